// MIT License
//
// Copyright (c) 2022 Ankur Srivastava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Avro datum encoding of serde values.

use crate::errors::RegistryError;
use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, to_avro_datum, Schema};
use serde::Serialize;

/// Avro encoding for anything serde can serialize.
///
/// ```rust
/// use avro_registry_client::prelude::*;
/// use avro_registry_client::apache_avro::Schema;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Beat {
///     beat: i64,
/// }
///
/// let schema = Schema::parse_str(
///     r#"{"type": "record", "name": "heartbeat", "fields": [{"name": "beat", "type": "long"}]}"#,
/// )
/// .unwrap();
/// let bytes = Beat { beat: 1 }.to_avro_datum(&schema).unwrap();
/// assert_eq!(bytes, vec![2]);
/// ```
pub trait SerdeExt: Serialize {
    /// Convert into an Avro value resolved against `schema`.
    fn to_avro_value(&self, schema: &Schema) -> Result<AvroValue, RegistryError> {
        let value = apache_avro::to_value(self)?;
        Ok(value.resolve(schema)?)
    }

    /// Avro binary encoding, without container or wire prefix.
    fn to_avro_datum(&self, schema: &Schema) -> Result<Vec<u8>, RegistryError> {
        encode_value(schema, self.to_avro_value(schema)?)
    }
}

impl<T: Serialize + ?Sized> SerdeExt for T {}

/// Encode an Avro value. The value is resolved against `schema` first, so
/// a `Map` works where a `Record` is expected.
pub fn encode_value(schema: &Schema, value: AvroValue) -> Result<Vec<u8>, RegistryError> {
    let value = value.resolve(schema)?;
    Ok(to_avro_datum(schema, value)?)
}

pub fn decode_value(schema: &Schema, mut payload: &[u8]) -> Result<AvroValue, RegistryError> {
    Ok(from_avro_datum(schema, &mut payload, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn record_schema() -> Schema {
        Schema::parse_str(
            r#"{
                "type": "record",
                "name": "test_schemas.schema2",
                "fields": [
                    {"name": "a", "type": "int"},
                    {"name": "b", "type": "string"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[derive(Serialize)]
    struct Pair {
        a: i32,
        b: String,
    }

    #[test]
    fn test_struct_to_record() {
        let schema = record_schema();
        let pair = Pair {
            a: 42,
            b: "hello".into(),
        };
        let bytes = pair.to_avro_datum(&schema).unwrap();
        // zigzag(42) = 84, then length-prefixed "hello".
        assert_eq!(bytes, [&[84u8, 10][..], b"hello"].concat());

        let decoded = decode_value(&schema, &bytes).unwrap();
        assert_eq!(
            decoded,
            AvroValue::Record(vec![
                ("a".into(), AvroValue::Int(42)),
                ("b".into(), AvroValue::String("hello".into())),
            ])
        );
    }

    #[test]
    fn test_json_value_to_record() {
        let schema = record_schema();
        let data = json!({"a": 42, "b": "hello"});
        let from_json = data.to_avro_datum(&schema).unwrap();
        let from_struct = Pair {
            a: 42,
            b: "hello".into(),
        }
        .to_avro_datum(&schema)
        .unwrap();
        assert_eq!(from_json, from_struct);
    }

    #[test]
    fn test_map_value_resolves() {
        let schema = record_schema();
        let value = AvroValue::Map(HashMap::from([
            ("a".to_string(), AvroValue::Int(1)),
            ("b".to_string(), AvroValue::String("x".into())),
        ]));
        let bytes = encode_value(&schema, value).unwrap();
        assert_eq!(bytes, vec![2, 2, b'x']);
    }

    #[test]
    fn test_mismatched_data() {
        let schema = record_schema();
        let err = json!({"a": "not a number"}).to_avro_datum(&schema).unwrap_err();
        assert!(matches!(err, RegistryError::Schema(_)));
    }

    #[test]
    fn test_truncated_payload() {
        let schema = record_schema();
        let err = decode_value(&schema, &[84]).unwrap_err();
        assert!(matches!(err, RegistryError::Schema(_)));
    }
}
