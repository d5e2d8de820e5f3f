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

//! Confluent wire format serializers.
//!
//! Messages are a five byte prefix (see [`crate::wire`]) followed by the
//! Avro binary encoding of the data.

use crate::client::{IsahcTransport, RegistryClient, Transport};
use crate::errors::RegistryError;
use crate::schema::CanonicalSchema;
use crate::serde_ext::{decode_value, encode_value};
use crate::wire::{pack_prefix, unpack_prefix, PREFIX_LEN};
use crate::SchemaId;
use apache_avro::types::Value as AvroValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

fn make_message(
    schema_id: SchemaId,
    schema: &CanonicalSchema,
    value: AvroValue,
) -> Result<Vec<u8>, RegistryError> {
    let datum = encode_value(schema.avro(), value)?;
    let mut message = Vec::with_capacity(PREFIX_LEN + datum.len());
    message.extend_from_slice(&pack_prefix(schema_id));
    message.extend_from_slice(&datum);
    Ok(message)
}

/// Serializer dedicated to a single schema.
///
/// ```rust,no_run
/// use avro_registry_client::{RegistryClient, Serializer};
/// use avro_registry_client::types::Auth;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main()-> Result<(), Box<dyn std::error::Error>>{
/// let client = RegistryClient::new("http://localhost:8081", Auth::None)?;
/// let schema = json!({
///     "type": "record",
///     "name": "schema1",
///     "namespace": "test-schemas",
///     "fields": [{"name": "a", "type": "int"}, {"name": "b", "type": "string"}]
/// });
/// let serializer = Serializer::register(&client, &schema, None).await?;
/// let message = serializer.serialize(&json!({"a": 42, "b": "Hello world!"}))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Serializer {
    schema: CanonicalSchema,
    id: SchemaId,
}

impl Serializer {
    pub fn new(schema: CanonicalSchema, schema_id: SchemaId) -> Self {
        Self {
            schema,
            id: schema_id,
        }
    }

    /// Register `schema` (or find its existing ID) and bind a serializer to
    /// it. Safe to call for schemas that are already registered.
    pub async fn register<T: Transport>(
        registry: &RegistryClient<T>,
        schema: &Value,
        subject: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let schema = CanonicalSchema::new(schema)?;
        let id = registry.register_canonical(&schema, subject).await?;
        Ok(Self::new(schema, id))
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn schema(&self) -> &CanonicalSchema {
        &self.schema
    }

    /// Encode `data` in the wire format.
    pub fn serialize<D: Serialize + ?Sized>(&self, data: &D) -> Result<Vec<u8>, RegistryError> {
        self.serialize_value(apache_avro::to_value(data)?)
    }

    pub fn serialize_value(&self, value: AvroValue) -> Result<Vec<u8>, RegistryError> {
        make_message(self.id, &self.schema, value)
    }
}

/// Serializer for messages of any schema, resolving IDs through a registry
/// client.
#[derive(Debug, Clone)]
pub struct PolySerializer<T = IsahcTransport> {
    registry: RegistryClient<T>,
}

impl<T: Transport> PolySerializer<T> {
    pub fn new(registry: RegistryClient<T>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RegistryClient<T> {
        &self.registry
    }

    /// Encode `data` in the wire format.
    ///
    /// With a `schema_id`, the schema always comes from the registry client
    /// and `schema` is ignored. Otherwise `schema` is registered under
    /// `subject` (or its fully-qualified name) to get an ID.
    #[instrument(level = "debug", skip(self, data, schema), err)]
    pub async fn serialize<D: Serialize + ?Sized>(
        &self,
        data: &D,
        schema: Option<&Value>,
        schema_id: Option<SchemaId>,
        subject: Option<&str>,
    ) -> Result<Vec<u8>, RegistryError> {
        let (schema, schema_id) = match (schema_id, schema) {
            (Some(id), _) => (self.registry.get_schema_by_id(id).await?, id),
            (None, Some(schema)) => {
                let schema = CanonicalSchema::new(schema)?;
                let id = self.registry.register_canonical(&schema, subject).await?;
                (schema, id)
            }
            (None, None) => {
                return Err(RegistryError::Configuration(
                    "Pass either a schema or schema_id parameter.".into(),
                ))
            }
        };
        make_message(schema_id, &schema, apache_avro::to_value(data)?)
    }
}

/// A decoded message with its schema ID.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageInfo {
    pub id: SchemaId,
    pub message: AvroValue,
    /// Only set when requested from [`Deserializer::deserialize`].
    pub schema: Option<CanonicalSchema>,
}

impl MessageInfo {
    /// Convert the message into any deserializable type.
    pub fn decode_into<D: DeserializeOwned>(&self) -> Result<D, RegistryError> {
        Ok(apache_avro::from_value(&self.message)?)
    }
}

/// Deserializer for wire format messages. Schemas are looked up by the
/// ID in the message prefix, through the client's cache.
#[derive(Debug, Clone)]
pub struct Deserializer<T = IsahcTransport> {
    registry: RegistryClient<T>,
}

impl<T: Transport> Deserializer<T> {
    pub fn new(registry: RegistryClient<T>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RegistryClient<T> {
        &self.registry
    }

    #[instrument(level = "debug", skip(self, data), fields(len = data.len()), err)]
    pub async fn deserialize(
        &self,
        data: &[u8],
        include_schema: bool,
    ) -> Result<MessageInfo, RegistryError> {
        let (id, payload) = unpack_prefix(data)?;
        let schema = self.registry.get_schema_by_id(id).await?;
        let message = decode_value(schema.avro(), payload)?;
        Ok(MessageInfo {
            id,
            message,
            schema: include_schema.then_some(schema),
        })
    }
}
