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

//! Canonical representation of Avro schemas.
//!
//! Two structurally identical schemas always canonicalize to the same JSON
//! string, whatever their key order or namespace spelling. That string is
//! the cache key and the exact payload sent when registering.

use crate::errors::RegistryError;
use apache_avro::Schema;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

const NAMED_TYPES: [&str; 4] = ["record", "error", "enum", "fixed"];

const KEYWORDS: [&str; 14] = [
    "null", "boolean", "int", "long", "float", "double", "bytes", "string", "record", "error",
    "enum", "fixed", "array", "map",
];

/// A validated Avro schema reduced to its canonical JSON form.
///
/// Equality and hashing only look at the canonical JSON.
#[derive(Clone, Debug)]
pub struct CanonicalSchema {
    json: Arc<str>,
    value: Arc<Value>,
    name: Option<Arc<str>>,
    avro: Arc<Schema>,
}

impl CanonicalSchema {
    /// Canonicalize and validate a schema given as JSON.
    pub fn new(raw: &Value) -> Result<Self, RegistryError> {
        let value = normalize(raw, None);
        let avro = Schema::parse(&avro_compatible(&value))?;
        let name = match &value {
            Value::Object(map) if is_named(map) => {
                map.get("name").and_then(Value::as_str).map(Arc::from)
            }
            _ => None,
        };
        let json = serde_json::to_string(&value)?;
        Ok(Self {
            json: Arc::from(json),
            value: Arc::new(value),
            name,
            avro: Arc::new(avro),
        })
    }

    pub fn parse_str(schema: &str) -> Result<Self, RegistryError> {
        let raw: Value = serde_json::from_str(schema)?;
        Self::new(&raw)
    }

    /// The canonical JSON string.
    pub fn as_str(&self) -> &str {
        &self.json
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Fully-qualified name of a named (record, enum, fixed) schema.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The parsed schema used by the Avro encoder and decoder.
    ///
    /// Names that the Avro naming rules reject (`test-schemas.heartbeat`,
    /// `1st`) are rewritten here with `_`. The canonical JSON keeps the
    /// original names.
    pub fn avro(&self) -> &Schema {
        &self.avro
    }
}

impl PartialEq for CanonicalSchema {
    fn eq(&self, other: &Self) -> bool {
        self.json == other.json
    }
}

impl Eq for CanonicalSchema {}

impl Hash for CanonicalSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.json.hash(state);
    }
}

impl fmt::Display for CanonicalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.json)
    }
}

impl FromStr for CanonicalSchema {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl TryFrom<&Value> for CanonicalSchema {
    type Error = RegistryError;

    fn try_from(raw: &Value) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl TryFrom<Value> for CanonicalSchema {
    type Error = RegistryError;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

/// Load a schema from a JSON file on disk.
pub trait FromFile: Sized {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError>;
}

impl FromFile for CanonicalSchema {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_str(&text)
    }
}

impl FromFile for Value {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Fully-qualified name of a raw schema document.
///
/// A `name` containing a period is already fully-qualified. Otherwise a
/// `namespace` is prepended when present.
pub fn fully_qualified_name(schema: &Value) -> Option<String> {
    let map = schema.as_object()?;
    let name = map.get("name")?.as_str()?;
    let namespace = map.get("namespace").and_then(Value::as_str);
    Some(fullname(name, namespace, None))
}

fn is_named(map: &Map<String, Value>) -> bool {
    map.get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| NAMED_TYPES.contains(&t))
}

fn fullname(name: &str, namespace: Option<&str>, enclosing: Option<&str>) -> String {
    if name.contains('.') {
        return name.to_owned();
    }
    // An explicit empty namespace means the null namespace.
    let namespace = match namespace {
        Some(ns) => Some(ns),
        None => enclosing,
    };
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_owned(),
    }
}

fn qualify(reference: &str, namespace: Option<&str>) -> String {
    if KEYWORDS.contains(&reference) {
        return reference.to_owned();
    }
    fullname(reference, None, namespace)
}

fn normalize(value: &Value, namespace: Option<&str>) -> Value {
    match value {
        Value::String(reference) => Value::String(qualify(reference, namespace)),
        Value::Array(branches) => Value::Array(
            branches
                .iter()
                .map(|branch| normalize(branch, namespace))
                .collect(),
        ),
        Value::Object(map) => normalize_object(map, namespace),
        other => other.clone(),
    }
}

fn normalize_object(map: &Map<String, Value>, namespace: Option<&str>) -> Value {
    let mut out: BTreeMap<String, Value> =
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    let mut inner = namespace.map(str::to_owned);
    if is_named(map) {
        if let Some(name) = map.get("name").and_then(Value::as_str) {
            let fqn = fullname(name, map.get("namespace").and_then(Value::as_str), namespace);
            inner = fqn.rsplit_once('.').map(|(ns, _)| ns.to_owned());
            out.remove("namespace");
            out.insert("name".into(), Value::String(fqn));
        }
    }
    let inner = inner.as_deref();

    if let Some(type_) = map.get("type") {
        out.insert("type".into(), normalize(type_, namespace));
    }
    if let Some(Value::Array(fields)) = map.get("fields") {
        let fields = fields.iter().map(|f| normalize_field(f, inner)).collect();
        out.insert("fields".into(), Value::Array(fields));
    }
    if let Some(items) = map.get("items") {
        out.insert("items".into(), normalize(items, inner));
    }
    if let Some(values) = map.get("values") {
        out.insert("values".into(), normalize(values, inner));
    }

    Value::Object(out.into_iter().collect())
}

fn normalize_field(field: &Value, namespace: Option<&str>) -> Value {
    let Some(map) = field.as_object() else {
        return field.clone();
    };
    let mut out: BTreeMap<String, Value> =
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    if let Some(type_) = map.get("type") {
        out.insert("type".into(), normalize(type_, namespace));
    }
    Value::Object(out.into_iter().collect())
}

/// Copy of a canonical schema whose names all satisfy the Avro naming
/// rules. Names never reach the binary encoding.
fn avro_compatible(value: &Value) -> Value {
    match value {
        Value::String(reference) => Value::String(avro_name(reference)),
        Value::Array(branches) => Value::Array(branches.iter().map(avro_compatible).collect()),
        Value::Object(map) => {
            let mut out = map.clone();
            if is_named(map) {
                out.remove("aliases");
                if let Some(Value::String(name)) = map.get("name") {
                    out.insert("name".into(), Value::String(avro_name(name)));
                }
            }
            for key in ["type", "items", "values"] {
                if let Some(inner) = map.get(key) {
                    out.insert(key.into(), avro_compatible(inner));
                }
            }
            if let Some(Value::Array(fields)) = map.get("fields") {
                let fields = fields
                    .iter()
                    .map(|field| match field {
                        Value::Object(field) => {
                            let mut field = field.clone();
                            let type_ = field.get("type").map(avro_compatible);
                            if let Some(type_) = type_ {
                                field.insert("type".into(), type_);
                            }
                            Value::Object(field)
                        }
                        other => other.clone(),
                    })
                    .collect();
                out.insert("fields".into(), Value::Array(fields));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn avro_name(fullname: &str) -> String {
    fullname
        .split('.')
        .map(avro_name_component)
        .collect::<Vec<_>>()
        .join(".")
}

fn avro_name_component(component: &str) -> String {
    let mut out: String = component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !out.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        out.insert(0, '_');
    }
    out
}
