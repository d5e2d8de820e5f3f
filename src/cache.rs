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

//! Process-lifetime caches of registry state.
//!
//! [`SchemaCache`] maps schema IDs to canonical schemas and back.
//! [`SubjectCache`] maps `(subject, version)` pairs to schema IDs and is
//! layered on a shared [`SchemaCache`]. Entries are never evicted.

use crate::errors::CacheError;
use crate::schema::CanonicalSchema;
use crate::SchemaId;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// A version of a subject in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// Most recent version, resolved by the registry on every request.
    #[default]
    Latest,
    Number(i32),
}

impl Version {
    /// The version number if it can be cached.
    pub fn concrete(self) -> Result<i32, CacheError> {
        match self {
            Version::Number(n) if n >= 0 => Ok(n),
            other => Err(CacheError::InvalidVersion(other.to_string())),
        }
    }
}

impl From<i32> for Version {
    fn from(n: i32) -> Self {
        Version::Number(n)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => f.write_str("latest"),
            Version::Number(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Version {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(Version::Latest);
        }
        s.parse::<i32>()
            .map(Version::Number)
            .map_err(|_| CacheError::InvalidVersion(s.to_owned()))
    }
}

/// Everything known about one subject version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectSchema {
    pub subject: String,
    pub version: i32,
    pub id: SchemaId,
    pub schema: CanonicalSchema,
}

#[derive(Debug, Default)]
struct SchemaMaps {
    by_id: HashMap<SchemaId, CanonicalSchema>,
    by_schema: HashMap<CanonicalSchema, SchemaId>,
}

/// Bidirectional cache between schema IDs and canonical schemas.
#[derive(Debug, Default)]
pub struct SchemaCache {
    maps: RwLock<SchemaMaps>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a schema under its registry ID.
    ///
    /// Re-inserting the same pair is a no-op. Last write wins: an ID that
    /// is re-inserted with another schema drops the old schema's reverse
    /// entry, and a schema re-inserted with another ID resolves to the new
    /// ID while the old ID keeps pointing at it.
    pub fn insert(&self, schema: CanonicalSchema, id: SchemaId) {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = maps.by_id.insert(id, schema.clone()) {
            if previous != schema && maps.by_schema.get(&previous) == Some(&id) {
                maps.by_schema.remove(&previous);
            }
        }
        maps.by_schema.insert(schema, id);
    }

    /// Canonicalize a raw schema document and cache it.
    pub fn insert_raw(&self, schema: &Value, id: SchemaId) -> Result<(), crate::RegistryError> {
        self.insert(CanonicalSchema::new(schema)?, id);
        Ok(())
    }

    pub fn get_by_id(&self, id: SchemaId) -> Option<CanonicalSchema> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.by_id.get(&id).cloned()
    }

    pub fn get_by_schema(&self, schema: &CanonicalSchema) -> Option<SchemaId> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.by_schema.get(schema).copied()
    }

    /// Look up the ID of a raw schema document.
    ///
    /// A document that fails to canonicalize is reported as a miss.
    pub fn get_by_raw(&self, schema: &Value) -> Option<SchemaId> {
        let schema = CanonicalSchema::new(schema).ok()?;
        self.get_by_schema(&schema)
    }

    pub fn contains_id(&self, id: SchemaId) -> bool {
        self.get_by_id(id).is_some()
    }

    pub fn contains_schema(&self, schema: &CanonicalSchema) -> bool {
        self.get_by_schema(schema).is_some()
    }

    pub fn contains_raw(&self, schema: &Value) -> bool {
        self.get_by_raw(schema).is_some()
    }

    pub fn len(&self) -> usize {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache of `(subject, version) -> schema ID`, layered on a [`SchemaCache`].
///
/// Every cached subject version resolves to a schema in the underlying
/// schema cache. Only concrete versions are cached, never `latest`.
#[derive(Debug)]
pub struct SubjectCache {
    schema_cache: Arc<SchemaCache>,
    subjects: RwLock<HashMap<(String, i32), SchemaId>>,
}

impl SubjectCache {
    pub fn new(schema_cache: Arc<SchemaCache>) -> Self {
        Self {
            schema_cache,
            subjects: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// Cache a subject version.
    ///
    /// If the schema is already in the schema cache, either `schema_id` or
    /// `schema` is enough. Otherwise both are needed, and the pair is added
    /// to the schema cache first.
    pub fn insert(
        &self,
        subject: &str,
        version: impl Into<Version>,
        schema_id: Option<SchemaId>,
        schema: Option<&CanonicalSchema>,
    ) -> Result<(), CacheError> {
        let version = version.into().concrete()?;

        let id = match (schema_id, schema) {
            (Some(id), schema) => {
                if !self.schema_cache.contains_id(id) {
                    let schema = schema.ok_or_else(|| CacheError::MissingSchema {
                        subject: subject.to_owned(),
                        version,
                        schema_id: id,
                    })?;
                    self.schema_cache.insert(schema.clone(), id);
                }
                id
            }
            (None, Some(schema)) => self.schema_cache.get_by_schema(schema).ok_or_else(|| {
                CacheError::MissingSchemaId {
                    subject: subject.to_owned(),
                    version,
                }
            })?,
            (None, None) => return Err(CacheError::MissingArgument),
        };

        let mut subjects = self.subjects.write().unwrap_or_else(PoisonError::into_inner);
        subjects.insert((subject.to_owned(), version), id);
        Ok(())
    }

    pub fn get_id(&self, subject: &str, version: i32) -> Option<SchemaId> {
        let subjects = self.subjects.read().unwrap_or_else(PoisonError::into_inner);
        subjects.get(&(subject.to_owned(), version)).copied()
    }

    pub fn get_schema(&self, subject: &str, version: i32) -> Option<CanonicalSchema> {
        self.get_id(subject, version)
            .and_then(|id| self.schema_cache.get_by_id(id))
    }

    /// The full cached record of a subject version.
    ///
    /// Fails with [`CacheError::InvalidVersion`] for `latest`, which always
    /// has to be resolved by the registry.
    pub fn get(&self, subject: &str, version: impl Into<Version>) -> Result<SubjectSchema, CacheError> {
        let version = version.into().concrete()?;
        let id = self.get_id(subject, version).ok_or(CacheError::NotFound)?;
        let schema = self.schema_cache.get_by_id(id).ok_or(CacheError::NotFound)?;
        Ok(SubjectSchema {
            subject: subject.to_owned(),
            version,
            id,
            schema,
        })
    }

    pub fn contains(&self, subject: &str, version: i32) -> bool {
        self.get_id(subject, version).is_some()
    }
}
