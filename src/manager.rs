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

//! Local schema management for the record name subject strategy.

use crate::client::types::CompatibilityType;
use crate::client::{IsahcTransport, RegistryClient, Transport};
use crate::errors::RegistryError;
use crate::schema::{CanonicalSchema, FromFile};
use crate::serializer::PolySerializer;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;
use walkdir::WalkDir;

/// Keeps the schemas of an application on disk and registers them under
/// their fully-qualified names.
///
/// Every `*.json` file below `root` (at any depth) is a schema. A
/// non-empty `suffix` is appended to each schema's name, which keeps
/// subjects used while testing apart from production ones.
///
/// ```rust,no_run
/// use avro_registry_client::{RecordNameSchemaManager, RegistryClient};
/// use avro_registry_client::types::Auth;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main()-> Result<(), Box<dyn std::error::Error>>{
/// let client = RegistryClient::new("http://localhost:8081", Auth::None)?;
/// let manager = RecordNameSchemaManager::new("schemas", client, "_dev1")?;
/// manager.register_schemas(Some("FORWARD")).await?;
/// let message = manager
///     .serialize(&json!({"beat": 1}), "test-schemas.heartbeat_dev1")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RecordNameSchemaManager<T = IsahcTransport> {
    root: PathBuf,
    suffix: String,
    serializer: PolySerializer<T>,
    schemas: BTreeMap<String, CanonicalSchema>,
}

impl<T: Transport> RecordNameSchemaManager<T> {
    pub fn new(
        root: impl AsRef<Path>,
        registry: RegistryClient<T>,
        suffix: &str,
    ) -> Result<Self, RegistryError> {
        let root = root.as_ref().to_path_buf();
        let schemas = load_schemas(&root, suffix)?;
        tracing::debug!(root = %root.display(), count = schemas.len(), "Loaded schemas");
        Ok(Self {
            root,
            suffix: suffix.to_owned(),
            serializer: PolySerializer::new(registry),
            schemas,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn registry(&self) -> &RegistryClient<T> {
        self.serializer.registry()
    }

    /// Local schemas keyed by fully-qualified name.
    pub fn schemas(&self) -> &BTreeMap<String, CanonicalSchema> {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&CanonicalSchema> {
        self.schemas.get(name)
    }

    /// Register every local schema under a subject named after it.
    ///
    /// With a `compatibility` level, each subject is set to that level
    /// unless it already has it. `None` leaves subject configs untouched,
    /// so new subjects inherit the registry's global level.
    #[instrument(level = "info", skip(self), err)]
    pub async fn register_schemas(&self, compatibility: Option<&str>) -> Result<(), RegistryError> {
        let compatibility = compatibility
            .map(CompatibilityType::parse_level)
            .transpose()?;

        for (subject, schema) in &self.schemas {
            let id = self
                .registry()
                .register_canonical(schema, Some(subject))
                .await?;
            tracing::debug!(subject, id, "Registered local schema");

            if let Some(level) = compatibility {
                self.set_subject_compatibility(subject, level).await?;
            }
        }
        Ok(())
    }

    async fn set_subject_compatibility(
        &self,
        subject: &str,
        level: CompatibilityType,
    ) -> Result<(), RegistryError> {
        let current = self.registry().get_subject_compatibility(subject).await?;
        tracing::debug!(subject, ?current, "Current config");
        if current != Some(level) {
            self.registry()
                .set_subject_compatibility(subject, level)
                .await?;
        }
        Ok(())
    }

    /// Serialize `data` with the local schema called `name`.
    pub async fn serialize<D: Serialize + ?Sized>(
        &self,
        data: &D,
        name: &str,
    ) -> Result<Vec<u8>, RegistryError> {
        let Some(schema) = self.schemas.get(name) else {
            return Err(RegistryError::UnmanagedSchema(format!(
                "Schema named '{name}' not among the locally-registered schemas. \
                 Available schemas are: {:?}",
                self.schemas.keys().collect::<Vec<_>>()
            )));
        };
        self.serializer
            .serialize(data, Some(schema.as_value()), None, Some(name))
            .await
    }
}

fn load_schemas(root: &Path, suffix: &str) -> Result<BTreeMap<String, CanonicalSchema>, RegistryError> {
    let mut schemas = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let mut raw = Value::from_file(path)?;
        if !suffix.is_empty() {
            if let Some(Value::String(name)) = raw.get_mut("name") {
                name.push_str(suffix);
            }
        }
        let schema = CanonicalSchema::new(&raw)?;
        let Some(name) = schema.name() else {
            return Err(RegistryError::Configuration(format!(
                "Schema {} has no name",
                path.display()
            )));
        };
        schemas.insert(name.to_owned(), schema);
    }
    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::wire::pack_prefix;
    use isahc::http::Method;
    use serde_json::json;

    const SCHEMA_ROOT: &str = "tests/data/schemas";

    fn registry_transport() -> MockTransport {
        MockTransport::default()
            .route(
                Method::POST,
                "/subjects/test-schemas.heartbeat/versions",
                200,
                &json!({"id": 1}),
            )
            .route(
                Method::POST,
                "/subjects/test-schemas.alert/versions",
                200,
                &json!({"id": 2}),
            )
            .route(
                Method::GET,
                "/config/test-schemas.heartbeat",
                200,
                &json!({"compatibilityLevel": "FORWARD"}),
            )
            .route(
                Method::GET,
                "/config/test-schemas.alert",
                404,
                &json!({"error_code": 40401, "message": "Subject not found."}),
            )
            .route(
                Method::PUT,
                "/config/test-schemas.alert",
                200,
                &json!({"compatibility": "FORWARD"}),
            )
    }

    fn manager(suffix: &str) -> RecordNameSchemaManager<MockTransport> {
        let client = RegistryClient::with_transport("http://registry:8081", registry_transport());
        RecordNameSchemaManager::new(SCHEMA_ROOT, client, suffix).unwrap()
    }

    #[test]
    fn test_load_schemas() {
        let manager = manager("");
        let names: Vec<_> = manager.schemas().keys().cloned().collect();
        assert_eq!(names, vec!["test-schemas.alert", "test-schemas.heartbeat"]);
        assert_eq!(manager.root(), Path::new(SCHEMA_ROOT));
    }

    #[test]
    fn test_load_schemas_with_suffix() {
        let manager = manager("_dev1");
        assert!(manager.schema("test-schemas.heartbeat_dev1").is_some());
        assert!(manager.schema("test-schemas.alert_dev1").is_some());
        assert!(manager.schema("test-schemas.heartbeat").is_none());
        assert_eq!(manager.suffix(), "_dev1");
    }

    #[test]
    fn test_unnamed_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain.json"), r#""string""#).unwrap();
        let client = RegistryClient::with_transport("http://registry:8081", MockTransport::default());
        let result = RecordNameSchemaManager::new(dir.path(), client, "");
        assert!(matches!(result, Err(RegistryError::Configuration(_))));
    }

    #[test]
    fn test_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let client = RegistryClient::with_transport("http://registry:8081", MockTransport::default());
        let manager = RecordNameSchemaManager::new(dir.path(), client, "").unwrap();
        assert!(manager.schemas().is_empty());
    }

    #[tokio::test]
    async fn test_register_schemas_sets_compatibility() {
        let manager = manager("");
        manager.register_schemas(Some("FORWARD")).await.unwrap();

        let transport = manager.registry().transport();
        assert_eq!(transport.count(&Method::POST), 2);
        assert_eq!(transport.count(&Method::GET), 2);

        // heartbeat already has FORWARD.
        let puts: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|request| request.method == Method::PUT)
            .collect();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].url, "http://registry:8081/config/test-schemas.alert");
        let body: Value = serde_json::from_slice(&puts[0].body).unwrap();
        assert_eq!(body, json!({"compatibility": "FORWARD"}));
    }

    #[tokio::test]
    async fn test_register_schemas_without_compatibility() {
        let manager = manager("");
        manager.register_schemas(None).await.unwrap();
        let transport = manager.registry().transport();
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.count(&Method::POST), 2);
    }

    #[tokio::test]
    async fn test_register_schemas_bad_compatibility() {
        let manager = manager("");
        let err = manager.register_schemas(Some("SIDEWAYS")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Configuration(_)));
        assert_eq!(manager.registry().transport().request_count(), 0);
    }

    #[tokio::test]
    async fn test_serialize() {
        let manager = manager("");
        let message = manager
            .serialize(&json!({"beat": 5}), "test-schemas.heartbeat")
            .await
            .unwrap();
        assert_eq!(message[..5], pack_prefix(1));
        assert_eq!(&message[5..], &[10]);
        assert_eq!(
            manager.registry().transport().last_request().unwrap().url,
            "http://registry:8081/subjects/test-schemas.heartbeat/versions"
        );
    }

    #[tokio::test]
    async fn test_serialize_unmanaged() {
        let manager = manager("");
        let err = manager
            .serialize(&json!({"beat": 5}), "test-schemas.unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnmanagedSchema(_)));
        assert_eq!(manager.registry().transport().request_count(), 0);
    }
}
