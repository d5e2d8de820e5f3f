//! Cached client for the Confluent Schema Registry, with Avro serializers
//! for the Confluent wire format.
//!
//! ```rust,no_run
//! use avro_registry_client::prelude::*;
//! use avro_registry_client::{Deserializer, RegistryClient, Serializer};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main()-> Result<(), Box<dyn std::error::Error>>{
//! let client = RegistryClient::from_config(&ClientConfig::from_env()?)?;
//! let schema = json!({
//!     "type": "record",
//!     "name": "heartbeat",
//!     "namespace": "test-schemas",
//!     "fields": [{"name": "beat", "type": "long"}]
//! });
//! let serializer = Serializer::register(&client, &schema, None).await?;
//! let message = serializer.serialize(&json!({"beat": 1}))?;
//!
//! let info = Deserializer::new(client).deserialize(&message, false).await?;
//! assert_eq!(info.id, serializer.id());
//! # Ok(())
//! # }
//! ```
pub mod cache;
pub mod errors;
mod manager;
mod schema;
mod serde_ext;
mod serializer;
pub mod wire;

mod client;
pub use client::*;

pub use cache::{SchemaCache, SubjectCache, SubjectSchema, Version};
pub use errors::{CacheError, RegistryError};
pub use manager::RecordNameSchemaManager;
pub use schema::{fully_qualified_name, CanonicalSchema, FromFile};
pub use serde_ext::{decode_value, encode_value, SerdeExt};
pub use serializer::{Deserializer, MessageInfo, PolySerializer, Serializer};

pub use apache_avro;

/// Registry-global identifier of one exact schema.
pub type SchemaId = u32;

pub mod prelude {
    pub use super::schema::FromFile;
    pub use super::types::*;
    pub use super::SerdeExt;
}
