use avro_registry_client::prelude::*;
use avro_registry_client::RegistryClient;
use serde_json::json;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{self, fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;
    let client = RegistryClient::from_config(&config)?;

    let schema = json!({
        "type": "record",
        "name": "heartbeat",
        "namespace": "demo",
        "fields": [{"name": "beat", "type": "long"}]
    });
    let id = client
        .register_schema_for_topic(&schema, "heartbeats", SchemaSubjectType::Value)
        .await?;
    tracing::info!(id, "Registered");

    // The second lookup is served from the cache.
    let _schema = client.get_schema_by_id(id).await?;
    let _schema = client.get_schema_by_id(id).await?;

    let latest = client
        .get_schema_by_subject("heartbeats-value", avro_registry_client::Version::Latest)
        .await?;
    tracing::info!(version = latest.version, schema = %latest.schema, "Latest version");

    let level = client.get_subject_compatibility("heartbeats-value").await?;
    tracing::info!(?level, "Compatibility");
    Ok(())
}
