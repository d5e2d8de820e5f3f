use avro_registry_client::{
    CanonicalSchema, Deserializer, MockTransport, RegistryClient, Serializer,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{self, fmt, EnvFilter};

#[derive(Debug, Serialize, Deserialize)]
struct Alert {
    level: String,
    count: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let schema = CanonicalSchema::new(&json!({
        "type": "record",
        "name": "alert",
        "namespace": "demo",
        "fields": [
            {"name": "level", "type": "string"},
            {"name": "count", "type": "int"}
        ]
    }))?;

    // No registry needed: the schema is cached up front.
    let client = RegistryClient::with_transport("http://localhost:8081", MockTransport::default());
    client.schema_cache().insert(schema.clone(), 7);

    let serializer = Serializer::new(schema, 7);
    let message = serializer.serialize(&Alert {
        level: "warn".into(),
        count: 3,
    })?;
    tracing::info!(?message, "Encoded");

    let info = Deserializer::new(client).deserialize(&message, true).await?;
    let alert: Alert = info.decode_into()?;
    tracing::info!(id = info.id, ?alert, "Decoded");
    Ok(())
}
