mod http;
mod inflight;
mod mock;
mod srclient;
mod transport;
pub mod types;

pub use http::{
    decipher_response, decode_body, format_url, make_headers, parse_content_type,
    JSON_CONTENT_TYPE, REGISTRY_MEDIA_TYPE,
};
pub use mock::MockTransport;
pub use srclient::RegistryClient;
pub use transport::{IsahcTransport, RegistryRequest, RegistryResponse, Transport};
