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

use crate::client::http::REGISTRY_MEDIA_TYPE;
use crate::client::transport::{RegistryRequest, RegistryResponse, Transport};
use crate::errors::RegistryError;
use async_trait::async_trait;
use isahc::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use isahc::http::Method;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use url::Url;

/// A [`Transport`] that never touches the network.
///
/// Every request is recorded. Responses come from the first matching
/// route, or from the default response when no route matches.
///
/// ```rust
/// use avro_registry_client::{MockTransport, RegistryClient};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = MockTransport::json(200, &json!({"id": 1}));
/// let client = RegistryClient::with_transport("http://registry:8081", transport);
/// let schema = json!({"type": "record", "name": "a.b", "fields": []});
/// assert_eq!(client.register_schema(&schema, None).await?, 1);
/// assert_eq!(client.transport().request_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    default: Mutex<RegistryResponse>,
    routes: Vec<(Method, String, RegistryResponse)>,
    requests: Mutex<Vec<RegistryRequest>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(200, Vec::new())
    }
}

impl MockTransport {
    /// Answer every request with `status` and a registry JSON content type.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::with_response(mock_response(status, body.into()))
    }

    /// Answer every request with `status` and `body` serialized as JSON.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_response(response: RegistryResponse) -> Self {
        Self {
            default: Mutex::new(response),
            routes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer `method` requests to `path` with a JSON body.
    pub fn route(mut self, method: Method, path: &str, status: u16, body: &Value) -> Self {
        let body = match body {
            Value::Null => Vec::new(),
            other => other.to_string().into_bytes(),
        };
        self.routes
            .push((method, path.to_owned(), mock_response(status, body)));
        self
    }

    /// Replace the default response.
    pub fn set_response(&self, response: RegistryResponse) {
        *self.default.lock().unwrap_or_else(PoisonError::into_inner) = response;
    }

    pub fn requests(&self) -> Vec<RegistryRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_request(&self) -> Option<RegistryRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of recorded requests with the given method.
    pub fn count(&self, method: &Method) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| &request.method == method)
            .count()
    }

    fn respond(&self, request: &RegistryRequest) -> RegistryResponse {
        let path = Url::parse(&request.url).ok();
        let path = path.as_ref().map(Url::path);
        self.routes
            .iter()
            .find(|(method, route, _)| *method == request.method && Some(route.as_str()) == path)
            .map(|(_, _, response)| response.clone())
            .unwrap_or_else(|| {
                self.default
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: RegistryRequest) -> Result<RegistryResponse, RegistryError> {
        let response = self.respond(&request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(response)
    }
}

fn mock_response(status: u16, body: Vec<u8>) -> RegistryResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(REGISTRY_MEDIA_TYPE));
    RegistryResponse {
        status,
        headers,
        body,
    }
}
