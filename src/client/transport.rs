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

use crate::client::http::decipher_response;
use crate::client::types::{Auth, ClientConfig};
use crate::errors::RegistryError;
use async_trait::async_trait;
use isahc::http::header::{HeaderMap, CONTENT_LENGTH};
use isahc::http::Method;
use isahc::{
    auth::{Authentication, Credentials},
    config::{RedirectPolicy, VersionNegotiation},
    prelude::*,
    AsyncReadResponseExt, HttpClient,
};
use serde_json::Value;

/// One HTTP request to the registry, fully built.
#[derive(Debug, Clone)]
pub struct RegistryRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// The raw response to a [`RegistryRequest`].
#[derive(Debug, Clone, Default)]
pub struct RegistryResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RegistryResponse {
    /// Decode the body, or classify the status as an error.
    pub fn decipher(&self) -> Result<Value, RegistryError> {
        decipher_response(self.status, &self.headers, &self.body)
    }
}

/// Anything that can perform one HTTP exchange with the registry.
///
/// Timeouts, retries and connection errors belong to the implementation;
/// errors are handed back to the caller untouched.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RegistryRequest) -> Result<RegistryResponse, RegistryError>;
}

/// [`Transport`] backed by an isahc [`HttpClient`].
#[derive(Clone, Debug)]
pub struct IsahcTransport {
    httpclient: HttpClient,
}

impl IsahcTransport {
    /// Build an HTTP client from the given configuration.
    ///
    /// ```rust,no_run
    /// use avro_registry_client::prelude::*;
    /// use avro_registry_client::IsahcTransport;
    ///
    /// let config = ClientConfig::new("http://localhost:8081").with_auth(Auth::Basic {
    ///     username: "username".to_string(),
    ///     password: "password".to_string(),
    /// });
    /// let transport = IsahcTransport::new(&config).unwrap();
    /// ```
    pub fn new(config: &ClientConfig) -> Result<Self, RegistryError> {
        let redirect_policy = match config.max_redirects {
            0 => RedirectPolicy::None,
            n => RedirectPolicy::Limit(n),
        };
        let builder = HttpClient::builder()
            .version_negotiation(VersionNegotiation::http11())
            .redirect_policy(redirect_policy)
            .timeout(config.timeout());

        let httpclient = match &config.auth {
            Auth::Basic { username, password } => builder
                .authentication(Authentication::basic())
                .credentials(Credentials::new(username.as_str(), password.as_str())),
            Auth::None => builder,
        }
        .build()?;

        Ok(Self { httpclient })
    }

    /// Wrap an already configured client.
    pub fn from_client(httpclient: HttpClient) -> Self {
        Self { httpclient }
    }
}

#[async_trait]
impl Transport for IsahcTransport {
    async fn send(&self, request: RegistryRequest) -> Result<RegistryResponse, RegistryError> {
        let mut http_request = isahc::Request::builder()
            .method(request.method)
            .uri(request.url.as_str())
            .body(request.body)?;
        *http_request.headers_mut() = request.headers;
        // curl computes the content-length from the body itself.
        http_request.headers_mut().remove(CONTENT_LENGTH);

        let mut response = self.httpclient.send_async(http_request).await?;
        let body = response.bytes().await?;
        Ok(RegistryResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body,
        })
    }
}
