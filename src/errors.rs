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

//! Errors to be used with the library, converts to and from
//! other dependencies' errors.

use thiserror::Error;

/// Failures of the in-memory schema and subject caches.
///
/// Plain cache lookups return `Option`; these only come out of
/// [`SubjectCache::insert`](crate::cache::SubjectCache::insert) and
/// [`SubjectCache::get`](crate::cache::SubjectCache::get).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Key or schema not in the cache")]
    NotFound,

    #[error("Cannot cache a non-integer version of a subject (got `{0}`)")]
    InvalidVersion(String),

    #[error("Provide either a schema_id or schema argument (or both)")]
    MissingArgument,

    #[error(
        "Schema ID {schema_id} for subject `{subject}` version {version} is not in the \
         schema cache, provide the schema as well as the schema_id"
    )]
    MissingSchema {
        subject: String,
        version: i32,
        schema_id: u32,
    },

    #[error(
        "Schema for subject `{subject}` version {version} is not in the schema cache, \
         provide the schema_id as well as the schema"
    )]
    MissingSchemaId { subject: String, version: i32 },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("File read error")]
    IO(#[from] std::io::Error),

    #[error("Schema parsing error: {0}")]
    Schema(#[from] apache_avro::Error),

    #[error("Serializing/Deserializing error  {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    /// 3XX response. No error envelope is read from these.
    #[error("Registry redirection ({status_code})")]
    Redirection { status_code: u16 },

    /// 4XX response: bad schema, unknown subject/version, incompatible
    /// schema change, or an auth failure.
    #[error("{}", describe("Registry bad request", *.status_code, .error_code, .message))]
    BadRequest {
        status_code: u16,
        error_code: Option<i32>,
        message: Option<String>,
    },

    /// 5XX response, the registry itself is broken.
    #[error("{}", describe("Registry server error", *.status_code, .error_code, .message))]
    Server {
        status_code: u16,
        error_code: Option<i32>,
        message: Option<String>,
    },

    #[error("Unexpected registry status code {status_code}")]
    Http { status_code: u16 },

    #[error("Data is too short, length is {len} bytes. Must be >= 5")]
    MalformedMessage { len: usize },

    #[error("{0}")]
    Configuration(String),

    #[error("Schema is not managed locally: {0}")]
    UnmanagedSchema(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid registry url: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTPClientError: {source}")]
    HTTPClient {
        #[from]
        source: isahc::Error,
    },

    #[error("HTTPRequestError: {source}")]
    HTTPRequest {
        #[from]
        source: isahc::http::Error,
    },

    #[error("TransportError: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl RegistryError {
    /// HTTP status of a registry response that was classified as an error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RegistryError::Redirection { status_code }
            | RegistryError::Http { status_code }
            | RegistryError::BadRequest { status_code, .. }
            | RegistryError::Server { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// The `error_code` field of the registry's error envelope, if one was sent.
    pub fn error_code(&self) -> Option<i32> {
        match self {
            RegistryError::BadRequest { error_code, .. }
            | RegistryError::Server { error_code, .. } => *error_code,
            _ => None,
        }
    }

    /// The `message` field of the registry's error envelope, if one was sent.
    pub fn message(&self) -> Option<&str> {
        match self {
            RegistryError::BadRequest { message, .. } | RegistryError::Server { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

fn describe(kind: &str, status_code: u16, error_code: &Option<i32>, message: &Option<String>) -> String {
    match (error_code, message) {
        (Some(code), Some(message)) => format!("{kind} ({status_code}). {code} - {message}"),
        (None, Some(message)) => format!("{kind} ({status_code}). {message}"),
        _ => format!("{kind} ({status_code})"),
    }
}
