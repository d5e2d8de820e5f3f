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

use crate::cache::{SchemaCache, SubjectCache, SubjectSchema, Version};
use crate::client::http::{format_url, make_headers, JSON_CONTENT_TYPE};
use crate::client::inflight::InFlight;
use crate::client::transport::{IsahcTransport, RegistryRequest, Transport};
use crate::client::types::*;
use crate::errors::RegistryError;
use crate::schema::CanonicalSchema;
use crate::SchemaId;
use isahc::http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use isahc::http::Method;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Client for a Confluent Schema Registry, with local schema and subject
/// caches.
///
/// Clones share the transport and both caches.
///
/// ```rust,no_run
/// use avro_registry_client::prelude::*;
/// use avro_registry_client::RegistryClient;
///
/// let client = RegistryClient::new("http://localhost:8081",
///         Auth::Basic{
///         username: "username".to_string(),
///         password: "password".to_string(),
///     })
///     .unwrap();
/// ```
pub struct RegistryClient<T = IsahcTransport> {
    transport: Arc<T>,
    url: String,
    schemas: Arc<SchemaCache>,
    subjects: Arc<SubjectCache>,
    registrations: Arc<InFlight<CanonicalSchema, SchemaId>>,
    schema_fetches: Arc<InFlight<SchemaId, CanonicalSchema>>,
    subject_fetches: Arc<InFlight<(String, i32), SubjectSchema>>,
}

impl<T> Clone for RegistryClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            url: self.url.clone(),
            schemas: Arc::clone(&self.schemas),
            subjects: Arc::clone(&self.subjects),
            registrations: Arc::clone(&self.registrations),
            schema_fetches: Arc::clone(&self.schema_fetches),
            subject_fetches: Arc::clone(&self.subject_fetches),
        }
    }
}

impl<T> fmt::Debug for RegistryClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("url", &self.url)
            .field("cached_schemas", &self.schemas.len())
            .finish()
    }
}

impl RegistryClient<IsahcTransport> {
    /// Create a new client backed by isahc.
    ///
    /// ```rust,no_run
    /// use avro_registry_client::RegistryClient;
    /// use avro_registry_client::types::Auth;
    ///
    /// # #[tokio::main]
    /// # async fn main()-> Result<(), Box<dyn std::error::Error>>{
    /// let client = RegistryClient::new("http://localhost:8081", Auth::None)?;
    /// //... use client here
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(url: &str, auth: Auth) -> Result<Self, RegistryError> {
        Self::from_config(&ClientConfig::new(url).with_auth(auth))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RegistryError> {
        let transport = IsahcTransport::new(config)?;
        Ok(Self::with_transport(config.url.as_str(), transport))
    }
}

impl<T: Transport> RegistryClient<T> {
    /// Create a client on top of any [`Transport`]. Caches start empty.
    pub fn with_transport(url: impl Into<String>, transport: T) -> Self {
        let schemas = Arc::new(SchemaCache::new());
        let subjects = Arc::new(SubjectCache::new(Arc::clone(&schemas)));
        Self {
            transport: Arc::new(transport),
            url: url.into(),
            schemas,
            subjects,
            registrations: Arc::new(InFlight::new()),
            schema_fetches: Arc::new(InFlight::new()),
            subject_fetches: Arc::new(InFlight::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schemas
    }

    pub fn subject_cache(&self) -> &SubjectCache {
        &self.subjects
    }

    /// Build and send one request, then decipher the response.
    ///
    /// `path` is relative to the registry URL (an absolute URL also works)
    /// and may be templated, e.g. `/subjects{/subject}/versions`.
    #[instrument(level = "debug", skip(self, body), err)]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        url_vars: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, RegistryError> {
        let url = format_url(&self.url, path, url_vars)?;
        tracing::debug!("URL is {:?}", &url);

        let mut headers = make_headers();
        let body = match body {
            Some(data) => {
                let body = serde_json::to_vec(data)?;
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                body
            }
            None => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(0usize));
                Vec::new()
            }
        };

        let request = RegistryRequest {
            method,
            url,
            headers,
            body,
        };
        self.transport.send(request).await?.decipher()
    }

    pub async fn get(&self, path: &str, url_vars: &[(&str, &str)]) -> Result<Value, RegistryError> {
        self.request(Method::GET, path, url_vars, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        url_vars: &[(&str, &str)],
        data: &Value,
    ) -> Result<Value, RegistryError> {
        self.request(Method::POST, path, url_vars, Some(data)).await
    }

    pub async fn put(
        &self,
        path: &str,
        url_vars: &[(&str, &str)],
        data: &Value,
    ) -> Result<Value, RegistryError> {
        self.request(Method::PUT, path, url_vars, Some(data)).await
    }

    pub async fn patch(
        &self,
        path: &str,
        url_vars: &[(&str, &str)],
        data: &Value,
    ) -> Result<Value, RegistryError> {
        self.request(Method::PATCH, path, url_vars, Some(data)).await
    }

    pub async fn delete(&self, path: &str, url_vars: &[(&str, &str)]) -> Result<Value, RegistryError> {
        self.request(Method::DELETE, path, url_vars, None).await
    }

    /// Register a schema, or get the ID of an identical schema registered
    /// earlier.
    ///
    /// Wraps `POST /subjects/{subject}/versions`. Without a `subject`, the
    /// schema's fully-qualified name is used. Each distinct schema is sent
    /// to the registry at most once per client; later calls are answered
    /// from the schema cache.
    #[instrument(level = "info", skip(self, schema), err)]
    pub async fn register_schema(
        &self,
        schema: &Value,
        subject: Option<&str>,
    ) -> Result<SchemaId, RegistryError> {
        let schema = CanonicalSchema::new(schema)?;
        self.register_canonical(&schema, subject).await
    }

    /// [`register_schema`](Self::register_schema) for an already canonical schema.
    pub async fn register_canonical(
        &self,
        schema: &CanonicalSchema,
        subject: Option<&str>,
    ) -> Result<SchemaId, RegistryError> {
        if let Some(id) = self.schemas.get_by_schema(schema) {
            tracing::debug!("Found in cache.");
            return Ok(id);
        }

        let subject = match subject.or(schema.name()) {
            Some(subject) => subject,
            None => {
                return Err(RegistryError::Configuration(format!(
                    "Cannot get a subject name from a 'name' key in the schema: {schema}"
                )))
            }
        };

        self.registrations
            .run(schema.clone(), move || async move {
                if let Some(id) = self.schemas.get_by_schema(schema) {
                    return Ok(id);
                }
                let result = self
                    .post(
                        "/subjects{/subject}/versions",
                        &[("subject", subject)],
                        &json!({ "schema": schema.as_str() }),
                    )
                    .await?;
                let resp: SchemaRegistrationResponse = serde_json::from_value(result)?;
                tracing::info!(subject, id = resp.id, "Registered schema");
                self.schemas.insert(schema.clone(), resp.id);
                Ok(resp.id)
            })
            .await
    }

    /// Register a schema under the topic name strategy subject
    /// (`<topic>-key` / `<topic>-value`).
    pub async fn register_schema_for_topic(
        &self,
        schema: &Value,
        topic: &str,
        subject_type: SchemaSubjectType,
    ) -> Result<SchemaId, RegistryError> {
        let subject = subject_type.subject_for_topic(topic);
        self.register_schema(schema, Some(&subject)).await
    }

    /// Get a schema by its registry ID.
    ///
    /// Wraps `GET /schemas/ids/{id}`, cache first.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn get_schema_by_id(&self, id: SchemaId) -> Result<CanonicalSchema, RegistryError> {
        if let Some(schema) = self.schemas.get_by_id(id) {
            tracing::debug!("Found in cache.");
            return Ok(schema);
        }

        self.schema_fetches
            .run(id, move || async move {
                if let Some(schema) = self.schemas.get_by_id(id) {
                    return Ok(schema);
                }
                tracing::debug!("Not in cache, making a schema registry call.");
                let id_var = id.to_string();
                let result = self
                    .get("/schemas/ids{/schema_id}", &[("schema_id", id_var.as_str())])
                    .await?;
                let resp: SchemaGetResponse = serde_json::from_value(result)?;
                let schema = CanonicalSchema::parse_str(&resp.schema)?;
                self.schemas.insert(schema.clone(), id);
                Ok(schema)
            })
            .await
    }

    /// Get the schema of a subject version.
    ///
    /// Wraps `GET /subjects/{subject}/versions/{version}`. Concrete versions
    /// are served from the subject cache when possible. `latest` always
    /// goes to the registry, but the answer is cached under the concrete
    /// version the registry reports.
    #[instrument(level = "debug", skip(self, version), err)]
    pub async fn get_schema_by_subject(
        &self,
        subject: &str,
        version: impl Into<Version> + Send,
    ) -> Result<SubjectSchema, RegistryError> {
        let version = version.into();
        let Ok(concrete) = version.concrete() else {
            return self.fetch_subject_version(subject, version).await;
        };

        if let Ok(cached) = self.subjects.get(subject, concrete) {
            tracing::debug!("Found in cache.");
            return Ok(cached);
        }

        self.subject_fetches
            .run((subject.to_owned(), concrete), move || async move {
                if let Ok(cached) = self.subjects.get(subject, concrete) {
                    return Ok(cached);
                }
                self.fetch_subject_version(subject, version).await
            })
            .await
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn fetch_subject_version(
        &self,
        subject: &str,
        version: Version,
    ) -> Result<SubjectSchema, RegistryError> {
        let version_var = version.to_string();
        let result = self
            .get(
                "/subjects{/subject}/versions{/version}",
                &[("subject", subject), ("version", version_var.as_str())],
            )
            .await?;
        let resp: SubjectVersionResponse = serde_json::from_value(result)?;
        let schema = CanonicalSchema::parse_str(&resp.schema)?;

        if let Err(err) =
            self.subjects
                .insert(&resp.subject, resp.version, Some(resp.id), Some(&schema))
        {
            tracing::debug!(%err, "Subject version not cached");
        }

        Ok(SubjectSchema {
            subject: resp.subject,
            version: resp.version,
            id: resp.id,
            schema,
        })
    }

    /// Compatibility level configured on a subject.
    ///
    /// `None` when the subject has no config of its own (the registry
    /// answers 4XX).
    #[instrument(level = "debug", skip(self), err)]
    pub async fn get_subject_compatibility(
        &self,
        subject: &str,
    ) -> Result<Option<CompatibilityType>, RegistryError> {
        match self.get("/config{/subject}", &[("subject", subject)]).await {
            Ok(result) => {
                let config: SubjectConfigResponse = serde_json::from_value(result)?;
                Ok(config.compatibility_level)
            }
            Err(RegistryError::BadRequest { .. }) => {
                tracing::info!("No existing configuration for this subject: {}", subject);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Set the compatibility level of a subject, returning the level the
    /// registry acknowledged.
    #[instrument(level = "info", skip(self), err)]
    pub async fn set_subject_compatibility(
        &self,
        subject: &str,
        compatibility: CompatibilityType,
    ) -> Result<CompatibilityType, RegistryError> {
        let body = serde_json::to_value(CompatibilityConfig { compatibility })?;
        let result = self
            .put("/config{/subject}", &[("subject", subject)], &body)
            .await?;
        let config: CompatibilityConfig = serde_json::from_value(result)?;
        Ok(config.compatibility)
    }
}
