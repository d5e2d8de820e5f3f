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

//! Request/response payloads of the registry REST API, plus client
//! configuration.

use crate::errors::RegistryError;
use crate::SchemaId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Authentication used when talking to the registry.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    #[default]
    None,
    Basic { username: String, password: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Which half of a Kafka record a schema describes, for the topic name
/// subject strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SchemaSubjectType {
    Key,
    Value,
}

impl SchemaSubjectType {
    /// `<topic>-key` or `<topic>-value`.
    pub fn subject_for_topic(&self, topic: &str) -> String {
        format!("{topic}-{self}")
    }
}

/// Subject compatibility levels enforced by the registry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityType {
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
    None,
}

impl CompatibilityType {
    /// Parse a level name such as `FORWARD_TRANSITIVE`.
    pub fn parse_level(level: &str) -> Result<Self, RegistryError> {
        level.parse().map_err(|_| {
            RegistryError::Configuration(format!(
                "Compatibility setting {level:?} is not in the allowed set: {:?}",
                Self::iter().map(|c| c.to_string()).collect::<Vec<_>>()
            ))
        })
    }
}

/// Response of `POST /subjects/{subject}/versions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaRegistrationResponse {
    pub id: SchemaId,
}

/// Response of `GET /schemas/ids/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaGetResponse {
    pub schema: String,
}

/// Response of `GET /subjects/{subject}/versions/{version}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectVersionResponse {
    pub subject: String,
    pub version: i32,
    pub id: SchemaId,
    pub schema: String,
}

/// Response of `GET /config/{subject}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfigResponse {
    pub compatibility_level: Option<CompatibilityType>,
}

/// Body and response of `PUT /config/{subject}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    pub compatibility: CompatibilityType,
}

/// Settings for the isahc-backed registry client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub auth: Auth,
    pub timeout_secs: u64,
    /// Redirects followed by the HTTP client. `0` surfaces 3XX responses
    /// as [`RegistryError::Redirection`].
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".into(),
            auth: Auth::None,
            timeout_secs: 20,
            max_redirects: 10,
        }
    }
}

impl ClientConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the configuration from `SCHEMA_REGISTRY_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, RegistryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RegistryError> {
        let mut config = Self::default();
        if let Some(url) = lookup("SCHEMA_REGISTRY_URL") {
            config.url = url;
        }
        match (
            lookup("SCHEMA_REGISTRY_USERNAME"),
            lookup("SCHEMA_REGISTRY_PASSWORD"),
        ) {
            (Some(username), Some(password)) => config.auth = Auth::Basic { username, password },
            (None, None) => {}
            _ => {
                return Err(RegistryError::Configuration(
                    "SCHEMA_REGISTRY_USERNAME and SCHEMA_REGISTRY_PASSWORD must be set together"
                        .into(),
                ))
            }
        }
        if let Some(timeout) = lookup("SCHEMA_REGISTRY_TIMEOUT_SECS") {
            config.timeout_secs = timeout.parse().map_err(|_| {
                RegistryError::Configuration(format!(
                    "SCHEMA_REGISTRY_TIMEOUT_SECS must be an integer, got `{timeout}`"
                ))
            })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_subject_for_topic() {
        assert_eq!(SchemaSubjectType::Key.subject_for_topic("orders"), "orders-key");
        assert_eq!(
            SchemaSubjectType::Value.subject_for_topic("orders"),
            "orders-value"
        );
    }

    #[test]
    fn test_compatibility_strings() {
        let names: Vec<String> = CompatibilityType::iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            [
                "BACKWARD",
                "BACKWARD_TRANSITIVE",
                "FORWARD",
                "FORWARD_TRANSITIVE",
                "FULL",
                "FULL_TRANSITIVE",
                "NONE"
            ]
        );
        assert_eq!(
            "FULL_TRANSITIVE".parse::<CompatibilityType>().unwrap(),
            CompatibilityType::FullTransitive
        );
        assert!("SIDEWAYS".parse::<CompatibilityType>().is_err());
        assert!(matches!(
            CompatibilityType::parse_level("SIDEWAYS"),
            Err(RegistryError::Configuration(_))
        ));

        let config: SubjectConfigResponse =
            serde_json::from_str(r#"{"compatibilityLevel": "BACKWARD"}"#).unwrap();
        assert_eq!(config.compatibility_level, Some(CompatibilityType::Backward));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SCHEMA_REGISTRY_URL", "http://registry:8081"),
            ("SCHEMA_REGISTRY_USERNAME", "user"),
            ("SCHEMA_REGISTRY_PASSWORD", "secret"),
            ("SCHEMA_REGISTRY_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.url, "http://registry:8081");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_redirects, 10);
        assert!(matches!(config.auth, Auth::Basic { ref username, .. } if username == "user"));
        assert!(!format!("{:?}", config.auth).contains("secret"));
    }

    #[test]
    fn test_config_defaults_and_errors() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());

        let only_user = ClientConfig::from_lookup(|k| {
            (k == "SCHEMA_REGISTRY_USERNAME").then(|| "user".to_string())
        });
        assert!(matches!(only_user, Err(RegistryError::Configuration(_))));

        let bad_timeout = ClientConfig::from_lookup(|k| {
            (k == "SCHEMA_REGISTRY_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(bad_timeout, Err(RegistryError::Configuration(_))));
    }

    #[test]
    fn test_config_deserialize() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"url": "http://sr:8081", "auth": {"type": "basic", "username": "u", "password": "p"}}"#,
        )
        .unwrap();
        assert_eq!(config.url, "http://sr:8081");
        assert_eq!(config.timeout_secs, 20);
        assert_eq!(
            config.auth,
            Auth::Basic {
                username: "u".into(),
                password: "p".into()
            }
        );
    }
}
