//! The general configuration file.
//!
//! ```json
//! {
//!   "DEBUG": false,
//!   "removeIndex": false,
//!   "elasticsearch": { "cluster": ["http://localhost:9200"] },
//!   "mqtt": { "client_id": "relay", "server": "localhost", "port": 1883 }
//! }
//! ```

use std::path::Path;

use mqtt_indexer_repository::{BackendConfig, ElasticsearchConfig, OpenSearchConfig};
use serde::Deserialize;

use crate::IndexingError;

/// Default MQTT broker port.
const DEFAULT_MQTT_PORT: u16 = 1883;

/// Prefix of the generated client id when none is configured.
const CLIENT_ID_PREFIX: &str = "mqtt-indexer";

/// Parsed general configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Enables debug logging unless `RUST_LOG` says otherwise.
    #[serde(rename = "DEBUG", default)]
    pub debug: bool,
    /// One-shot mode: delete the mapped indices and exit.
    #[serde(rename = "removeIndex", default)]
    pub remove_index: bool,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
    #[serde(default)]
    pub opensearch: Option<OpenSearchConfig>,
    pub mqtt: MqttConfig,
}

impl AppConfig {
    /// Parse the configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, IndexingError> {
        serde_json::from_str(json)
            .map_err(|e| IndexingError::config(format!("Invalid configuration: {}", e)))
    }

    /// Read and parse the configuration file.
    pub async fn from_file(path: &Path) -> Result<Self, IndexingError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            IndexingError::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }

    /// The selected document store backend.
    ///
    /// Elasticsearch wins when both blocks are present. Having neither is fatal.
    pub fn backend(&self) -> Result<BackendConfig, IndexingError> {
        BackendConfig::select(self.elasticsearch.clone(), self.opensearch.clone()).ok_or_else(
            || {
                IndexingError::config(
                    "No document store configured: add an 'elasticsearch' or 'opensearch' block",
                )
            },
        )
    }
}

/// MQTT protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum ProtocolVersion {
    /// MQTT 3.1.1
    #[default]
    V311,
    /// MQTT 5
    V5,
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 | 4 => Ok(Self::V311),
            5 => Ok(Self::V5),
            other => Err(format!(
                "unsupported MQTT protocol version {} (expected 3 or 5)",
                other
            )),
        }
    }
}

/// MQTT broker connection settings.
#[derive(Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub server: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Check that the broker certificate matches `server` (TLS only).
    #[serde(default = "default_true")]
    pub hostname_validation: bool,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_true() -> bool {
    true
}

impl MqttConfig {
    /// The configured client id, or a generated unique one.
    pub fn client_id(&self) -> String {
        match self.client_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}-{}", CLIENT_ID_PREFIX, uuid::Uuid::new_v4().simple()),
        }
    }

    /// Username and password, when both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("client_id", &self.client_id)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("server", &self.server)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("hostname_validation", &self.hostname_validation)
            .field("protocol_version", &self.protocol_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt_indexer_repository::BackendKind;

    const MQTT_BLOCK: &str = r#""mqtt": {"client_id": "relay", "server": "broker.local"}"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_json(&format!(
            r#"{{"elasticsearch": {{"cluster": ["http://localhost:9200"]}}, {}}}"#,
            MQTT_BLOCK
        ))
        .unwrap();

        assert!(!config.debug);
        assert!(!config.remove_index);
        assert_eq!(config.mqtt.port, 1883);
        assert!(!config.mqtt.tls);
        assert!(config.mqtt.hostname_validation);
        assert_eq!(config.mqtt.protocol_version, ProtocolVersion::V311);
        assert_eq!(config.mqtt.client_id(), "relay");
        assert!(config.mqtt.credentials().is_none());
    }

    #[test]
    fn test_full_configuration() {
        let config = AppConfig::from_json(
            r#"{
                "DEBUG": true,
                "removeIndex": true,
                "opensearch": {
                    "hosts": [{"host": "search", "port": 9200}],
                    "username": "admin",
                    "password": "secret",
                    "tls": true,
                    "verify_certs": false
                },
                "mqtt": {
                    "client_id": "relay",
                    "user": "mqtt",
                    "password": "pw",
                    "server": "broker.local",
                    "port": 8883,
                    "tls": true,
                    "hostname_validation": false,
                    "protocol_version": 5
                }
            }"#,
        )
        .unwrap();

        assert!(config.debug);
        assert!(config.remove_index);
        assert_eq!(config.backend().unwrap().kind(), BackendKind::OpenSearch);
        assert_eq!(config.mqtt.port, 8883);
        assert!(!config.mqtt.hostname_validation);
        assert_eq!(config.mqtt.protocol_version, ProtocolVersion::V5);
        assert_eq!(config.mqtt.credentials(), Some(("mqtt", "pw")));
    }

    #[test]
    fn test_elasticsearch_takes_precedence() {
        let config = AppConfig::from_json(&format!(
            r#"{{"elasticsearch": {{"cluster": ["http://es:9200"]}},
                 "opensearch": {{"hosts": [{{"host": "os", "port": 9200}}]}}, {}}}"#,
            MQTT_BLOCK
        ))
        .unwrap();
        assert_eq!(config.backend().unwrap().kind(), BackendKind::Elasticsearch);
    }

    #[test]
    fn test_missing_backend_is_fatal() {
        let config = AppConfig::from_json(&format!("{{{}}}", MQTT_BLOCK)).unwrap();
        assert!(matches!(config.backend(), Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_missing_mqtt_block_is_fatal() {
        let result =
            AppConfig::from_json(r#"{"elasticsearch": {"cluster": ["http://localhost:9200"]}}"#);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_protocol_version() {
        let result = AppConfig::from_json(
            r#"{"mqtt": {"server": "broker", "protocol_version": 6}}"#,
        );
        assert!(matches!(result, Err(IndexingError::ConfigError(msg)) if msg.contains("protocol version")));
    }

    #[test]
    fn test_generated_client_id() {
        let config = AppConfig::from_json(r#"{"mqtt": {"server": "broker"}}"#).unwrap();
        let first = config.mqtt.client_id();
        assert!(first.starts_with("mqtt-indexer-"));
        assert_ne!(first, config.mqtt.client_id());
    }

    #[test]
    fn test_empty_credentials_are_ignored() {
        let config =
            AppConfig::from_json(r#"{"mqtt": {"server": "broker", "user": "u", "password": ""}}"#)
                .unwrap();
        assert!(config.mqtt.credentials().is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = AppConfig::from_file(Path::new("/nonexistent/mqtt-indexer.json")).await;
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }
}
