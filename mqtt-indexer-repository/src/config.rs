//! Backend configuration types.
//!
//! These structs are deserialized from the `elasticsearch` and `opensearch`
//! blocks of the general configuration file. Exactly one backend is selected
//! per process, see [`BackendConfig::select`].

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

use crate::errors::DocumentStoreError;
use crate::types::BackendKind;
use crate::utils;

/// Connection settings for an Elasticsearch cluster.
#[derive(Clone, Deserialize, PartialEq)]
pub struct ElasticsearchConfig {
    /// Cluster node URLs, e.g. `["http://localhost:9200"]`.
    pub cluster: Vec<String>,
    /// Base64 encoded API key (`id:api_key`).
    #[serde(default)]
    pub api_key: Option<String>,
    /// PEM bundle used instead of the system roots to verify the cluster.
    #[serde(default)]
    pub ca_certs_path: Option<PathBuf>,
}

impl ElasticsearchConfig {
    /// Parse the configured node URLs, in order.
    pub fn node_urls(&self) -> Result<Vec<Url>, DocumentStoreError> {
        if self.cluster.is_empty() {
            return Err(DocumentStoreError::config(
                "elasticsearch.cluster must list at least one node URL",
            ));
        }
        self.cluster.iter().map(|raw| utils::parse_url(raw)).collect()
    }

    /// The API key, if one is configured and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for ElasticsearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticsearchConfig")
            .field("cluster", &self.cluster)
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .field("ca_certs_path", &self.ca_certs_path)
            .finish()
    }
}

/// One OpenSearch node address.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OpenSearchHost {
    pub host: String,
    pub port: u16,
}

/// Connection settings for an OpenSearch cluster.
#[derive(Clone, Deserialize, PartialEq)]
pub struct OpenSearchConfig {
    pub hosts: Vec<OpenSearchHost>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Use `https` for the transport.
    #[serde(default)]
    pub tls: bool,
    /// Validate the peer certificate when `tls` is enabled.
    #[serde(default = "default_verify_certs")]
    pub verify_certs: bool,
    /// PEM bundle used to verify the peer; system roots when absent.
    #[serde(default)]
    pub ca_certs_path: Option<PathBuf>,
}

fn default_verify_certs() -> bool {
    true
}

impl OpenSearchConfig {
    /// Build the node URLs from the configured hosts.
    pub fn node_urls(&self) -> Result<Vec<Url>, DocumentStoreError> {
        if self.hosts.is_empty() {
            return Err(DocumentStoreError::config(
                "opensearch.hosts must list at least one host",
            ));
        }
        let scheme = if self.tls { "https" } else { "http" };
        self.hosts
            .iter()
            .map(|h| utils::parse_url(&format!("{}://{}:{}", scheme, h.host, h.port)))
            .collect()
    }

    /// Basic auth credentials, when both username and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for OpenSearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSearchConfig")
            .field("hosts", &self.hosts)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("verify_certs", &self.verify_certs)
            .field("ca_certs_path", &self.ca_certs_path)
            .finish()
    }
}

/// The selected document store backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    Elasticsearch(ElasticsearchConfig),
    OpenSearch(OpenSearchConfig),
}

impl BackendConfig {
    /// Pick the backend by precedence: Elasticsearch first, then OpenSearch.
    ///
    /// Returns `None` when neither block is configured.
    pub fn select(
        elasticsearch: Option<ElasticsearchConfig>,
        opensearch: Option<OpenSearchConfig>,
    ) -> Option<Self> {
        match (elasticsearch, opensearch) {
            (Some(es), _) => Some(Self::Elasticsearch(es)),
            (None, Some(os)) => Some(Self::OpenSearch(os)),
            (None, None) => None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Elasticsearch(_) => BackendKind::Elasticsearch,
            Self::OpenSearch(_) => BackendKind::OpenSearch,
        }
    }
}
