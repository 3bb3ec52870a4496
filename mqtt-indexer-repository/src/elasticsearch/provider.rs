//! Elasticsearch provider implementation.
//!
//! This module provides the concrete implementation of `DocumentStoreProvider`
//! using the Elasticsearch Rust crate.

use async_trait::async_trait;
use elasticsearch::{
    auth::Credentials,
    cert::{Certificate, CertificateValidation},
    http::response::Response,
    http::transport::{MultiNodeConnectionPool, SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    Elasticsearch, IndexParts,
};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::ElasticsearchConfig;
use crate::errors::DocumentStoreError;
use crate::interfaces::DocumentStoreProvider;
use crate::types::{BackendKind, DeleteOutcome, EnsureOutcome};
use crate::utils;

/// Elasticsearch provider implementation.
///
/// Requests rotate over every node of the configured cluster, so a dead node
/// only fails the requests that land on it.
pub struct ElasticsearchProvider {
    client: Elasticsearch,
    nodes: Vec<Url>,
}

impl ElasticsearchProvider {
    /// Create a provider for the configured cluster.
    ///
    /// A single node uses a single-node pool; several nodes are used round-robin.
    ///
    /// # Returns
    ///
    /// * `Ok(ElasticsearchProvider)` - A new provider instance
    /// * `Err(DocumentStoreError)` - If a node URL or the CA bundle is invalid
    pub async fn new(config: &ElasticsearchConfig) -> Result<Self, DocumentStoreError> {
        let ca_bundle = match &config.ca_certs_path {
            Some(path) => Some(utils::read_ca_bundle(path).await?),
            None => None,
        };
        let provider = Self::with_ca_bundle(config, ca_bundle.as_deref())?;

        info!(
            nodes = ?provider.nodes.iter().map(Url::as_str).collect::<Vec<_>>(),
            authenticated = config.api_key().is_some(),
            custom_ca = ca_bundle.is_some(),
            "Created Elasticsearch provider"
        );
        Ok(provider)
    }

    /// Build a provider from an already loaded CA bundle.
    pub fn with_ca_bundle(
        config: &ElasticsearchConfig,
        ca_bundle: Option<&[u8]>,
    ) -> Result<Self, DocumentStoreError> {
        let mut urls = config.node_urls()?;
        let nodes = urls.clone();

        let mut builder = if urls.len() == 1 {
            TransportBuilder::new(SingleNodeConnectionPool::new(urls.remove(0)))
        } else {
            TransportBuilder::new(MultiNodeConnectionPool::round_robin(urls, None))
        };
        builder = builder.disable_proxy();

        if let Some(api_key) = config.api_key() {
            builder = builder.auth(Credentials::EncodedApiKey(api_key.to_string()));
        }

        if let Some(pem) = ca_bundle {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| DocumentStoreError::config(format!("Invalid CA bundle: {}", e)))?;
            builder = builder.cert_validation(CertificateValidation::Full(cert));
        }

        let transport = builder
            .build()
            .map_err(|e| DocumentStoreError::config(format!("Failed to build transport: {}", e)))?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            nodes,
        })
    }

    /// The cluster nodes requests are spread over.
    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }

    /// Status code, plus the body when the request failed.
    async fn status_and_body(response: Response) -> (u16, String) {
        let status = response.status_code().as_u16();
        if utils::is_success(status) {
            return (status, String::new());
        }
        (status, response.text().await.unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStoreProvider for ElasticsearchProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::Elasticsearch
    }

    async fn ping(&self) -> Result<(), DocumentStoreError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        utils::ping_result(response.status_code().as_u16())
    }

    async fn ensure_index(
        &self,
        name: &str,
        body: Option<&Value>,
    ) -> Result<EnsureOutcome, DocumentStoreError> {
        let indices = self.client.indices();

        let response = indices
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(index = %name, "Index already exists, skipping creation");
            return Ok(EnsureOutcome::AlreadyExists);
        }

        let create = indices.create(IndicesCreateParts::Index(name));
        let response = match body {
            Some(body) => create.body(body.clone()).send().await,
            None => create.send().await,
        }
        .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        let (status, error_body) = Self::status_and_body(response).await;
        utils::create_index_result(name, status, &error_body)
    }

    async fn delete_index(&self, name: &str) -> Result<DeleteOutcome, DocumentStoreError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        let (status, error_body) = Self::status_and_body(response).await;
        utils::delete_index_result(name, status, &error_body)
    }

    async fn index_document(
        &self,
        index: &str,
        document: &Value,
    ) -> Result<(), DocumentStoreError> {
        let response = self
            .client
            .index(IndexParts::Index(index))
            .body(document)
            .send()
            .await
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        let (status, error_body) = Self::status_and_body(response).await;
        utils::index_document_result(index, status, &error_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cluster: &[&str]) -> ElasticsearchConfig {
        ElasticsearchConfig {
            cluster: cluster.iter().map(|node| node.to_string()).collect(),
            api_key: Some("aWQ6a2V5".to_string()),
            ca_certs_path: None,
        }
    }

    #[test]
    fn test_single_node() {
        let provider =
            ElasticsearchProvider::with_ca_bundle(&config(&["http://localhost:9200"]), None)
                .unwrap();
        assert_eq!(provider.nodes().len(), 1);
        assert_eq!(provider.backend(), BackendKind::Elasticsearch);
    }

    #[test]
    fn test_cluster_keeps_every_node() {
        let provider = ElasticsearchProvider::with_ca_bundle(
            &config(&["http://es-1:9200", "http://es-2:9200", "http://es-3:9200"]),
            None,
        )
        .unwrap();

        let hosts: Vec<&str> = provider
            .nodes()
            .iter()
            .filter_map(|url| url.host_str())
            .collect();
        assert_eq!(hosts, ["es-1", "es-2", "es-3"]);
    }

    #[test]
    fn test_invalid_ca_bundle() {
        let result = ElasticsearchProvider::with_ca_bundle(
            &config(&["https://localhost:9200"]),
            Some(b"not a certificate".as_slice()),
        );
        assert!(matches!(result, Err(DocumentStoreError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_missing_ca_bundle() {
        let mut config = config(&["https://localhost:9200"]);
        config.ca_certs_path = Some("/nonexistent/ca.pem".into());

        assert!(matches!(
            ElasticsearchProvider::new(&config).await,
            Err(DocumentStoreError::ConfigError(_))
        ));
    }
}
