//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `DocumentStoreProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cert::{Certificate, CertificateValidation},
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    IndexParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::OpenSearchConfig;
use crate::errors::DocumentStoreError;
use crate::interfaces::DocumentStoreProvider;
use crate::opensearch::RoundRobinConnectionPool;
use crate::types::{BackendKind, DeleteOutcome, EnsureOutcome};
use crate::utils;

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use mqtt_indexer_repository::{OpenSearchConfig, OpenSearchProvider, DocumentStoreProvider};
///
/// let config: OpenSearchConfig = serde_json::from_str(
///     r#"{"hosts": [{"host": "localhost", "port": 9200}]}"#,
/// )?;
/// let provider = OpenSearchProvider::new(&config).await?;
/// provider.ensure_index("temp-2025-06", None).await?;
/// provider.index_document("temp-2025-06", &serde_json::json!({"value": 21.5})).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the configured hosts.
    ///
    /// A single host uses a single-node pool; several hosts are used round-robin.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(DocumentStoreError)` - If the configuration is invalid or the transport cannot be built
    pub async fn new(config: &OpenSearchConfig) -> Result<Self, DocumentStoreError> {
        let mut urls = config.node_urls()?;

        let mut builder = if urls.len() == 1 {
            TransportBuilder::new(SingleNodeConnectionPool::new(urls.remove(0)))
        } else {
            TransportBuilder::new(RoundRobinConnectionPool::new(urls)?)
        };
        builder = builder.disable_proxy();

        if let Some((username, password)) = config.credentials() {
            builder = builder.auth(Credentials::Basic(
                username.to_string(),
                password.to_string(),
            ));
        }

        if config.tls {
            builder = builder.cert_validation(Self::cert_validation(config).await?);
        }

        let transport = builder
            .build()
            .map_err(|e| DocumentStoreError::config(format!("Failed to build transport: {}", e)))?;

        info!(
            hosts = ?config.hosts,
            tls = config.tls,
            verify_certs = config.verify_certs,
            authenticated = config.credentials().is_some(),
            "Created OpenSearch provider"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    async fn cert_validation(
        config: &OpenSearchConfig,
    ) -> Result<CertificateValidation, DocumentStoreError> {
        if !config.verify_certs {
            return Ok(CertificateValidation::None);
        }
        match &config.ca_certs_path {
            Some(path) => {
                let pem = utils::read_ca_bundle(path).await?;
                let cert = Certificate::from_pem(&pem)
                    .map_err(|e| DocumentStoreError::config(format!("Invalid CA bundle: {}", e)))?;
                Ok(CertificateValidation::Full(cert))
            }
            None => Ok(CertificateValidation::Default),
        }
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
impl DocumentStoreProvider for OpenSearchProvider {
    fn backend(&self) -> BackendKind {
        BackendKind::OpenSearch
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
