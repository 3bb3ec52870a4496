//! # MQTT Indexer Repository
//!
//! This crate provides the document store abstraction used by the MQTT
//! indexer. It includes definitions for errors, the provider interface,
//! backend configuration, and concrete implementations for Elasticsearch and
//! OpenSearch.

pub mod config;
pub mod elasticsearch;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;
pub mod utils;

use std::sync::Arc;

pub use config::{BackendConfig, ElasticsearchConfig, OpenSearchConfig, OpenSearchHost};
pub use crate::elasticsearch::ElasticsearchProvider;
pub use errors::DocumentStoreError;
pub use interfaces::DocumentStoreProvider;
pub use crate::opensearch::OpenSearchProvider;
pub use types::{BackendKind, DeleteOutcome, EnsureOutcome};

/// Build the provider for the configured backend.
///
/// The backend is chosen once here and stays fixed for the process lifetime.
pub async fn connect(
    config: &BackendConfig,
) -> Result<Arc<dyn DocumentStoreProvider>, DocumentStoreError> {
    match config {
        BackendConfig::Elasticsearch(es) => Ok(Arc::new(ElasticsearchProvider::new(es).await?)),
        BackendConfig::OpenSearch(os) => Ok(Arc::new(OpenSearchProvider::new(os).await?)),
    }
}
