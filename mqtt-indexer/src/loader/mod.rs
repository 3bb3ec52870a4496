//! Loader module for the MQTT indexer ingest.
//!
//! Writes documents into the document store and keeps track of the indices
//! already confirmed to exist during this process lifetime.

use std::collections::HashSet;
use std::sync::Arc;

use mqtt_indexer_repository::{
    DeleteOutcome, DocumentStoreError, DocumentStoreProvider, EnsureOutcome,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::supervisor::HealthMonitor;

/// Result of [`IndexLoader::ensure_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureStatus {
    /// The index was already known, no request was sent.
    Cached,
    /// The store was asked and the index is now known.
    Ensured(EnsureOutcome),
}

/// Loader that writes documents into the document store.
///
/// The loader is responsible for:
/// - Ensuring each index exists before the first write to it
/// - Caching index names that are known to exist
/// - Reporting store connection failures to the store [`HealthMonitor`]
pub struct IndexLoader {
    provider: Arc<dyn DocumentStoreProvider>,
    known_indices: Mutex<HashSet<String>>,
    store_health: HealthMonitor,
}

impl IndexLoader {
    /// Create a new loader with an empty index cache.
    pub fn new(provider: Arc<dyn DocumentStoreProvider>, store_health: HealthMonitor) -> Self {
        Self {
            provider,
            known_indices: Mutex::new(HashSet::new()),
            store_health,
        }
    }

    pub fn store_health(&self) -> &HealthMonitor {
        &self.store_health
    }

    /// Whether the index is in the cache.
    pub async fn is_known(&self, index: &str) -> bool {
        self.known_indices.lock().await.contains(index)
    }

    /// Make sure an index exists, asking the store only on a cache miss.
    ///
    /// The cache is updated only when the store confirms the index, so a
    /// failed attempt is retried by the next caller.
    #[instrument(skip(self, body))]
    pub async fn ensure_index(
        &self,
        index: &str,
        body: Option<&Value>,
    ) -> Result<EnsureStatus, DocumentStoreError> {
        if self.is_known(index).await {
            return Ok(EnsureStatus::Cached);
        }

        let outcome = self
            .provider
            .ensure_index(index, body)
            .await
            .map_err(|e| self.observe(e))?;

        self.known_indices.lock().await.insert(index.to_string());
        debug!(outcome = ?outcome, "Index ready");
        Ok(EnsureStatus::Ensured(outcome))
    }

    /// Write one document.
    pub async fn write(&self, index: &str, document: &Value) -> Result<(), DocumentStoreError> {
        self.provider
            .index_document(index, document)
            .await
            .map_err(|e| self.observe(e))
    }

    /// Delete an index and forget it.
    #[instrument(skip(self))]
    pub async fn delete_index(&self, index: &str) -> Result<DeleteOutcome, DocumentStoreError> {
        let outcome = self
            .provider
            .delete_index(index)
            .await
            .map_err(|e| self.observe(e))?;

        self.known_indices.lock().await.remove(index);
        Ok(outcome)
    }

    fn observe(&self, error: DocumentStoreError) -> DocumentStoreError {
        if error.is_connection() {
            self.store_health.mark_down();
        }
        error
    }
}
