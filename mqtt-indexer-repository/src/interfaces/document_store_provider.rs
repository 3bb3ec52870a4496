//! Document store provider trait definition.
//!
//! This module defines the abstract interface for document store operations,
//! implemented for Elasticsearch and OpenSearch.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::DocumentStoreError;
use crate::types::{BackendKind, DeleteOutcome, EnsureOutcome};

/// Abstracts the underlying document store (Elasticsearch or OpenSearch).
///
/// Implementations are chosen once at startup and shared behind an `Arc`.
/// All methods return `Result<T, DocumentStoreError>` for consistent error
/// handling across backends.
#[async_trait]
pub trait DocumentStoreProvider: Send + Sync {
    /// The backend variant behind this provider.
    fn backend(&self) -> BackendKind;

    /// Check that the store answers requests.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the store is reachable
    /// * `Err(DocumentStoreError)` - A connection error otherwise
    async fn ping(&self) -> Result<(), DocumentStoreError>;

    /// Make sure an index exists, creating it if necessary.
    ///
    /// Idempotent: an existing index is reported as [`EnsureOutcome::AlreadyExists`],
    /// never as an error. When `body` is `None` the index is created with the
    /// backend defaults.
    ///
    /// # Arguments
    ///
    /// * `name` - The concrete index name
    /// * `body` - Optional settings and mappings for index creation
    async fn ensure_index(
        &self,
        name: &str,
        body: Option<&Value>,
    ) -> Result<EnsureOutcome, DocumentStoreError>;

    /// Delete an index.
    ///
    /// # Returns
    ///
    /// * `Ok(DeleteOutcome::Deleted)` - If the index was removed
    /// * `Ok(DeleteOutcome::NotFound)` - If there was no such index
    /// * `Err(DocumentStoreError)` - If the deletion fails
    async fn delete_index(&self, name: &str) -> Result<DeleteOutcome, DocumentStoreError>;

    /// Write a single document into an index.
    ///
    /// # Arguments
    ///
    /// * `index` - The concrete index name
    /// * `document` - The document body
    async fn index_document(&self, index: &str, document: &Value)
        -> Result<(), DocumentStoreError>;
}
