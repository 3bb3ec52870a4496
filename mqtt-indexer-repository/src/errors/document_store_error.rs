//! Document store error types.
//!
//! This module defines the unified error type for all document store
//! operations, covering both transport failures and rejected requests.

use thiserror::Error;

/// Unified errors from document store operations.
///
/// Used by the `DocumentStoreProvider` trait for every backend. Callers use
/// [`DocumentStoreError::is_connection`] to tell an unreachable store apart
/// from a request the store rejected.
#[derive(Debug, Clone, Error)]
pub enum DocumentStoreError {
    /// Invalid backend configuration (bad URL, unreadable CA bundle, ...).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to create an index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to delete an index.
    #[error("Index deletion error: {0}")]
    IndexDeletionError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),
}

impl DocumentStoreError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create an index deletion error.
    pub fn index_deletion(msg: impl Into<String>) -> Self {
        Self::IndexDeletionError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Whether the error means the store is unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}
