//! # MQTT Indexer
//!
//! Relays JSON messages from an MQTT broker into Elasticsearch or OpenSearch,
//! choosing the target index per topic.
//!
//! ## Architecture
//!
//! The indexer follows a Consumer-Router-Loader pattern:
//!
//! 1. **Consumer**: Subscribes to the mapped topics and receives messages
//! 2. **Router**: Resolves the index for each message from the mapping table
//! 3. **Loader**: Ensures indices exist and writes documents
//! 4. **Orchestrator**: Coordinates the ingest flow
//! 5. **Supervisor**: Tracks broker and store reachability
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: MQTT consumer for inbound messages
//! - [`router`]: Per-message routing to an index
//! - [`loader`]: Writes documents and caches known indices
//! - [`lifecycle`]: Bulk ensure and removal of the mapped indices
//! - [`orchestrator`]: Coordinates the ingest flow
//! - [`supervisor`]: Connection state and store recovery
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod consumer;
pub mod errors;
pub mod lifecycle;
pub mod loader;
pub mod orchestrator;
pub mod router;
pub mod supervisor;

pub use config::Dependencies;
pub use errors::IngestError;

use mqtt_indexer_repository::DocumentStoreError;
use mqtt_indexer_shared::MappingError;
use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid topic mapping file.
    #[error("Mapping error: {0}")]
    MappingError(#[from] MappingError),

    /// Document store error outside of message ingest.
    #[error("Document store error: {0}")]
    StoreError(#[from] DocumentStoreError),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
