//! Router for inbound MQTT messages.
//!
//! Takes one message at a time through mapping lookup, index name
//! resolution, index ensure, payload parsing and the document write.

use std::fmt;
use std::sync::Arc;

use mqtt_indexer_repository::DocumentStoreError;
use mqtt_indexer_shared::{InboundMessage, TopicMappingTable};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::loader::IndexLoader;

/// Why a message was dropped.
#[derive(Debug, Clone)]
pub enum IngestFailure {
    /// The payload is not a JSON object.
    InvalidPayload(String),
    /// The target index could not be ensured.
    EnsureFailed {
        index: String,
        error: DocumentStoreError,
    },
    /// The document write was rejected or did not reach the store.
    WriteFailed {
        index: String,
        error: DocumentStoreError,
    },
}

impl IngestFailure {
    /// Whether the failure was caused by an unreachable store.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::InvalidPayload(_) => false,
            Self::EnsureFailed { error, .. } | Self::WriteFailed { error, .. } => {
                error.is_connection()
            }
        }
    }
}

impl fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload(reason) => write!(f, "invalid payload: {}", reason),
            Self::EnsureFailed { index, error } => {
                write!(f, "failed to ensure index {}: {}", index, error)
            }
            Self::WriteFailed { index, error } => {
                write!(f, "failed to write to index {}: {}", index, error)
            }
        }
    }
}

/// Final state of one routed message.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The document was written to `index`.
    Written { index: String },
    /// No mapping exists for the topic.
    Discarded,
    /// The message was dropped.
    Failed(IngestFailure),
}

impl IngestOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Routes messages to their index according to the mapping table.
#[derive(Clone)]
pub struct Router {
    mappings: Arc<TopicMappingTable>,
    loader: Arc<IndexLoader>,
}

impl Router {
    pub fn new(mappings: Arc<TopicMappingTable>, loader: Arc<IndexLoader>) -> Self {
        Self { mappings, loader }
    }

    /// Route one message and report what happened to it.
    ///
    /// Nothing is retried here. A failed ensure leaves the index uncached so
    /// the next message for it asks the store again.
    #[instrument(skip(self, message), fields(topic = %message.topic))]
    pub async fn route(&self, message: &InboundMessage) -> IngestOutcome {
        let Some(mapping) = self.mappings.lookup(&message.topic) else {
            debug!("No mapping for topic, discarding message");
            return IngestOutcome::Discarded;
        };

        let index = mapping.index_name(message.received_at);
        if index != mapping.index_template {
            debug!(template = %mapping.index_template, index = %index, "Resolved index name");
        }

        if let Err(error) = self
            .loader
            .ensure_index(&index, mapping.index_body.as_ref())
            .await
        {
            warn!(index = %index, error = %error, "Failed to ensure index, dropping message");
            return IngestOutcome::Failed(IngestFailure::EnsureFailed { index, error });
        }

        let document = match parse_document(&message.payload) {
            Ok(document) => document,
            Err(reason) => {
                warn!(index = %index, reason = %reason, "Invalid payload, dropping message");
                return IngestOutcome::Failed(IngestFailure::InvalidPayload(reason));
            }
        };

        if let Err(error) = self.loader.write(&index, &document).await {
            warn!(index = %index, error = %error, "Failed to write document, dropping message");
            return IngestOutcome::Failed(IngestFailure::WriteFailed { index, error });
        }

        debug!(index = %index, "Document written");
        IngestOutcome::Written { index }
    }
}

/// Parse a payload into a JSON object document.
///
/// Numbers keep their original text, so integers wider than 64 bits reach
/// the store unchanged.
fn parse_document(payload: &[u8]) -> Result<Value, String> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("payload is not a JSON object".to_string())
    }
}
