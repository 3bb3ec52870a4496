//! Error types for topic mapping configuration.

use thiserror::Error;

/// Errors raised while loading or validating the topic mapping document.
#[derive(Debug, Clone, Error)]
pub enum MappingError {
    /// The mapping document is not valid JSON or has the wrong shape.
    #[error("Invalid mapping document: {0}")]
    InvalidDocument(String),

    /// The mapping document does not contain any topic.
    #[error("Mapping document does not define any topic")]
    Empty,

    /// A topic entry failed validation.
    #[error("Invalid mapping for topic '{topic}': {reason}")]
    InvalidEntry { topic: String, reason: String },
}

impl MappingError {
    /// Create an invalid document error.
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Create an invalid entry error.
    pub fn invalid_entry(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}
