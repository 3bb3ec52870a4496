//! Error types for the MQTT indexer ingest.

use thiserror::Error;

/// Errors that can occur in the MQTT indexer ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Error from the loader component.
    #[error("Loader error: {0}")]
    LoaderError(String),

    /// MQTT client or broker error.
    #[error("MQTT error: {0}")]
    MqttError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl IngestError {
    /// Create a loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::LoaderError(msg.into())
    }

    /// Create an MQTT error.
    pub fn mqtt(msg: impl Into<String>) -> Self {
        Self::MqttError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}

impl From<rumqttc::ClientError> for IngestError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::MqttError(err.to_string())
    }
}

impl From<rumqttc::v5::ClientError> for IngestError {
    fn from(err: rumqttc::v5::ClientError) -> Self {
        Self::MqttError(err.to_string())
    }
}
