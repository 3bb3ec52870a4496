//! Inbound MQTT message envelope.

use chrono::{DateTime, Utc};

/// A message received from the broker, stamped with its arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// The topic the message was published on.
    pub topic: String,
    /// The raw payload bytes.
    pub payload: Vec<u8>,
    /// When the subscriber received the message (UTC).
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a message stamped with the current time.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::received_at(topic, payload, Utc::now())
    }

    /// Create a message with an explicit arrival time.
    pub fn received_at(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }
}
