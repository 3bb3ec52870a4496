//! Message types for the consumer.

use mqtt_indexer_shared::InboundMessage;

/// Messages sent from the consumer to the orchestrator.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// A message received from the broker.
    Message(InboundMessage),
    /// The consumer hit a fatal error and is stopping.
    Error(String),
    /// The consumer stopped.
    End,
}
