//! Consumer module for the MQTT indexer ingest.
//!
//! Provides the broker subscription that feeds inbound messages to the
//! orchestrator.

mod messages;
mod mqtt_consumer;
mod tls;

pub use messages::StreamMessage;
pub use mqtt_consumer::MqttConsumer;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::errors::IngestError;
use crate::supervisor::HealthMonitor;

/// A source of inbound messages.
///
/// Implementations push messages into `sender` until `shutdown` fires or a
/// fatal error occurs. They must never block on a full channel.
#[async_trait]
pub trait Consumer: Send {
    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;

    /// Connection state of the source, if it tracks one.
    fn broker_health(&self) -> Option<HealthMonitor> {
        None
    }
}
