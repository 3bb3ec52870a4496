//! MQTT consumer implementation for the indexer.
//!
//! Subscribes to every mapped topic and forwards received publishes to the
//! ingest channel. The network loop never waits on ingestion.

use std::time::Duration;

use mqtt_indexer_shared::InboundMessage;
use rumqttc::v5 as mqtt5;
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, Incoming, MqttOptions, QoS, SubscribeFilter,
    TlsConfiguration, Transport,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use async_trait::async_trait;

use crate::config::{MqttConfig, ProtocolVersion};
use crate::consumer::messages::StreamMessage;
use crate::consumer::{tls, Consumer};
use crate::errors::IngestError;
use crate::supervisor::{ConnectionState, HealthMonitor};

/// Keep-alive interval sent to the broker.
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Capacity of the client request channel (subscribe, disconnect).
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// How long to keep polling after a disconnect request.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection options for either protocol version.
#[derive(Clone)]
enum SessionOptions {
    V311(MqttOptions),
    V5(mqtt5::MqttOptions),
}

/// A live client and its event loop.
enum Session {
    V311 {
        client: AsyncClient,
        eventloop: EventLoop,
    },
    V5 {
        client: mqtt5::AsyncClient,
        eventloop: mqtt5::EventLoop,
    },
}

enum SessionEvent {
    /// ConnAck received.
    Connected,
    Message(InboundMessage),
    Other,
}

enum PollError {
    /// The broker rejected the connection.
    Refused(String),
    /// Network or protocol failure, the next poll reconnects.
    Transient(String),
}

impl Session {
    fn open(options: SessionOptions) -> Self {
        match options {
            SessionOptions::V311(options) => {
                let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
                Session::V311 { client, eventloop }
            }
            SessionOptions::V5(options) => {
                let (client, eventloop) =
                    mqtt5::AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
                Session::V5 { client, eventloop }
            }
        }
    }

    async fn poll(&mut self) -> Result<SessionEvent, PollError> {
        match self {
            Session::V311 { eventloop, .. } => match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => Ok(SessionEvent::Connected),
                Ok(Event::Incoming(Incoming::Publish(publish))) => Ok(SessionEvent::Message(
                    InboundMessage::new(publish.topic, publish.payload.to_vec()),
                )),
                Ok(_) => Ok(SessionEvent::Other),
                Err(ConnectionError::ConnectionRefused(code)) => {
                    Err(PollError::Refused(format!("{:?}", code)))
                }
                Err(e) => Err(PollError::Transient(e.to_string())),
            },
            Session::V5 { eventloop, .. } => match eventloop.poll().await {
                Ok(mqtt5::Event::Incoming(mqtt5::Incoming::ConnAck(_))) => {
                    Ok(SessionEvent::Connected)
                }
                Ok(mqtt5::Event::Incoming(mqtt5::Incoming::Publish(publish))) => {
                    Ok(SessionEvent::Message(InboundMessage::new(
                        String::from_utf8_lossy(&publish.topic).into_owned(),
                        publish.payload.to_vec(),
                    )))
                }
                Ok(_) => Ok(SessionEvent::Other),
                Err(mqtt5::ConnectionError::ConnectionRefused(code)) => {
                    Err(PollError::Refused(format!("{:?}", code)))
                }
                Err(e) => Err(PollError::Transient(e.to_string())),
            },
        }
    }

    async fn subscribe(&mut self, topics: &[String]) -> Result<(), IngestError> {
        match self {
            Session::V311 { client, .. } => {
                client
                    .subscribe_many(
                        topics
                            .iter()
                            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce)),
                    )
                    .await?
            }
            Session::V5 { client, .. } => {
                client
                    .subscribe_many(topics.iter().map(|topic| {
                        mqtt5::mqttbytes::v5::Filter::new(
                            topic.clone(),
                            mqtt5::mqttbytes::QoS::AtMostOnce,
                        )
                    }))
                    .await?
            }
        }
        Ok(())
    }

    /// Send a disconnect and poll until it is flushed or the timeout elapses.
    async fn disconnect(&mut self) {
        let requested = match self {
            Session::V311 { client, .. } => client.try_disconnect().map_err(IngestError::from),
            Session::V5 { client, .. } => client.try_disconnect().map_err(IngestError::from),
        };
        if let Err(e) = requested {
            debug!(error = %e, "Could not request disconnect");
            return;
        }

        let _ = timeout(DISCONNECT_TIMEOUT, async {
            while self.poll().await.is_ok() {}
        })
        .await;
    }
}

/// MQTT consumer for the mapped topics.
pub struct MqttConsumer {
    options: SessionOptions,
    client_id: String,
    server: String,
    port: u16,
    topics: Vec<String>,
    retry_interval: Duration,
    health: HealthMonitor,
}

impl MqttConsumer {
    /// Create a new MQTT consumer.
    ///
    /// # Arguments
    ///
    /// * `config` - Broker connection settings
    /// * `topics` - Topics to subscribe to on every connect
    /// * `retry_interval` - Pause after a connection error before polling again
    ///
    /// # Returns
    ///
    /// * `Ok(MqttConsumer)` - A new consumer instance, not yet connected
    /// * `Err(IngestError)` - If the client id or the TLS setup is invalid
    pub fn new(
        config: &MqttConfig,
        topics: Vec<String>,
        retry_interval: Duration,
    ) -> Result<Self, IngestError> {
        let client_id = config.client_id();
        let options = build_options(config, &client_id)?;

        info!(
            server = %config.server,
            port = config.port,
            client_id = %client_id,
            protocol_version = ?config.protocol_version,
            tls = config.tls,
            topic_count = topics.len(),
            "Created MQTT consumer"
        );

        Ok(Self {
            options,
            client_id,
            server: config.server.clone(),
            port: config.port,
            topics,
            retry_interval,
            health: HealthMonitor::new("broker", ConnectionState::Down),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

#[async_trait]
impl Consumer for MqttConsumer {
    /// Poll the broker connection and forward publishes to `sender`.
    ///
    /// Connection errors are retried after the retry interval. A refused
    /// connection ends the consumer with an error.
    #[instrument(skip(self, sender, shutdown), fields(server = %self.server, port = self.port))]
    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        let mut session = Session::open(self.options.clone());
        info!("Connecting to MQTT broker");

        loop {
            let event = tokio::select! {
                _ = shutdown.recv() => None,
                event = session.poll() => Some(event),
            };

            let Some(event) = event else {
                info!("Consumer received shutdown signal");
                session.disconnect().await;
                self.health.mark_down();
                break;
            };

            match event {
                Ok(SessionEvent::Connected) => {
                    self.health.mark_up();
                    info!(topics = ?self.topics, "Connected to MQTT broker, subscribing");
                    session.subscribe(&self.topics).await?;
                }
                Ok(SessionEvent::Message(message)) => {
                    debug!(topic = %message.topic, bytes = message.payload.len(), "Received message");
                    if !forward(&sender, message) {
                        info!("Ingest channel closed, stopping consumer");
                        session.disconnect().await;
                        return Ok(());
                    }
                }
                Ok(SessionEvent::Other) => {}
                Err(PollError::Refused(reason)) => {
                    self.health.mark_down();
                    error!(reason = %reason, "MQTT broker refused the connection");
                    let message = format!("Connection refused by broker: {}", reason);
                    let _ = sender.try_send(StreamMessage::Error(message.clone()));
                    return Err(IngestError::mqtt(message));
                }
                Err(PollError::Transient(reason)) => {
                    self.health.mark_down();
                    warn!(
                        error = %reason,
                        retry_interval_secs = self.retry_interval.as_secs(),
                        "MQTT connection error, retrying..."
                    );
                    let stop = tokio::select! {
                        _ = shutdown.recv() => true,
                        _ = sleep(self.retry_interval) => false,
                    };
                    if stop {
                        info!("Consumer received shutdown signal");
                        break;
                    }
                }
            }
        }

        let _ = sender.try_send(StreamMessage::End);
        Ok(())
    }

    fn broker_health(&self) -> Option<HealthMonitor> {
        Some(self.health.clone())
    }
}

/// Hand a message to the ingest channel without waiting.
///
/// A full channel drops the message. Returns `false` once the receiver is gone.
fn forward(sender: &mpsc::Sender<StreamMessage>, message: InboundMessage) -> bool {
    match sender.try_send(StreamMessage::Message(message)) {
        Ok(()) => true,
        Err(TrySendError::Full(StreamMessage::Message(dropped))) => {
            warn!(topic = %dropped.topic, "Ingest channel full, dropping message");
            true
        }
        Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => false,
    }
}

fn build_options(config: &MqttConfig, client_id: &str) -> Result<SessionOptions, IngestError> {
    if client_id.starts_with(' ') {
        return Err(IngestError::mqtt("client_id must not start with a space"));
    }

    let transport = if config.tls {
        Some(tls_transport(config.hostname_validation)?)
    } else {
        None
    };

    let options = match config.protocol_version {
        ProtocolVersion::V311 => {
            let mut options = MqttOptions::new(client_id, config.server.clone(), config.port);
            options.set_keep_alive(KEEP_ALIVE);
            options.set_clean_session(true);
            if let Some((user, password)) = config.credentials() {
                options.set_credentials(user, password);
            }
            if let Some(transport) = transport {
                options.set_transport(transport);
            }
            SessionOptions::V311(options)
        }
        ProtocolVersion::V5 => {
            let mut options =
                mqtt5::MqttOptions::new(client_id, config.server.clone(), config.port);
            options.set_keep_alive(KEEP_ALIVE);
            options.set_clean_start(true);
            if let Some((user, password)) = config.credentials() {
                options.set_credentials(user.to_string(), password.to_string());
            }
            if let Some(transport) = transport {
                options.set_transport(transport);
            }
            SessionOptions::V5(options)
        }
    };

    Ok(options)
}

/// TLS transport using the system trust store.
fn tls_transport(hostname_validation: bool) -> Result<Transport, IngestError> {
    let config = tls::client_config(hostname_validation)?;
    Ok(Transport::tls_with_config(TlsConfiguration::Rustls(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> MqttConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_v311_options() {
        let config = config(r#"{"server": "broker.local", "port": 1884}"#);
        let options = build_options(&config, "relay").unwrap();

        match options {
            SessionOptions::V311(options) => {
                assert_eq!(options.client_id(), "relay");
                assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
                assert_eq!(options.keep_alive(), KEEP_ALIVE);
                assert!(options.clean_session());
            }
            SessionOptions::V5(_) => panic!("expected MQTT 3.1.1 options"),
        }
    }

    #[test]
    fn test_v5_options() {
        let config = config(r#"{"server": "broker.local", "protocol_version": 5}"#);
        let options = build_options(&config, "relay").unwrap();

        match options {
            SessionOptions::V5(options) => {
                assert_eq!(options.client_id(), "relay");
                assert_eq!(options.broker_address(), ("broker.local".to_string(), 1883));
                assert_eq!(options.keep_alive(), KEEP_ALIVE);
            }
            SessionOptions::V311(_) => panic!("expected MQTT 5 options"),
        }
    }

    fn verifier_debug(transport: Transport) -> String {
        match transport {
            Transport::Tls(TlsConfiguration::Rustls(config)) => format!("{:?}", config),
            _ => panic!("expected rustls transport"),
        }
    }

    #[test]
    fn test_tls_checks_hostname_by_default() {
        let config = config(r#"{"server": "broker.local", "port": 8883, "tls": true}"#);
        let options = build_options(&config, "relay").unwrap();

        let SessionOptions::V311(options) = options else {
            panic!("expected MQTT 3.1.1 options");
        };
        let debug = verifier_debug(options.transport());
        assert!(debug.contains("WebPkiServerVerifier"));
        assert!(!debug.contains("SkipHostnameVerification"));
    }

    #[test]
    fn test_tls_without_hostname_validation() {
        let config = config(
            r#"{"server": "10.0.0.5", "port": 8883, "tls": true, "hostname_validation": false, "protocol_version": 5}"#,
        );
        let options = build_options(&config, "relay").unwrap();

        let SessionOptions::V5(options) = options else {
            panic!("expected MQTT 5 options");
        };
        assert!(verifier_debug(options.transport()).contains("SkipHostnameVerification"));
    }

    #[test]
    fn test_plain_tcp_without_tls() {
        let config = config(r#"{"server": "broker.local"}"#);
        let SessionOptions::V311(options) = build_options(&config, "relay").unwrap() else {
            panic!("expected MQTT 3.1.1 options");
        };
        assert!(matches!(options.transport(), Transport::Tcp));
    }

    #[tokio::test]
    async fn test_subscribe_future_is_send() {
        fn assert_send<T: Send>(_: T) {}

        let config = config(r#"{"server": "broker.local", "protocol_version": 5}"#);
        let mut session = Session::open(build_options(&config, "relay").unwrap());
        let topics = vec!["sensors/temp".to_string()];

        assert_send(session.subscribe(&topics));
    }

    #[test]
    fn test_client_id_with_leading_space_is_rejected() {
        let config = config(r#"{"server": "broker.local"}"#);
        assert!(matches!(
            build_options(&config, " relay"),
            Err(IngestError::MqttError(_))
        ));
    }

    #[test]
    fn test_consumer_starts_disconnected() {
        let config = config(r#"{"server": "broker.local", "client_id": "relay"}"#);
        let consumer = MqttConsumer::new(
            &config,
            vec!["sensors/temp".to_string()],
            Duration::from_secs(15),
        )
        .unwrap();

        assert_eq!(consumer.client_id(), "relay");
        assert_eq!(consumer.topics(), ["sensors/temp".to_string()]);
        let health = consumer.broker_health().unwrap();
        assert_eq!(health.state(), ConnectionState::Down);
    }

    #[tokio::test]
    async fn test_forward_drops_when_full() {
        let (sender, mut receiver) = mpsc::channel(1);

        assert!(forward(&sender, InboundMessage::new("a", "{}")));
        assert!(forward(&sender, InboundMessage::new("b", "{}")));

        match receiver.recv().await {
            Some(StreamMessage::Message(message)) => assert_eq!(message.topic, "a"),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_reports_closed_channel() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);

        assert!(!forward(&sender, InboundMessage::new("a", "{}")));
    }
}
