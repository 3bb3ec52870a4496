//! Orchestrator module for the MQTT indexer ingest.
//!
//! Coordinates the consumer, router, and store supervisor.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, timeout, Duration};
use tracing::{error, info, instrument, warn};

use crate::consumer::{Consumer, StreamMessage};
use crate::errors::IngestError;
use crate::router::{IngestOutcome, Router};
use crate::supervisor::{wait_for_state, ConnectionState, HealthMonitor, StoreSupervisor};
use mqtt_indexer_shared::InboundMessage;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// How long an in-flight message may take to finish after shutdown.
    pub shutdown_grace_period: Duration,
    /// Interval between progress log lines.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            shutdown_grace_period: Duration::from_secs(5),
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Snapshot of the ingest counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub written: u64,
    pub discarded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct IngestCounters {
    received: AtomicU64,
    written: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
}

impl IngestCounters {
    fn record(&self, outcome: &IngestOutcome) {
        let counter = match outcome {
            IngestOutcome::Written { .. } => &self.written,
            IngestOutcome::Discarded => &self.discarded,
            IngestOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IngestStats {
        IngestStats {
            received: self.received.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrator that coordinates the ingest components.
///
/// The orchestrator:
/// - Runs the consumer and the store supervisor in background tasks
/// - Routes messages one at a time, in arrival order
/// - Pauses routing while the document store is unreachable
/// - Handles shutdown signals
pub struct Orchestrator {
    consumer: Option<Box<dyn Consumer>>,
    broker_health: Option<HealthMonitor>,
    router: Router,
    supervisor: StoreSupervisor,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    counters: IngestCounters,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(consumer: Box<dyn Consumer>, router: Router, supervisor: StoreSupervisor) -> Self {
        Self::with_config(consumer, router, supervisor, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: Box<dyn Consumer>,
        router: Router,
        supervisor: StoreSupervisor,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let broker_health = consumer.broker_health();

        Self {
            consumer: Some(consumer),
            broker_health,
            router,
            supervisor,
            config,
            shutdown_tx,
            counters: IngestCounters::default(),
        }
    }

    /// Run the orchestrator.
    ///
    /// Blocks until a shutdown signal is received, the consumer stops, or the
    /// consumer fails. A consumer failure is returned.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!("Starting MQTT indexer orchestrator");

        let mut consumer = self
            .consumer
            .take()
            .ok_or_else(|| IngestError::channel("Orchestrator can only run once"))?;

        let (message_transmitter, mut message_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        // Subscribe before spawning so no shutdown is missed.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let consumer_shutdown = self.shutdown_tx.subscribe();
        let supervisor_shutdown = self.shutdown_tx.subscribe();

        let consumer_handle =
            tokio::spawn(async move { consumer.run(message_transmitter, consumer_shutdown).await });
        let supervisor_handle = tokio::spawn(self.supervisor.clone().run(supervisor_shutdown));

        let signal_tx = self.shutdown_tx.clone();
        let signal_handle = tokio::spawn(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(());
        });

        let mut store_state = self.supervisor.health().subscribe();

        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the first tick immediately
        progress_timer.tick().await;
        let mut prev_written: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        info!("Ready to route messages from MQTT");

        loop {
            tokio::select! {
                msg = message_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Message(message)) => {
                            if !self.handle_message(message, &mut store_state, &mut shutdown_rx).await {
                                break;
                            }
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = progress_timer.tick() => {
                    let stats = self.counters.snapshot();

                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let written_per_sec = if elapsed_secs > 0.0 {
                        (stats.written.saturating_sub(prev_written) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        messages_received = stats.received,
                        documents_written = stats.written,
                        messages_discarded = stats.discarded,
                        messages_failed = stats.failed,
                        documents_per_sec = format!("{:.2}", written_per_sec),
                        store = ?self.supervisor.health().state(),
                        broker = ?self.broker_health.as_ref().map(|h| h.state()),
                        "Processing progress"
                    );

                    prev_written = stats.written;
                    prev_time = now;
                }
            }
        }

        // Stop the consumer and the supervisor
        let _ = self.shutdown_tx.send(());
        signal_handle.abort();

        let consumer_result = match consumer_handle.await {
            Ok(result) => result,
            Err(e) => Err(IngestError::channel(format!("Consumer task failed: {}", e))),
        };
        let _ = supervisor_handle.await;

        let stats = self.counters.snapshot();
        info!(
            messages_received = stats.received,
            documents_written = stats.written,
            messages_discarded = stats.discarded,
            messages_failed = stats.failed,
            "Orchestrator shutdown complete"
        );

        if let Err(e) = &consumer_result {
            error!(error = %e, "Consumer stopped with an error");
        }
        consumer_result
    }

    /// Route one message. Returns `false` when shutdown interrupted it.
    async fn handle_message(
        &self,
        message: InboundMessage,
        store_state: &mut watch::Receiver<ConnectionState>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> bool {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let store_up = store_state.borrow().is_up();
        if !store_up {
            info!(topic = %message.topic, "Document store unreachable, waiting before routing");
            let ready = tokio::select! {
                up = wait_for_state(store_state, ConnectionState::Up) => up,
                _ = shutdown_rx.recv() => false,
            };
            if !ready {
                return false;
            }
        }

        let route = self.router.route(&message);
        tokio::pin!(route);

        tokio::select! {
            outcome = &mut route => {
                self.counters.record(&outcome);
                true
            }
            _ = shutdown_rx.recv() => {
                match timeout(self.config.shutdown_grace_period, &mut route).await {
                    Ok(outcome) => self.counters.record(&outcome),
                    Err(_) => warn!(
                        topic = %message.topic,
                        grace_period_secs = self.config.shutdown_grace_period.as_secs(),
                        "In-flight message abandoned at shutdown"
                    ),
                }
                false
            }
        }
    }

    /// Counters since startup.
    pub fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }

    /// A sender that stops [`Orchestrator::run`] when sent to.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
