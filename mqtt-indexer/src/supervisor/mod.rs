//! Connection supervision for the broker and the document store.
//!
//! Each dependency publishes its [`ConnectionState`] through a [`HealthMonitor`].
//! The broker side is driven by the MQTT consumer itself (rumqttc reconnects on
//! the next poll). The store side is driven by [`StoreSupervisor`], which pings
//! the store after a connection failure until it answers again.

use std::sync::Arc;
use std::time::Duration;

use mqtt_indexer_repository::DocumentStoreProvider;
use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Reachability of a network dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Up,
    Down,
}

impl ConnectionState {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Shared, observable connection state of one dependency.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    name: &'static str,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl HealthMonitor {
    /// Create a monitor with an initial state.
    pub fn new(name: &'static str, initial: ConnectionState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            name,
            state: Arc::new(state),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Mark the dependency reachable. Returns `true` on a state change.
    pub fn mark_up(&self) -> bool {
        self.transition(ConnectionState::Up)
    }

    /// Mark the dependency unreachable. Returns `true` on a state change.
    pub fn mark_down(&self) -> bool {
        self.transition(ConnectionState::Down)
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn transition(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            match next {
                ConnectionState::Up => info!(dependency = self.name, "Connection restored"),
                ConnectionState::Down => warn!(dependency = self.name, "Connection lost"),
            }
        }
        changed
    }
}

/// Wait until the observed state equals `target`.
///
/// Returns `false` if the monitor was dropped.
pub async fn wait_for_state(
    receiver: &mut watch::Receiver<ConnectionState>,
    target: ConnectionState,
) -> bool {
    receiver.wait_for(|state| *state == target).await.is_ok()
}

/// Restores the document store state after connection failures.
#[derive(Clone)]
pub struct StoreSupervisor {
    provider: Arc<dyn DocumentStoreProvider>,
    health: HealthMonitor,
    retry_interval: Duration,
}

impl StoreSupervisor {
    pub fn new(
        provider: Arc<dyn DocumentStoreProvider>,
        health: HealthMonitor,
        retry_interval: Duration,
    ) -> Self {
        Self {
            provider,
            health,
            retry_interval,
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Watch the store state until shutdown.
    ///
    /// Whenever the state turns `Down`, pings the store every retry interval
    /// and marks it `Up` again once a ping succeeds.
    #[instrument(skip(self, shutdown), fields(backend = %self.provider.backend()))]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut state = self.health.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                down = wait_for_state(&mut state, ConnectionState::Down) => {
                    if !down {
                        return;
                    }
                }
            }

            warn!(
                retry_interval_secs = self.retry_interval.as_secs(),
                "Document store unreachable, pausing ingestion"
            );

            loop {
                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = sleep(self.retry_interval) => {}
                }

                match self.provider.ping().await {
                    Ok(()) => {
                        self.health.mark_up();
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Document store still unreachable, retrying...");
                    }
                }
            }
        }
    }
}
