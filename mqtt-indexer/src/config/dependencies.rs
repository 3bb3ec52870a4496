//! Dependency initialization and wiring for the MQTT indexer.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mqtt_indexer_repository::{BackendConfig, DocumentStoreError, DocumentStoreProvider};
use mqtt_indexer_shared::TopicMappingTable;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{AppConfig, ConnectionMode, RuntimeSettings};
use crate::consumer::MqttConsumer;
use crate::lifecycle::{
    ensure_mapped_indices, remove_mapped_indices, EnsureReport, RemovalReport,
};
use crate::loader::IndexLoader;
use crate::orchestrator::Orchestrator;
use crate::router::Router;
use crate::supervisor::{ConnectionState, HealthMonitor, StoreSupervisor};
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The topic mapping table, shared with the router.
    pub mappings: Arc<TopicMappingTable>,
    /// The loader owning the index creation cache.
    pub loader: Arc<IndexLoader>,
    router: Router,
    supervisor: StoreSupervisor,
    consumer: MqttConsumer,
}

impl Dependencies {
    /// Initialize all dependencies.
    ///
    /// Connects to the document store (retrying per `STORE_CONNECTION_MODE`)
    /// and prepares, but does not connect, the MQTT consumer.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - On invalid configuration, or a store
    ///   connection failure in fail-fast mode
    pub async fn new(
        settings: &RuntimeSettings,
        config: &AppConfig,
        mappings: TopicMappingTable,
    ) -> Result<Self, IndexingError> {
        let backend = config.backend()?;

        info!(
            backend = %backend.kind(),
            mqtt_server = %config.mqtt.server,
            mqtt_port = config.mqtt.port,
            topic_count = mappings.len(),
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let provider = connect_with_retry(
            settings.connection_mode,
            settings.retry_interval,
            || connect_to_store(&backend),
        )
        .await?;

        info!(backend = %provider.backend(), "Document store connection established");

        let store_health = HealthMonitor::new("store", ConnectionState::Up);
        let loader = Arc::new(IndexLoader::new(provider.clone(), store_health.clone()));
        let mappings = Arc::new(mappings);
        let router = Router::new(mappings.clone(), loader.clone());
        let supervisor = StoreSupervisor::new(provider, store_health, settings.retry_interval);

        let topics: Vec<String> = mappings.topics().map(str::to_string).collect();
        let consumer = MqttConsumer::new(&config.mqtt, topics, settings.retry_interval)?;

        Ok(Self {
            mappings,
            loader,
            router,
            supervisor,
            consumer,
        })
    }

    /// Delete every mapped index, resolved now.
    pub async fn remove_indices(&self) -> RemovalReport {
        remove_mapped_indices(&self.mappings, &self.loader, Utc::now()).await
    }

    /// Ensure every mapped index exists, resolved now.
    pub async fn ensure_indices(&self) -> EnsureReport {
        ensure_mapped_indices(&self.mappings, &self.loader, Utc::now()).await
    }

    /// Build the orchestrator that subscribes and routes.
    pub fn into_orchestrator(self) -> Orchestrator {
        Orchestrator::new(Box::new(self.consumer), self.router, self.supervisor)
    }
}

/// Read and parse the topic mapping file.
pub async fn load_mappings(path: &Path) -> Result<TopicMappingTable, IndexingError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        IndexingError::config(format!(
            "Failed to read mapping file {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(TopicMappingTable::from_json(&contents)?)
}

/// Build the provider and check that the store answers.
async fn connect_to_store(
    backend: &BackendConfig,
) -> Result<Arc<dyn DocumentStoreProvider>, DocumentStoreError> {
    let provider = mqtt_indexer_repository::connect(backend).await?;
    provider.ping().await?;
    Ok(provider)
}

/// Run `connect` until it succeeds, per the connection mode.
///
/// Only connection errors are retried; anything else is a configuration
/// problem and fails immediately.
async fn connect_with_retry<T, F, Fut>(
    mode: ConnectionMode,
    retry_interval: Duration,
    mut connect: F,
) -> Result<T, IndexingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DocumentStoreError>>,
{
    loop {
        match connect().await {
            Ok(connected) => return Ok(connected),
            Err(e) if !e.is_connection() => return Err(e.into()),
            Err(e) => match mode {
                ConnectionMode::FailFast => {
                    return Err(IndexingError::config(format!(
                        "Failed to connect to document store: {}",
                        e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to connect to document store, retrying..."
                    );
                    sleep(retry_interval).await;
                }
            },
        }
    }
}
