//! Integration tests for the MQTT indexer orchestrator.
//!
//! These tests use the real Orchestrator, Router and IndexLoader but mock
//! dependencies (Consumer and DocumentStoreProvider) to ensure reliable testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use mqtt_indexer::consumer::{Consumer, StreamMessage};
use mqtt_indexer::errors::IngestError;
use mqtt_indexer::loader::IndexLoader;
use mqtt_indexer::orchestrator::{IngestStats, Orchestrator, OrchestratorConfig};
use mqtt_indexer::router::Router;
use mqtt_indexer::supervisor::{ConnectionState, HealthMonitor, StoreSupervisor};
use mqtt_indexer_repository::{
    BackendKind, DeleteOutcome, DocumentStoreError, DocumentStoreProvider, EnsureOutcome,
};
use mqtt_indexer_shared::{InboundMessage, TopicMappingTable};

const MAPPINGS: &str = r#"{
    "sensors/temp": { "elasticIndex": "temp-{Y}-{m}" },
    "sensors/hum": {
        "elasticIndex": "hum-{Y}",
        "elasticBody": { "settings": { "number_of_shards": 1 } }
    }
}"#;

// Mock Consumer for testing
struct MockConsumer {
    messages: Vec<InboundMessage>,
    error: Option<String>,
    send_end: bool,
}

impl MockConsumer {
    /// Sends the messages followed by `End`.
    fn new(messages: Vec<InboundMessage>) -> Self {
        Self {
            messages,
            error: None,
            send_end: true,
        }
    }

    /// Sends nothing and stays connected until shutdown.
    fn idle() -> Self {
        Self {
            messages: Vec::new(),
            error: None,
            send_end: false,
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            messages: Vec::new(),
            error: Some(reason.to_string()),
            send_end: false,
        }
    }
}

#[async_trait::async_trait]
impl Consumer for MockConsumer {
    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        if let Some(reason) = &self.error {
            return Err(IngestError::mqtt(reason.clone()));
        }

        for message in self.messages.drain(..) {
            let _ = sender.send(StreamMessage::Message(message)).await;
        }
        if self.send_end {
            let _ = sender.send(StreamMessage::End).await;
        }

        // Stay connected until the orchestrator stops us
        let _ = shutdown.recv().await;
        Ok(())
    }
}

// Mock document store for testing
#[derive(Default)]
struct MockDocumentStore {
    existing: Mutex<HashSet<String>>,
    ensure_calls: Mutex<Vec<(String, Option<Value>)>>,
    written: Mutex<Vec<(String, Value)>>,
    /// Number of upcoming ensure calls to reject.
    rejected_ensures: AtomicUsize,
    /// Number of upcoming writes that fail with a connection error.
    unreachable_writes: AtomicUsize,
    /// Number of upcoming pings that fail.
    failing_pings: AtomicUsize,
    pings: AtomicUsize,
}

impl MockDocumentStore {
    fn written(&self) -> Vec<(String, Value)> {
        self.written.lock().unwrap().clone()
    }

    fn ensured_names(&self) -> Vec<String> {
        self.ensure_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl DocumentStoreProvider for MockDocumentStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Elasticsearch
    }

    async fn ping(&self) -> Result<(), DocumentStoreError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_pings) {
            Err(DocumentStoreError::connection("connection refused"))
        } else {
            Ok(())
        }
    }

    async fn ensure_index(
        &self,
        name: &str,
        body: Option<&Value>,
    ) -> Result<EnsureOutcome, DocumentStoreError> {
        self.ensure_calls
            .lock()
            .unwrap()
            .push((name.to_string(), body.cloned()));
        if take_one(&self.rejected_ensures) {
            return Err(DocumentStoreError::index_creation("mapper_parsing_exception"));
        }
        if self.existing.lock().unwrap().insert(name.to_string()) {
            Ok(EnsureOutcome::Created)
        } else {
            Ok(EnsureOutcome::AlreadyExists)
        }
    }

    async fn delete_index(&self, name: &str) -> Result<DeleteOutcome, DocumentStoreError> {
        if self.existing.lock().unwrap().remove(name) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    async fn index_document(
        &self,
        index: &str,
        document: &Value,
    ) -> Result<(), DocumentStoreError> {
        if take_one(&self.unreachable_writes) {
            return Err(DocumentStoreError::connection("connection reset"));
        }
        self.written
            .lock()
            .unwrap()
            .push((index.to_string(), document.clone()));
        Ok(())
    }
}

fn june_15() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()
}

fn message(topic: &str, payload: &str) -> InboundMessage {
    InboundMessage::received_at(topic, payload, june_15())
}

/// Helper to create a test orchestrator with mocked dependencies
fn create_test_orchestrator(
    consumer: MockConsumer,
    store: Arc<MockDocumentStore>,
) -> (Orchestrator, Arc<IndexLoader>) {
    let mappings = Arc::new(TopicMappingTable::from_json(MAPPINGS).unwrap());
    let health = HealthMonitor::new("store", ConnectionState::Up);
    let loader = Arc::new(IndexLoader::new(store.clone(), health.clone()));
    let router = Router::new(mappings, loader.clone());
    let supervisor = StoreSupervisor::new(store, health, Duration::from_millis(20));

    let config = OrchestratorConfig {
        channel_buffer_size: 16,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::with_config(Box::new(consumer), router, supervisor, config);

    (orchestrator, loader)
}

async fn run_to_end(orchestrator: &mut Orchestrator) -> Result<(), IngestError> {
    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("orchestrator did not finish in time")
}

/// Runs the orchestrator over `messages` until the consumer signals the end.
async fn run_messages(
    messages: Vec<InboundMessage>,
    store: Arc<MockDocumentStore>,
) -> (IngestStats, Arc<IndexLoader>) {
    let expected = messages.len() as u64;
    let (mut orchestrator, loader) = create_test_orchestrator(MockConsumer::new(messages), store);

    let result = run_to_end(&mut orchestrator).await;
    assert!(result.is_ok(), "orchestrator failed: {:?}", result);

    let stats = orchestrator.stats();
    assert_eq!(stats.received, expected);
    (stats, loader)
}

#[tokio::test]
async fn test_end_to_end_message_is_indexed() {
    let store = Arc::new(MockDocumentStore::default());

    let (stats, loader) = run_messages(
        vec![message("sensors/temp", r#"{"value": 21.5}"#)],
        store.clone(),
    )
    .await;

    assert_eq!(stats.written, 1);
    assert_eq!(store.ensured_names(), vec!["temp-2025-06".to_string()]);
    assert_eq!(
        store.written(),
        vec![("temp-2025-06".to_string(), json!({"value": 21.5}))]
    );
    assert!(loader.is_known("temp-2025-06").await);
}

#[tokio::test]
async fn test_unmapped_topic_never_reaches_store() {
    let store = Arc::new(MockDocumentStore::default());

    let (stats, _) = run_messages(
        vec![message("sensors/unknown", r#"{"value": 1}"#)],
        store.clone(),
    )
    .await;

    assert_eq!(stats.discarded, 1);
    assert!(store.ensured_names().is_empty());
    assert!(store.written().is_empty());
}

#[tokio::test]
async fn test_invalid_payload_is_dropped() {
    let store = Arc::new(MockDocumentStore::default());

    let (stats, _) = run_messages(
        vec![
            message("sensors/temp", "not json"),
            message("sensors/temp", "[1, 2]"),
            message("sensors/temp", r#"{"value": 3}"#),
        ],
        store.clone(),
    )
    .await;

    assert_eq!(stats.failed, 2);
    assert_eq!(stats.written, 1);
    assert_eq!(
        store.written(),
        vec![("temp-2025-06".to_string(), json!({"value": 3}))]
    );
}

#[tokio::test]
async fn test_known_index_is_not_ensured_again() {
    let store = Arc::new(MockDocumentStore::default());

    let (stats, _) = run_messages(
        vec![
            message("sensors/temp", r#"{"value": 1}"#),
            message("sensors/temp", r#"{"value": 2}"#),
            message("sensors/hum", r#"{"rh": 40}"#),
            message("sensors/temp", r#"{"value": 3}"#),
        ],
        store.clone(),
    )
    .await;

    assert_eq!(stats.written, 4);
    assert_eq!(
        store.ensured_names(),
        vec!["temp-2025-06".to_string(), "hum-2025".to_string()]
    );
    let ensure_calls = store.ensure_calls.lock().unwrap();
    assert_eq!(
        ensure_calls[1].1,
        Some(json!({"settings": {"number_of_shards": 1}}))
    );
}

#[tokio::test]
async fn test_failed_ensure_is_retried_by_next_message() {
    let store = Arc::new(MockDocumentStore::default());
    store.rejected_ensures.store(1, Ordering::SeqCst);

    let (stats, loader) = run_messages(
        vec![
            message("sensors/temp", r#"{"value": 1}"#),
            message("sensors/temp", r#"{"value": 2}"#),
        ],
        store.clone(),
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 1);
    assert_eq!(store.ensured_names().len(), 2);
    assert_eq!(
        store.written(),
        vec![("temp-2025-06".to_string(), json!({"value": 2}))]
    );
    assert!(loader.is_known("temp-2025-06").await);
}

#[tokio::test]
async fn test_store_outage_pauses_routing_until_ping_succeeds() {
    let store = Arc::new(MockDocumentStore::default());
    store.unreachable_writes.store(1, Ordering::SeqCst);
    store.failing_pings.store(2, Ordering::SeqCst);

    let (stats, loader) = run_messages(
        vec![
            message("sensors/temp", r#"{"value": 1}"#),
            message("sensors/temp", r#"{"value": 2}"#),
        ],
        store.clone(),
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 1);
    assert_eq!(
        store.written(),
        vec![("temp-2025-06".to_string(), json!({"value": 2}))]
    );
    assert!(store.pings.load(Ordering::SeqCst) >= 3);
    assert_eq!(loader.store_health().state(), ConnectionState::Up);
}

#[tokio::test]
async fn test_orchestrator_shutdown() {
    let store = Arc::new(MockDocumentStore::default());
    let (mut orchestrator, _) = create_test_orchestrator(MockConsumer::idle(), store);

    let handle = orchestrator.shutdown_handle();
    let shutdown = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = handle.send(());
    });

    let result = run_to_end(&mut orchestrator).await;
    assert!(shutdown.await.is_ok(), "Shutdown task should succeed");
    assert!(result.is_ok(), "Orchestrator should complete successfully");
    assert_eq!(orchestrator.stats(), IngestStats::default());
}

#[tokio::test]
async fn test_orchestrator_error_handling() {
    let store = Arc::new(MockDocumentStore::default());
    let (mut orchestrator, _) =
        create_test_orchestrator(MockConsumer::failing("Connection refused by broker"), store);

    let result = run_to_end(&mut orchestrator).await;

    match result {
        Err(IngestError::MqttError(msg)) => assert_eq!(msg, "Connection refused by broker"),
        other => panic!("Expected MqttError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_orchestrator_runs_once() {
    let store = Arc::new(MockDocumentStore::default());
    let (mut orchestrator, _) =
        create_test_orchestrator(MockConsumer::failing("Connection refused by broker"), store);

    let _ = run_to_end(&mut orchestrator).await;
    let second = run_to_end(&mut orchestrator).await;

    assert!(matches!(second, Err(IngestError::ChannelError(_))));
}
