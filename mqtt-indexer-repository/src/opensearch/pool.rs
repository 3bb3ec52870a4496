//! Round-robin connection pool for OpenSearch clusters with several hosts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opensearch::http::transport::{Connection, ConnectionPool};
use url::Url;

use crate::errors::DocumentStoreError;

/// Hands out the configured nodes in turn.
///
/// Clones share the cursor, so every clone of the transport keeps rotating
/// through the same sequence.
#[derive(Debug, Clone)]
pub struct RoundRobinConnectionPool {
    connections: Arc<[Connection]>,
    cursor: Arc<AtomicUsize>,
}

impl RoundRobinConnectionPool {
    /// Create a pool over `urls`, which must not be empty.
    pub fn new(urls: Vec<Url>) -> Result<Self, DocumentStoreError> {
        if urls.is_empty() {
            return Err(DocumentStoreError::config(
                "a connection pool needs at least one node",
            ));
        }
        Ok(Self {
            connections: urls.into_iter().map(Connection::new).collect(),
            cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn next_position(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.connections.len()
    }
}

impl ConnectionPool for RoundRobinConnectionPool {
    fn next(&self) -> Connection {
        self.connections[self.next_position()].clone()
    }
}
