//! OpenSearch implementation of the document store provider.
//!
//! This module provides a concrete implementation of `DocumentStoreProvider`
//! using OpenSearch as the backend.

mod pool;
mod provider;

pub use pool::RoundRobinConnectionPool;
pub use provider::OpenSearchProvider;
