//! Result types for document store operations.

use std::fmt;

/// The document store variant in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Elasticsearch,
    OpenSearch,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Elasticsearch => "elasticsearch",
            BackendKind::OpenSearch => "opensearch",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a successful `ensure_index` call.
///
/// Both variants mean the index is ready for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The index was created by this call.
    Created,
    /// The index was already there, possibly created concurrently by another writer.
    AlreadyExists,
}

/// Outcome of a successful `delete_index` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The index existed and was deleted.
    Deleted,
    /// There was no index with that name.
    NotFound,
}
