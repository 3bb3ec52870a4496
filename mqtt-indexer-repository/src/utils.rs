//! Utility functions shared by the backend implementations.

use std::path::Path;

use tracing::{debug, error, info};
use url::Url;

use crate::errors::DocumentStoreError;
use crate::types::{DeleteOutcome, EnsureOutcome};

/// Error type reported by both backends when creating an index that exists.
const ALREADY_EXISTS_EXCEPTION: &str = "resource_already_exists_exception";

/// Parse a node URL.
///
/// # Example
///
/// ```
/// use mqtt_indexer_repository::utils::parse_url;
///
/// let url = parse_url("http://localhost:9200").expect("valid URL");
/// assert_eq!(url.port(), Some(9200));
/// ```
pub fn parse_url(raw: &str) -> Result<Url, DocumentStoreError> {
    Url::parse(raw).map_err(|e| DocumentStoreError::config(format!("Invalid URL '{}': {}", raw, e)))
}

/// Whether an error response body reports an index that already exists.
///
/// Another process may create the index between our existence check and our
/// create call; that race is treated as success.
pub fn is_already_exists(body: &str) -> bool {
    body.contains(ALREADY_EXISTS_EXCEPTION)
}

/// Read a PEM certificate bundle from disk.
pub async fn read_ca_bundle(path: &Path) -> Result<Vec<u8>, DocumentStoreError> {
    tokio::fs::read(path).await.map_err(|e| {
        DocumentStoreError::config(format!(
            "Failed to read CA bundle {}: {}",
            path.display(),
            e
        ))
    })
}

/// Whether an HTTP status code reports success.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Interpret the status of a ping.
///
/// Rejected credentials are a configuration problem, not an outage, so they
/// are not retried.
pub fn ping_result(status: u16) -> Result<(), DocumentStoreError> {
    match status {
        s if is_success(s) => Ok(()),
        401 | 403 => Err(DocumentStoreError::config(format!(
            "Document store rejected the credentials with status {}",
            status
        ))),
        _ => Err(DocumentStoreError::connection(format!(
            "Ping failed with status {}",
            status
        ))),
    }
}

/// Interpret the response to a create index request.
pub fn create_index_result(
    index: &str,
    status: u16,
    body: &str,
) -> Result<EnsureOutcome, DocumentStoreError> {
    if is_success(status) {
        info!(index = %index, "Created index");
        return Ok(EnsureOutcome::Created);
    }
    if is_already_exists(body) {
        debug!(index = %index, "Index was created concurrently");
        return Ok(EnsureOutcome::AlreadyExists);
    }

    error!(index = %index, status, body = %body, "Create index request failed");
    Err(DocumentStoreError::index_creation(format!(
        "Creating index {} failed with status {}: {}",
        index, status, body
    )))
}

/// Interpret the response to a delete index request.
pub fn delete_index_result(
    index: &str,
    status: u16,
    body: &str,
) -> Result<DeleteOutcome, DocumentStoreError> {
    if status == 404 {
        debug!(index = %index, "Index not found, nothing to delete");
        return Ok(DeleteOutcome::NotFound);
    }
    if !is_success(status) {
        error!(index = %index, status, body = %body, "Delete index request failed");
        return Err(DocumentStoreError::index_deletion(format!(
            "Deleting index {} failed with status {}: {}",
            index, status, body
        )));
    }

    info!(index = %index, "Deleted index");
    Ok(DeleteOutcome::Deleted)
}

/// Interpret the response to a document index request.
pub fn index_document_result(
    index: &str,
    status: u16,
    body: &str,
) -> Result<(), DocumentStoreError> {
    if !is_success(status) {
        error!(index = %index, status, body = %body, "Index request failed");
        return Err(DocumentStoreError::index(format!(
            "Indexing into {} failed with status {}: {}",
            index, status, body
        )));
    }

    debug!(index = %index, status, "Document indexed");
    Ok(())
}
