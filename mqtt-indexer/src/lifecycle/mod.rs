//! Index lifecycle operations driven by the mapping table.
//!
//! Both operations resolve every mapped template against a single instant,
//! so topics sharing a template touch their index once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mqtt_indexer_repository::{DeleteOutcome, DocumentStoreError, EnsureOutcome};
use mqtt_indexer_shared::TopicMappingTable;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::loader::{EnsureStatus, IndexLoader};

/// Per-index results of [`remove_mapped_indices`].
#[derive(Debug, Default)]
pub struct RemovalReport {
    pub deleted: Vec<String>,
    pub not_found: Vec<String>,
    pub failed: Vec<(String, DocumentStoreError)>,
}

impl RemovalReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-index results of [`ensure_mapped_indices`].
#[derive(Debug, Default)]
pub struct EnsureReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<(String, DocumentStoreError)>,
}

/// Resolve every mapped template at `at`, keeping the first body per name.
pub fn mapped_indices(
    table: &TopicMappingTable,
    at: DateTime<Utc>,
) -> BTreeMap<String, Option<&Value>> {
    let mut indices = BTreeMap::new();
    for (_, mapping) in table.entries() {
        indices
            .entry(mapping.index_name(at))
            .or_insert(mapping.index_body.as_ref());
    }
    indices
}

/// Delete every index derivable from the mapping table.
#[instrument(skip(table, loader))]
pub async fn remove_mapped_indices(
    table: &TopicMappingTable,
    loader: &IndexLoader,
    at: DateTime<Utc>,
) -> RemovalReport {
    let mut report = RemovalReport::default();

    for index in mapped_indices(table, at).into_keys() {
        match loader.delete_index(&index).await {
            Ok(DeleteOutcome::Deleted) => {
                info!(index = %index, "Removed index");
                report.deleted.push(index);
            }
            Ok(DeleteOutcome::NotFound) => {
                info!(index = %index, "Index does not exist, nothing to remove");
                report.not_found.push(index);
            }
            Err(e) => {
                error!(index = %index, error = %e, "Failed to remove index");
                report.failed.push((index, e));
            }
        }
    }

    report
}

/// Ensure every mapped index exists, seeding the loader cache.
///
/// Failures are reported, not returned: the router ensures lazily again.
#[instrument(skip(table, loader))]
pub async fn ensure_mapped_indices(
    table: &TopicMappingTable,
    loader: &IndexLoader,
    at: DateTime<Utc>,
) -> EnsureReport {
    let mut report = EnsureReport::default();

    for (index, body) in mapped_indices(table, at) {
        match loader.ensure_index(&index, body).await {
            Ok(EnsureStatus::Ensured(EnsureOutcome::Created)) => {
                info!(index = %index, "Created index");
                report.created.push(index);
            }
            Ok(EnsureStatus::Ensured(EnsureOutcome::AlreadyExists)) | Ok(EnsureStatus::Cached) => {
                debug!(index = %index, "Index already exists");
                report.existing.push(index);
            }
            Err(e) => {
                warn!(index = %index, error = %e, "Failed to ensure index at startup");
                report.failed.push((index, e));
            }
        }
    }

    report
}
