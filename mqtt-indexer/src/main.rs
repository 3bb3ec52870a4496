//! MQTT Indexer Main Entry Point
//!
//! Subscribes to the mapped MQTT topics and writes every JSON message into
//! the Elasticsearch or OpenSearch index configured for its topic.

use dotenv::dotenv;
use mqtt_indexer::config::dependencies::load_mappings;
use mqtt_indexer::config::{AppConfig, LogFormat, RuntimeSettings};
use mqtt_indexer::{Dependencies, IndexingError, IngestError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
///
/// `RUST_LOG` wins over the level derived from the `DEBUG` config flag.
fn init_tracing(debug: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug { "debug" } else { "info" };
        EnvFilter::new(format!(
            "mqtt_indexer={level},mqtt_indexer_repository={level},mqtt_indexer_shared={level}"
        ))
    });

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .init();

            info!(
                service_name = "mqtt-indexer",
                service_version = env!("CARGO_PKG_VERSION"),
                "Tracing initialized with JSON format"
            );
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
                .init();

            info!(
                service_name = "mqtt-indexer",
                service_version = env!("CARGO_PKG_VERSION"),
                "Tracing initialized with console output"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Load environment variables from .env file
    dotenv().ok();

    let settings = RuntimeSettings::from_env();
    let config = AppConfig::from_file(&settings.config_file).await;

    // Logging needs the DEBUG flag, so it starts after the config is read
    init_tracing(
        config.as_ref().map(|c| c.debug).unwrap_or(false),
        settings.log_format,
    );

    let config = config.inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;

    info!(
        config_file = %settings.config_file.display(),
        mapping_file = %settings.mapping_file.display(),
        remove_index = config.remove_index,
        "Starting MQTT indexer"
    );

    let mappings = load_mappings(&settings.mapping_file)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to load topic mappings"))?;

    // Initialize dependencies
    let deps = match Dependencies::new(&settings, &config, mappings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    if config.remove_index {
        let report = deps.remove_indices().await;
        info!(
            deleted = report.deleted.len(),
            not_found = report.not_found.len(),
            failed = report.failed.len(),
            "Index removal finished, exiting"
        );
        if !report.is_success() {
            return Err(IngestError::loader(format!(
                "Failed to remove {} index(es)",
                report.failed.len()
            ))
            .into());
        }
        return Ok(());
    }

    let report = deps.ensure_indices().await;
    if report.failed.is_empty() {
        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Mapped indices ready"
        );
    } else {
        warn!(
            created = report.created.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "Some mapped indices could not be ensured, retrying on first message"
        );
    }

    // Run the orchestrator
    let mut orchestrator = deps.into_orchestrator();
    match orchestrator.run().await {
        Ok(()) => {
            info!("MQTT indexer stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "MQTT indexer failed");
            Err(e.into())
        }
    }
}
