//! Configuration loading and dependency wiring.
//!
//! - [`app_config`]: the general JSON configuration file
//! - [`settings`]: process settings read from environment variables
//! - [`dependencies`]: builds the document store, loader and orchestrator

pub mod app_config;
pub mod dependencies;
pub mod settings;

pub use app_config::{AppConfig, MqttConfig, ProtocolVersion};
pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, LogFormat, RuntimeSettings};
