//! # MQTT Indexer Shared
//!
//! This crate defines shared data structures used across the MQTT indexer.
//! It includes the topic mapping table loaded from the mapping file, the
//! index name template resolver and the inbound message envelope.

pub mod errors;
pub mod index_name;
pub mod types;

pub use errors::MappingError;
pub use index_name::resolve_index_name;
pub use types::inbound_message::InboundMessage;
pub use types::topic_mapping::{TopicMapping, TopicMappingTable};
