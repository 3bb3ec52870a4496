//! This module defines the core data structures used across the MQTT indexer.
//! It re-exports `TopicMapping`, `TopicMappingTable` and `InboundMessage`.

pub mod inbound_message;
pub mod topic_mapping;

pub use inbound_message::InboundMessage;
pub use topic_mapping::{TopicMapping, TopicMappingTable};
