//! Topic mapping types.
//!
//! The mapping document is a JSON object keyed by literal MQTT topic. Each
//! value names the index template (`elasticIndex`) and, optionally, the body
//! sent when the index is created (`elasticBody`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MappingError;
use crate::index_name::resolve_index_name;

/// Index routing for one subscribed topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMapping {
    /// Index name template with optional `{Y}`, `{m}` and `{d}` placeholders.
    #[serde(rename = "elasticIndex")]
    pub index_template: String,
    /// Settings and mappings used when the index is created.
    #[serde(
        rename = "elasticBody",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub index_body: Option<Value>,
}

impl TopicMapping {
    /// Create a mapping without an index creation body.
    pub fn new(index_template: impl Into<String>) -> Self {
        Self {
            index_template: index_template.into(),
            index_body: None,
        }
    }

    /// Attach an index creation body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.index_body = Some(body);
        self
    }

    /// Resolve the concrete index name for the given instant.
    pub fn index_name(&self, at: DateTime<Utc>) -> String {
        resolve_index_name(&self.index_template, at)
    }

    fn validate(&self, topic: &str) -> Result<(), MappingError> {
        if self.index_template.trim().is_empty() {
            return Err(MappingError::invalid_entry(
                topic,
                "elasticIndex must not be empty",
            ));
        }
        if let Some(body) = &self.index_body {
            if !body.is_object() {
                return Err(MappingError::invalid_entry(
                    topic,
                    "elasticBody must be a JSON object",
                ));
            }
        }
        Ok(())
    }
}

/// Immutable table of topic mappings, loaded once at startup.
///
/// Lookups are exact string matches; MQTT wildcards in keys are passed to the
/// broker as-is but are never expanded here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicMappingTable {
    mappings: BTreeMap<String, TopicMapping>,
}

impl TopicMappingTable {
    /// Build a table from already constructed mappings, validating every entry.
    pub fn new(
        mappings: impl IntoIterator<Item = (String, TopicMapping)>,
    ) -> Result<Self, MappingError> {
        let mappings: BTreeMap<String, TopicMapping> = mappings.into_iter().collect();

        if mappings.is_empty() {
            return Err(MappingError::Empty);
        }

        for (topic, mapping) in &mappings {
            if topic.is_empty() {
                return Err(MappingError::invalid_entry(topic, "topic must not be empty"));
            }
            mapping.validate(topic)?;
        }

        Ok(Self { mappings })
    }

    /// Parse the mapping document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, MappingError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| MappingError::invalid_document(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse the mapping document from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, MappingError> {
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(MappingError::invalid_document(format!(
                    "expected a JSON object keyed by topic, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let mut mappings = Vec::with_capacity(object.len());
        for (topic, entry) in object {
            let mapping: TopicMapping = serde_json::from_value(entry)
                .map_err(|e| MappingError::invalid_entry(&topic, e.to_string()))?;
            mappings.push((topic, mapping));
        }

        Self::new(mappings)
    }

    /// Look up the mapping for a topic by exact match.
    pub fn lookup(&self, topic: &str) -> Option<&TopicMapping> {
        self.mappings.get(topic)
    }

    /// Topics to subscribe to, in sorted order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }

    /// All `(topic, mapping)` pairs, in topic order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &TopicMapping)> {
        self.mappings.iter().map(|(t, m)| (t.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
