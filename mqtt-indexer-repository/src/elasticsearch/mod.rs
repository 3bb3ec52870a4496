//! Elasticsearch implementation of the document store provider.

mod provider;

pub use provider::ElasticsearchProvider;
