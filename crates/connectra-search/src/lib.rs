//! # connectra-search
//!
//! Compiles declarative VQL queries into search-engine request bodies and
//! adapts an Elasticsearch/OpenSearch-compatible HTTP API to the
//! [`connectra_core::SearchIndex`] trait.

pub mod search_index;
pub mod vql_translate;

pub use search_index::{EsClientConfig, EsSearchIndex};
pub use vql_translate::translate;
