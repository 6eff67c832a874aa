//! Web-search collaborator.
//!
//! The pipeline only needs unstructured text back for a query; the parser in
//! `pipeline::parser` turns it into resource records.

pub mod serper;

pub use serper::SerperSearch;

use async_trait::async_trait;

use crate::error::SearchError;

/// A capability that answers a query with free text.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name, for logging and tool events.
    fn name(&self) -> &str;

    /// Run a query. The returned text may be empty or irrelevant.
    async fn search(&self, query: &str) -> Result<String, SearchError>;
}
