//! Error types for Civic Assist.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// History-store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Language-model provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Web-search provider errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Search provider {provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    #[error("Search provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Failed to decode search response: {0}")]
    Decode(String),
}

/// Pipeline errors that reach the outer boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Pipeline task failed: {0}")]
    TaskFailed(String),
}
