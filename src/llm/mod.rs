//! Language-model integration for Civic Assist.
//!
//! The pipeline only sees the `LlmProvider` trait; `AnthropicProvider` is the
//! production implementation and tests plug in mocks.

pub mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = AnthropicProvider::new(config)?;
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(provider))
}
