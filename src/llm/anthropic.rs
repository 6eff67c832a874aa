//! Anthropic Messages API provider over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

const PROVIDER: &str = "anthropic";
const DEFAULT_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic-backed `LlmProvider`.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    default_temperature: f32,
    default_max_tokens: u32,
    timeout: Duration,
    messages_url: String,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
            timeout: config.timeout,
            messages_url: DEFAULT_MESSAGES_URL.to_string(),
        })
    }

    /// Point the provider at a different endpoint (tests, proxies).
    pub fn with_messages_url(mut self, url: impl Into<String>) -> Self {
        self.messages_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(self.default_max_tokens),
            "temperature": request.temperature.unwrap_or(self.default_temperature),
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }

        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    LlmError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, text, retry_after));
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                })?;

        let content = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response contained no text".to_string(),
            });
        }

        let finish_reason = match parsed.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Unknown,
        };
        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        debug!(
            model = %self.model,
            input_tokens,
            output_tokens,
            "Anthropic completion finished"
        );

        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
            finish_reason,
        })
    }
}

fn map_status_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> LlmError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        _ => LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
