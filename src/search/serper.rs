//! Serper (Google Search API) provider.
//!
//! Results are rendered as lightly marked-up text (`**Title**`, snippet,
//! `Website:` and `Phone:` lines) so the resource parser can pick them apart.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::search::SearchProvider;

const PROVIDER: &str = "serper";

/// Search provider backed by the Serper API.
#[derive(Clone)]
pub struct SerperSearch {
    client: Client,
    api_key: SecretString,
    endpoint: String,
    results_per_query: u32,
    timeout: Duration,
}

impl SerperSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            results_per_query: config.results_per_query,
            timeout: config.timeout,
        })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    gl: &'a str,
    num: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    places: Vec<Place>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    title: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganicResult {
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
}

#[async_trait]
impl SearchProvider for SerperSearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<String, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose_secret())
            .json(&SearchRequest {
                q: query,
                gl: "us",
                num: self.results_per_query,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    SearchError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let text = render_results(&parsed);
        debug!(query, chars = text.len(), "Serper search finished");
        Ok(text)
    }
}

/// Render a Serper response as text the resource parser understands.
fn render_results(response: &SearchResponse) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(answer) = &response.answer_box {
        let body = answer
            .answer
            .as_deref()
            .or(answer.snippet.as_deref())
            .unwrap_or_default();
        if !body.trim().is_empty() {
            let mut block = String::new();
            if let Some(title) = answer.title.as_deref().filter(|t| !t.trim().is_empty()) {
                block.push_str(&format!("**{}**\n", title.trim()));
            }
            block.push_str(&format!("Description: {}", body.trim()));
            blocks.push(block);
        }
    }

    for place in &response.places {
        let mut lines = vec![format!("**{}**", place.title.trim())];
        if let Some(address) = &place.address {
            lines.push(format!("Address: {}", address.trim()));
        }
        if let Some(phone) = &place.phone_number {
            lines.push(format!("Phone: {}", phone.trim()));
        }
        if let Some(website) = &place.website {
            lines.push(format!("Website: {}", website.trim()));
        }
        blocks.push(lines.join("\n"));
    }

    for result in &response.organic {
        let mut lines = vec![format!("**{}**", result.title.trim())];
        if let Some(snippet) = result.snippet.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("Description: {}", snippet.trim()));
        }
        if let Some(phone) = &result.phone_number {
            lines.push(format!("Phone: {}", phone.trim()));
        }
        if let Some(link) = &result.link {
            lines.push(format!("Website: {}", link.trim()));
        }
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}
