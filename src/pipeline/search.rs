//! Resource searcher.
//!
//! Builds one canonical query per category, calls the search collaborator
//! (at most `max_queries` times), parses the text into resources and appends
//! the curated supplement. Any failure degrades to the static fallback table.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::pipeline::catalog;
use crate::pipeline::events::PipelineEvents;
use crate::pipeline::parser::ResourceParser;
use crate::pipeline::sanitizer::UrlSanitizer;
use crate::pipeline::types::{NeedCategory, ResponseSource, SessionState, UrgencyLevel};
use crate::search::SearchProvider;

const TOOL_NAME: &str = "web_search";

/// Qualifier appended to the query for high-urgency requests.
const URGENT_QUALIFIER: &str = "emergency immediate";

/// Query template per category, before locale and year.
fn query_template(category: NeedCategory) -> &'static str {
    match category {
        NeedCategory::Housing => "emergency housing rental assistance",
        NeedCategory::Food => "food pantry SNAP assistance",
        NeedCategory::Healthcare => "community health clinic",
        NeedCategory::Transportation => "public transportation paratransit",
        NeedCategory::Employment => "job training employment services",
        NeedCategory::Financial => "financial assistance emergency funds",
        NeedCategory::Legal => "legal aid free legal services",
        NeedCategory::FamilyServices => "family services child care",
        NeedCategory::ElderlyServices => "senior services elderly assistance",
        NeedCategory::General => "general services",
    }
}

/// Finds resources for a classified need.
pub struct ResourceSearcher {
    provider: Option<Arc<dyn SearchProvider>>,
    parser: ResourceParser,
    sanitizer: UrlSanitizer,
    locale: String,
    max_queries: usize,
    timeout: Duration,
}

impl ResourceSearcher {
    pub fn new(
        provider: Option<Arc<dyn SearchProvider>>,
        parser: ResourceParser,
        sanitizer: UrlSanitizer,
        locale: impl Into<String>,
        max_queries: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            parser,
            sanitizer,
            locale: locale.into(),
            max_queries: max_queries.max(1),
            timeout,
        }
    }

    /// Primary query for a category, e.g.
    /// `food pantry SNAP assistance Peoria Illinois 2026`.
    pub fn primary_query(&self, category: NeedCategory, urgency: UrgencyLevel, year: i32) -> String {
        let mut query = format!("{} {} {}", query_template(category), self.locale, year);
        if urgency == UrgencyLevel::High {
            query.push(' ');
            query.push_str(URGENT_QUALIFIER);
        }
        query
    }

    /// Local query issued when the primary one comes back blank.
    pub fn secondary_query(&self, category: NeedCategory) -> String {
        format!(
            "{} {} assistance programs",
            self.locale,
            category.as_str().replace('_', " ")
        )
    }

    /// Populate `state` with resources. Never fails.
    pub async fn search(&self, state: &mut SessionState, events: &PipelineEvents) {
        if !state.needs_search {
            debug!(session_id = %state.session_id, "No search needed");
            state.response_source = ResponseSource::Conversation;
            return;
        }

        let category = state.category_or_general();
        let primary = self.primary_query(category, state.urgency_level, state.current_year());
        state.search_query = Some(primary.clone());

        let Some(provider) = &self.provider else {
            info!(session_id = %state.session_id, %category, "No search provider configured, using fallback resources");
            self.use_fallback(state, category);
            return;
        };

        events.progress(format!("Searching for {} resources", category.label()));
        let mut queries = vec![primary];
        if self.max_queries > 1 {
            queries.push(self.secondary_query(category));
        }

        for query in queries {
            match self.run_query(provider.as_ref(), &query, events).await {
                Ok(text) if !text.trim().is_empty() => {
                    self.use_results(state, category, query, text);
                    return;
                }
                Ok(_) => {
                    debug!(session_id = %state.session_id, %query, "Search returned no text");
                }
                Err(reason) => {
                    warn!(session_id = %state.session_id, %query, %reason, "Search failed, using fallback resources");
                    self.use_fallback(state, category);
                    return;
                }
            }
        }

        warn!(session_id = %state.session_id, %category, "Search returned nothing, using fallback resources");
        self.use_fallback(state, category);
    }

    async fn run_query(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
        events: &PipelineEvents,
    ) -> Result<String, String> {
        events.tool_started(TOOL_NAME, query);
        match tokio::time::timeout(self.timeout, provider.search(query)).await {
            Ok(Ok(text)) => {
                events.tool_finished(TOOL_NAME, format!("{} chars", text.len()));
                Ok(text)
            }
            Ok(Err(e)) => {
                events.tool_error(TOOL_NAME, e.to_string());
                Err(e.to_string())
            }
            Err(_) => {
                events.tool_error(TOOL_NAME, "timed out");
                Err(format!("{} timed out after {:?}", provider.name(), self.timeout))
            }
        }
    }

    fn use_results(&self, state: &mut SessionState, category: NeedCategory, query: String, text: String) {
        let mut resources = self.parser.parse(&text, category);
        let parsed = resources.len();
        resources.extend(catalog::supplement(category, state.urgency_level));
        let resources = self.sanitizer.sanitize(resources);

        info!(
            session_id = %state.session_id,
            %category,
            parsed,
            total = resources.len(),
            "Search complete"
        );

        state.search_performed = true;
        state.search_query = Some(query);
        state.raw_search_results = Some(text);
        state.resources_found = resources;
        state.response_source = ResponseSource::Search;
    }

    fn use_fallback(&self, state: &mut SessionState, category: NeedCategory) {
        state.search_performed = false;
        state.raw_search_results = None;
        state.resources_found = self.sanitizer.sanitize(catalog::fallback(category));
        state.response_source = ResponseSource::Fallback;
    }
}
