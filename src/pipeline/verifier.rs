//! Resource verifier.
//!
//! Three independent checks per resource, each tri-state:
//! - phone: digit count and area code
//! - website: live GET with a bounded timeout
//! - address: known place names for the region
//!
//! An optional narrative report is requested from the language model. The
//! verifier only annotates; it never removes a resource.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::Region;
use crate::error::ConfigError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::events::PipelineEvents;
use crate::pipeline::types::{
    Resource, ResourceVerification, SessionState, VerificationFinding, VerificationStatus,
};

/// Report used when the narrative pass fails.
pub const VERIFICATION_UNAVAILABLE: &str = "Verification temporarily unavailable";

const WEBSITE_TOOL: &str = "website_checker";
const NARRATIVE_TOOL: &str = "verification_model";

const NARRATIVE_MAX_TOKENS: u32 = 1200;
const NARRATIVE_TEMPERATURE: f32 = 0.1;

/// Checks resource contact details against the service region.
pub struct ResourceVerifier {
    http: reqwest::Client,
    llm: Option<Arc<dyn LlmProvider>>,
    region: Region,
    state_re: Regex,
    narrative: bool,
    llm_timeout: Duration,
}

impl ResourceVerifier {
    pub fn new(
        region: Region,
        llm: Option<Arc<dyn LlmProvider>>,
        narrative: bool,
        url_timeout: Duration,
        llm_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(url_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let state_re = Regex::new(&format!(
            r"(?i)\b(?:{}|{})\b",
            regex::escape(&region.state_abbrev),
            regex::escape(&region.state_name)
        ))
        .map_err(|e| ConfigError::InvalidValue {
            key: "region.state".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            llm,
            region,
            state_re,
            narrative,
            llm_timeout,
        })
    }

    /// Annotate `state.resources_found`. Skipped unless a live search produced them.
    pub async fn verify(&self, state: &mut SessionState, events: &PipelineEvents) {
        if !state.search_performed || state.resources_found.is_empty() {
            debug!(session_id = %state.session_id, "Nothing to verify");
            return;
        }

        events.progress(format!("Verifying {} resources", state.resources_found.len()));
        let checks = state
            .resources_found
            .iter()
            .map(|resource| self.verify_resource(resource, events));
        let verifications = join_all(checks).await;

        let flagged = verifications
            .iter()
            .filter(|v| v.phone.needs_attention() || v.website.needs_attention())
            .count();
        info!(
            session_id = %state.session_id,
            checked = verifications.len(),
            flagged,
            "Resource verification complete"
        );
        state.verifications = verifications;

        if self.narrative
            && let Some(llm) = &self.llm
        {
            state.verification_report =
                Some(self.narrative_report(llm.as_ref(), state, events).await);
        }
    }

    async fn verify_resource(&self, resource: &Resource, events: &PipelineEvents) -> ResourceVerification {
        ResourceVerification {
            resource_name: resource.name.clone(),
            phone: self.check_phone(&resource.contact),
            website: self.check_url(&resource.url, events).await,
            address: self.check_address(&resource.location),
        }
    }

    pub fn check_phone(&self, contact: &str) -> VerificationFinding {
        let digits: String = contact.chars().filter(char::is_ascii_digit).collect();

        if digits.len() != 10 {
            return VerificationFinding::new(
                VerificationStatus::Invalid,
                format!("{contact:?} is not a 10-digit phone number"),
            );
        }

        let formatted = format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]);
        if digits.starts_with(&self.region.area_code) {
            VerificationFinding::new(
                VerificationStatus::Valid,
                format!("{formatted} uses the local {} area code", self.region.area_code),
            )
        } else {
            VerificationFinding::new(
                VerificationStatus::Warning,
                format!(
                    "{formatted} uses area code {}, not {}",
                    &digits[..3],
                    self.region.area_code
                ),
            )
        }
    }

    pub async fn check_url(&self, url: &str, events: &PipelineEvents) -> VerificationFinding {
        let url = url.trim();
        if url.is_empty() {
            return VerificationFinding::new(VerificationStatus::Warning, "No website listed");
        }
        if url.starts_with("tel:") {
            return VerificationFinding::new(VerificationStatus::Valid, "Phone link");
        }

        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };

        events.tool_started(WEBSITE_TOOL, &target);
        match self.http.get(&target).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                events.tool_finished(WEBSITE_TOOL, format!("{target} reachable"));
                VerificationFinding::new(VerificationStatus::Valid, format!("{target} is reachable"))
            }
            Ok(response) => {
                let status = response.status().as_u16();
                events.tool_finished(WEBSITE_TOOL, format!("{target} returned {status}"));
                VerificationFinding::new(
                    VerificationStatus::Warning,
                    format!("{target} returned status {status}"),
                )
            }
            Err(e) => {
                debug!(url = %target, error = %e, "Website check failed");
                events.tool_error(WEBSITE_TOOL, format!("{target} unreachable"));
                VerificationFinding::new(
                    VerificationStatus::Invalid,
                    format!("{target} is not reachable"),
                )
            }
        }
    }

    /// Never `Invalid`: free-text addresses are too ambiguous to reject.
    pub fn check_address(&self, location: &str) -> VerificationFinding {
        let lower = location.to_lowercase();
        let has_city = lower.contains(&self.region.principal_city.to_lowercase());
        let has_state = self.state_re.is_match(location);

        if has_city && has_state {
            VerificationFinding::new(
                VerificationStatus::Valid,
                format!("Confirmed in {}, {}", self.region.principal_city, self.region.state_abbrev),
            )
        } else if has_city
            || self
                .region
                .secondary_places
                .iter()
                .any(|place| lower.contains(place.as_str()))
        {
            VerificationFinding::new(
                VerificationStatus::Warning,
                format!("Likely in the {} area", self.region.name),
            )
        } else {
            VerificationFinding::new(
                VerificationStatus::Warning,
                format!("Cannot confirm a {} location", self.region.name),
            )
        }
    }

    async fn narrative_report(
        &self,
        llm: &dyn LlmProvider,
        state: &SessionState,
        events: &PipelineEvents,
    ) -> String {
        let resources = match serde_json::to_string_pretty(&state.resources_found) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Could not serialize resources for verification");
                return VERIFICATION_UNAVAILABLE.to_string();
            }
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.narrative_system_prompt()),
            ChatMessage::user(format!("RESOURCES TO VERIFY:\n{resources}")),
        ])
        .with_temperature(NARRATIVE_TEMPERATURE)
        .with_max_tokens(NARRATIVE_MAX_TOKENS);

        events.tool_started(NARRATIVE_TOOL, "Reviewing resources");
        match tokio::time::timeout(self.llm_timeout, llm.complete(request)).await {
            Ok(Ok(response)) if !response.content.trim().is_empty() => {
                events.tool_finished(NARRATIVE_TOOL, "Report ready");
                response.content
            }
            Ok(Ok(_)) => {
                events.tool_error(NARRATIVE_TOOL, "empty report");
                VERIFICATION_UNAVAILABLE.to_string()
            }
            Ok(Err(e)) => {
                warn!(session_id = %state.session_id, error = %e, "Narrative verification failed");
                events.tool_error(NARRATIVE_TOOL, e.to_string());
                VERIFICATION_UNAVAILABLE.to_string()
            }
            Err(_) => {
                warn!(session_id = %state.session_id, "Narrative verification timed out");
                events.tool_error(NARRATIVE_TOOL, "timed out");
                VERIFICATION_UNAVAILABLE.to_string()
            }
        }
    }

    fn narrative_system_prompt(&self) -> String {
        let r = &self.region;
        format!(
            "You are verifying resources for someone in the {name} area ({city}, {state}).\n\n\
             For each resource, check:\n\
             1. Phone numbers: should use the {area} area code\n\
             2. Websites: should be accessible and working\n\
             3. Addresses: should be in or near {city}, {state}\n\n\
             Report one block per resource:\n\
             - Resource Name: VERIFIED/WARNING/ISSUE - explanation\n\
             - Phone: VALID / WARNING: reason / INVALID: reason\n\
             - Website: ACCESSIBLE / WARNING: reason / BROKEN: reason\n\
             - Location: CONFIRMED / UNCERTAIN: reason\n\n\
             Be honest. If something looks wrong, flag it.",
            name = r.name,
            city = r.principal_city,
            state = r.state_name,
            area = r.area_code,
        )
    }
}
