//! Shared types for the referral pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::events::ToolEvent;

// ── Conversation history ────────────────────────────────────────────

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One recorded turn of a session. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

// ── Classification taxonomy ─────────────────────────────────────────

/// Closed taxonomy of assistance needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedCategory {
    Housing,
    Food,
    Healthcare,
    Transportation,
    Employment,
    Financial,
    Legal,
    FamilyServices,
    ElderlyServices,
    General,
}

impl NeedCategory {
    pub const ALL: [NeedCategory; 10] = [
        Self::Housing,
        Self::Food,
        Self::Healthcare,
        Self::Transportation,
        Self::Employment,
        Self::Financial,
        Self::Legal,
        Self::FamilyServices,
        Self::ElderlyServices,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Housing => "housing",
            Self::Food => "food",
            Self::Healthcare => "healthcare",
            Self::Transportation => "transportation",
            Self::Employment => "employment",
            Self::Financial => "financial",
            Self::Legal => "legal",
            Self::FamilyServices => "family_services",
            Self::ElderlyServices => "elderly_services",
            Self::General => "general",
        }
    }

    /// Title-cased display label, e.g. `Family Services`.
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Map free-form classifier output onto the taxonomy. Anything unknown is `General`.
    pub fn normalize(raw: &str) -> Self {
        let key = raw.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .unwrap_or(Self::General)
    }
}

impl fmt::Display for NeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-tier urgency signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Unknown values become `Medium`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of conversational turn the classifier detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Greeting,
    CivicNeed,
    FollowUp,
}

impl ConversationType {
    /// Parse the model's label (`GREETING`, `civic_need`, `Follow-Up`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "greeting" => Some(Self::Greeting),
            "civic_need" => Some(Self::CivicNeed),
            "follow_up" | "followup" => Some(Self::FollowUp),
            _ => None,
        }
    }
}

/// Which classifier tier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Model,
    Rules,
}

/// Output of the need classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub conversation_type: ConversationType,
    /// `None` for conversation-only turns such as greetings.
    pub need_category: Option<NeedCategory>,
    pub urgency_level: UrgencyLevel,
    pub needs_search: bool,
    pub reasoning: String,
    pub source: ClassificationSource,
}

// ── Resources ───────────────────────────────────────────────────────

/// Where the final reply came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    #[default]
    Conversation,
    Search,
    DirectSearchResults,
    Fallback,
    Error,
}

/// A single referral record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    /// Display label of the need category, e.g. `Family Services`.
    pub category: String,
    pub description: String,
    /// Free-text phone or dial string.
    pub contact: String,
    pub url: String,
    pub location: String,
    pub eligibility: String,
    pub next_step: String,
}

// ── Verification ────────────────────────────────────────────────────

/// Tri-state outcome of one programmatic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Valid,
    Warning,
    Invalid,
}

/// One field's check result with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFinding {
    pub status: VerificationStatus,
    pub message: String,
}

impl VerificationFinding {
    pub fn new(status: VerificationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn needs_attention(&self) -> bool {
        self.status != VerificationStatus::Valid
    }
}

/// Phone, website and address findings for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVerification {
    pub resource_name: String,
    pub phone: VerificationFinding,
    pub website: VerificationFinding,
    pub address: VerificationFinding,
}

// ── Session state ───────────────────────────────────────────────────

/// Mutable working record for one pipeline run. Never shared between runs.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub user_message: String,
    pub session_id: String,
    pub started_at: DateTime<Local>,
    /// `YYYY-MM-DD`
    pub current_date: String,
    /// `HH:MM`
    pub current_time: String,
    pub location: String,
    pub conversation_history: Vec<ConversationTurn>,
    pub conversation_type: Option<ConversationType>,
    pub needs_search: bool,
    pub need_category: Option<NeedCategory>,
    pub urgency_level: UrgencyLevel,
    pub search_performed: bool,
    pub search_query: Option<String>,
    pub raw_search_results: Option<String>,
    pub resources_found: Vec<Resource>,
    pub verifications: Vec<ResourceVerification>,
    pub verification_report: Option<String>,
    pub civic_response: String,
    pub response_source: ResponseSource,
    pub execution_time_ms: u64,
    pub step_timings: BTreeMap<String, u64>,
}

impl SessionState {
    pub fn new(
        user_message: impl Into<String>,
        session_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        let now = Local::now();
        Self {
            user_message: user_message.into(),
            session_id: session_id.into(),
            started_at: now,
            current_date: now.format("%Y-%m-%d").to_string(),
            current_time: now.format("%H:%M").to_string(),
            location: location.into(),
            conversation_history: Vec::new(),
            conversation_type: None,
            needs_search: false,
            need_category: None,
            urgency_level: UrgencyLevel::Medium,
            search_performed: false,
            search_query: None,
            raw_search_results: None,
            resources_found: Vec::new(),
            verifications: Vec::new(),
            verification_report: None,
            civic_response: String::new(),
            response_source: ResponseSource::Conversation,
            execution_time_ms: 0,
            step_timings: BTreeMap::new(),
        }
    }

    pub fn current_year(&self) -> i32 {
        self.started_at.year()
    }

    /// Category used by stages that require one; `General` when unset.
    pub fn category_or_general(&self) -> NeedCategory {
        self.need_category.unwrap_or(NeedCategory::General)
    }

    pub fn apply(&mut self, classification: &Classification) {
        self.conversation_type = Some(classification.conversation_type);
        self.need_category = classification.need_category;
        self.urgency_level = classification.urgency_level;
        self.needs_search = classification.needs_search;
    }
}

// ── Boundary contract ───────────────────────────────────────────────

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Outbound chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub resources: Vec<Resource>,
    pub session_id: String,
    pub search_performed: bool,
    /// Empty for conversation-only turns.
    pub need_category: String,
    pub urgency_level: UrgencyLevel,
    pub response_source: ResponseSource,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub step_timings: BTreeMap<String, u64>,
    #[serde(default)]
    pub tool_events: Vec<ToolEvent>,
    #[serde(default)]
    pub verification: Vec<ResourceVerification>,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    /// Build the response for a completed run.
    pub fn from_state(state: SessionState, tool_events: Vec<ToolEvent>) -> Self {
        Self {
            response: state.civic_response,
            resources: state.resources_found,
            session_id: state.session_id,
            search_performed: state.search_performed,
            need_category: state
                .need_category
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            urgency_level: state.urgency_level,
            response_source: state.response_source,
            success: true,
            error: None,
            execution_time_ms: state.execution_time_ms,
            step_timings: state.step_timings,
            tool_events,
            verification: state.verifications,
            location: state.location,
            timestamp: Utc::now(),
        }
    }

    /// Safe response for a run that could not complete.
    pub fn failure(
        session_id: impl Into<String>,
        response: impl Into<String>,
        error: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            response: response.into(),
            resources: Vec::new(),
            session_id: session_id.into(),
            search_performed: false,
            need_category: String::new(),
            urgency_level: UrgencyLevel::Medium,
            response_source: ResponseSource::Error,
            success: false,
            error: Some(error.into()),
            execution_time_ms: 0,
            step_timings: BTreeMap::new(),
            tool_events: Vec::new(),
            verification: Vec::new(),
            location: location.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_normalizes_unknown_to_general() {
        assert_eq!(NeedCategory::normalize("food"), NeedCategory::Food);
        assert_eq!(NeedCategory::normalize(" Family Services "), NeedCategory::FamilyServices);
        assert_eq!(NeedCategory::normalize("elderly-services"), NeedCategory::ElderlyServices);
        assert_eq!(NeedCategory::normalize("spaceships"), NeedCategory::General);
        assert_eq!(NeedCategory::normalize(""), NeedCategory::General);
    }

    #[test]
    fn category_labels_are_title_cased() {
        assert_eq!(NeedCategory::FamilyServices.label(), "Family Services");
        assert_eq!(NeedCategory::Housing.label(), "Housing");
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_value(NeedCategory::ElderlyServices).unwrap();
        assert_eq!(json, "elderly_services");
    }

    #[test]
    fn urgency_normalizes_unknown_to_medium() {
        assert_eq!(UrgencyLevel::normalize("HIGH"), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::normalize("low"), UrgencyLevel::Low);
        assert_eq!(UrgencyLevel::normalize("critical"), UrgencyLevel::Medium);
    }

    #[test]
    fn conversation_type_parses_model_labels() {
        assert_eq!(ConversationType::parse("GREETING"), Some(ConversationType::Greeting));
        assert_eq!(ConversationType::parse("CIVIC_NEED"), Some(ConversationType::CivicNeed));
        assert_eq!(ConversationType::parse("follow-up"), Some(ConversationType::FollowUp));
        assert_eq!(ConversationType::parse("smalltalk"), None);
    }

    #[test]
    fn verification_status_serializes_uppercase() {
        let finding = VerificationFinding::new(VerificationStatus::Warning, "check");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["status"], "WARNING");
        assert!(finding.needs_attention());
    }

    #[test]
    fn response_from_state_renders_missing_category_as_empty() {
        let mut state = SessionState::new("hi", "s-1", "Central Illinois");
        state.civic_response = "Hello".into();
        let response = ChatResponse::from_state(state, Vec::new());
        assert_eq!(response.need_category, "");
        assert!(response.success);
        assert!(response.error.is_none());
        assert_eq!(response.response_source, ResponseSource::Conversation);
    }

    #[test]
    fn failure_response_is_safe() {
        let response = ChatResponse::failure("s-2", "call 211", "boom", "Central Illinois");
        assert!(!response.success);
        assert_eq!(response.response, "call 211");
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert!(response.resources.is_empty());
        assert_eq!(response.response_source, ResponseSource::Error);
    }

    #[test]
    fn chat_request_session_is_optional() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(request.session_id.is_none());
    }
}
