//! Need classifier: model first, rules as backstop.
//!
//! Flow:
//! 1. No model configured → rules engine
//! 2. Model call (bounded by timeout) → JSON decision
//! 3. Any call error, parse error, missing key or unknown label → rules engine

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::events::PipelineEvents;
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{
    Classification, ClassificationSource, ConversationType, NeedCategory, SessionState,
    TurnRole, UrgencyLevel,
};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 400;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

const TOOL_NAME: &str = "intake_model";

/// Decides conversation type, category, urgency and whether to search.
pub struct NeedClassifier {
    llm: Option<Arc<dyn LlmProvider>>,
    rules: RulesEngine,
    history_turns: usize,
    timeout: Duration,
}

impl NeedClassifier {
    pub fn new(
        llm: Option<Arc<dyn LlmProvider>>,
        rules: RulesEngine,
        history_turns: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            rules,
            history_turns,
            timeout,
        }
    }

    /// Classify the current message. Never fails.
    pub async fn classify(&self, state: &SessionState, events: &PipelineEvents) -> Classification {
        let Some(llm) = &self.llm else {
            debug!(session_id = %state.session_id, "No language model configured, using rules");
            return self.rules.evaluate(&state.user_message);
        };

        match self.classify_with_model(llm.as_ref(), state, events).await {
            Ok(classification) => {
                info!(
                    session_id = %state.session_id,
                    conversation_type = ?classification.conversation_type,
                    category = ?classification.need_category,
                    urgency = %classification.urgency_level,
                    needs_search = classification.needs_search,
                    "Model classification"
                );
                classification
            }
            Err(reason) => {
                warn!(
                    session_id = %state.session_id,
                    reason = %reason,
                    "Model classification unusable, falling back to rules"
                );
                let classification = self.rules.evaluate(&state.user_message);
                info!(
                    session_id = %state.session_id,
                    category = ?classification.need_category,
                    urgency = %classification.urgency_level,
                    needs_search = classification.needs_search,
                    "Rule classification"
                );
                classification
            }
        }
    }

    async fn classify_with_model(
        &self,
        llm: &dyn LlmProvider,
        state: &SessionState,
        events: &PipelineEvents,
    ) -> Result<Classification, String> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(state, self.history_turns)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        events.tool_started(TOOL_NAME, "Analyzing request");
        let response = match tokio::time::timeout(self.timeout, llm.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                events.tool_error(TOOL_NAME, e.to_string());
                return Err(format!("LLM call failed: {e}"));
            }
            Err(_) => {
                events.tool_error(TOOL_NAME, "timed out");
                return Err(format!("LLM call timed out after {:?}", self.timeout));
            }
        };
        events.tool_finished(TOOL_NAME, "Analysis complete");

        parse_classification(&response.content)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    "You are the intake specialist for a community resource referral service. \
     Classify the user's message.\n\n\
     Conversation types:\n\
     - GREETING: a simple hi/hello/hey\n\
     - CIVIC_NEED: a specific request for resources or help\n\
     - FOLLOW_UP: continuing the previous conversation\n\n\
     Need categories:\n\
     - housing (shelter, rent, utilities)\n\
     - food (pantries, SNAP, meals)\n\
     - healthcare (clinics, insurance, mental health)\n\
     - transportation (bus, rides, car help)\n\
     - employment (jobs, training, benefits)\n\
     - financial (assistance, bills, emergency funds)\n\
     - legal (aid, advice, court help)\n\
     - family_services (childcare, parenting, family support)\n\
     - elderly_services (senior programs, caregiving)\n\
     - general (multiple needs, unclear)\n\n\
     Urgency: low (planning ahead), medium (need help soon), high (emergency, crisis).\n\n\
     Search decision: SEARCH_NEEDED when they need specific resource information, \
     CONVERSATION_ONLY for greetings, thanks or general chat.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"conversation_type\": \"GREETING|CIVIC_NEED|FOLLOW_UP\", \"need_category\": \"...\", \
     \"urgency_level\": \"low|medium|high\", \"search_decision\": \"SEARCH_NEEDED|CONVERSATION_ONLY\", \
     \"reasoning\": \"...\"}"
        .to_string()
}

fn build_classify_user_prompt(state: &SessionState, history_turns: usize) -> String {
    let mut prompt = String::with_capacity(512);

    prompt.push_str(&format!("Date: {}\n", state.current_date));
    prompt.push_str(&format!("Time: {}\n", state.current_time));
    prompt.push_str(&format!("Location: {}\n", state.location));

    // One exchange is a user turn plus an assistant turn.
    let window = history_turns * 2;
    let history = &state.conversation_history;
    let recent = &history[history.len().saturating_sub(window)..];
    if !recent.is_empty() {
        prompt.push_str("\nConversation history:\n");
        for turn in recent {
            let preview: String = turn.content.chars().take(300).collect();
            let role = match turn.role {
                TurnRole::User => "User",
                TurnRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{role}: {preview}\n"));
        }
    }

    prompt.push_str(&format!("\nCurrent message:\nUser: \"{}\"", state.user_message));
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model's reply into a classification.
///
/// The four decision keys are required; `reasoning` is optional.
fn parse_classification(raw: &str) -> Result<Classification, String> {
    let json_str = extract_json_object(raw);
    let value: serde_json::Value =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    let field = |key: &str| -> Result<String, String> {
        match object.get(key) {
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(serde_json::Value::Null) => Ok(String::new()),
            Some(other) => Ok(other.to_string()),
            None => Err(format!("missing key '{key}'")),
        }
    };

    let conversation_type_raw = field("conversation_type")?;
    let category_raw = field("need_category")?;
    let urgency_raw = field("urgency_level")?;
    let decision_raw = field("search_decision")?;
    let reasoning = field("reasoning").unwrap_or_default();

    let conversation_type = ConversationType::parse(&conversation_type_raw)
        .ok_or_else(|| format!("unknown conversation_type: '{conversation_type_raw}'"))?;

    let needs_search = match decision_raw.trim().to_uppercase().as_str() {
        "SEARCH_NEEDED" => true,
        "CONVERSATION_ONLY" => false,
        other => return Err(format!("unknown search_decision: '{other}'")),
    };

    let need_category = if conversation_type == ConversationType::Greeting {
        None
    } else {
        Some(NeedCategory::normalize(&category_raw))
    };

    Ok(Classification {
        conversation_type,
        need_category,
        urgency_level: UrgencyLevel::normalize(&urgency_raw),
        needs_search,
        reasoning,
        source: ClassificationSource::Model,
    })
}

/// Extract a JSON object from LLM output: the span from the first `{` to the
/// last `}`, which also covers markdown fences and surrounding prose.
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
