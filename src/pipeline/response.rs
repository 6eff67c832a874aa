//! Response assembler.
//!
//! State machine over `response_source`:
//! - `conversation` → fixed greeting
//! - `search` with search text → lead-in, optional clarifying questions,
//!   urgency guidance, the resource list and any verification notes
//! - anything else → fixed information-line fallback

use std::fmt::Write as _;

use tracing::info;

use crate::config::ClarificationConfig;
use crate::pipeline::types::{NeedCategory, ResponseSource, SessionState, UrgencyLevel};

pub const GREETING: &str = "Hi there! 👋 Welcome! I'm here to help you find local resources and support in Central Illinois—whether that's help with housing, food, healthcare, jobs, or anything else you might need. What brings you in today? What can I help you with?";

pub const FALLBACK_RESPONSE: &str =
    "I understand you need help. For immediate assistance, call 211 (available 24/7).";

/// Returned when a run fails outright.
pub const CATASTROPHIC_RESPONSE: &str =
    "I'm having trouble right now. For immediate help, call 211 - available 24/7.";

const HOUSING_QUESTIONS: &str = "**To help you find the most relevant resources, can you tell me a bit more?**

- Are you looking for **emergency housing** or shelter right now?
- Do you need help with **rent payments** or rental assistance?
- Are you interested in **affordable housing** programs or homeownership?
- Is this about **transitional housing** after a difficult situation?

You can just tell me which feels closest to your situation, and I'll find more targeted resources for you.";

const FOOD_QUESTIONS: &str = "**I can help you find the right food resources! What would be most helpful?**

- **Food pantries** for groceries to take home
- **Hot meals** or soup kitchens
- **SNAP benefits** (food stamps) application help
- **Emergency food** assistance right away

Just let me know what sounds most helpful for your situation.";

fn urgency_guidance(urgency: UrgencyLevel) -> &'static str {
    match urgency {
        UrgencyLevel::High => "This seems urgent. I've prioritized immediate help options.",
        UrgencyLevel::Medium => "Here are resources that can help you.",
        UrgencyLevel::Low => "I found some good options for you to explore.",
    }
}

/// Turns a finished session state into the user-facing reply.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    clarification: ClarificationConfig,
}

impl ResponseAssembler {
    pub fn new(clarification: ClarificationConfig) -> Self {
        Self { clarification }
    }

    /// Set `civic_response` and the final `response_source`.
    pub fn assemble(&self, state: &mut SessionState) {
        let has_text = state
            .raw_search_results
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());

        match state.response_source {
            ResponseSource::Conversation => {
                state.civic_response = GREETING.to_string();
            }
            ResponseSource::Search if state.search_performed && has_text => {
                state.civic_response = self.search_response(state);
                state.response_source = ResponseSource::DirectSearchResults;
            }
            _ => {
                state.civic_response = FALLBACK_RESPONSE.to_string();
                state.response_source = ResponseSource::Fallback;
            }
        }

        info!(
            session_id = %state.session_id,
            source = ?state.response_source,
            chars = state.civic_response.len(),
            "Response assembled"
        );
    }

    /// Clarifying questions for an under-specified request, if any apply.
    pub fn clarifying_questions(&self, category: NeedCategory, message: &str) -> Option<&'static str> {
        if !self.clarification.enabled {
            return None;
        }
        let lower = message.to_lowercase();
        match category {
            NeedCategory::Housing
                if !lower.contains(&self.clarification.housing_unless_keyword.to_lowercase()) =>
            {
                Some(HOUSING_QUESTIONS)
            }
            NeedCategory::Food
                if message.split_whitespace().count() <= self.clarification.food_max_words =>
            {
                Some(FOOD_QUESTIONS)
            }
            _ => None,
        }
    }

    fn search_response(&self, state: &SessionState) -> String {
        let category = state.category_or_general();
        let mut out = format!(
            "Here's what I found for your {} needs:\n\n",
            category.as_str().replace('_', " ")
        );

        if let Some(questions) = self.clarifying_questions(category, &state.user_message) {
            out.push_str(questions);
            out.push_str("\n\n");
        }

        out.push_str(urgency_guidance(state.urgency_level));
        out.push_str("\n\n");

        for (i, resource) in state.resources_found.iter().enumerate() {
            let _ = writeln!(out, "{}. **{}**", i + 1, resource.name);
            let _ = writeln!(out, "   - {}", resource.description);
            if !resource.contact.is_empty() {
                let _ = writeln!(out, "   - Contact: {}", resource.contact);
            }
            if !resource.url.is_empty() {
                let _ = writeln!(out, "   - Website: {}", resource.url);
            }
            let _ = writeln!(out, "   - Next step: {}", resource.next_step);
            out.push('\n');
        }

        let service_lines: Vec<&str> = state
            .resources_found
            .iter()
            .filter(|r| is_service_line(&r.contact))
            .map(|r| r.name.as_str())
            .collect();
        let notes: Vec<String> = state
            .verifications
            .iter()
            .flat_map(|v| {
                let phone = (!service_lines.contains(&v.resource_name.as_str())).then_some(&v.phone);
                phone
                    .into_iter()
                    .chain([&v.website])
                    .filter(|f| f.needs_attention())
                    .map(move |f| format!("- {}: {}", v.resource_name, f.message))
            })
            .collect();
        if !notes.is_empty() {
            out.push_str("**Please double-check before you go:**\n");
            out.push_str(&notes.join("\n"));
            out.push('\n');
        }

        out.trim_end().to_string()
    }
}

/// Three-digit lines like 211 are dialed as written, so their phone finding is not listed.
fn is_service_line(contact: &str) -> bool {
    contact.chars().filter(char::is_ascii_digit).count() == 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{
        Resource, ResourceVerification, VerificationFinding, VerificationStatus,
    };

    fn assembler() -> ResponseAssembler {
        ResponseAssembler::new(ClarificationConfig::default())
    }

    fn resource(name: &str) -> Resource {
        Resource {
            name: name.into(),
            category: "Food".into(),
            description: "Groceries weekly".into(),
            contact: "(309) 555-0100".into(),
            url: "https://example.org".into(),
            location: "Peoria, IL".into(),
            eligibility: "All".into(),
            next_step: "Call ahead".into(),
        }
    }

    fn searched(message: &str, category: NeedCategory, urgency: UrgencyLevel) -> SessionState {
        let mut state = SessionState::new(message, "s-1", "Central Illinois");
        state.need_category = Some(category);
        state.urgency_level = urgency;
        state.search_performed = true;
        state.raw_search_results = Some("**Pantry**\nfood help".into());
        state.resources_found = vec![resource("Pantry")];
        state.response_source = ResponseSource::Search;
        state
    }

    #[test]
    fn conversation_gets_greeting() {
        let mut state = SessionState::new("hi", "s-1", "Central Illinois");
        assembler().assemble(&mut state);
        assert_eq!(state.civic_response, GREETING);
        assert_eq!(state.response_source, ResponseSource::Conversation);
    }

    #[test]
    fn search_results_are_presented_directly() {
        let mut state = searched(
            "I need groceries for my family this week please",
            NeedCategory::Food,
            UrgencyLevel::Medium,
        );
        assembler().assemble(&mut state);

        assert_eq!(state.response_source, ResponseSource::DirectSearchResults);
        assert!(state.civic_response.starts_with("Here's what I found for your food needs:\n\n"));
        assert!(state.civic_response.contains("Here are resources that can help you."));
        assert!(state.civic_response.contains("1. **Pantry**"));
        assert!(state.civic_response.contains("Website: https://example.org"));
        assert!(!state.civic_response.contains("food resources! What"));
    }

    #[test]
    fn fallback_source_gets_fixed_text() {
        let mut state = SessionState::new("help", "s-1", "Central Illinois");
        state.response_source = ResponseSource::Fallback;
        state.resources_found = vec![resource("211")];
        assembler().assemble(&mut state);
        assert_eq!(state.civic_response, FALLBACK_RESPONSE);
        assert_eq!(state.response_source, ResponseSource::Fallback);
    }

    #[test]
    fn search_without_text_falls_back() {
        let mut state = searched("food", NeedCategory::Food, UrgencyLevel::Medium);
        state.raw_search_results = Some("  ".into());
        assembler().assemble(&mut state);
        assert_eq!(state.civic_response, FALLBACK_RESPONSE);
        assert_eq!(state.response_source, ResponseSource::Fallback);
    }

    #[test]
    fn multi_word_category_reads_naturally() {
        let mut state = searched("parenting classes", NeedCategory::FamilyServices, UrgencyLevel::Low);
        assembler().assemble(&mut state);
        assert!(state.civic_response.starts_with("Here's what I found for your family services needs"));
        assert!(state.civic_response.contains("I found some good options for you to explore."));
    }

    // ── Clarification ───────────────────────────────────────────────

    #[test]
    fn housing_without_emergency_asks_questions() {
        let mut state = searched("I need help with rent", NeedCategory::Housing, UrgencyLevel::Medium);
        assembler().assemble(&mut state);
        assert!(state.civic_response.contains("tell me a bit more?"));
    }

    #[test]
    fn housing_with_emergency_skips_questions() {
        let mut state = searched("Emergency housing please help", NeedCategory::Housing, UrgencyLevel::High);
        assembler().assemble(&mut state);
        assert!(!state.civic_response.contains("tell me a bit more?"));
        assert!(state.civic_response.contains("This seems urgent."));
    }

    #[test]
    fn short_food_request_asks_questions() {
        let a = assembler();
        assert!(a.clarifying_questions(NeedCategory::Food, "I need food").is_some());
        assert!(a.clarifying_questions(NeedCategory::Food, "one two three four five").is_some());
        assert!(a.clarifying_questions(NeedCategory::Food, "one two three four five six").is_none());
    }

    #[test]
    fn clarification_thresholds_are_configurable() {
        let a = ResponseAssembler::new(ClarificationConfig {
            enabled: true,
            housing_unless_keyword: "tonight".into(),
            food_max_words: 1,
        });
        assert!(a.clarifying_questions(NeedCategory::Housing, "shelter tonight").is_none());
        assert!(a.clarifying_questions(NeedCategory::Housing, "emergency shelter").is_some());
        assert!(a.clarifying_questions(NeedCategory::Food, "food please").is_none());

        let off = ResponseAssembler::new(ClarificationConfig {
            enabled: false,
            ..ClarificationConfig::default()
        });
        assert!(off.clarifying_questions(NeedCategory::Housing, "rent").is_none());
    }

    #[test]
    fn other_categories_never_ask() {
        assert!(assembler().clarifying_questions(NeedCategory::Legal, "lawyer").is_none());
    }

    // ── Verification notes ──────────────────────────────────────────

    #[test]
    fn flagged_findings_are_listed() {
        let mut state = searched(
            "where can I get groceries for my kids today",
            NeedCategory::Food,
            UrgencyLevel::Medium,
        );
        state.verifications = vec![ResourceVerification {
            resource_name: "Pantry".into(),
            phone: VerificationFinding::new(VerificationStatus::Warning, "uses area code 217"),
            website: VerificationFinding::new(VerificationStatus::Valid, "reachable"),
            address: VerificationFinding::new(VerificationStatus::Warning, "uncertain"),
        }];
        assembler().assemble(&mut state);

        assert!(state.civic_response.contains("Please double-check before you go"));
        assert!(state.civic_response.contains("- Pantry: uses area code 217"));
        assert!(!state.civic_response.contains("reachable"));
        assert!(!state.civic_response.contains("uncertain"));
    }

    #[test]
    fn service_line_phone_findings_are_not_listed() {
        let mut state = searched(
            "where can I get groceries for my kids today",
            NeedCategory::Food,
            UrgencyLevel::Medium,
        );
        let mut hotline = resource("United Way 2-1-1");
        hotline.contact = "Dial 2-1-1".into();
        state.resources_found.push(hotline);
        state.verifications = vec![ResourceVerification {
            resource_name: "United Way 2-1-1".into(),
            phone: VerificationFinding::new(VerificationStatus::Invalid, "not a 10-digit phone number"),
            website: VerificationFinding::new(VerificationStatus::Valid, "dial link"),
            address: VerificationFinding::new(VerificationStatus::Warning, "uncertain"),
        }];
        assembler().assemble(&mut state);

        assert!(state.civic_response.contains("United Way 2-1-1"));
        assert!(!state.civic_response.contains("not a 10-digit"));
        assert!(!state.civic_response.contains("Please double-check before you go"));
    }
}
