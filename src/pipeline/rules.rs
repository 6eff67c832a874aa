//! Rule-based need classification.
//!
//! Deterministic backstop for the model classifier:
//! - bare greetings (`hi`, `hello`, `hey`) → conversation only
//! - whole-word keyword sets, checked in a fixed priority order → category
//! - housing plus an emergency word → high urgency
//!
//! Anything that matches no keyword set is `general` and still searched.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{
    Classification, ClassificationSource, ConversationType, NeedCategory, UrgencyLevel,
};

/// A category and the whole-word keywords that select it.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: NeedCategory,
    /// Compiled `\b(a|b|c)\b` alternation over the keywords.
    pub regex: Regex,
    /// Urgency override applied when the escalation words also match.
    pub escalation: Option<EscalationRule>,
}

/// Urgency escalation attached to a category rule.
#[derive(Debug, Clone)]
pub struct EscalationRule {
    pub regex: Regex,
    pub urgency: UrgencyLevel,
}

/// Keyword classifier used when the model is unavailable or unparseable.
pub struct RulesEngine {
    greetings: Vec<String>,
    /// Evaluated in order; first match wins.
    category_rules: Vec<CategoryRule>,
}

/// Build a case-insensitive whole-word alternation.
fn word_set(words: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
}

impl RulesEngine {
    /// Create a rules engine with the default keyword taxonomy.
    pub fn default_rules() -> Self {
        let rule = |category, words: &[&str]| CategoryRule {
            category,
            regex: word_set(words).unwrap(),
            escalation: None,
        };

        let mut housing = rule(
            NeedCategory::Housing,
            &["housing", "house", "rent", "apartment", "home", "shelter", "homeless"],
        );
        housing.escalation = Some(EscalationRule {
            regex: word_set(&["emergency", "urgent", "immediately", "crisis", "homeless"]).unwrap(),
            urgency: UrgencyLevel::High,
        });

        let category_rules = vec![
            housing,
            rule(
                NeedCategory::Food,
                &["food", "hungry", "meal", "pantry", "snap", "groceries", "eating"],
            ),
            rule(
                NeedCategory::Healthcare,
                &["health", "medical", "doctor", "clinic", "mental", "healthcare"],
            ),
            rule(
                NeedCategory::FamilyServices,
                &["child", "safety", "abuse", "neglect", "family", "parenting", "protection"],
            ),
            rule(
                NeedCategory::Employment,
                &[
                    "job",
                    "work",
                    "employment",
                    "career",
                    "business",
                    "startup",
                    "restaurant",
                    "company",
                ],
            ),
            rule(
                NeedCategory::Transportation,
                &["transport", "bus", "ride", "car", "transportation", "travel"],
            ),
            rule(NeedCategory::Legal, &["legal", "lawyer", "court", "law"]),
            rule(
                NeedCategory::Financial,
                &["financial", "money", "bills", "debt", "assistance"],
            ),
        ];

        Self {
            greetings: vec!["hi".into(), "hello".into(), "hey".into()],
            category_rules,
        }
    }

    /// Classify a message. Same input, same output.
    pub fn evaluate(&self, message: &str) -> Classification {
        let normalized = message.trim().to_lowercase();

        if self.greetings.iter().any(|g| *g == normalized) {
            debug!("Message matched greeting rule");
            return Classification {
                conversation_type: ConversationType::Greeting,
                need_category: None,
                urgency_level: UrgencyLevel::Medium,
                needs_search: false,
                reasoning: "Bare greeting".into(),
                source: ClassificationSource::Rules,
            };
        }

        for rule in &self.category_rules {
            if !rule.regex.is_match(&normalized) {
                continue;
            }
            let urgency_level = rule
                .escalation
                .as_ref()
                .filter(|e| e.regex.is_match(&normalized))
                .map(|e| e.urgency)
                .unwrap_or_default();
            debug!(
                category = %rule.category,
                urgency = %urgency_level,
                "Message matched category rule"
            );
            return Classification {
                conversation_type: ConversationType::CivicNeed,
                need_category: Some(rule.category),
                urgency_level,
                needs_search: true,
                reasoning: format!("Keyword match for {}", rule.category),
                source: ClassificationSource::Rules,
            };
        }

        Classification {
            conversation_type: ConversationType::CivicNeed,
            need_category: Some(NeedCategory::General),
            urgency_level: UrgencyLevel::Medium,
            needs_search: true,
            reasoning: "No keyword match".into(),
            source: ClassificationSource::Rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> Classification {
        RulesEngine::default_rules().evaluate(message)
    }

    #[test]
    fn greetings_skip_search_in_any_casing() {
        for message in ["hi", "Hello", "  HEY  ", "hEy\n"] {
            let result = classify(message);
            assert!(!result.needs_search, "{message:?}");
            assert_eq!(result.need_category, None, "{message:?}");
            assert_eq!(result.conversation_type, ConversationType::Greeting);
        }
    }

    #[test]
    fn greeting_with_more_words_is_not_a_greeting() {
        let result = classify("hi there");
        assert!(result.needs_search);
        assert_eq!(result.need_category, Some(NeedCategory::General));
    }

    #[test]
    fn housing_without_emergency_is_medium() {
        for message in ["I need help with rent", "looking for an apartment", "affordable housing"] {
            let result = classify(message);
            assert_eq!(result.need_category, Some(NeedCategory::Housing), "{message:?}");
            assert_eq!(result.urgency_level, UrgencyLevel::Medium, "{message:?}");
        }
    }

    #[test]
    fn housing_with_emergency_is_high() {
        for message in [
            "I need help with rent urgent",
            "emergency shelter tonight",
            "I am homeless",
            "need an apartment immediately",
        ] {
            let result = classify(message);
            assert_eq!(result.need_category, Some(NeedCategory::Housing), "{message:?}");
            assert_eq!(result.urgency_level, UrgencyLevel::High, "{message:?}");
        }
    }

    #[test]
    fn matches_whole_words_only() {
        // "carpet" must not match "car", "lawn" must not match "law".
        assert_eq!(classify("carpet cleaning").need_category, Some(NeedCategory::General));
        assert_eq!(classify("lawn mowing").need_category, Some(NeedCategory::General));
    }

    #[test]
    fn priority_order_is_fixed() {
        // housing beats food
        assert_eq!(
            classify("food and shelter").need_category,
            Some(NeedCategory::Housing)
        );
        // family_services beats employment
        assert_eq!(
            classify("child care so I can work").need_category,
            Some(NeedCategory::FamilyServices)
        );
        // transportation beats financial
        assert_eq!(
            classify("bus pass assistance").need_category,
            Some(NeedCategory::Transportation)
        );
    }

    #[test]
    fn each_category_has_a_trigger() {
        let cases = [
            ("I'm hungry", NeedCategory::Food),
            ("need a doctor", NeedCategory::Healthcare),
            ("parenting classes", NeedCategory::FamilyServices),
            ("looking for a job", NeedCategory::Employment),
            ("need a ride", NeedCategory::Transportation),
            ("need a lawyer", NeedCategory::Legal),
            ("behind on bills", NeedCategory::Financial),
            ("something else entirely", NeedCategory::General),
        ];
        for (message, expected) in cases {
            assert_eq!(classify(message).need_category, Some(expected), "{message:?}");
        }
    }

    #[test]
    fn non_housing_urgency_stays_medium() {
        let result = classify("emergency food needed");
        assert_eq!(result.need_category, Some(NeedCategory::Food));
        assert_eq!(result.urgency_level, UrgencyLevel::Medium);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let engine = RulesEngine::default_rules();
        let a = engine.evaluate("Emergency housing please help");
        let b = engine.evaluate("Emergency housing please help");
        assert_eq!(a, b);
        assert_eq!(a.source, ClassificationSource::Rules);
    }
}
