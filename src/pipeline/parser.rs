//! Best-effort extraction of resource records from free-text search output.
//!
//! Line-oriented heuristics:
//! - a name marker (label, known organisation, `#` header or leading bold text)
//!   closes the open record and starts a new one
//! - following lines feed phone, URL, location, eligibility and description
//! - every field left empty gets a safe default
//!
//! Lines before the first name marker are ignored. If nothing parses but the
//! text is non-blank, a single record carrying a truncated copy of the text is
//! returned so the search output is never silently dropped.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{NeedCategory, Resource};

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap());

static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());

/// Bold text at the start of a line, optionally after a bullet or list number.
static LEADING_BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-•*]\s+|\d+[.)]\s+)?\*\*([^*]+)\*\*").unwrap());

static LEADING_MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[\s#>•*\-]+|\d+[.)]\s+)+").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Labels whose value is the organisation name.
const NAME_LABELS: &[&str] = &[
    "primary resource:",
    "secondary resource:",
    "name:",
    "organization:",
    "program:",
];

/// Organisations that appear without markup in search summaries.
const KNOWN_ORGANIZATIONS: &[&str] = &["CAREER LINK", "GOODWILL", "ILLINOIS CENTRAL COLLEGE"];

const CONTACT_LABELS: &[&str] = &["phone:", "contact:", "call:"];
const URL_LABELS: &[&str] = &["website:", "web:", "url:"];
const LOCATION_LABELS: &[&str] = &["address:", "location:"];
const ELIGIBILITY_LABELS: &[&str] = &["eligibility:", "requirements:", "qualifies:"];
const DESCRIPTION_LABELS: &[&str] = &["description:", "services:", "what they offer:", "offers:"];

/// Unlabelled lines containing one of these words count as description.
const SERVICE_WORDS: &[&str] = &["training", "assistance", "help"];

/// Line classification after markdown is stripped.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Name(String),
    Contact(String),
    Url(String),
    Location(String),
    Eligibility(String),
    Description(String),
    Other(String),
}

/// Record under construction.
#[derive(Debug, Default)]
struct Draft {
    name: String,
    contact: String,
    url: String,
    location: String,
    eligibility: String,
    description: Vec<String>,
}

/// Parses search text into at most `max_records` resources.
#[derive(Debug, Clone)]
pub struct ResourceParser {
    max_records: usize,
    description_cap: usize,
    default_location: String,
    synthesized_location: String,
}

impl ResourceParser {
    pub fn new(
        max_records: usize,
        description_cap: usize,
        default_location: impl Into<String>,
        synthesized_location: impl Into<String>,
    ) -> Self {
        Self {
            max_records,
            description_cap,
            default_location: default_location.into(),
            synthesized_location: synthesized_location.into(),
        }
    }

    pub fn parse(&self, text: &str, category: NeedCategory) -> Vec<Resource> {
        let mut drafts: Vec<Draft> = Vec::new();
        let mut current: Option<Draft> = None;

        for raw_line in text.lines() {
            let raw_line = raw_line.trim();
            if raw_line.is_empty() {
                continue;
            }

            let line = classify_line(raw_line);
            if let Line::Name(name) = line {
                if let Some(done) = current.take() {
                    drafts.push(done);
                }
                current = Some(Draft {
                    name,
                    ..Draft::default()
                });
                continue;
            }

            let Some(draft) = current.as_mut() else {
                continue;
            };
            apply_line(draft, raw_line, line);
        }
        if let Some(done) = current.take() {
            drafts.push(done);
        }

        let found = drafts.len();
        let resources: Vec<Resource> = drafts
            .into_iter()
            .filter(|d| !d.name.is_empty())
            .take(self.max_records)
            .map(|d| self.finish(d, category))
            .collect();
        debug!(found, kept = resources.len(), %category, "Parsed search results");

        if resources.is_empty() && !text.trim().is_empty() {
            return vec![self.synthesize(text, category)];
        }
        resources
    }

    fn finish(&self, draft: Draft, category: NeedCategory) -> Resource {
        let topic = category.as_str().replace('_', " ");
        let description = draft.description.join(" ");
        let or_default = |value: String, default: String| {
            if value.trim().is_empty() { default } else { value }
        };

        Resource {
            name: draft.name,
            category: category.label(),
            description: or_default(description, format!("Local {topic} resource")),
            contact: draft.contact,
            url: draft.url,
            location: or_default(draft.location, self.default_location.clone()),
            eligibility: or_default(
                draft.eligibility,
                "Contact for eligibility requirements".to_string(),
            ),
            next_step: format!("Contact for {topic} assistance"),
        }
    }

    fn synthesize(&self, text: &str, category: NeedCategory) -> Resource {
        let topic = category.as_str().replace('_', " ");
        let text = text.trim();
        let description = if text.chars().count() > self.description_cap {
            let head: String = text.chars().take(self.description_cap).collect();
            format!("{head}...")
        } else {
            text.to_string()
        };

        Resource {
            name: "Search Results Information".to_string(),
            category: category.label(),
            description,
            contact: "See details for contact information".to_string(),
            url: String::new(),
            location: self.synthesized_location.clone(),
            eligibility: "Varies by program".to_string(),
            next_step: format!("Review details for {topic} assistance"),
        }
    }
}

/// Strip bold, headers, bullets and list numbers, and collapse whitespace.
pub(crate) fn strip_markdown(text: &str) -> String {
    let unbolded = BOLD_RE.replace_all(text, "$1");
    let unprefixed = LEADING_MARKUP_RE.replace(&unbolded, "");
    let no_headers = unprefixed.replace('#', "");
    WHITESPACE_RE.replace_all(no_headers.trim(), " ").to_string()
}

/// Value after the label, if the line starts with one of `labels`.
fn labelled<'a>(clean: &'a str, lower: &str, labels: &[&str]) -> Option<&'a str> {
    labels
        .iter()
        .find(|label| lower.starts_with(*label))
        .and_then(|label| clean.get(label.len()..))
        .map(str::trim)
}

fn classify_line(raw: &str) -> Line {
    let clean = strip_markdown(raw);
    let lower = clean.to_lowercase();

    // Field labels first so `**Phone:** ...` is never read as a name.
    if let Some(v) = labelled(&clean, &lower, CONTACT_LABELS) {
        return Line::Contact(v.to_string());
    }
    if let Some(v) = labelled(&clean, &lower, URL_LABELS) {
        return Line::Url(v.to_string());
    }
    if let Some(v) = labelled(&clean, &lower, LOCATION_LABELS) {
        return Line::Location(v.to_string());
    }
    if let Some(v) = labelled(&clean, &lower, ELIGIBILITY_LABELS) {
        return Line::Eligibility(v.to_string());
    }
    if let Some(v) = labelled(&clean, &lower, DESCRIPTION_LABELS) {
        return Line::Description(v.to_string());
    }

    if let Some(v) = labelled(&clean, &lower, NAME_LABELS) {
        if !v.is_empty() {
            return Line::Name(v.to_string());
        }
    }

    if let Some(caps) = LEADING_BOLD_RE.captures(raw) {
        let bold = caps[1].trim().trim_end_matches(':').trim();
        if !bold.is_empty() {
            return Line::Name(strip_markdown(bold));
        }
    }

    let upper = clean.to_uppercase();
    if KNOWN_ORGANIZATIONS.iter().any(|org| upper.contains(org)) {
        return Line::Name(clean);
    }

    if raw.starts_with('#') && !clean.is_empty() {
        return Line::Name(clean);
    }

    Line::Other(clean)
}

fn first_url(text: &str) -> Option<String> {
    URL_RE.find(text).map(|m| {
        m.as_str()
            .trim_end_matches(['.', ',', ')', ';', ':', '*'])
            .to_string()
    })
}

fn apply_line(draft: &mut Draft, raw: &str, line: Line) {
    match line {
        Line::Contact(value) => {
            draft.contact = PHONE_RE
                .find(&value)
                .map(|m| m.as_str().to_string())
                .unwrap_or(value);
        }
        Line::Url(value) => {
            if let Some(url) = first_url(&value).or_else(|| first_url(raw)) {
                draft.url = url;
            }
        }
        Line::Location(value) => draft.location = value,
        Line::Eligibility(value) => draft.eligibility = value,
        Line::Description(value) => {
            if !value.is_empty() {
                draft.description.push(value);
            }
        }
        Line::Other(clean) => {
            if draft.contact.is_empty()
                && let Some(m) = PHONE_RE.find(raw)
            {
                draft.contact = m.as_str().to_string();
            }
            if draft.url.is_empty()
                && let Some(url) = first_url(raw)
            {
                draft.url = url;
            }
            let lower = clean.to_lowercase();
            if clean != draft.name && SERVICE_WORDS.iter().any(|w| lower.contains(w)) {
                draft.description.push(clean);
            }
        }
        Line::Name(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ResourceParser {
        ResourceParser::new(6, 300, "Central Illinois area", "Central Illinois")
    }

    // ── Name markers ────────────────────────────────────────────────

    #[test]
    fn bold_line_starts_record() {
        assert_eq!(
            classify_line("**Peoria Housing Authority**"),
            Line::Name("Peoria Housing Authority".into())
        );
        assert_eq!(
            classify_line("1. **Goodwill Workforce** - job help"),
            Line::Name("Goodwill Workforce".into())
        );
    }

    #[test]
    fn header_line_starts_record() {
        assert_eq!(
            classify_line("## Tri-County Legal Aid"),
            Line::Name("Tri-County Legal Aid".into())
        );
    }

    #[test]
    fn name_labels_start_record() {
        assert_eq!(
            classify_line("PRIMARY RESOURCE: CityLink Paratransit"),
            Line::Name("CityLink Paratransit".into())
        );
        assert_eq!(
            classify_line("Organization: Peoria Area Food Bank"),
            Line::Name("Peoria Area Food Bank".into())
        );
    }

    #[test]
    fn known_organization_starts_record() {
        assert!(matches!(
            classify_line("Illinois Central College adult education"),
            Line::Name(_)
        ));
    }

    #[test]
    fn bold_field_label_is_not_a_name() {
        assert_eq!(
            classify_line("- **Phone:** (309) 555-0100"),
            Line::Contact("(309) 555-0100".into())
        );
    }

    // ── Field extraction ────────────────────────────────────────────

    #[test]
    fn extracts_phone_url_and_labels() {
        let text = "**Peoria Housing Authority**\n\
                    Description: Public housing and vouchers\n\
                    Phone: (309) 673-8629\n\
                    Website: https://www.pha-il.com.\n\
                    Address: 100 S Richard Pryor Place, Peoria, IL\n\
                    Eligibility: Income limits apply";
        let resources = parser().parse(text, NeedCategory::Housing);
        assert_eq!(resources.len(), 1);
        let r = &resources[0];
        assert_eq!(r.name, "Peoria Housing Authority");
        assert_eq!(r.contact, "(309) 673-8629");
        assert_eq!(r.url, "https://www.pha-il.com");
        assert_eq!(r.location, "100 S Richard Pryor Place, Peoria, IL");
        assert_eq!(r.eligibility, "Income limits apply");
        assert_eq!(r.description, "Public housing and vouchers");
        assert_eq!(r.category, "Housing");
    }

    #[test]
    fn unlabelled_phone_and_url_are_picked_up() {
        let text = "**CityLink**\nCall 309-676-4040 or visit https://ridecitylink.org for routes";
        let r = &parser().parse(text, NeedCategory::Transportation)[0];
        assert_eq!(r.contact, "309-676-4040");
        assert_eq!(r.url, "https://ridecitylink.org");
    }

    #[test]
    fn description_accumulates_service_lines() {
        let text = "**Goodwill**\n- Offers job **training** programs\nOpen weekdays\nResume help available";
        let r = &parser().parse(text, NeedCategory::Employment)[0];
        assert_eq!(r.description, "Offers job training programs Resume help available");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let r = &parser().parse("**Senior Center**", NeedCategory::ElderlyServices)[0];
        assert_eq!(r.location, "Central Illinois area");
        assert_eq!(r.eligibility, "Contact for eligibility requirements");
        assert_eq!(r.description, "Local elderly services resource");
        assert_eq!(r.next_step, "Contact for elderly services assistance");
        assert_eq!(r.category, "Elderly Services");
        assert!(r.contact.is_empty());
    }

    #[test]
    fn lines_before_first_name_are_ignored() {
        let text = "Search summary (309) 555-1234\n**Food Bank**\nDescription: groceries";
        let r = &parser().parse(text, NeedCategory::Food)[0];
        assert!(r.contact.is_empty());
    }

    #[test]
    fn caps_record_count() {
        let text = (0..10)
            .map(|i| format!("**Org {i}**"))
            .collect::<Vec<_>>()
            .join("\n");
        let resources = parser().parse(&text, NeedCategory::General);
        assert_eq!(resources.len(), 6);
        assert_eq!(resources[5].name, "Org 5");
    }

    // ── Synthesized record ──────────────────────────────────────────

    #[test]
    fn unparseable_text_is_kept_truncated() {
        let text = "x".repeat(500);
        let resources = parser().parse(&text, NeedCategory::Legal);
        assert_eq!(resources.len(), 1);
        let r = &resources[0];
        assert_eq!(r.name, "Search Results Information");
        assert_eq!(r.description.chars().count(), 303);
        assert!(r.description.ends_with("..."));
        assert_eq!(r.next_step, "Review details for legal assistance");
        assert_eq!(r.eligibility, "Varies by program");
    }

    #[test]
    fn short_unparseable_text_is_not_truncated() {
        let r = &parser().parse("some plain text", NeedCategory::Food)[0];
        assert_eq!(r.description, "some plain text");
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(parser().parse("  \n ", NeedCategory::Food).is_empty());
    }

    #[test]
    fn strip_markdown_removes_markup() {
        assert_eq!(strip_markdown("## **Bold** header"), "Bold header");
        assert_eq!(strip_markdown("- item   with  spaces"), "item with spaces");
        assert_eq!(strip_markdown("2. numbered"), "numbered");
    }
}
