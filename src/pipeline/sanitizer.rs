//! URL sanitizer: removes known-fabricated websites from resource lists.
//!
//! A denylisted URL is replaced by a `tel:` URI derived from the resource's
//! contact string, or by the region's information line. `tel:` URIs never match
//! the denylist, so sanitizing twice changes nothing.

use tracing::warn;

use crate::config::Region;
use crate::pipeline::types::Resource;

/// Domains known to be fabricated by generated text for this region.
pub const DENYLISTED_DOMAINS: &[&str] = &[
    "211centralillinois.org",
    "peoriarescuemission.org",
    "salvationarmyheartland.org",
    "hoihabitat.org",
    "peoria.score.org",
    "greaterpeoriaedc.org",
    "illinoissbdc.org",
];

/// Rewrites denylisted resource URLs.
#[derive(Debug, Clone)]
pub struct UrlSanitizer {
    denylist: Vec<String>,
    info_line: String,
    info_line_uri: String,
}

impl UrlSanitizer {
    pub fn new(region: &Region) -> Self {
        Self {
            denylist: DENYLISTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            info_line: region.info_line.clone(),
            info_line_uri: region.info_line_uri(),
        }
    }

    pub fn is_denylisted(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.denylist.iter().any(|domain| lower.contains(domain.as_str()))
    }

    /// Sanitize a list in place.
    pub fn sanitize_in_place(&self, resources: &mut [Resource]) {
        for resource in resources.iter_mut() {
            if !self.is_denylisted(&resource.url) {
                continue;
            }
            let replacement = self.tel_for(&resource.contact);
            warn!(
                resource = %resource.name,
                from = %resource.url,
                to = %replacement,
                "Replaced denylisted URL"
            );
            resource.url = replacement;
        }
    }

    /// Sanitize a list, returning the cleaned copy.
    pub fn sanitize(&self, mut resources: Vec<Resource>) -> Vec<Resource> {
        self.sanitize_in_place(&mut resources);
        resources
    }

    /// `tel:` URI for a contact string, or the information line.
    fn tel_for(&self, contact: &str) -> String {
        let fallback = self.info_line_uri.clone();
        if !self.is_dialable(contact) {
            return fallback;
        }

        let digits: String = contact.chars().filter(char::is_ascii_digit).collect();
        if digits == self.info_line {
            fallback
        } else if digits.len() == 10 {
            format!("tel:{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..])
        } else if digits.len() >= 7 {
            format!("tel:{digits}")
        } else {
            fallback
        }
    }

    /// Parenthesised area code, a "Dial ..." instruction, or the bare information line.
    fn is_dialable(&self, contact: &str) -> bool {
        let trimmed = contact.trim();
        if trimmed.is_empty() {
            return false;
        }
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        trimmed.contains('(')
            || trimmed.to_lowercase().contains("dial")
            || digits == self.info_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(contact: &str, url: &str) -> Resource {
        Resource {
            name: "Test Org".into(),
            category: "Housing".into(),
            description: "desc".into(),
            contact: contact.into(),
            url: url.into(),
            location: "Peoria, IL".into(),
            eligibility: "All".into(),
            next_step: "Call".into(),
        }
    }

    fn sanitizer() -> UrlSanitizer {
        UrlSanitizer::new(&Region::default())
    }

    #[test]
    fn dial_instruction_maps_to_info_line() {
        let out = sanitizer().sanitize(vec![resource(
            "Dial 2-1-1",
            "https://211centralillinois.org/x",
        )]);
        assert_eq!(out[0].url, "tel:211");
    }

    #[test]
    fn parenthesised_phone_becomes_formatted_tel() {
        let out = sanitizer().sanitize(vec![resource(
            "(309) 555-0100",
            "https://peoriarescuemission.org",
        )]);
        assert_eq!(out[0].url, "tel:309-555-0100");
    }

    #[test]
    fn eleven_digit_dialable_number_keeps_all_digits() {
        let out = sanitizer().sanitize(vec![resource(
            "Dial 1 (800) 252-2873",
            "https://hoihabitat.org",
        )]);
        assert_eq!(out[0].url, "tel:18002522873");
    }

    #[test]
    fn non_dialable_contact_defaults_to_info_line() {
        let out = sanitizer().sanitize(vec![
            resource("309-555-0100", "https://greaterpeoriaedc.org"),
            resource("", "https://illinoissbdc.org/peoria"),
            resource("See website", "https://peoria.score.org"),
        ]);
        assert!(out.iter().all(|r| r.url == "tel:211"));
    }

    #[test]
    fn bare_info_line_contact_is_dialable() {
        let out = sanitizer().sanitize(vec![resource("211", "https://salvationarmyheartland.org")]);
        assert_eq!(out[0].url, "tel:211");
    }

    #[test]
    fn clean_urls_are_untouched() {
        let input = vec![
            resource("(309) 673-8629", "https://www.pha-il.com"),
            resource("Dial 2-1-1", "tel:211"),
            resource("", ""),
        ];
        assert_eq!(sanitizer().sanitize(input.clone()), input);
    }

    #[test]
    fn denylist_match_is_case_insensitive() {
        let out = sanitizer().sanitize(vec![resource("", "https://WWW.HOIHABITAT.ORG")]);
        assert_eq!(out[0].url, "tel:211");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let input: Vec<Resource> = DENYLISTED_DOMAINS
            .iter()
            .zip(["(309) 555-0100", "Dial 2-1-1", "", "211", "call us", "(217) 524-5856", "x"])
            .map(|(domain, contact)| resource(contact, &format!("https://{domain}/page")))
            .chain([resource("(309) 673-8629", "https://www.pha-il.com")])
            .collect();

        let s = sanitizer();
        let once = s.sanitize(input);
        let twice = s.sanitize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn output_never_contains_denylisted_domain() {
        let input: Vec<Resource> = DENYLISTED_DOMAINS
            .iter()
            .flat_map(|domain| {
                [
                    resource("(309) 555-0100", &format!("https://{domain}")),
                    resource("", &format!("http://sub.{domain}/path?q=1")),
                    resource("Dial 2-1-1", &format!("{domain}")),
                ]
            })
            .collect();

        let s = sanitizer();
        for r in s.sanitize(input) {
            assert!(!s.is_denylisted(&r.url), "{}", r.url);
            assert!(r.url.starts_with("tel:"));
        }
    }
}
