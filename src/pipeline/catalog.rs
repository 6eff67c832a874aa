//! Curated, hand-verified resource records for the Central Illinois region.
//!
//! Two tables:
//! - supplements, appended after parsed search results for high-stakes categories
//! - fallbacks, used alone when live search is unavailable or fails
//!
//! Both are read-only process-wide constants.

use crate::pipeline::types::{NeedCategory, Resource, UrgencyLevel};

/// A static catalog row. Converted to an owned `Resource` on use.
struct CatalogEntry {
    name: &'static str,
    category: &'static str,
    description: &'static str,
    contact: &'static str,
    url: &'static str,
    location: &'static str,
    eligibility: &'static str,
    next_step: &'static str,
}

impl CatalogEntry {
    fn to_resource(&self) -> Resource {
        Resource {
            name: self.name.to_string(),
            category: self.category.to_string(),
            description: self.description.to_string(),
            contact: self.contact.to_string(),
            url: self.url.to_string(),
            location: self.location.to_string(),
            eligibility: self.eligibility.to_string(),
            next_step: self.next_step.to_string(),
        }
    }
}

fn resources(entries: &[CatalogEntry]) -> Vec<Resource> {
    entries.iter().map(CatalogEntry::to_resource).collect()
}

// ── Housing ─────────────────────────────────────────────────────────

static HOUSING_EMERGENCY: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Peoria Rescue Ministries Emergency Shelter",
        category: "Emergency Shelter",
        description: "Emergency shelter services for individuals and families experiencing homelessness",
        contact: "(309) 676-6416",
        url: "tel:309-676-6416",
        location: "600 NE Adams Street, Peoria, IL",
        eligibility: "Emergency situations, immediate need",
        next_step: "Call immediately for emergency shelter availability",
    },
    CatalogEntry {
        name: "Salvation Army Emergency Assistance",
        category: "Emergency Housing Aid",
        description: "Emergency rental assistance, utility help, and shelter referrals",
        contact: "(309) 671-1621",
        url: "https://www.salvationarmyusa.org/usa-central-territory/",
        location: "720 W McClure Avenue, Peoria, IL",
        eligibility: "Financial crisis, immediate need",
        next_step: "Call for emergency assistance appointment",
    },
];

static HOUSING_STANDARD: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Heart of Illinois Habitat for Humanity",
        category: "Affordable Housing",
        description: "Builds and repairs affordable homes for qualifying families in Central Illinois",
        contact: "(309) 637-4828",
        url: "tel:309-637-4828",
        location: "2600 N University Street, Peoria, IL",
        eligibility: "30-80% Area Median Income, must meet homeownership criteria",
        next_step: "Call to discuss income requirements and application process",
    },
    CatalogEntry {
        name: "Peoria Housing Authority",
        category: "Public Housing",
        description: "Public housing, Housing Choice Vouchers (Section 8), and affordable housing programs",
        contact: "(309) 673-8629",
        url: "https://www.pha-il.com",
        location: "100 S Richard Pryor Place, Peoria, IL",
        eligibility: "Income limits based on family size, background check required",
        next_step: "Call to check waiting list status and application process",
    },
    CatalogEntry {
        name: "211 Central Illinois Housing Resources",
        category: "Housing Directory",
        description: "Comprehensive directory of housing assistance, rental aid, and emergency shelter programs",
        contact: "Dial 2-1-1",
        url: "tel:211",
        location: "Central Illinois",
        eligibility: "Available to all residents",
        next_step: "Call 211 and say 'I need housing assistance' for personalized help",
    },
    CatalogEntry {
        name: "Center for Prevention of Abuse Housing Program",
        category: "Transitional Housing",
        description: "Safe transitional housing and support services for domestic violence survivors",
        contact: "(309) 691-0551",
        url: "https://centerforpreventionofabuse.org",
        location: "Peoria area (confidential locations)",
        eligibility: "Domestic violence survivors, families with children prioritized",
        next_step: "Call confidential hotline for housing assistance",
    },
];

// ── Family services ─────────────────────────────────────────────────

static FAMILY_SERVICES: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Illinois DCFS Child Abuse Hotline",
        category: "Emergency Child Protection",
        description: "24/7 hotline for reporting child abuse and neglect. Emergency protective services and crisis intervention.",
        contact: "1-800-252-2873",
        url: "https://dcfs.illinois.gov",
        location: "Statewide - serves Central Illinois",
        eligibility: "Available to anyone with concerns about child safety",
        next_step: "Call immediately if child is in danger or to report suspected abuse",
    },
    CatalogEntry {
        name: "Center for Prevention of Abuse",
        category: "Crisis Support",
        description: "Comprehensive services for families affected by domestic violence and child abuse, including emergency shelter and counseling.",
        contact: "(309) 691-0551",
        url: "https://centerforpreventionofabuse.org",
        location: "Multiple locations in Central Illinois",
        eligibility: "Families experiencing or at risk of violence/abuse",
        next_step: "Call 24/7 crisis hotline for immediate support and safety planning",
    },
    CatalogEntry {
        name: "OSF Children's Hospital Child Advocacy Center",
        category: "Medical & Legal Support",
        description: "Specialized medical evaluations, forensic interviews, and advocacy services for children who have experienced abuse.",
        contact: "(309) 655-2000",
        url: "https://www.osfhealthcare.org/childrens",
        location: "530 NE Glen Oak Ave, Peoria, IL",
        eligibility: "Children and families needing medical evaluation or advocacy",
        next_step: "Contact emergency department or call for child advocacy services",
    },
    CatalogEntry {
        name: "Heart of Illinois United Way Family Support",
        category: "Family Services",
        description: "Family counseling, parenting support, and connection to child safety resources in Central Illinois.",
        contact: "(309) 674-1010",
        url: "https://uwheart.org",
        location: "331 Fulton Street, Peoria, IL",
        eligibility: "Families in Central Illinois",
        next_step: "Call for family support services and counseling referrals",
    },
];

// ── Food ────────────────────────────────────────────────────────────

static FOOD: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Heart of Illinois United Way Food Pantries",
        category: "Food Pantry",
        description: "Network of food pantries throughout Peoria County providing groceries and emergency food",
        contact: "(309) 674-1010",
        url: "https://www.uwheart.org/find-help",
        location: "Multiple locations in Peoria County",
        eligibility: "Income verification, most pantries serve all residents",
        next_step: "Call to find nearest pantry location and hours",
    },
    CatalogEntry {
        name: "Salvation Army Food Services",
        category: "Food Assistance",
        description: "Hot meals, food pantry, and emergency food assistance",
        contact: "(309) 671-1621",
        // Denylisted; the sanitizer rewrites it to the phone number.
        url: "https://salvationarmyheartland.org",
        location: "720 W McClure Avenue, Peoria, IL",
        eligibility: "Open to all, no income requirements for meals",
        next_step: "Call for meal times and pantry hours",
    },
    CatalogEntry {
        name: "211 Central Illinois Food Resources",
        category: "Food Directory",
        description: "Complete directory of food pantries, SNAP assistance, and meal programs in Central Illinois",
        contact: "Dial 2-1-1",
        url: "tel:211",
        location: "Central Illinois",
        eligibility: "Available to all residents",
        next_step: "Call 211 and ask for food assistance near your location",
    },
];

// ── Employment ──────────────────────────────────────────────────────

static EMPLOYMENT: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Small Business Development Center - Bradley University",
        category: "Business Development",
        description: "Free business consulting, startup guidance, business planning, and market research for entrepreneurs and small businesses",
        contact: "(309) 677-2992",
        url: "https://www.bradley.edu/sbdc",
        location: "1501 W Bradley Ave, Peoria, IL",
        eligibility: "Open to all entrepreneurs and small business owners",
        next_step: "Call to schedule a free consultation with a business advisor",
    },
    CatalogEntry {
        name: "SCORE Mentors Central Illinois",
        category: "Business Mentorship",
        description: "Free mentoring and workshops from experienced business professionals. Specializes in restaurant, retail, and service businesses",
        contact: "(309) 676-0755",
        url: "https://www.score.org/landoflincoln",
        location: "Peoria area meetings and online",
        eligibility: "Free for all entrepreneurs and business owners",
        next_step: "Request a free mentor match online or attend a workshop",
    },
    CatalogEntry {
        name: "Greater Peoria Economic Development Council",
        category: "Business Resources",
        description: "Local business support, networking, and economic development resources for Central Illinois businesses",
        contact: "(309) 495-5910",
        url: "tel:309-495-5910",
        location: "100 SW Water Street, Peoria, IL",
        eligibility: "Businesses located in or moving to Greater Peoria area",
        next_step: "Contact for business development resources and local connections",
    },
    CatalogEntry {
        name: "Illinois Small Business Development Center Network",
        category: "Statewide Business Support",
        description: "Comprehensive business development services, funding assistance, and startup resources across Illinois",
        contact: "(217) 524-5856",
        url: "https://sbdc.siu.edu",
        location: "Statewide network with Peoria representation",
        eligibility: "Illinois-based businesses and entrepreneurs",
        next_step: "Find your local center and schedule consulting services",
    },
];

// ── Public API ──────────────────────────────────────────────────────

/// Curated records appended after parsed search results.
///
/// High-urgency housing gets emergency shelters first. Categories without a
/// curated list get a single information-line record.
pub fn supplement(category: NeedCategory, urgency: UrgencyLevel) -> Vec<Resource> {
    match category {
        NeedCategory::Housing => {
            let mut out = Vec::new();
            if urgency == UrgencyLevel::High {
                out.extend(resources(HOUSING_EMERGENCY));
            }
            out.extend(resources(HOUSING_STANDARD));
            out
        }
        NeedCategory::FamilyServices => resources(FAMILY_SERVICES),
        NeedCategory::Food => resources(FOOD),
        NeedCategory::Employment => resources(EMPLOYMENT),
        other => vec![info_line_supplement(other)],
    }
}

/// Single-record table used when search is unavailable. Never empty.
pub fn fallback(category: NeedCategory) -> Vec<Resource> {
    let (description, next_step) = match category {
        NeedCategory::Food => (
            "Comprehensive directory of food pantries, SNAP assistance, and meal programs",
            "Call 211 for current food assistance options",
        ),
        NeedCategory::Housing => (
            "Housing assistance, rental aid, and emergency shelter information",
            "Call 211 for housing assistance options",
        ),
        _ => (
            "Comprehensive information about local health and human services",
            "Call 211 for assistance with your specific need",
        ),
    };

    vec![Resource {
        name: "211 Central Illinois".to_string(),
        category: "General Resources".to_string(),
        description: description.to_string(),
        contact: "Dial 2-1-1".to_string(),
        url: "tel:211".to_string(),
        location: "Central Illinois".to_string(),
        eligibility: "Available to all residents".to_string(),
        next_step: next_step.to_string(),
    }]
}

fn info_line_supplement(category: NeedCategory) -> Resource {
    let topic = category.as_str().replace('_', " ");
    Resource {
        name: "211 Central Illinois".to_string(),
        category: category.label(),
        description: format!("Comprehensive directory of {topic} resources in Central Illinois"),
        contact: "Dial 2-1-1".to_string(),
        url: "tel:211".to_string(),
        location: "Central Illinois".to_string(),
        eligibility: "Available to all residents".to_string(),
        next_step: format!("Call 211 and ask about {topic} assistance"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_urgency_housing_puts_shelters_first() {
        let list = supplement(NeedCategory::Housing, UrgencyLevel::High);
        assert_eq!(list.len(), 6);
        assert_eq!(list[0].name, "Peoria Rescue Ministries Emergency Shelter");
        assert_eq!(list[1].name, "Salvation Army Emergency Assistance");
        assert_eq!(list[2].name, "Heart of Illinois Habitat for Humanity");
    }

    #[test]
    fn medium_urgency_housing_has_no_shelters() {
        let list = supplement(NeedCategory::Housing, UrgencyLevel::Medium);
        assert_eq!(list.len(), 4);
        assert!(list.iter().all(|r| r.category != "Emergency Shelter"));
    }

    #[test]
    fn curated_categories_have_lists() {
        assert_eq!(supplement(NeedCategory::FamilyServices, UrgencyLevel::Medium).len(), 4);
        assert_eq!(supplement(NeedCategory::Food, UrgencyLevel::Low).len(), 3);
        assert_eq!(supplement(NeedCategory::Employment, UrgencyLevel::Medium).len(), 4);
    }

    #[test]
    fn other_categories_get_info_line_record() {
        let list = supplement(NeedCategory::ElderlyServices, UrgencyLevel::Medium);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].url, "tel:211");
        assert_eq!(list[0].category, "Elderly Services");
        assert!(list[0].description.contains("elderly services"));
    }

    #[test]
    fn fallback_is_never_empty() {
        for category in NeedCategory::ALL {
            let list = fallback(category);
            assert_eq!(list.len(), 1, "{category}");
            assert_eq!(list[0].url, "tel:211");
        }
    }

    #[test]
    fn fallback_descriptions_are_category_specific() {
        assert!(fallback(NeedCategory::Food)[0].description.contains("food pantries"));
        assert!(fallback(NeedCategory::Housing)[0].description.contains("Housing"));
        assert!(fallback(NeedCategory::Legal)[0].description.contains("human services"));
    }
}
