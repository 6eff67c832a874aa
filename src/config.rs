//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

/// Default model for classification and narrative verification.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Default Serper search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://google.serper.dev/search";

/// The service region every referral is scoped to.
#[derive(Debug, Clone)]
pub struct Region {
    /// Human-readable region name used in responses and default locations.
    pub name: String,
    /// Principal city (address checks require it for a confirmed match).
    pub principal_city: String,
    /// Two-letter state abbreviation.
    pub state_abbrev: String,
    /// Full state name.
    pub state_name: String,
    /// Expected telephone area code.
    pub area_code: String,
    /// Three-digit community information line.
    pub info_line: String,
    /// Locale appended to search queries.
    pub search_locale: String,
    /// Other place names inside the region.
    pub secondary_places: Vec<String>,
    /// Location given to parsed resources that state none.
    pub default_location: String,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            name: "Central Illinois".to_string(),
            principal_city: "Peoria".to_string(),
            state_abbrev: "IL".to_string(),
            state_name: "Illinois".to_string(),
            area_code: "309".to_string(),
            info_line: "211".to_string(),
            search_locale: "Peoria Illinois".to_string(),
            secondary_places: [
                "pekin",
                "bartonville",
                "chillicothe",
                "dunlap",
                "elmwood",
                "glasford",
                "hanna city",
                "mapleton",
                "morton",
                "peoria heights",
                "washington",
                "west peoria",
                "east peoria",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_location: "Central Illinois area".to_string(),
        }
    }
}

impl Region {
    /// `tel:` URI for the region's information line.
    pub fn info_line_uri(&self) -> String {
        format!("tel:{}", self.info_line)
    }
}

/// When to ask a clarifying question instead of guessing.
#[derive(Debug, Clone)]
pub struct ClarificationConfig {
    pub enabled: bool,
    /// Housing requests get clarifying questions unless the message contains this word.
    pub housing_unless_keyword: String,
    /// Food requests of at most this many words get clarifying questions.
    pub food_max_words: usize,
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            housing_unless_keyword: "emergency".to_string(),
            food_max_words: 5,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct CivicConfig {
    pub region: Region,
    /// Prior exchanges loaded by the context initializer.
    pub history_limit: usize,
    /// Prior exchanges shown to the classifier.
    pub classifier_history_turns: usize,
    /// Upper bound on search collaborator calls per turn.
    pub max_search_queries: usize,
    /// Upper bound on records taken from the search parser.
    pub max_parsed_resources: usize,
    /// Character cap for the synthesized description when parsing finds nothing.
    pub description_cap: usize,
    /// Run the verification stage at all.
    pub verify_resources: bool,
    /// Ask the language model for a narrative verification report.
    pub narrative_verification: bool,
    pub url_check_timeout: Duration,
    pub llm_timeout: Duration,
    pub search_timeout: Duration,
    pub store_timeout: Duration,
    pub clarification: ClarificationConfig,
}

impl Default for CivicConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            history_limit: 5,
            classifier_history_turns: 3,
            max_search_queries: 2,
            max_parsed_resources: 6,
            description_cap: 300,
            verify_resources: true,
            narrative_verification: true,
            url_check_timeout: Duration::from_secs(10),
            llm_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(15),
            store_timeout: Duration::from_secs(5),
            clarification: ClarificationConfig::default(),
        }
    }
}

impl CivicConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            region: defaults.region,
            history_limit: env_or("CIVIC_HISTORY_LIMIT", defaults.history_limit),
            classifier_history_turns: env_or(
                "CIVIC_CLASSIFIER_HISTORY_TURNS",
                defaults.classifier_history_turns,
            ),
            max_search_queries: env_or("CIVIC_MAX_SEARCH_QUERIES", defaults.max_search_queries)
                .clamp(1, 2),
            max_parsed_resources: env_or(
                "CIVIC_MAX_PARSED_RESOURCES",
                defaults.max_parsed_resources,
            ),
            description_cap: defaults.description_cap,
            verify_resources: env_or("CIVIC_VERIFY_RESOURCES", defaults.verify_resources),
            narrative_verification: env_or(
                "CIVIC_NARRATIVE_VERIFICATION",
                defaults.narrative_verification,
            ),
            url_check_timeout: Duration::from_secs(env_or(
                "CIVIC_URL_CHECK_TIMEOUT_SECS",
                defaults.url_check_timeout.as_secs(),
            )),
            llm_timeout: Duration::from_secs(env_or(
                "CIVIC_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )),
            search_timeout: Duration::from_secs(env_or(
                "CIVIC_SEARCH_TIMEOUT_SECS",
                defaults.search_timeout.as_secs(),
            )),
            store_timeout: Duration::from_secs(env_or(
                "CIVIC_STORE_TIMEOUT_SECS",
                defaults.store_timeout.as_secs(),
            )),
            clarification: ClarificationConfig {
                enabled: env_or("CIVIC_CLARIFY", defaults.clarification.enabled),
                housing_unless_keyword: std::env::var("CIVIC_CLARIFY_HOUSING_UNLESS")
                    .unwrap_or(defaults.clarification.housing_unless_keyword),
                food_max_words: env_or(
                    "CIVIC_CLARIFY_FOOD_MAX_WORDS",
                    defaults.clarification.food_max_words,
                ),
            },
        }
    }
}

/// Language-model settings. `None` from `from_env` disables the collaborator.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Returns `None` if `ANTHROPIC_API_KEY` is not set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_key = non_empty_env("ANTHROPIC_API_KEY")?;
        Some(Self {
            api_key: SecretString::from(api_key),
            model: std::env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: env_or("MODEL_TEMPERATURE", 0.3),
            max_tokens: env_or("MODEL_MAX_TOKENS", 1500),
            timeout,
        })
    }
}

/// Web-search settings. `None` from `from_env` disables live search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: SecretString,
    pub endpoint: String,
    pub results_per_query: u32,
    pub timeout: Duration,
}

impl SearchConfig {
    /// Returns `None` if `SERPER_API_KEY` is not set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_key = non_empty_env("SERPER_API_KEY")?;
        Some(Self {
            api_key: SecretString::from(api_key),
            endpoint: std::env::var("SERPER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_SEARCH_ENDPOINT.to_string()),
            results_per_query: env_or("SERPER_RESULTS_PER_QUERY", 8),
            timeout,
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_or("CIVIC_PORT", 8000),
            db_path: std::env::var("CIVIC_DB_PATH")
                .unwrap_or_else(|_| "./data/civic-assist.db".to_string()),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an env var, keeping `default` when it is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring invalid configuration value");
                default
            }
        },
        Err(_) => default,
    }
}
