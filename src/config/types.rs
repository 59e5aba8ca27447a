use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Forum-Sieve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,

    /// Section name -> URL template (relative to the base URL or absolute)
    pub sections: BTreeMap<String, String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,

    #[serde(default, rename = "user-agents")]
    pub user_agents: UserAgentConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub insights: InsightsConfig,

    #[serde(default)]
    pub privacy: PrivacyConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Target site description
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Base URL of the forum, e.g. "https://forum.example.com"
    pub base_url: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Markers that show up only once logged in
    #[serde(default = "default_login_success_indicators")]
    pub login_success_indicators: Vec<String>,

    /// Markers of a login prompt served in place of the requested page
    #[serde(default = "default_login_prompt_signatures")]
    pub login_prompt_signatures: Vec<String>,

    /// Markers of an explicit block or ban page
    #[serde(default = "default_block_signatures")]
    pub block_signatures: Vec<String>,

    /// Markers of an account lockout after login
    #[serde(default = "default_lockout_signatures")]
    pub lockout_signatures: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of pages fetched per section
    pub max_pages: u32,

    /// How many times a page whose fetch failed transiently is re-requested
    pub page_retries: u32,

    /// Full page size; a page with fewer posts is treated as the last one
    pub page_size: Option<usize>,

    /// Attempts per request before a transient failure becomes `FetchFailed`
    pub max_retries: u32,

    /// Base delay before the first retry (milliseconds)
    pub retry_delay_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    pub max_retry_delay_ms: u64,

    pub request_timeout_secs: u64,

    /// Attempts for the login handshake on transient failures
    pub login_attempts: u32,

    /// Age after which a session is considered stale (seconds)
    pub session_timeout_secs: u64,

    pub respect_robots_txt: bool,

    /// Agent token matched against robots.txt groups
    pub policy_agent: String,

    /// Wall-clock limit for one run (seconds)
    pub max_run_time_secs: Option<u64>,

    /// Crawl sections concurrently, one session and rate limiter per section
    pub parallel_sections: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            page_retries: 2,
            page_size: None,
            max_retries: 3,
            retry_delay_ms: 5000,
            max_retry_delay_ms: 60_000,
            request_timeout_secs: 30,
            login_attempts: 3,
            session_timeout_secs: 3600,
            respect_robots_txt: true,
            policy_agent: "forum-sieve".to_string(),
            max_run_time_secs: None,
            parallel_sections: false,
        }
    }
}

/// Request pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    /// Minimum spacing between requests (milliseconds); 0 disables pacing
    pub interval_ms: u64,

    /// Maximum random extra delay added to each spacing (milliseconds)
    pub jitter_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1500,
            jitter_ms: 500,
        }
    }
}

/// User agent rotation pool
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    pub pool: Vec<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            pool: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

/// Term lists driving the classifier
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClassifierConfig {
    pub question_markers: Vec<String>,
    pub answer_markers: Vec<String>,
    pub sentiment_terms: Vec<String>,
    pub resource_terms: Vec<String>,
    pub keyword_terms: Vec<String>,

    /// Number of most frequent words added to keywords (0 disables)
    pub auto_keywords: usize,

    pub opportunities: OpportunityTerms,
    pub engagement: EngagementConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            question_markers: terms(&[
                "how to",
                "what is",
                "where can",
                "when should",
                "why does",
                "does anyone",
                "has anyone",
                "anyone know",
                "help",
                "advice",
                "suggestions",
                "recommendations",
            ]),
            answer_markers: terms(&[
                "try this",
                "i suggest",
                "in my experience",
                "you should",
                "i recommend",
                "highly recommend",
                "what worked for me",
                "here's what",
                "we loved",
            ]),
            sentiment_terms: terms(&[
                "worried",
                "scared",
                "excited",
                "frustrated",
                "happy",
                "sad",
                "anxious",
                "grateful",
                "confused",
                "hopeful",
                "loved",
            ]),
            resource_terms: terms(&[
                "book", "website", "article", "doctor", "specialist", "product", "service",
                "app", "tool", "resource",
            ]),
            keyword_terms: Vec::new(),
            auto_keywords: 10,
            opportunities: OpportunityTerms::default(),
            engagement: EngagementConfig::default(),
        }
    }
}

/// Keyword sets for the four opportunity categories; must be pairwise disjoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpportunityTerms {
    pub product: Vec<String>,
    pub service: Vec<String>,
    pub information: Vec<String>,
    pub community: Vec<String>,
}

impl Default for OpportunityTerms {
    fn default() -> Self {
        Self {
            product: terms(&[
                "product",
                "buy",
                "purchase",
                "brand",
                "where to find",
                "review",
                "comparison",
                "price",
                "store",
                "amazon",
            ]),
            service: terms(&[
                "service",
                "recommend",
                "dr.",
                "doctor",
                "professional",
                "expert",
                "consultation",
                "therapy",
                "counseling",
                "specialist",
                "tutor",
            ]),
            information: terms(&[
                "information",
                "learn",
                "understand",
                "explain",
                "guide",
                "tutorial",
                "how to",
                "what is",
                "article",
                "book",
            ]),
            community: terms(&[
                "group",
                "community",
                "meet",
                "connect",
                "share",
                "similar",
                "together",
                "local",
            ]),
        }
    }
}

/// Engagement score policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngagementConfig {
    /// Weight of the reply-to-view ratio component
    pub ratio_weight: f64,

    /// Weight of the absolute activity component
    pub volume_weight: f64,

    /// Replies + views at which the activity component saturates
    pub volume_saturation: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            ratio_weight: 70.0,
            volume_weight: 30.0,
            volume_saturation: 10_000,
        }
    }
}

/// Privacy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PrivacyConfig {
    /// Redact e-mail addresses, phone numbers, mentions and known usernames
    pub redact_contact_info: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            redact_contact_info: true,
        }
    }
}

/// Term tables and limits for the business-insight report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct InsightsConfig {
    /// Terms marking a sentence as a complaint or struggle
    pub pain_terms: Vec<String>,

    /// Service kind -> terms, counted among service posts
    pub service_kinds: BTreeMap<String, Vec<String>>,

    /// Season -> topic terms
    pub seasonal_topics: BTreeMap<String, Vec<String>>,

    /// Questions with at most this many replies count as resource gaps
    pub gap_reply_limit: u64,

    pub top_posts: usize,
    pub top_mentions: usize,
    pub max_pain_points: usize,
    pub max_gaps_per_section: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            pain_terms: terms(&[
                "frustrated",
                "annoyed",
                "difficult",
                "struggle",
                "problem",
                "issue",
                "trouble",
                "worry",
                "worried",
                "stress",
                "desperate",
                "confused",
            ]),
            service_kinds: BTreeMap::from([
                (
                    "medical".to_string(),
                    terms(&["doctor", "specialist", "medical", "health", "pediatrician"]),
                ),
                (
                    "educational".to_string(),
                    terms(&["tutor", "teacher", "education", "class"]),
                ),
                (
                    "counseling".to_string(),
                    terms(&["counseling", "counselor", "therapy", "therapist"]),
                ),
                (
                    "professional".to_string(),
                    terms(&["consultant", "expert", "professional"]),
                ),
            ]),
            seasonal_topics: BTreeMap::from([
                (
                    "spring".to_string(),
                    terms(&["passover", "pesach", "spring cleaning", "allergy"]),
                ),
                ("summer".to_string(), terms(&["camp", "vacation", "summer", "heat"])),
                (
                    "fall".to_string(),
                    terms(&["school", "rosh hashana", "yom kippur", "sukkos"]),
                ),
                ("winter".to_string(), terms(&["chanukah", "cold", "winter", "flu"])),
            ]),
            gap_reply_limit: 2,
            top_posts: 5,
            top_mentions: 20,
            max_pain_points: 20,
            max_gaps_per_section: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Directory for JSON and markdown output
    pub directory: String,

    /// Engagement score above which a post counts as high engagement
    pub high_engagement_threshold: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "scraped_data".to_string(),
            high_engagement_threshold: 50.0,
        }
    }
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_logout_path() -> String {
    "/logout".to_string()
}

fn default_login_success_indicators() -> Vec<String> {
    terms(&["logout", "dashboard", "my-account", "user-menu", "member-area"])
}

fn default_login_prompt_signatures() -> Vec<String> {
    terms(&[
        "please log in",
        "you must be logged in",
        "login required",
        "id=\"login-form\"",
    ])
}

fn default_block_signatures() -> Vec<String> {
    terms(&[
        "you have been banned",
        "access denied",
        "your ip has been blocked",
    ])
}

fn default_lockout_signatures() -> Vec<String> {
    terms(&[
        "account locked",
        "account has been locked",
        "too many login attempts",
        "temporarily locked",
    ])
}
