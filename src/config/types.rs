use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Tidemark
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub extract: ExtractConfig,
}

/// Crawl engine tunables
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// First page of the paginated source
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Lower bound of the adaptive inter-request delay (seconds)
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: f64,

    /// Upper bound of the adaptive inter-request delay (seconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: f64,

    /// Delay used before the first request of a fresh crawl (seconds)
    #[serde(rename = "initial-delay", default = "default_initial_delay")]
    pub initial_delay: f64,

    /// Retries allowed per page after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout of the first attempt; grows by 50% per retry (seconds)
    #[serde(rename = "base-timeout", default = "default_base_timeout")]
    pub base_timeout: f64,

    /// Number of newly scraped items between periodic checkpoints
    #[serde(
        rename = "checkpoint-every-n-items",
        default = "default_checkpoint_every"
    )]
    pub checkpoint_every_n_items: u64,
}

impl CrawlConfig {
    /// Creates a crawl configuration with default tunables for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            initial_delay: default_initial_delay(),
            max_retries: default_max_retries(),
            base_timeout: default_base_timeout(),
            checkpoint_every_n_items: default_checkpoint_every(),
        }
    }

    /// Base timeout as a duration; out-of-range values saturate
    pub fn base_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.base_timeout).unwrap_or(Duration::MAX)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Tidemark".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON checkpoint file
    #[serde(rename = "checkpoint-path", default = "default_checkpoint_path")]
    pub checkpoint_path: String,

    /// Optional JSON export of the final items
    #[serde(rename = "json-path", default)]
    pub json_path: Option<String>,

    /// Optional markdown summary
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,

    /// Optional SQLite export of the final items
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
            json_path: None,
            summary_path: None,
            database_path: None,
        }
    }
}

/// CSS selectors driving the HTML item parser
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Selects one element per item on a listing page
    #[serde(rename = "item-selector")]
    pub item_selector: String,

    /// Selects, inside an item, the element carrying the item key
    #[serde(rename = "key-selector")]
    pub key_selector: String,

    /// Attribute of the key element holding the key (usually a link)
    #[serde(rename = "key-attribute", default = "default_key_attribute")]
    pub key_attribute: String,

    /// Selects the link to the next listing page
    #[serde(rename = "next-page-selector", default)]
    pub next_page_selector: Option<String>,

    /// Field name -> selector whose text becomes the field value
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

fn default_min_delay() -> f64 {
    0.5
}

fn default_max_delay() -> f64 {
    10.0
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_timeout() -> f64 {
    10.0
}

fn default_checkpoint_every() -> u64 {
    10
}

fn default_checkpoint_path() -> String {
    "checkpoint.json".to_string()
}

fn default_key_attribute() -> String {
    "href".to_string()
}
