use crate::crawler::TextPattern;
use crate::output::OutputFormat;
use serde::Deserialize;
use std::time::Duration;

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("sumi-harvest/", env!("CARGO_PKG_VERSION"));

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Creates a configuration for the given seed with every other setting defaulted
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_harvest::config::Config;
    ///
    /// let config = Config::new("https://example.com/");
    /// assert_eq!(config.crawler.max_pages, 10);
    /// assert_eq!(config.crawler.workers, 4);
    /// ```
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            crawler: CrawlerConfig::new(seed),
            http: HttpConfig::default(),
            extract: ExtractConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Absolute address the crawl starts from; its origin bounds the crawl
    pub seed: String,

    /// Maximum number of distinct addresses fetched in one crawl
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Number of addresses fetched concurrently per batch
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pause between batches (milliseconds)
    #[serde(rename = "politeness-delay", default = "default_politeness_delay")]
    pub politeness_delay: u64,
}

impl CrawlerConfig {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            max_pages: default_max_pages(),
            workers: default_workers(),
            politeness_delay: default_politeness_delay(),
        }
    }

    /// Returns the politeness delay as a duration
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay)
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Value of the User-Agent header
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// CSS selectors whose first match is stored as ad hoc key/value text
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,

    /// Text patterns mined from each page
    #[serde(default)]
    pub patterns: Vec<TextPattern>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            selectors: default_selectors(),
            patterns: Vec::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the file the records are written to
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Encoding of the output file
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
        }
    }
}

fn default_max_pages() -> usize {
    10
}

fn default_workers() -> usize {
    4
}

fn default_politeness_delay() -> u64 {
    1000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_selectors() -> Vec<String> {
    ["title", "h1", "p"].iter().map(|s| s.to_string()).collect()
}

fn default_output_path() -> String {
    "harvest.json".to_string()
}
