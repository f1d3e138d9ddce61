//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HunterConfig {
    /// Search URLs to crawl each run
    #[serde(default)]
    pub urls: Vec<String>,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Per-user offer filter thresholds
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Proxy rotation settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl HunterConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Configured search URLs.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Whether fetches should go through rotating proxies.
    pub fn uses_proxy(&self) -> bool {
        self.proxy.enabled
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agents.is_empty() {
            return Err(AppError::config("crawler.user_agents is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::config("crawler.max_concurrent must be > 0"));
        }
        if self.proxy.enabled && self.proxy.max_rounds == 0 {
            return Err(AppError::config(
                "proxy.max_rounds must be > 0 when proxy mode is enabled",
            ));
        }
        if self.proxy.enabled && self.proxy.timeout_ms == 0 {
            return Err(AppError::config(
                "proxy.timeout_ms must be > 0 when proxy mode is enabled",
            ));
        }
        self.filters.validate()?;
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent pool for identity rotation
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent crawler/URL fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Offer filter thresholds. All bounds are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FiltersConfig {
    #[serde(default)]
    pub max_price: Option<f64>,

    #[serde(default)]
    pub min_price: Option<f64>,

    #[serde(default)]
    pub max_size: Option<f64>,

    #[serde(default)]
    pub min_size: Option<f64>,

    #[serde(default)]
    pub max_rooms: Option<f64>,

    #[serde(default)]
    pub min_rooms: Option<f64>,

    /// Offers whose title contains one of these words are dropped
    #[serde(default)]
    pub excluded_titles: Vec<String>,
}

impl FiltersConfig {
    fn validate(&self) -> Result<()> {
        let pairs = [
            ("price", self.min_price, self.max_price),
            ("size", self.min_size, self.max_size),
            ("rooms", self.min_rooms, self.max_rooms),
        ];
        for (name, min, max) in pairs {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(AppError::config(format!(
                        "filters.min_{name} ({min}) exceeds filters.max_{name} ({max})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Proxy rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Route fetches through rotating proxies
    #[serde(default)]
    pub enabled: bool,

    /// Page to scrape fresh proxy candidates from
    #[serde(default = "defaults::proxy_list_url")]
    pub list_url: String,

    /// Fixed proxy URLs; when non-empty these are used instead of
    /// scraping `list_url`
    #[serde(default)]
    pub static_list: Vec<String>,

    /// How many times to refresh an exhausted candidate list before giving up
    #[serde(default = "defaults::proxy_rounds")]
    pub max_rounds: usize,

    /// Per-proxy connect/read timeout, tuned to fail fast on dead proxies
    #[serde(default = "defaults::proxy_timeout")]
    pub timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            list_url: defaults::proxy_list_url(),
            static_list: Vec::new(),
            max_rounds: defaults::proxy_rounds(),
            timeout_ms: defaults::proxy_timeout(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Message template, expanded per offer (see `Offer::format`)
    #[serde(default = "defaults::message")]
    pub message: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            message: defaults::message(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the offer history and run marker
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".into(),
        ]
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        5
    }

    // Proxy defaults
    pub fn proxy_list_url() -> String {
        "https://free-proxy-list.net/".into()
    }
    pub fn proxy_rounds() -> usize {
        3
    }
    pub fn proxy_timeout() -> u64 {
        2000
    }

    // Notification defaults
    pub fn message() -> String {
        "{title}\n{price} | {size} | {rooms} rooms\n{url}".into()
    }

    // Storage defaults
    pub fn data_dir() -> String {
        "data".into()
    }
}
