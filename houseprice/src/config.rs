//! Configuration types for fetching, retrying and running pipelines.
//!
//! Every section deserializes with defaults, so a config file only needs the
//! keys it wants to change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::errors::{HousePriceError, Result};
use crate::fetch::RetryPolicy;

/// Environment variable holding the geocoding API key.
pub const ENV_GEOCODE_AK: &str = "HOUSEPRICE_GEOCODE_AK";
/// Environment variable overriding the concurrency limit.
pub const ENV_CONCURRENCY: &str = "HOUSEPRICE_CONCURRENCY";
/// Environment variable overriding the retry attempt budget.
pub const ENV_MAX_ATTEMPTS: &str = "HOUSEPRICE_MAX_ATTEMPTS";

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Additional headers to include on every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/75.0.3770.100 YaBrowser/19.7.0.1635 Yowser/2.5 Safari/537.36"
        .to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

/// Settings for the bounded task runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of pipelines in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Delay slept before each request to a rate-limit sensitive site.
    #[serde(default = "default_politeness_ms")]
    pub politeness_delay_ms: u64,
    /// Grace period after the session is released at shutdown.
    #[serde(default = "default_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_concurrency() -> usize {
    5
}

fn default_politeness_ms() -> u64 {
    1000
}

fn default_grace_ms() -> u64 {
    3000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            politeness_delay_ms: default_politeness_ms(),
            shutdown_grace_ms: default_grace_ms(),
        }
    }
}

impl RunnerConfig {
    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the politeness delay.
    #[must_use]
    pub fn with_politeness_delay_ms(mut self, delay: u64) -> Self {
        self.politeness_delay_ms = delay;
        self
    }

    /// Politeness delay as Duration.
    #[must_use]
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    /// Shutdown grace period as Duration.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Geocoding API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Endpoint URL, without query string.
    #[serde(default = "default_geocode_endpoint")]
    pub endpoint: String,
    /// API key sent as the `ak` parameter.
    #[serde(default)]
    pub api_key: String,
}

fn default_geocode_endpoint() -> String {
    "http://api.map.baidu.com/geocoding/v3/".to_string()
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocode_endpoint(),
            api_key: String::new(),
        }
    }
}

/// Price site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSiteConfig {
    /// Search page URL, without query string.
    #[serde(default = "default_search_url")]
    pub search_url: String,
    /// Name of the keyword query parameter.
    #[serde(default = "default_keyword_param")]
    pub keyword_param: String,
    /// Selector of the first result link on a listing page.
    #[serde(default = "default_detail_link_selector")]
    pub detail_link_selector: String,
    /// Selector of the price element on a detail page.
    #[serde(default = "default_price_selector")]
    pub price_selector: String,
}

fn default_search_url() -> String {
    "https://m.creprice.cn/ha/indexSearch.html".to_string()
}

fn default_keyword_param() -> String {
    "keyword".to_string()
}

fn default_detail_link_selector() -> String {
    ".searchlist a".to_string()
}

fn default_price_selector() -> String {
    ".cont_01 .data .fl span".to_string()
}

impl Default for PriceSiteConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            keyword_param: default_keyword_param(),
            detail_link_selector: default_detail_link_selector(),
            price_selector: default_price_selector(),
        }
    }
}

/// Area crawl settings.
///
/// Both patterns must have exactly two capture groups: `(url, city)` for
/// targets and `(district, price)` for district rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaConfig {
    /// Index page listing the cities.
    #[serde(default)]
    pub seed_url: Option<String>,
    /// Pattern extracting `(relative_url, city)` from the index page.
    #[serde(default)]
    pub target_pattern: String,
    /// Pattern extracting `(district, average_price)` from a city page.
    #[serde(default)]
    pub district_pattern: String,
    /// Prefix joined to each discovered relative URL.
    #[serde(default)]
    pub url_prefix: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Retry policy shared by every facet.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Runner settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Geocoding API.
    #[serde(default)]
    pub geocode: GeocodeConfig,
    /// Price site.
    #[serde(default)]
    pub price_site: PriceSiteConfig,
    /// Area crawl.
    #[serde(default)]
    pub area: AreaConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parses a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ak) = lookup(ENV_GEOCODE_AK) {
            self.geocode.api_key = ak;
        }
        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            self.runner.concurrency = raw.trim().parse().map_err(|_| {
                HousePriceError::config(format!("{ENV_CONCURRENCY} is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            self.retry.max_attempts = raw.trim().parse().map_err(|_| {
                HousePriceError::config(format!("{ENV_MAX_ATTEMPTS} is not a number: {raw}"))
            })?;
        }
        Ok(())
    }

    /// Checks values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.runner.concurrency == 0 {
            return Err(HousePriceError::config("runner.concurrency must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(HousePriceError::config("retry.max_attempts must be at least 1"));
        }
        if self.fetch.timeout_seconds <= 0.0 || !self.fetch.timeout_seconds.is_finite() {
            return Err(HousePriceError::config("fetch.timeout_seconds must be positive"));
        }
        Ok(())
    }
}
