use crate::harvest::RetryPolicy;
use crate::plan::{DateRange, Granularity};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for channel-harvest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub harvest: HarvestConfig,
    pub index: IndexConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub sink: SinkConfig,
}

/// Which remote index a run harvests from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HarvestMethod {
    /// Common Crawl index API, one task per snapshot and pattern
    CcIndex,
    /// Wayback CDX API, one task per date window and pattern
    Wayback,
}

impl HarvestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CcIndex => "cc-index",
            Self::Wayback => "wayback",
        }
    }

    /// Patterns used when the configuration lists none
    pub fn default_patterns(&self) -> Vec<String> {
        let patterns: &[&str] = match self {
            Self::CcIndex => &[
                "*.youtube.com/@*",
                "*.youtube.com/c/*",
                "*.youtube.com/channel/*",
                "*.youtube.com/user/*",
                "*.youtube.com/+*",
            ],
            Self::Wayback => &[
                "youtube.com/@",
                "youtube.com/c/",
                "youtube.com/channel/",
                "youtube.com/user/",
                "youtube.com/+",
                "youtube.com/browse/",
            ],
        };
        patterns.iter().map(|p| p.to_string()).collect()
    }
}

impl fmt::Display for HarvestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HarvestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cc-index" | "cc" | "commoncrawl" => Ok(Self::CcIndex),
            "wayback" | "cdx" => Ok(Self::Wayback),
            other => Err(format!(
                "unknown harvest method '{}' (expected 'cc-index' or 'wayback')",
                other
            )),
        }
    }
}

/// What to harvest and how work is sized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Index to query
    pub method: HarvestMethod,

    /// Calendar year whose snapshots are harvested (cc-index)
    pub year: Option<i32>,

    /// First day of the harvested span (wayback); defaults to 2018-01-01
    pub start_date: Option<NaiveDate>,

    /// Last day of the harvested span (wayback); defaults to today
    pub end_date: Option<NaiveDate>,

    /// How the span is cut into windows (wayback)
    pub granularity: Granularity,

    /// Entities per sink insert
    pub batch_size: usize,

    /// Rows requested per page (wayback `limit`)
    pub page_size: u32,

    /// Upper bound on pages requested per task
    pub max_pages: u32,

    /// Bisect failed date windows instead of skipping them
    pub split_on_failure: bool,

    /// URL patterns; empty means the method's defaults
    pub patterns: Vec<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            method: HarvestMethod::Wayback,
            year: None,
            start_date: None,
            end_date: None,
            granularity: Granularity::Month,
            batch_size: 500,
            page_size: 5000,
            max_pages: 10_000,
            split_on_failure: true,
            patterns: Vec::new(),
        }
    }
}

impl HarvestConfig {
    /// First day harvested when no start date is configured
    pub const DEFAULT_START: (i32, u32, u32) = (2018, 1, 1);

    /// Configured patterns, or the method's defaults when none are given
    pub fn effective_patterns(&self) -> Vec<String> {
        if self.patterns.is_empty() {
            self.method.default_patterns()
        } else {
            self.patterns.clone()
        }
    }

    /// The requested date span, with defaults filled in
    ///
    /// Returns None when the start lies after the end.
    pub fn date_range(&self, today: NaiveDate) -> Option<DateRange> {
        let (y, m, d) = Self::DEFAULT_START;
        let start = self
            .start_date
            .or_else(|| NaiveDate::from_ymd_opt(y, m, d))
            .unwrap_or(today);
        let end = self.end_date.unwrap_or(today);
        DateRange::new(start, end)
    }

    /// [`HarvestConfig::date_range`] relative to the current UTC date
    pub fn date_range_until_today(&self) -> Option<DateRange> {
        self.date_range(Utc::now().date_naive())
    }
}

/// Remote index endpoints and request behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Base URL of the Common Crawl index server
    pub cc_index_url: String,

    /// Location of the Common Crawl snapshot listing
    pub collinfo_url: String,

    /// Local cache of the snapshot listing; read if present, written if not
    pub collinfo_path: Option<String>,

    /// Wayback CDX search endpoint
    pub cdx_url: String,

    /// CDX `matchType` applied to every pattern
    pub cdx_match_type: String,

    /// Attempts per page, including the first
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_backoff_ms: u64,

    /// Cap on any single retry delay (milliseconds)
    pub max_backoff_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cc_index_url: "https://index.commoncrawl.org".to_string(),
            collinfo_url: "https://index.commoncrawl.org/collinfo.json".to_string(),
            collinfo_path: None,
            cdx_url: "https://web.archive.org/cdx/search/cdx".to_string(),
            cdx_match_type: "prefix".to_string(),
            max_attempts: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            request_timeout_secs: 60,
        }
    }
}

impl IndexConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the harvester
    pub crawler_name: String,

    /// Version of the harvester
    pub crawler_version: String,

    /// URL with information about the harvester
    pub contact_url: String,

    /// Email address for harvester-related contact
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "channel-harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/channel-harvest".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header: `Name/Version (+URL; Email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SinkConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            database_path: "./channels.db".to_string(),
        }
    }
}
