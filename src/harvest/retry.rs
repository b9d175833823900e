//! Retry policy for index page requests
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Network error | Retry, exponential backoff |
//! | HTTP 5xx | Retry, exponential backoff |
//! | HTTP 429 | Retry, wait `Retry-After` if present, else backoff |
//! | Attempts exhausted | Task reported as failed |

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Attempt ceiling and backoff bounds for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Cap on any single delay, including upstream hints
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt
    ///
    /// An upstream hint wins over the internal backoff; both are capped at
    /// `max_backoff`.
    pub fn delay(&self, backoff: Duration, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(backoff).min(self.max_backoff)
    }

    /// Doubles the backoff counter, capped at `max_backoff`
    pub fn next_backoff(&self, backoff: Duration) -> Duration {
        backoff.saturating_mul(2).min(self.max_backoff)
    }
}

/// Reads a `Retry-After` header as either delta-seconds or an HTTP date
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    parse_retry_after(value, Utc::now())
}

fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
