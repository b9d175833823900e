//! Query task definitions
//!
//! A `QueryTask` is one unit of work for the index client: a URL pattern
//! evaluated over one window, either a named snapshot or an inclusive date
//! range.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Creates a range, returning None if `from` is after `to`
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// Creates a single-day range
    pub fn day(date: NaiveDate) -> Self {
        Self {
            from: date,
            to: date,
        }
    }

    /// Number of days covered, counting both ends
    pub fn days(&self) -> u64 {
        (self.to - self.from).num_days() as u64 + 1
    }

    /// Splits the range at its midpoint
    ///
    /// The left half takes the ceiling of the span and the right half the
    /// floor, so a 7-day range splits into 4 + 3 days. Returns None for a
    /// single day, which is the minimum granularity.
    pub fn bisect(&self) -> Option<(DateRange, DateRange)> {
        let days = self.days();
        if days <= 1 {
            return None;
        }

        let left_days = days.div_ceil(2);
        let left_to = self.from.checked_add_days(Days::new(left_days - 1))?;
        let right_from = left_to.succ_opt()?;

        Some((
            DateRange {
                from: self.from,
                to: left_to,
            },
            DateRange {
                from: right_from,
                to: self.to,
            },
        ))
    }

    /// Whether `date` falls inside the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// The historical window a task covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Window {
    /// An opaque crawl generation id (e.g. `CC-MAIN-2024-10`)
    Snapshot(String),
    /// A contiguous date range
    Range(DateRange),
}

impl Window {
    /// Stable label used for resume points and checkpoints
    ///
    /// Snapshots are labelled by id, date ranges by their first day.
    pub fn label(&self) -> String {
        match self {
            Self::Snapshot(id) => id.clone(),
            Self::Range(range) => range.from.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot(id) => f.write_str(id),
            Self::Range(range) => range.fmt(f),
        }
    }
}

/// Position of the next page to request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageCursor {
    /// Zero-based integer page number
    Page(u32),
    /// Opaque continuation token handed back by the index
    Token(String),
}

/// One unit of work submitted to the index client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryTask {
    /// URL-matching expression (glob or prefix, depending on the index)
    pub pattern: String,

    /// Snapshot or date range the query is restricted to
    pub window: Window,

    /// Next page to fetch; None before the first request
    pub page_cursor: Option<PageCursor>,
}

impl QueryTask {
    /// Creates a task positioned before its first page
    pub fn new(window: Window, pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            window,
            page_cursor: None,
        }
    }

    /// Copy of this task positioned at `cursor`
    pub fn at(&self, cursor: PageCursor) -> Self {
        Self {
            pattern: self.pattern.clone(),
            window: self.window.clone(),
            page_cursor: Some(cursor),
        }
    }

    /// Span in days for range tasks, None for snapshot tasks
    pub fn span_days(&self) -> Option<u64> {
        match &self.window {
            Window::Range(range) => Some(range.days()),
            Window::Snapshot(_) => None,
        }
    }

    /// Splits a range task into two half-span tasks with the same pattern
    ///
    /// Both halves start from their first page. Snapshot tasks and single-day
    /// tasks cannot be split.
    pub fn bisect(&self) -> Option<(QueryTask, QueryTask)> {
        let Window::Range(range) = &self.window else {
            return None;
        };
        let (left, right) = range.bisect()?;
        Some((
            QueryTask::new(Window::Range(left), self.pattern.clone()),
            QueryTask::new(Window::Range(right), self.pattern.clone()),
        ))
    }
}

impl fmt::Display for QueryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.pattern, self.window)
    }
}

/// How a requested date span is partitioned into windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    /// One window covering the whole span
    Whole,
    /// One window per calendar month, clamped to the span
    Month,
    /// Fixed-size windows of N days; the last one may be shorter
    Days(u32),
}

impl FromStr for Granularity {
    type Err = String;

    /// Parses `whole`, `month`, `day`, or `days:N`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whole" => Ok(Self::Whole),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Days(1)),
            other => {
                let n = other
                    .strip_prefix("days:")
                    .ok_or_else(|| format!("unknown granularity '{}'", s))?;
                let days: u32 = n
                    .parse()
                    .map_err(|_| format!("invalid day count in granularity '{}'", s))?;
                if days == 0 {
                    return Err("window size must be at least one day".to_string());
                }
                Ok(Self::Days(days))
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => f.write_str("whole"),
            Self::Month => f.write_str("month"),
            Self::Days(n) => write!(f, "days:{}", n),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.to_string()
    }
}
