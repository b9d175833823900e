//! The unit of record written to the sink

use chrono::{DateTime, Utc};
use std::fmt;

/// Which harvesting method produced an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    /// Common Crawl index API, queried per named snapshot
    CommonCrawl,
    /// Wayback Machine CDX API, queried per date window
    Wayback,
}

impl SourceTag {
    /// Converts the tag to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::CommonCrawl => "cc_index",
            Self::Wayback => "wayback",
        }
    }

    /// Parses a tag from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "cc_index" => Some(Self::CommonCrawl),
            "wayback" => Some(Self::Wayback),
            _ => None,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// One canonical channel identity, ready to be appended to the sink
///
/// Only `identity` takes part in deduplication. `discovered_at` is the moment
/// the entity was normalized, not the capture time in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEntity {
    pub identity: String,
    pub source_tag: SourceTag,
    pub discovered_at: DateTime<Utc>,
}

impl CanonicalEntity {
    /// Creates an entity stamped with the current time
    pub fn new(identity: impl Into<String>, source_tag: SourceTag) -> Self {
        Self {
            identity: identity.into(),
            source_tag,
            discovered_at: Utc::now(),
        }
    }
}
