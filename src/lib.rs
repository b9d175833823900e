//! Channel-Harvest: an incremental channel-homepage harvester
//!
//! This crate queries historical web indexes (the Common Crawl index API and the
//! Wayback CDX API) for channel homepage captures, canonicalizes every discovered
//! URL to one identity per channel, and appends only never-before-seen identities
//! to a SQLite sink.

pub mod config;
pub mod entity;
pub mod harvest;
pub mod index;
pub mod output;
pub mod plan;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Channel-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Snapshot directory error: {0}")]
    SnapshotDirectory(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Errors raised while turning a request span into query tasks
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("No snapshots found for year {0}")]
    NoSnapshots(i32),

    #[error("The requested span produced no query tasks")]
    EmptyPlan,

    #[error("Resume point window={window} pattern={pattern:?} is not in the planned task sequence")]
    UnknownResumePoint {
        window: String,
        pattern: Option<String>,
    },
}

/// Result type alias for Channel-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use entity::{CanonicalEntity, SourceTag};
pub use crate::url::{canonicalize, Canonicalizer, Rejection};
