//! Storage module for persisting harvest results
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Batched, deduplicated entity inserts
//! - Run tracking and per-task checkpoints for resumption

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteSink;
pub use traits::{BatchResult, RowError, RowErrorKind, Sink, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Initializes or opens a sink database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteSink)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_sink(path: &Path) -> Result<SqliteSink, HarvestError> {
    SqliteSink::new(path)
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub method: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub new_entities: u64,
}

/// The last task a run finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub run_id: i64,
    pub window: String,
    pub pattern: String,
    pub completed_at: String,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// True for runs that stopped before their plan was exhausted
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}
