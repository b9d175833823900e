//! Storage traits and error types
//!
//! This module defines the trait interface for entity sinks and the
//! associated error types.

use crate::entity::{CanonicalEntity, SourceTag};
use crate::storage::{Checkpoint, RunRecord, RunStatus};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Why a single row of a batch was not inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowErrorKind {
    /// The identity is already stored; the row is a harmless duplicate
    AlreadyPresent,
    /// The sink refused the row for any other reason
    Rejected,
}

/// Per-row failure reported by [`Sink::insert_batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Position of the row within the submitted batch
    pub index: usize,
    pub identity: String,
    pub kind: RowErrorKind,
    pub message: String,
}

/// Result of one batch insert that reached the sink
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Rows actually added to the store
    pub inserted: usize,
    /// Rows that were not added, in batch order
    pub errors: Vec<RowError>,
}

/// Trait for entity sink implementations
///
/// A sink persists canonical entities and the bookkeeping needed to resume
/// a harvest. A batch is submitted in one call and committed atomically;
/// row-level problems are reported in the result instead of failing the
/// whole batch.
pub trait Sink {
    // ===== Entities =====

    /// Loads every identity already present in the store
    fn load_identities(&self) -> StorageResult<HashSet<String>>;

    /// Inserts a batch of entities in a single transaction
    ///
    /// # Returns
    ///
    /// * `Ok(BatchResult)` - The batch was committed; rows that were skipped
    ///   are listed with their reason
    /// * `Err(StorageError)` - Nothing from the batch was committed
    fn insert_batch(&mut self, batch: &[CanonicalEntity]) -> StorageResult<BatchResult>;

    /// Counts all stored entities
    fn count_entities(&self) -> StorageResult<u64>;

    /// Counts stored entities per source index
    fn count_entities_by_source(&self) -> StorageResult<Vec<(SourceTag, u64)>>;

    // ===== Run Management =====

    /// Creates a new harvest run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `method` - Harvest method name (`cc-index` or `wayback`)
    /// * `config_hash` - Hash of the effective configuration
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn begin_run(&mut self, method: &str, config_hash: &str) -> StorageResult<i64>;

    /// Records that the task at (`window`, `pattern`) finished for `run_id`
    fn record_checkpoint(&mut self, run_id: i64, window: &str, pattern: &str) -> StorageResult<()>;

    /// Sets the final status of a run and adds to its new-entity count
    fn finish_run(&mut self, run_id: i64, status: RunStatus, new_entities: u64) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Gets the most recently recorded checkpoint of a run
    fn last_checkpoint(&self, run_id: i64) -> StorageResult<Option<Checkpoint>>;

    /// Gets up to `limit` runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
