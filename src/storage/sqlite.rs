//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Sink trait.

use crate::entity::{CanonicalEntity, SourceTag};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BatchResult, RowError, RowErrorKind, Sink, StorageError, StorageResult};
use crate::storage::{Checkpoint, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, method, config_hash, status, new_entities";

/// SQLite entity sink
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Creates a new SqliteSink instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            method: row.get(3)?,
            config_hash: row.get(4)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
            new_entities: row.get::<_, i64>(6)? as u64,
        })
    }
}

/// Maps a failed row insert to the reason the batch reports for it
///
/// A primary-key conflict means the identity is already stored. Every other
/// failure (constraint, type, size) is a rejection of the row itself.
fn classify_row_error(error: &rusqlite::Error) -> RowErrorKind {
    match error {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RowErrorKind::AlreadyPresent
        }
        _ => RowErrorKind::Rejected,
    }
}

impl Sink for SqliteSink {
    // ===== Entities =====

    fn load_identities(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT identity FROM entities")?;
        let identities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(identities)
    }

    fn insert_batch(&mut self, batch: &[CanonicalEntity]) -> StorageResult<BatchResult> {
        let tx = self.conn.transaction()?;
        let mut result = BatchResult::default();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO entities (identity, source, discovered_at) VALUES (?1, ?2, ?3)",
            )?;

            for (index, entity) in batch.iter().enumerate() {
                let inserted = stmt.execute(params![
                    entity.identity,
                    entity.source_tag.to_db_string(),
                    entity.discovered_at.to_rfc3339()
                ]);

                match inserted {
                    Ok(_) => result.inserted += 1,
                    Err(e) => result.errors.push(RowError {
                        index,
                        identity: entity.identity.clone(),
                        kind: classify_row_error(&e),
                        message: e.to_string(),
                    }),
                }
            }
        }

        tx.commit()?;
        Ok(result)
    }

    fn count_entities(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_entities_by_source(&self) -> StorageResult<Vec<(SourceTag, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM entities GROUP BY source ORDER BY source")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (source, count) = row?;
            match SourceTag::from_db_string(&source) {
                Some(tag) => counts.push((tag, count as u64)),
                None => {
                    return Err(StorageError::Database(format!(
                        "unknown source tag '{}' in entities table",
                        source
                    )))
                }
            }
        }
        Ok(counts)
    }

    // ===== Run Management =====

    fn begin_run(&mut self, method: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, method, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, method, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn record_checkpoint(&mut self, run_id: i64, window: &str, pattern: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO run_checkpoints (run_id, window_label, pattern, completed_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, window, pattern, now],
        )?;
        Ok(())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, new_entities: u64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, new_entities = new_entities + ?3 WHERE id = ?4",
            params![status.to_db_string(), now, new_entities as i64, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                Self::run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn last_checkpoint(&self, run_id: i64) -> StorageResult<Option<Checkpoint>> {
        let checkpoint = self
            .conn
            .query_row(
                "SELECT run_id, window_label, pattern, completed_at FROM run_checkpoints
                 WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
                params![run_id],
                |row| {
                    Ok(Checkpoint {
                        run_id: row.get(0)?,
                        window: row.get(1)?,
                        pattern: row.get(2)?,
                        completed_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(checkpoint)
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS))?;
        let runs = stmt
            .query_map(params![limit as i64], Self::run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
