//! Database schema definitions

/// Longest identity the sink accepts
pub const MAX_IDENTITY_LEN: usize = 2048;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    method TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    new_entities INTEGER NOT NULL DEFAULT 0
);

-- Canonical channel identities, one row per channel
CREATE TABLE IF NOT EXISTS entities (
    identity TEXT PRIMARY KEY
        CHECK (length(identity) BETWEEN 1 AND 2048),
    source TEXT NOT NULL
        CHECK (source IN ('cc_index', 'wayback')),
    discovered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entities_source ON entities(source);

-- Tasks finished by each run, in completion order
CREATE TABLE IF NOT EXISTS run_checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    window_label TEXT NOT NULL,
    pattern TEXT NOT NULL,
    completed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_run_checkpoints_run ON run_checkpoints(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
