// crates/sdlc-loop-store-sqlite/src/connection.rs
// ============================================================================
// Module: SQLite Connection and Schema
// Description: Pragma setup, schema migration, and the store handle.
// Purpose: Serialize every mutation through one connection under a mutex,
// the way a single-writer embedded store avoids SQLITE_BUSY contention
// without a connection pool.
// Dependencies: rusqlite, crate::config, crate::error
// ============================================================================

//! ## Overview
//! [`SqliteStore`] wraps one [`rusqlite::Connection`] in a [`Mutex`]. Every
//! trait impl in this crate locks it for the duration of one logical
//! operation (a single statement, or a short read-decide-write transaction),
//! so the CAS guards `sdlc_loop_core::runtime` decides against a row
//! snapshot are never racing a concurrent writer on this connection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OpenFlags;

use crate::config::SqliteStoreConfig;
use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Store Handle
// ============================================================================

/// `SQLite`-backed implementation of every `sdlc_loop_core::interfaces` store
/// trait.
///
/// # Invariants
/// - `conn` is only ever locked for the duration of one logical operation;
///   no trait impl holds the lock across an I/O boundary outside `SQLite`
///   itself.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates, if needed) a `SQLite` store at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the connection cannot be opened, a
    /// pragma fails to apply, or schema migration fails.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let conn = open_connection(config)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the in-memory connection cannot be
    /// initialized or migrated.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(std::time::Duration::from_millis(
            crate::config::DEFAULT_BUSY_TIMEOUT_MS,
        ))?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection for the duration of one logical operation.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] if the mutex was poisoned by a
    /// panicking holder.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.conn
            .lock()
            .map_err(|_poisoned| SqliteStoreError::Invalid("sqlite connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens a `SQLite` connection and applies durability pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

/// Applies the journal mode, synchronous mode, busy timeout, and foreign-key
/// enforcement pragmas required for durability.
fn apply_pragmas(conn: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};",
        config.sync_mode.pragma_value()
    ))?;
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates every table and index this store needs, if not already present.
fn run_migrations(conn: &Connection) -> Result<(), SqliteStoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Full schema for the loop controller's durable store.
///
/// Each table carries the canonical row as a `row_json` snapshot plus the
/// handful of plain columns its own queries filter or order on.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS loops (
    loop_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    thread_id TEXT NOT NULL,
    repo_full_name TEXT NOT NULL,
    pr_number INTEGER,
    state TEXT NOT NULL,
    loop_version INTEGER NOT NULL,
    current_head_sha TEXT,
    is_terminal INTEGER NOT NULL,
    created_at_ms INTEGER NOT NULL,
    row_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_loops_active_pr
    ON loops(repo_full_name, pr_number, is_terminal);
CREATE INDEX IF NOT EXISTS idx_loops_active_thread
    ON loops(user_id, thread_id, is_terminal);

CREATE TABLE IF NOT EXISTS loop_leases (
    loop_id TEXT PRIMARY KEY,
    lease_owner TEXT,
    lease_epoch INTEGER NOT NULL,
    lease_expires_at_ms INTEGER
);

CREATE TABLE IF NOT EXISTS webhook_deliveries (
    delivery_id TEXT PRIMARY KEY,
    claimant_token TEXT NOT NULL,
    claim_expires_at_ms INTEGER NOT NULL,
    completed_at_ms INTEGER,
    event_type TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS outbox (
    outbox_id TEXT PRIMARY KEY,
    loop_id TEXT NOT NULL,
    action_key TEXT NOT NULL,
    transition_seq INTEGER NOT NULL,
    supersession_group TEXT NOT NULL,
    status TEXT NOT NULL,
    attempt_count INTEGER NOT NULL,
    next_retry_at_ms INTEGER,
    created_at_ms INTEGER NOT NULL,
    row_json TEXT NOT NULL,
    UNIQUE(loop_id, action_key)
);
CREATE INDEX IF NOT EXISTS idx_outbox_claimable
    ON outbox(loop_id, status, transition_seq);
CREATE INDEX IF NOT EXISTS idx_outbox_supersession
    ON outbox(loop_id, supersession_group, status);

CREATE TABLE IF NOT EXISTS outbox_attempts (
    outbox_id TEXT NOT NULL,
    attempt INTEGER NOT NULL,
    row_json TEXT NOT NULL,
    PRIMARY KEY(outbox_id, attempt)
);

CREATE TABLE IF NOT EXISTS signal_inbox (
    signal_id TEXT PRIMARY KEY,
    loop_id TEXT NOT NULL,
    canonical_cause_id TEXT NOT NULL,
    received_at_ms INTEGER NOT NULL,
    processed_at_ms INTEGER,
    row_json TEXT NOT NULL,
    UNIQUE(loop_id, canonical_cause_id)
);
CREATE INDEX IF NOT EXISTS idx_signal_unprocessed
    ON signal_inbox(loop_id, processed_at_ms, received_at_ms);

CREATE TABLE IF NOT EXISTS gate_runs (
    loop_id TEXT NOT NULL,
    head_sha TEXT NOT NULL,
    gate_kind TEXT NOT NULL,
    loop_version INTEGER NOT NULL,
    row_json TEXT NOT NULL,
    PRIMARY KEY(loop_id, head_sha, gate_kind)
);

CREATE TABLE IF NOT EXISTS findings (
    loop_id TEXT NOT NULL,
    head_sha TEXT NOT NULL,
    stable_finding_id TEXT NOT NULL,
    row_json TEXT NOT NULL,
    PRIMARY KEY(loop_id, head_sha, stable_finding_id)
);

CREATE TABLE IF NOT EXISTS phase_artifacts (
    artifact_id TEXT PRIMARY KEY,
    loop_id TEXT NOT NULL,
    phase TEXT NOT NULL,
    head_sha TEXT,
    status TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL,
    row_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_artifacts_phase_key
    ON phase_artifacts(loop_id, phase, head_sha, status);

CREATE TABLE IF NOT EXISTS plan_tasks (
    artifact_id TEXT NOT NULL,
    stable_task_id TEXT NOT NULL,
    row_json TEXT NOT NULL,
    PRIMARY KEY(artifact_id, stable_task_id)
);

CREATE TABLE IF NOT EXISTS parity_samples (
    sample_id INTEGER PRIMARY KEY AUTOINCREMENT,
    observed_at_ms INTEGER NOT NULL,
    row_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_parity_window ON parity_samples(observed_at_ms);
";
