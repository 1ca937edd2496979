// crates/sdlc-loop-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Store Error
// Description: Error type for the SQLite-backed store, convertible into the
// shared sdlc_loop_core::interfaces::StoreError.
// Purpose: Preserve SQLite-specific diagnostic detail while still exposing
// the backend-agnostic error surface every trait impl returns.
// Dependencies: rusqlite, sdlc_loop_core, thiserror
// ============================================================================

use sdlc_loop_core::interfaces::StoreError;
use thiserror::Error;

/// Errors raised by the `SQLite` store before being folded into
/// [`StoreError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The underlying `SQLite` engine reported an error.
    #[error("sqlite engine error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A row's JSON column failed to (de)serialize.
    #[error("sqlite row codec error: {0}")]
    Codec(#[from] serde_json::Error),
    /// A path or pragma value was rejected before opening the connection.
    #[error("sqlite store config error: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(value: SqliteStoreError) -> Self {
        match value {
            SqliteStoreError::Sqlite(err) => Self::Io(err.to_string()),
            SqliteStoreError::Codec(err) => Self::Corrupt(err.to_string()),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}
