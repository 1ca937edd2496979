// crates/sdlc-loop-store-sqlite/src/signal_store.rs
// ============================================================================
// Module: SQLite Signal Inbox Store
// Description: `SignalInboxStore` implementation backed by the
// `signal_inbox` table.
// Purpose: Persist the per-loop queue of external signals awaiting dispatch.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::SignalId;
use sdlc_loop_core::core::signal::SignalInboxRow;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::interfaces::SignalInboxStore;
use sdlc_loop_core::interfaces::StoreError;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

impl SignalInboxStore for SqliteStore {
    fn insert_signal(&self, signal: &SignalInboxRow) -> Result<(), StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let row_json = codec::to_json(signal).map_err(StoreError::from)?;
        conn.execute(
            "INSERT INTO signal_inbox (
                signal_id, loop_id, canonical_cause_id, received_at_ms, processed_at_ms, row_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                signal.signal_id.as_str(),
                signal.loop_id.as_str(),
                signal.canonical_cause_id.as_str(),
                signal.received_at.unix_millis(),
                signal.processed_at.map(Timestamp::unix_millis),
                row_json,
            ],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn oldest_unprocessed(&self, loop_id: &LoopId) -> Result<Option<SignalInboxRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT row_json FROM signal_inbox
                 WHERE loop_id = ?1 AND processed_at_ms IS NULL
                 ORDER BY received_at_ms ASC LIMIT 1",
                params![loop_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        raw.map(|r| codec::from_json::<SignalInboxRow>(&r))
            .transpose()
            .map_err(StoreError::from)
    }

    fn mark_processed(&self, signal_id: &SignalId, now: Timestamp) -> Result<bool, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT row_json FROM signal_inbox WHERE signal_id = ?1 AND processed_at_ms IS NULL",
                params![signal_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;

        let Some(raw) = existing else {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(false);
        };

        let mut signal: SignalInboxRow = codec::from_json(&raw).map_err(StoreError::from)?;
        signal.processed_at = Some(now);
        let updated_json = codec::to_json(&signal).map_err(StoreError::from)?;

        let affected = tx
            .execute(
                "UPDATE signal_inbox SET processed_at_ms = ?1, row_json = ?2
                 WHERE signal_id = ?3 AND processed_at_ms IS NULL",
                params![now.unix_millis(), updated_json, signal_id.as_str()],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(affected == 1)
    }
}
