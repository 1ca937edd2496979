// crates/sdlc-loop-store-sqlite/src/loop_store.rs
// ============================================================================
// Module: SQLite Loop Store
// Description: `LoopStore` implementation backed by the `loops` table.
// Purpose: Persist loop rows and apply head-SHA/loop-version-guarded state
// transitions as one conditional update.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::RepoFullName;
use sdlc_loop_core::core::identifiers::ThreadId;
use sdlc_loop_core::core::identifiers::UserId;
use sdlc_loop_core::core::state::LoopRow;
use sdlc_loop_core::interfaces::LoopStore;
use sdlc_loop_core::interfaces::StoreError;
use sdlc_loop_core::runtime::state_machine::GateGuardedUpdate;
use sdlc_loop_core::runtime::state_machine::GuardedUpdateOutcome;
use sdlc_loop_core::runtime::state_machine::persist_guarded_gate_loop_state;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

/// Loads a [`LoopRow`] by its primary key, within an already-open statement
/// scope, returning `None` on an empty result.
fn load_loop_row(conn: &rusqlite::Connection, loop_id: &LoopId) -> Result<Option<LoopRow>, SqliteStoreError> {
    conn.query_row(
        "SELECT row_json FROM loops WHERE loop_id = ?1",
        params![loop_id.as_str()],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(SqliteStoreError::from)?
    .map(|raw| codec::from_json::<LoopRow>(&raw))
    .transpose()
}

impl LoopStore for SqliteStore {
    fn insert_loop(&self, loop_row: &LoopRow) -> Result<(), StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let row_json = codec::to_json(loop_row).map_err(StoreError::from)?;
        let pr_number = loop_row
            .pr_number
            .map(codec::u64_to_i64)
            .transpose()
            .map_err(StoreError::from)?;
        conn.execute(
            "INSERT INTO loops (
                loop_id, user_id, thread_id, repo_full_name, pr_number, state,
                loop_version, current_head_sha, is_terminal, created_at_ms, row_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                loop_row.loop_id.as_str(),
                loop_row.user_id.as_str(),
                loop_row.thread_id.as_str(),
                loop_row.repo_full_name.as_str(),
                pr_number,
                codec::loop_state_tag(loop_row.state),
                codec::u64_to_i64(loop_row.loop_version).map_err(StoreError::from)?,
                loop_row.current_head_sha.as_ref().map(sdlc_loop_core::core::identifiers::HeadSha::as_str),
                i64::from(loop_row.state.is_terminal()),
                loop_row.created_at.unix_millis(),
                row_json,
            ],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn get_loop(&self, loop_id: &LoopId) -> Result<Option<LoopRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        load_loop_row(&conn, loop_id).map_err(StoreError::from)
    }

    fn get_active_loop_for_pr(
        &self,
        repo_full_name: &RepoFullName,
        pr_number: u64,
    ) -> Result<Option<LoopRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let pr_number_i64 = codec::u64_to_i64(pr_number).map_err(StoreError::from)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT row_json FROM loops
                 WHERE repo_full_name = ?1 AND pr_number = ?2 AND is_terminal = 0
                 ORDER BY created_at_ms DESC LIMIT 1",
                params![repo_full_name.as_str(), pr_number_i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        raw.map(|r| codec::from_json::<LoopRow>(&r))
            .transpose()
            .map_err(StoreError::from)
    }

    fn get_active_loop_for_thread(
        &self,
        user_id: &UserId,
        thread_id: &ThreadId,
    ) -> Result<Option<LoopRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT row_json FROM loops
                 WHERE user_id = ?1 AND thread_id = ?2 AND is_terminal = 0
                 ORDER BY created_at_ms DESC LIMIT 1",
                params![user_id.as_str(), thread_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        raw.map(|r| codec::from_json::<LoopRow>(&r))
            .transpose()
            .map_err(StoreError::from)
    }

    fn apply_guarded_transition(
        &self,
        loop_id: &LoopId,
        update: &GateGuardedUpdate,
    ) -> Result<GuardedUpdateOutcome, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let Some(current) = load_loop_row(&tx, loop_id).map_err(StoreError::from)? else {
            return Ok(GuardedUpdateOutcome::StaleNoop);
        };

        let outcome = persist_guarded_gate_loop_state(&current, update);

        if let GuardedUpdateOutcome::Updated(next) = &outcome {
            let row_json = codec::to_json(next).map_err(StoreError::from)?;
            let pr_number = next.pr_number.map(codec::u64_to_i64).transpose().map_err(StoreError::from)?;
            let affected = tx
                .execute(
                    "UPDATE loops SET
                        state = ?1, loop_version = ?2, current_head_sha = ?3,
                        is_terminal = ?4, pr_number = ?5, row_json = ?6
                     WHERE loop_id = ?7 AND state = ?8 AND loop_version = ?9",
                    params![
                        codec::loop_state_tag(next.state),
                        codec::u64_to_i64(next.loop_version).map_err(StoreError::from)?,
                        next.current_head_sha.as_ref().map(sdlc_loop_core::core::identifiers::HeadSha::as_str),
                        i64::from(next.state.is_terminal()),
                        pr_number,
                        row_json,
                        loop_id.as_str(),
                        codec::loop_state_tag(current.state),
                        codec::u64_to_i64(current.loop_version).map_err(StoreError::from)?,
                    ],
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;

            if affected != 1 {
                tx.rollback().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
                return Ok(GuardedUpdateOutcome::StaleNoop);
            }
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(outcome)
    }
}
