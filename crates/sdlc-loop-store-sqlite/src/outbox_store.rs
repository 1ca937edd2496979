// crates/sdlc-loop-store-sqlite/src/outbox_store.rs
// ============================================================================
// Module: SQLite Outbox Store
// Description: `OutboxStore` implementation backed by the `outbox` and
// `outbox_attempts` tables.
// Purpose: Upsert-and-supersede enqueue, lease-fenced claim, and backoff-
// driven completion for the transactional outbox.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::OutboxId;
use sdlc_loop_core::core::outbox::ActionKeyedEnqueue;
use sdlc_loop_core::core::outbox::ActionType;
use sdlc_loop_core::core::outbox::AttemptStatus;
use sdlc_loop_core::core::outbox::CanceledReason;
use sdlc_loop_core::core::outbox::OutboxAttempt;
use sdlc_loop_core::core::outbox::OutboxRow;
use sdlc_loop_core::core::outbox::OutboxStatus;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::interfaces::OutboxStore;
use sdlc_loop_core::interfaces::StoreError;
use sdlc_loop_core::runtime::outbox::OutboxCompleteInput;
use sdlc_loop_core::runtime::outbox::OutboxCompleteOutcome;
use sdlc_loop_core::runtime::outbox::decide_outbox_completion;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

/// Derives the deterministic outbox row id for a `(loop_id, action_key)`
/// pair, so re-enqueuing the same action key always addresses the same row.
fn derive_outbox_id(loop_id: &LoopId, action_key: &sdlc_loop_core::core::identifiers::ActionKey) -> OutboxId {
    OutboxId::new(format!("{loop_id}:{action_key}"))
}

/// Loads an [`OutboxRow`] by id within an open connection/transaction.
fn load_outbox_row(
    conn: &rusqlite::Connection,
    outbox_id: &OutboxId,
) -> Result<Option<OutboxRow>, SqliteStoreError> {
    conn.query_row(
        "SELECT row_json FROM outbox WHERE outbox_id = ?1",
        params![outbox_id.as_str()],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(SqliteStoreError::from)?
    .map(|raw| codec::from_json::<OutboxRow>(&raw))
    .transpose()
}

/// Writes an [`OutboxRow`]'s indexed columns and JSON snapshot in place.
fn write_outbox_row(conn: &rusqlite::Connection, row: &OutboxRow) -> Result<(), SqliteStoreError> {
    let row_json = codec::to_json(row)?;
    conn.execute(
        "UPDATE outbox SET
            transition_seq = ?1, supersession_group = ?2, status = ?3,
            attempt_count = ?4, next_retry_at_ms = ?5, row_json = ?6
         WHERE outbox_id = ?7",
        params![
            codec::u64_to_i64(row.transition_seq)?,
            codec::supersession_group_tag(row.supersession_group),
            codec::outbox_status_tag(row.status),
            codec::u32_to_i64(row.attempt_count),
            row.next_retry_at.map(Timestamp::unix_millis),
            row_json,
            row.outbox_id.as_str(),
        ],
    )?;
    Ok(())
}

impl OutboxStore for SqliteStore {
    fn enqueue(&self, enqueue: &ActionKeyedEnqueue) -> Result<OutboxRow, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let outbox_id = derive_outbox_id(&enqueue.loop_id, &enqueue.action_key);
        let now = codec::now();
        let fresh = OutboxRow {
            outbox_id: outbox_id.clone(),
            loop_id: enqueue.loop_id.clone(),
            transition_seq: enqueue.transition_seq,
            action_type: enqueue.action_type,
            supersession_group: enqueue.action_type.supersession_group(),
            action_key: enqueue.action_key.clone(),
            payload: enqueue.payload.clone(),
            status: OutboxStatus::Pending,
            attempt_count: 0,
            next_retry_at: None,
            claimed_by: None,
            claimed_at: None,
            completed_at: None,
            last_error_class: None,
            last_error_code: None,
            last_error_message: None,
            superseded_by_outbox_id: None,
            canceled_reason: None,
            created_at: now,
        };
        let row_json = codec::to_json(&fresh).map_err(StoreError::from)?;

        tx.execute(
            "INSERT INTO outbox (
                outbox_id, loop_id, action_key, transition_seq, supersession_group,
                status, attempt_count, next_retry_at_ms, created_at_ms, row_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, ?8)
            ON CONFLICT(outbox_id) DO UPDATE SET
                transition_seq = excluded.transition_seq,
                supersession_group = excluded.supersession_group,
                status = excluded.status,
                attempt_count = 0,
                next_retry_at_ms = NULL,
                row_json = excluded.row_json",
            params![
                outbox_id.as_str(),
                enqueue.loop_id.as_str(),
                enqueue.action_key.as_str(),
                codec::u64_to_i64(enqueue.transition_seq).map_err(StoreError::from)?,
                codec::supersession_group_tag(fresh.supersession_group),
                codec::outbox_status_tag(OutboxStatus::Pending),
                now.unix_millis(),
                row_json,
            ],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;

        // Cancel pending/running siblings in the same supersession group
        // produced by an earlier transition.
        let sibling_ids: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT outbox_id, row_json FROM outbox
                     WHERE loop_id = ?1 AND supersession_group = ?2
                       AND status IN ('pending', 'running')
                       AND outbox_id <> ?3
                       AND transition_seq <= ?4",
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            let rows = stmt
                .query_map(
                    params![
                        enqueue.loop_id.as_str(),
                        codec::supersession_group_tag(fresh.supersession_group),
                        outbox_id.as_str(),
                        codec::u64_to_i64(enqueue.transition_seq).map_err(StoreError::from)?,
                    ],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?
        };

        for (sibling_id, sibling_json) in sibling_ids {
            let mut sibling: OutboxRow = codec::from_json(&sibling_json).map_err(StoreError::from)?;
            sibling.status = OutboxStatus::Canceled;
            sibling.canceled_reason = Some(CanceledReason::SupersededByNewerTransition);
            sibling.superseded_by_outbox_id = Some(outbox_id.clone());
            let sibling_row_json = codec::to_json(&sibling).map_err(StoreError::from)?;
            tx.execute(
                "UPDATE outbox SET status = ?1, row_json = ?2 WHERE outbox_id = ?3",
                params![codec::outbox_status_tag(OutboxStatus::Canceled), sibling_row_json, sibling_id],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        let stored = load_outbox_row(&tx, &outbox_id)
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::Corrupt(format!("outbox row {outbox_id} missing immediately after upsert")))?;

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(stored)
    }

    fn claim(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        lease_epoch: u64,
        allowed_action_types: Option<&[ActionType]>,
        now: Timestamp,
    ) -> Result<Option<OutboxRow>, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let lease_epoch_i64 = codec::u64_to_i64(lease_epoch).map_err(StoreError::from)?;
        let lease_is_current: bool = tx
            .query_row(
                "SELECT 1 FROM loop_leases
                 WHERE loop_id = ?1 AND lease_owner = ?2 AND lease_epoch = ?3
                   AND (lease_expires_at_ms IS NULL OR lease_expires_at_ms > ?4)",
                params![loop_id.as_str(), lease_owner, lease_epoch_i64, now.unix_millis()],
                |_row| Ok(()),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?
            .is_some();

        if !lease_is_current {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(None);
        }

        let candidates: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT outbox_id, row_json FROM outbox
                     WHERE loop_id = ?1 AND status = 'pending'
                       AND (next_retry_at_ms IS NULL OR next_retry_at_ms <= ?2)
                     ORDER BY transition_seq ASC, created_at_ms ASC",
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            let rows = stmt
                .query_map(params![loop_id.as_str(), now.unix_millis()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?
        };

        for (outbox_id, row_json) in candidates {
            let mut candidate: OutboxRow = codec::from_json(&row_json).map_err(StoreError::from)?;
            if let Some(allowed) = allowed_action_types
                && !allowed.contains(&candidate.action_type)
            {
                continue;
            }

            candidate.status = OutboxStatus::Running;
            candidate.claimed_by = Some(lease_owner.to_string());
            candidate.claimed_at = Some(now);
            candidate.attempt_count = candidate.attempt_count.saturating_add(1);
            let claimed_json = codec::to_json(&candidate).map_err(StoreError::from)?;

            let affected = tx
                .execute(
                    "UPDATE outbox SET
                        status = ?1, attempt_count = ?2, row_json = ?3
                     WHERE outbox_id = ?4 AND status = 'pending'",
                    params![
                        codec::outbox_status_tag(OutboxStatus::Running),
                        codec::u32_to_i64(candidate.attempt_count),
                        claimed_json,
                        outbox_id,
                    ],
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;

            if affected == 1 {
                tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
                return Ok(Some(candidate));
            }
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(None)
    }

    fn complete(
        &self,
        outbox_id: &OutboxId,
        lease_owner: &str,
        input: &OutboxCompleteInput,
        now: Timestamp,
    ) -> Result<OutboxCompleteOutcome, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let Some(mut row) = load_outbox_row(&tx, outbox_id).map_err(StoreError::from)? else {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(OutboxCompleteOutcome::NotRunningOrNotOwner);
        };

        if row.status != OutboxStatus::Running || row.claimed_by.as_deref() != Some(lease_owner) {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(OutboxCompleteOutcome::NotRunningOrNotOwner);
        }

        let outcome = decide_outbox_completion(row.attempt_count, input, now);

        let attempt_status = match &outcome {
            OutboxCompleteOutcome::NotRunningOrNotOwner => None,
            OutboxCompleteOutcome::Completed => Some(AttemptStatus::Completed),
            OutboxCompleteOutcome::RetryScheduled { .. } => Some(AttemptStatus::RetryScheduled),
            OutboxCompleteOutcome::Failed => Some(AttemptStatus::Failed),
        };

        if let Some(attempt_status) = attempt_status {
            match &outcome {
                OutboxCompleteOutcome::Completed => {
                    row.status = OutboxStatus::Completed;
                    row.completed_at = Some(now);
                }
                OutboxCompleteOutcome::RetryScheduled { retry_at } => {
                    row.status = OutboxStatus::Pending;
                    row.next_retry_at = Some(*retry_at);
                    row.last_error_class = input.error_class;
                    row.last_error_code.clone_from(&input.error_code);
                    row.last_error_message = input
                        .error_message
                        .as_deref()
                        .map(sdlc_loop_core::core::outbox::normalize_error_message);
                }
                OutboxCompleteOutcome::Failed => {
                    row.status = OutboxStatus::Failed;
                    row.last_error_class = input.error_class;
                    row.last_error_code.clone_from(&input.error_code);
                    row.last_error_message = input
                        .error_message
                        .as_deref()
                        .map(sdlc_loop_core::core::outbox::normalize_error_message);
                }
                // Guarded by the `attempt_status.is_some()` check above:
                // `decide_outbox_completion` never constructs this variant.
                OutboxCompleteOutcome::NotRunningOrNotOwner => {}
            }

            write_outbox_row(&tx, &row).map_err(StoreError::from)?;

            let attempt = OutboxAttempt {
                outbox_id: outbox_id.clone(),
                attempt: row.attempt_count,
                status: attempt_status,
                error_class: row.last_error_class,
                error_code: row.last_error_code.clone(),
                error_message: row.last_error_message.clone(),
                retry_at: row.next_retry_at,
            };
            let attempt_json = codec::to_json(&attempt).map_err(StoreError::from)?;
            tx.execute(
                "INSERT INTO outbox_attempts (outbox_id, attempt, row_json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(outbox_id, attempt) DO UPDATE SET row_json = excluded.row_json",
                params![outbox_id.as_str(), codec::u32_to_i64(attempt.attempt), attempt_json],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(outcome)
    }

    fn cancel_all_for_loop(&self, loop_id: &LoopId, _reason: &str) -> Result<u64, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let candidates: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT outbox_id, row_json FROM outbox
                     WHERE loop_id = ?1 AND status IN ('pending', 'running')",
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            let rows = stmt
                .query_map(params![loop_id.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?
        };

        let count = candidates.len();
        for (outbox_id, row_json) in candidates {
            let mut row: OutboxRow = codec::from_json(&row_json).map_err(StoreError::from)?;
            row.status = OutboxStatus::Canceled;
            row.canceled_reason = Some(CanceledReason::CanceledDueToStop);
            let updated_json = codec::to_json(&row).map_err(StoreError::from)?;
            tx.execute(
                "UPDATE outbox SET status = ?1, row_json = ?2 WHERE outbox_id = ?3",
                params![codec::outbox_status_tag(OutboxStatus::Canceled), updated_json, outbox_id],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        u64::try_from(count).map_err(|_overflow| {
            StoreError::from(SqliteStoreError::Invalid(format!("{count} outbox rows exceeds u64 range")))
        })
    }
}
