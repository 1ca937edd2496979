// crates/sdlc-loop-store-sqlite/src/lease_store.rs
// ============================================================================
// Module: SQLite Lease Store
// Description: `LeaseStore` implementation backed by the `loop_leases` table.
// Purpose: Persist the per-loop mutex lease's TTL/epoch/owner fields.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::state::LoopLeaseRow;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::interfaces::LeaseStore;
use sdlc_loop_core::interfaces::StoreError;
use sdlc_loop_core::runtime::lease::LeaseAcquireOutcome;
use sdlc_loop_core::runtime::lease::decide_lease_acquire;
use sdlc_loop_core::runtime::lease::decide_lease_release;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

/// Loads a [`LoopLeaseRow`] within an open transaction, `None` if absent.
fn load_lease_row(
    conn: &rusqlite::Connection,
    loop_id: &LoopId,
) -> Result<Option<LoopLeaseRow>, SqliteStoreError> {
    conn.query_row(
        "SELECT lease_owner, lease_epoch, lease_expires_at_ms FROM loop_leases WHERE loop_id = ?1",
        params![loop_id.as_str()],
        |row| {
            let lease_owner: Option<String> = row.get(0)?;
            let lease_epoch: i64 = row.get(1)?;
            let lease_expires_at_ms: Option<i64> = row.get(2)?;
            Ok((lease_owner, lease_epoch, lease_expires_at_ms))
        },
    )
    .optional()
    .map_err(SqliteStoreError::from)?
    .map(|(lease_owner, lease_epoch, lease_expires_at_ms)| {
        Ok(LoopLeaseRow {
            loop_id: loop_id.clone(),
            lease_owner,
            lease_epoch: codec::i64_to_u64(lease_epoch)?,
            lease_expires_at: lease_expires_at_ms.map(Timestamp::from_unix_millis),
        })
    })
    .transpose()
}

impl LeaseStore for SqliteStore {
    fn acquire(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        lease_ttl_ms: i64,
        now: Timestamp,
    ) -> Result<LeaseAcquireOutcome, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        let existing = load_lease_row(&tx, loop_id).map_err(StoreError::from)?;
        let outcome = decide_lease_acquire(existing.as_ref(), lease_owner, now);

        if let LeaseAcquireOutcome::Acquired { epoch } = outcome {
            let expires_at_ms = now.plus_millis(lease_ttl_ms).unix_millis();
            tx.execute(
                "INSERT INTO loop_leases (loop_id, lease_owner, lease_epoch, lease_expires_at_ms)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(loop_id) DO UPDATE SET
                    lease_owner = excluded.lease_owner,
                    lease_epoch = excluded.lease_epoch,
                    lease_expires_at_ms = excluded.lease_expires_at_ms",
                params![loop_id.as_str(), lease_owner, codec::u64_to_i64(epoch).map_err(StoreError::from)?, expires_at_ms],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(outcome)
    }

    fn release(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        let existing = load_lease_row(&tx, loop_id).map_err(StoreError::from)?;

        if !decide_lease_release(existing.as_ref(), lease_owner) {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(false);
        }

        let affected = tx
            .execute(
                "UPDATE loop_leases SET lease_expires_at_ms = ?1
                 WHERE loop_id = ?2 AND lease_owner = ?3",
                params![now.unix_millis(), loop_id.as_str(), lease_owner],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(affected == 1)
    }
}
