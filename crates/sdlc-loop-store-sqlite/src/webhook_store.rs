// crates/sdlc-loop-store-sqlite/src/webhook_store.rs
// ============================================================================
// Module: SQLite Webhook Claim Store
// Description: `WebhookClaimStore` implementation backed by the
// `webhook_deliveries` table.
// Purpose: Persist the exactly-once admission ledger for inbound deliveries.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::identifiers::DeliveryId;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::core::webhook::WebhookDeliveryRow;
use sdlc_loop_core::interfaces::StoreError;
use sdlc_loop_core::interfaces::WebhookClaimStore;
use sdlc_loop_core::runtime::webhook_claim::ClaimOutcome;
use sdlc_loop_core::runtime::webhook_claim::WEBHOOK_CLAIM_TTL_MS;
use sdlc_loop_core::runtime::webhook_claim::decide_claim;

use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

/// Loads a [`WebhookDeliveryRow`] within an open transaction, `None` if
/// absent.
fn load_delivery_row(
    conn: &rusqlite::Connection,
    delivery_id: &DeliveryId,
) -> Result<Option<WebhookDeliveryRow>, SqliteStoreError> {
    conn.query_row(
        "SELECT claimant_token, claim_expires_at_ms, completed_at_ms, event_type, created_at_ms
         FROM webhook_deliveries WHERE delivery_id = ?1",
        params![delivery_id.as_str()],
        |row| {
            Ok(WebhookDeliveryRow {
                delivery_id: delivery_id.clone(),
                claimant_token: row.get(0)?,
                claim_expires_at: Timestamp::from_unix_millis(row.get(1)?),
                completed_at: row.get::<_, Option<i64>>(2)?.map(Timestamp::from_unix_millis),
                event_type: row.get(3)?,
                created_at: Timestamp::from_unix_millis(row.get(4)?),
            })
        },
    )
    .optional()
    .map_err(SqliteStoreError::from)
}

impl WebhookClaimStore for SqliteStore {
    fn claim(
        &self,
        delivery_id: &DeliveryId,
        claimant_token: &str,
        event_type: &str,
        now: Timestamp,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        let existing = load_delivery_row(&tx, delivery_id).map_err(StoreError::from)?;
        let outcome = decide_claim(existing.as_ref(), now);

        if outcome.should_process() {
            let expires_at_ms = now.plus_millis(WEBHOOK_CLAIM_TTL_MS).unix_millis();
            match outcome {
                ClaimOutcome::ClaimedNew => {
                    tx.execute(
                        "INSERT INTO webhook_deliveries (
                            delivery_id, claimant_token, claim_expires_at_ms, completed_at_ms,
                            event_type, created_at_ms
                        ) VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
                        params![delivery_id.as_str(), claimant_token, expires_at_ms, event_type, now.unix_millis()],
                    )
                    .map_err(SqliteStoreError::from)
                    .map_err(StoreError::from)?;
                }
                ClaimOutcome::StaleStolen => {
                    let affected = tx
                        .execute(
                            "UPDATE webhook_deliveries SET claimant_token = ?1, claim_expires_at_ms = ?2
                             WHERE delivery_id = ?3 AND completed_at_ms IS NULL",
                            params![claimant_token, expires_at_ms, delivery_id.as_str()],
                        )
                        .map_err(SqliteStoreError::from)
                        .map_err(StoreError::from)?;
                    if affected != 1 {
                        tx.rollback().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
                        return Ok(ClaimOutcome::InProgressFresh);
                    }
                }
                ClaimOutcome::AlreadyCompleted | ClaimOutcome::InProgressFresh => {}
            }
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(outcome)
    }

    fn complete(&self, delivery_id: &DeliveryId, claimant_token: &str) -> Result<bool, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let affected = conn
            .execute(
                "UPDATE webhook_deliveries SET completed_at_ms = CAST(strftime('%s', 'now') AS INTEGER) * 1000
                 WHERE delivery_id = ?1 AND claimant_token = ?2 AND completed_at_ms IS NULL",
                params![delivery_id.as_str(), claimant_token],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        Ok(affected == 1)
    }

    fn release(&self, delivery_id: &DeliveryId, claimant_token: &str) -> Result<bool, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let affected = conn
            .execute(
                "UPDATE webhook_deliveries SET claim_expires_at_ms = 0
                 WHERE delivery_id = ?1 AND claimant_token = ?2 AND completed_at_ms IS NULL",
                params![delivery_id.as_str(), claimant_token],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        Ok(affected == 1)
    }

    fn get(&self, delivery_id: &DeliveryId) -> Result<Option<WebhookDeliveryRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        load_delivery_row(&conn, delivery_id).map_err(StoreError::from)
    }
}
