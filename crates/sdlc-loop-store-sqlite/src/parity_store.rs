// crates/sdlc-loop-store-sqlite/src/parity_store.rs
// ============================================================================
// Module: SQLite Parity Store
// Description: `ParityStore` implementation backed by the `parity_samples`
// table.
// Purpose: Persist the append-only parity-SLO sample stream.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::params;
use sdlc_loop_core::core::parity::ParityMetricSample;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::interfaces::ParityStore;
use sdlc_loop_core::interfaces::StoreError;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

impl ParityStore for SqliteStore {
    fn record_sample(&self, sample: &ParityMetricSample) -> Result<(), StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let row_json = codec::to_json(sample).map_err(StoreError::from)?;
        conn.execute(
            "INSERT INTO parity_samples (observed_at_ms, row_json) VALUES (?1, ?2)",
            params![sample.observed_at.unix_millis(), row_json],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn samples_in_window(
        &self,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<Vec<ParityMetricSample>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let mut stmt = conn
            .prepare(
                "SELECT row_json FROM parity_samples
                 WHERE observed_at_ms >= ?1 AND observed_at_ms <= ?2
                 ORDER BY observed_at_ms ASC",
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![window_start.unix_millis(), window_end.unix_millis()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        rows.map(|raw| {
            let raw = raw.map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            codec::from_json::<ParityMetricSample>(&raw).map_err(StoreError::from)
        })
        .collect()
    }
}
