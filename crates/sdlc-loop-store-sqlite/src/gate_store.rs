// crates/sdlc-loop-store-sqlite/src/gate_store.rs
// ============================================================================
// Module: SQLite Gate Store
// Description: `GateStore` implementation backed by the `gate_runs` and
// `findings` tables.
// Purpose: Persist gate evaluation rows with a loop-version-guarded upsert
// and the finding set each evaluation replaces wholesale.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::gates::FindingRow;
use sdlc_loop_core::core::gates::GateKind;
use sdlc_loop_core::core::gates::GateRunRow;
use sdlc_loop_core::core::identifiers::HeadSha;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::interfaces::GateStore;
use sdlc_loop_core::interfaces::StoreError;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

impl GateStore for SqliteStore {
    fn upsert_gate_run(&self, row: &GateRunRow) -> Result<(), StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let existing_version: Option<i64> = tx
            .query_row(
                "SELECT loop_version FROM gate_runs
                 WHERE loop_id = ?1 AND head_sha = ?2 AND gate_kind = ?3",
                params![row.loop_id.as_str(), row.head_sha.as_str(), codec::gate_kind_tag(row.gate_kind)],
                |r| r.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;

        let new_version = codec::u64_to_i64(row.loop_version).map_err(StoreError::from)?;
        if let Some(existing_version) = existing_version
            && existing_version > new_version
        {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(());
        }

        let row_json = codec::to_json(row).map_err(StoreError::from)?;
        tx.execute(
            "INSERT INTO gate_runs (loop_id, head_sha, gate_kind, loop_version, row_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(loop_id, head_sha, gate_kind) DO UPDATE SET
                loop_version = excluded.loop_version,
                row_json = excluded.row_json",
            params![
                row.loop_id.as_str(),
                row.head_sha.as_str(),
                codec::gate_kind_tag(row.gate_kind),
                new_version,
                row_json,
            ],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(())
    }

    fn latest_gate_run(
        &self,
        loop_id: &LoopId,
        head_sha: &HeadSha,
        gate_kind: GateKind,
    ) -> Result<Option<GateRunRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT row_json FROM gate_runs
                 WHERE loop_id = ?1 AND head_sha = ?2 AND gate_kind = ?3",
                params![loop_id.as_str(), head_sha.as_str(), codec::gate_kind_tag(gate_kind)],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        raw.map(|r| codec::from_json::<GateRunRow>(&r))
            .transpose()
            .map_err(StoreError::from)
    }

    fn replace_findings(
        &self,
        loop_id: &LoopId,
        head_sha: &HeadSha,
        findings: &[FindingRow],
    ) -> Result<(), StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        tx.execute(
            "DELETE FROM findings WHERE loop_id = ?1 AND head_sha = ?2",
            params![loop_id.as_str(), head_sha.as_str()],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;

        for finding in findings {
            let row_json = codec::to_json(finding).map_err(StoreError::from)?;
            tx.execute(
                "INSERT INTO findings (loop_id, head_sha, stable_finding_id, row_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    loop_id.as_str(),
                    head_sha.as_str(),
                    finding.stable_finding_id.as_str(),
                    row_json,
                ],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(())
    }

    fn delete_findings(&self, loop_id: &LoopId, head_sha: &HeadSha) -> Result<(), StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        conn.execute(
            "DELETE FROM findings WHERE loop_id = ?1 AND head_sha = ?2",
            params![loop_id.as_str(), head_sha.as_str()],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;
        Ok(())
    }
}
