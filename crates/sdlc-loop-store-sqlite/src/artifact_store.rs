// crates/sdlc-loop-store-sqlite/src/artifact_store.rs
// ============================================================================
// Module: SQLite Artifact Store
// Description: `ArtifactStore` implementation backed by the
// `phase_artifacts` and `plan_tasks` tables.
// Purpose: Persist phase artifacts with key-scoped supersession, approval
// CAS, and the plan task list an artifact decomposes into.
// Dependencies: rusqlite, sdlc_loop_core, crate::{codec, connection, error}
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use sdlc_loop_core::core::artifacts::ArtifactStatus;
use sdlc_loop_core::core::artifacts::PhaseArtifactRow;
use sdlc_loop_core::core::artifacts::PlanTaskRow;
use sdlc_loop_core::core::identifiers::ArtifactId;
use sdlc_loop_core::core::identifiers::UserId;
use sdlc_loop_core::interfaces::ArtifactStore;
use sdlc_loop_core::interfaces::StoreError;

use crate::codec;
use crate::connection::SqliteStore;
use crate::error::SqliteStoreError;

/// Loads a [`PhaseArtifactRow`] by id within an open connection.
fn load_artifact_row(
    conn: &rusqlite::Connection,
    artifact_id: &ArtifactId,
) -> Result<Option<PhaseArtifactRow>, SqliteStoreError> {
    conn.query_row(
        "SELECT row_json FROM phase_artifacts WHERE artifact_id = ?1",
        params![artifact_id.as_str()],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(SqliteStoreError::from)?
    .map(|raw| codec::from_json::<PhaseArtifactRow>(&raw))
    .transpose()
}

impl ArtifactStore for SqliteStore {
    fn create_plan_artifact(&self, artifact: &PhaseArtifactRow) -> Result<(), StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let siblings: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT artifact_id, row_json FROM phase_artifacts
                     WHERE loop_id = ?1 AND phase = ?2
                       AND (head_sha IS ?3)
                       AND status != 'superseded'",
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            let rows = stmt
                .query_map(
                    params![
                        artifact.loop_id.as_str(),
                        codec::phase_tag(artifact.phase),
                        artifact.head_sha.as_ref().map(sdlc_loop_core::core::identifiers::HeadSha::as_str),
                    ],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(SqliteStoreError::from)
                .map_err(StoreError::from)?
        };

        for (sibling_id, sibling_json) in siblings {
            let mut sibling: PhaseArtifactRow = codec::from_json(&sibling_json).map_err(StoreError::from)?;
            sibling.status = ArtifactStatus::Superseded;
            let updated_json = codec::to_json(&sibling).map_err(StoreError::from)?;
            tx.execute(
                "UPDATE phase_artifacts SET status = ?1, row_json = ?2 WHERE artifact_id = ?3",
                params![codec::artifact_status_tag(ArtifactStatus::Superseded), updated_json, sibling_id],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        let row_json = codec::to_json(artifact).map_err(StoreError::from)?;
        tx.execute(
            "INSERT INTO phase_artifacts (
                artifact_id, loop_id, phase, head_sha, status, created_at_ms, row_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                artifact.artifact_id.as_str(),
                artifact.loop_id.as_str(),
                codec::phase_tag(artifact.phase),
                artifact.head_sha.as_ref().map(sdlc_loop_core::core::identifiers::HeadSha::as_str),
                codec::artifact_status_tag(artifact.status),
                artifact.created_at.unix_millis(),
                row_json,
            ],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(())
    }

    fn get_artifact(&self, artifact_id: &ArtifactId) -> Result<Option<PhaseArtifactRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        load_artifact_row(&conn, artifact_id).map_err(StoreError::from)
    }

    fn approve_plan_artifact(
        &self,
        artifact_id: &ArtifactId,
        approved_by_user_id: &UserId,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        let Some(mut artifact) = load_artifact_row(&tx, artifact_id).map_err(StoreError::from)? else {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(false);
        };

        if artifact.status != ArtifactStatus::Generated {
            tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            return Ok(false);
        }

        artifact.status = ArtifactStatus::Approved;
        artifact.approved_by_user_id = Some(approved_by_user_id.clone());
        let updated_json = codec::to_json(&artifact).map_err(StoreError::from)?;

        let affected = tx
            .execute(
                "UPDATE phase_artifacts SET status = ?1, row_json = ?2
                 WHERE artifact_id = ?3 AND status = 'generated'",
                params![codec::artifact_status_tag(ArtifactStatus::Approved), updated_json, artifact_id.as_str()],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(affected == 1)
    }

    fn replace_plan_tasks(&self, artifact_id: &ArtifactId, tasks: &[PlanTaskRow]) -> Result<(), StoreError> {
        let mut conn = self.lock().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(SqliteStoreError::from).map_err(StoreError::from)?;

        tx.execute(
            "DELETE FROM plan_tasks WHERE artifact_id = ?1",
            params![artifact_id.as_str()],
        )
        .map_err(SqliteStoreError::from)
        .map_err(StoreError::from)?;

        for task in tasks {
            let row_json = codec::to_json(task).map_err(StoreError::from)?;
            tx.execute(
                "INSERT INTO plan_tasks (artifact_id, stable_task_id, row_json) VALUES (?1, ?2, ?3)",
                params![artifact_id.as_str(), task.stable_task_id.as_str(), row_json],
            )
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        }

        tx.commit().map_err(SqliteStoreError::from).map_err(StoreError::from)?;
        Ok(())
    }

    fn get_plan_tasks(&self, artifact_id: &ArtifactId) -> Result<Vec<PlanTaskRow>, StoreError> {
        let conn = self.lock().map_err(StoreError::from)?;
        let mut stmt = conn
            .prepare("SELECT row_json FROM plan_tasks WHERE artifact_id = ?1")
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![artifact_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(SqliteStoreError::from)
            .map_err(StoreError::from)?;
        rows.map(|raw| {
            let raw = raw.map_err(SqliteStoreError::from).map_err(StoreError::from)?;
            codec::from_json::<PlanTaskRow>(&raw).map_err(StoreError::from)
        })
        .collect()
    }
}
