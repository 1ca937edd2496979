// crates/sdlc-loop-store-sqlite/src/codec.rs
// ============================================================================
// Module: Row Codec Helpers
// Description: JSON (de)serialization and wire-tag helpers shared by every
// trait impl in this crate.
// Purpose: Keep the canonical-JSON-snapshot pattern (full row as JSON, plus
// a few indexed plain columns) consistent across every table.
// Dependencies: rusqlite, serde, serde_json, sdlc_loop_core
// ============================================================================

use sdlc_loop_core::core::artifacts::ArtifactStatus;
use sdlc_loop_core::core::artifacts::Phase;
use sdlc_loop_core::core::gates::GateKind;
use sdlc_loop_core::core::outbox::OutboxStatus;
use sdlc_loop_core::core::outbox::SupersessionGroup;
use sdlc_loop_core::core::state::LoopState;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SqliteStoreError;

/// Serializes a row to its canonical JSON snapshot.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(SqliteStoreError::from)
}

/// Deserializes a row from its canonical JSON snapshot.
pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(raw).map_err(SqliteStoreError::from)
}

/// Converts a `rusqlite` lookup into `Ok(None)` on an empty result set
/// instead of propagating [`rusqlite::Error::QueryReturnedNoRows`].
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, SqliteStoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(SqliteStoreError::from(err)),
    }
}

/// Stable wire tag for a [`LoopState`], matching its `snake_case` serde form.
pub(crate) const fn loop_state_tag(state: LoopState) -> &'static str {
    match state {
        LoopState::Planning => "planning",
        LoopState::Implementing => "implementing",
        LoopState::Reviewing => "reviewing",
        LoopState::UiTesting => "ui_testing",
        LoopState::PrBabysitting => "pr_babysitting",
        LoopState::BlockedOnHumanFeedback => "blocked_on_human_feedback",
        LoopState::TerminatedPrClosed => "terminated_pr_closed",
        LoopState::TerminatedPrMerged => "terminated_pr_merged",
        LoopState::Done => "done",
        LoopState::Stopped => "stopped",
    }
}

/// Stable wire tag for a [`GateKind`], matching its `snake_case` serde form.
pub(crate) const fn gate_kind_tag(kind: GateKind) -> &'static str {
    match kind {
        GateKind::Ci => "ci",
        GateKind::ReviewThread => "review_thread",
        GateKind::DeepReview => "deep_review",
        GateKind::CarmackReview => "carmack_review",
    }
}

/// Stable wire tag for a [`Phase`], matching its `snake_case` serde form.
pub(crate) const fn phase_tag(phase: Phase) -> &'static str {
    match phase {
        Phase::Planning => "planning",
        Phase::Implementing => "implementing",
        Phase::Reviewing => "reviewing",
        Phase::UiTesting => "ui_testing",
        Phase::PrLinking => "pr_linking",
        Phase::PrBabysitting => "pr_babysitting",
    }
}

/// Stable wire tag for an [`OutboxStatus`], matching its `snake_case` serde
/// form.
pub(crate) const fn outbox_status_tag(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Running => "running",
        OutboxStatus::Completed => "completed",
        OutboxStatus::Failed => "failed",
        OutboxStatus::Canceled => "canceled",
    }
}

/// Stable wire tag for a [`SupersessionGroup`], matching its `snake_case`
/// serde form.
pub(crate) const fn supersession_group_tag(group: SupersessionGroup) -> &'static str {
    match group {
        SupersessionGroup::PublicationStatus => "publication_status",
        SupersessionGroup::FixTaskEnqueue => "fix_task_enqueue",
        SupersessionGroup::PublicationVideo => "publication_video",
        SupersessionGroup::Telemetry => "telemetry",
    }
}

/// Stable wire tag for an [`ArtifactStatus`], matching its `snake_case`
/// serde form.
pub(crate) const fn artifact_status_tag(status: ArtifactStatus) -> &'static str {
    match status {
        ArtifactStatus::Generated => "generated",
        ArtifactStatus::Approved => "approved",
        ArtifactStatus::Accepted => "accepted",
        ArtifactStatus::Superseded => "superseded",
    }
}

/// Narrows a `u64` into the `i64` `SQLite` uses for `INTEGER` columns.
pub(crate) fn u64_to_i64(value: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(value)
        .map_err(|_overflow| SqliteStoreError::Invalid(format!("value {value} does not fit in i64")))
}

/// Widens the `i64` `SQLite` returns for an `INTEGER` column back to `u64`.
pub(crate) fn i64_to_u64(value: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(value)
        .map_err(|_negative| SqliteStoreError::Invalid(format!("negative value {value} for u64 column")))
}

/// Narrows a `u32` into the `i64` `SQLite` uses for `INTEGER` columns.
pub(crate) fn u32_to_i64(value: u32) -> i64 {
    i64::from(value)
}

/// Widens the `i64` `SQLite` returns for an `INTEGER` column back to `u32`.
pub(crate) fn i64_to_u32(value: i64) -> Result<u32, SqliteStoreError> {
    u32::try_from(value)
        .map_err(|_out_of_range| SqliteStoreError::Invalid(format!("value {value} does not fit in u32")))
}

/// Returns the current wall-clock time as a [`sdlc_loop_core::core::time::Timestamp`].
///
/// Used only for the handful of store operations (`enqueue`, `complete`)
/// whose trait signature has no explicit `now` parameter; every
/// decision-bearing computation still takes `now` explicitly.
pub(crate) fn now() -> sdlc_loop_core::core::time::Timestamp {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    sdlc_loop_core::core::time::Timestamp::from_unix_millis(millis)
}
