// crates/sdlc-loop-core/src/core/outbox.rs
// ============================================================================
// Module: SDLC Loop Outbox
// Description: Outbox row, attempt ledger, action types, and supersession
// groups.
// Purpose: Model the at-least-once transactional outbox data shapes.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The outbox carries side effects (publications, fix-task enqueues,
//! telemetry) produced by a state transition to eventual external delivery.
//! This module defines the row shapes; [`crate::runtime::outbox`] holds the
//! pure backoff/supersession logic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ActionKey;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::OutboxId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Type and Supersession Group
// ============================================================================

/// Kind of side effect an outbox row carries.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Publish or refresh the loop's canonical status comment.
    PublishStatusComment,
    /// Publish or refresh the loop's canonical check summary.
    PublishCheckSummary,
    /// Enqueue a follow-up fix task to the agent.
    EnqueueFixTask,
    /// Publish a link to the captured UI-testing video.
    PublishVideoLink,
    /// Emit a telemetry event.
    EmitTelemetry,
}

/// Equivalence class of interchangeable outbox actions.
///
/// A newer transition cancels pending/running siblings in the same group.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersessionGroup {
    /// Status comment and check summary publications share intent.
    PublicationStatus,
    /// Fix-task enqueue actions.
    FixTaskEnqueue,
    /// Video-link publication actions.
    PublicationVideo,
    /// Telemetry emission actions.
    Telemetry,
}

impl ActionType {
    /// Returns the fixed supersession group for this action type.
    #[must_use]
    pub const fn supersession_group(self) -> SupersessionGroup {
        match self {
            Self::PublishStatusComment | Self::PublishCheckSummary => {
                SupersessionGroup::PublicationStatus
            }
            Self::EnqueueFixTask => SupersessionGroup::FixTaskEnqueue,
            Self::PublishVideoLink => SupersessionGroup::PublicationVideo,
            Self::EmitTelemetry => SupersessionGroup::Telemetry,
        }
    }
}

// ============================================================================
// SECTION: Outbox Row Status
// ============================================================================

/// Lifecycle status of an outbox row.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Awaiting claim.
    Pending,
    /// Claimed by a worker and executing.
    Running,
    /// Executed successfully.
    Completed,
    /// Exhausted its retry budget.
    Failed,
    /// Canceled, typically by supersession or manual stop.
    Canceled,
}

/// Reason an outbox row was canceled.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanceledReason {
    /// A newer transition produced an equivalent action.
    SupersededByNewerTransition,
    /// The owning loop was manually stopped.
    CanceledDueToStop,
}

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// Classification of an outbox attempt failure.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Authentication or authorization failure against the external system.
    Auth,
    /// Rate limit or quota exhaustion.
    Quota,
    /// A scripted interaction (e.g. browser automation) failed.
    Script,
    /// Infrastructure or transport failure.
    Infra,
    /// Unclassified failure.
    Unknown,
}

// ============================================================================
// SECTION: Outbox Row
// ============================================================================

/// Persisted representation of an outbox row.
///
/// # Invariants
/// - `(loop_id, action_key)` is unique.
/// - A row in `Canceled` with `canceled_reason = SupersededByNewerTransition`
///   is never claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRow {
    /// Outbox row identifier.
    pub outbox_id: OutboxId,
    /// Owning loop.
    pub loop_id: LoopId,
    /// Monotonically increasing sequence number of the producing transition.
    pub transition_seq: u64,
    /// Kind of side effect this row carries.
    pub action_type: ActionType,
    /// Supersession group derived from `action_type`.
    pub supersession_group: SupersessionGroup,
    /// Key unique within the owning loop.
    pub action_key: ActionKey,
    /// Opaque action payload.
    pub payload: Value,
    /// Current lifecycle status.
    pub status: OutboxStatus,
    /// Number of claim attempts made so far.
    pub attempt_count: u32,
    /// Earliest time the row may be claimed again after a retriable failure.
    pub next_retry_at: Option<Timestamp>,
    /// Lease owner token that currently holds this row, if running.
    pub claimed_by: Option<String>,
    /// Timestamp of the most recent claim.
    pub claimed_at: Option<Timestamp>,
    /// Timestamp of successful completion.
    pub completed_at: Option<Timestamp>,
    /// Error classification of the most recent failed attempt.
    pub last_error_class: Option<ErrorClass>,
    /// Caller-supplied error code of the most recent failed attempt.
    pub last_error_code: Option<String>,
    /// Truncated error message of the most recent failed attempt.
    pub last_error_message: Option<String>,
    /// Identifier of the row that superseded this one, if canceled.
    pub superseded_by_outbox_id: Option<OutboxId>,
    /// Reason this row was canceled, if canceled.
    pub canceled_reason: Option<CanceledReason>,
    /// Timestamp the row was created.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Outbox Attempt
// ============================================================================

/// Status recorded for a single outbox attempt.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The attempt completed successfully.
    Completed,
    /// The attempt failed but a retry was scheduled.
    RetryScheduled,
    /// The attempt failed and no further retry will occur.
    Failed,
}

/// Append-only per-attempt audit row.
///
/// # Invariants
/// - Never deleted; attempt numbers are unique within an outbox row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxAttempt {
    /// Owning outbox row.
    pub outbox_id: OutboxId,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Outcome of this attempt.
    pub status: AttemptStatus,
    /// Error classification, if the attempt failed.
    pub error_class: Option<ErrorClass>,
    /// Caller-supplied error code, if the attempt failed.
    pub error_code: Option<String>,
    /// Truncated error message (max 1000 chars), if the attempt failed.
    pub error_message: Option<String>,
    /// Time the next retry is scheduled for, if any.
    pub retry_at: Option<Timestamp>,
}

/// Maximum length an outbox error message is truncated to before storage.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// Trims and truncates an error message to [`MAX_ERROR_MESSAGE_LEN`] chars.
#[must_use]
pub fn normalize_error_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}

// ============================================================================
// SECTION: Enqueue Request
// ============================================================================

/// Input to [`crate::interfaces::OutboxStore::enqueue`].
///
/// # Invariants
/// - `action_key` must be unique within `loop_id`; re-use upserts the
///   existing row to a fresh `pending` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionKeyedEnqueue {
    /// Owning loop.
    pub loop_id: LoopId,
    /// Sequence number of the transition producing this action.
    pub transition_seq: u64,
    /// Kind of side effect to enqueue.
    pub action_type: ActionType,
    /// Key unique within the owning loop.
    pub action_key: ActionKey,
    /// Opaque action payload.
    pub payload: Value,
}
