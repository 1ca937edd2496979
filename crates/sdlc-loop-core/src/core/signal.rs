// crates/sdlc-loop-core/src/core/signal.rs
// ============================================================================
// Module: SDLC Loop Signal Inbox
// Description: Cause type and signal inbox row shapes.
// Purpose: Model the per-loop queue of external signals awaiting dispatch.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Every external event that might move a loop forward is first normalized
//! into a canonical cause (see [`crate::runtime::cause`]) and queued as a
//! signal inbox row. Workers drain this queue oldest-first per loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::CanonicalCauseId;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::SignalId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Cause Type
// ============================================================================

/// The external event kind a canonical cause was derived from.
///
/// # Invariants
/// - Variants are stable for serialization and match the encoding table in
///   [`crate::runtime::cause`] one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseType {
    /// A sandbox daemon terminal event.
    DaemonTerminal,
    /// A GitHub `check_run.completed` webhook.
    CheckRunCompleted,
    /// A GitHub `check_suite.completed` webhook.
    CheckSuiteCompleted,
    /// A GitHub `pull_request.synchronize` webhook.
    PullRequestSynchronize,
    /// A GitHub `pull_request.closed` webhook.
    PullRequestClosed,
    /// A GitHub `pull_request.reopened` webhook.
    PullRequestReopened,
    /// A GitHub `pull_request.edited` webhook.
    PullRequestEdited,
    /// A GitHub `pull_request_review` webhook.
    PullRequestReview,
    /// A GitHub `pull_request_review_comment` webhook.
    PullRequestReviewComment,
    /// A synthetic signal produced by polling for unresolved review threads.
    ReviewThreadPollSynthetic,
}

// ============================================================================
// SECTION: Signal Inbox Row
// ============================================================================

/// Persisted representation of one queued signal.
///
/// # Invariants
/// - `(loop_id, canonical_cause_id)` is unique.
/// - At most one row in an unprocessed state per cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalInboxRow {
    /// Signal row identifier.
    pub signal_id: SignalId,
    /// Owning loop.
    pub loop_id: LoopId,
    /// External event kind this signal was derived from.
    pub cause_type: CauseType,
    /// Deterministic identifier for the originating external event instance.
    pub canonical_cause_id: CanonicalCauseId,
    /// Opaque signal payload.
    pub payload: Value,
    /// Timestamp the signal was received.
    pub received_at: Timestamp,
    /// Timestamp the signal was processed, if processed.
    pub processed_at: Option<Timestamp>,
    /// Version of the cause-identity derivation used to produce this row.
    pub cause_identity_version: u32,
}

/// Current cause-identity derivation version.
pub const CAUSE_IDENTITY_VERSION: u32 = 1;
