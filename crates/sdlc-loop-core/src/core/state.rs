// crates/sdlc-loop-core/src/core/state.rs
// ============================================================================
// Module: SDLC Loop State
// Description: Loop row, lease row, lifecycle state, and transition events.
// Purpose: Capture the loop's phase and the events that move it between
// phases, independent of how a store persists them.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A loop is the persistent coordinator for a single pull request under
//! automated iteration. This module defines its lifecycle state, the events
//! that drive transitions, and the row shapes a store persists. Resolving
//! transitions is handled in [`crate::runtime::state_machine`]; this module
//! only defines the data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::HeadSha;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::RepoFullName;
use crate::core::identifiers::ThreadId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Plan Approval Policy
// ============================================================================

/// Governs which artifact status is required to leave the planning phase.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanApprovalPolicy {
    /// A plan artifact reaching `accepted` is sufficient to advance.
    Auto,
    /// A plan artifact must reach `approved` by a human before advancing.
    HumanRequired,
}

// ============================================================================
// SECTION: Loop State
// ============================================================================

/// Lifecycle state of a loop.
///
/// This workspace implements the clean five-primary-state set plus
/// `blocked_on_human_feedback`, omitting the legacy migration states; see
/// `DESIGN.md` for the rationale.
///
/// # Invariants
/// - [`LoopState::is_terminal`] states never transition to a non-terminal
///   state once reached, except the idempotent `done -> done` remaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Drafting and approving the implementation plan.
    Planning,
    /// The agent is implementing the plan.
    Implementing,
    /// Gate evaluators are reviewing the implementation.
    Reviewing,
    /// UI smoke testing and video capture are running.
    UiTesting,
    /// The PR has been linked and is awaiting merge-readiness gates.
    PrBabysitting,
    /// A global override parked the loop for human attention.
    BlockedOnHumanFeedback,
    /// Terminal: the PR was closed without merging.
    TerminatedPrClosed,
    /// Terminal: the PR was merged.
    TerminatedPrMerged,
    /// Terminal: the loop completed successfully.
    Done,
    /// Terminal: the loop was manually stopped.
    Stopped,
}

impl LoopState {
    /// Returns whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::TerminatedPrClosed | Self::TerminatedPrMerged | Self::Done | Self::Stopped
        )
    }
}

// ============================================================================
// SECTION: Transition Events
// ============================================================================

/// Events that drive loop state transitions.
///
/// # Invariants
/// - Variants are stable for serialization; [`crate::runtime::state_machine::resolve_next_state`]
///   matches exhaustively over this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEvent {
    /// The plan artifact was approved/accepted.
    PlanCompleted,
    /// The agent reported incremental implementation progress.
    ImplementationProgress,
    /// The agent reported the implementation as complete.
    ImplementationCompleted,
    /// Human or deep review marked the change blocked.
    ReviewBlocked,
    /// Human or automated review passed.
    ReviewPassed,
    /// The CI gate passed.
    CiGatePassed,
    /// The CI gate blocked.
    CiGateBlocked,
    /// The review-thread gate passed.
    ReviewThreadGatePassed,
    /// The review-thread gate blocked.
    ReviewThreadGateBlocked,
    /// The deep-review gate passed.
    DeepReviewGatePassed,
    /// The deep-review gate blocked.
    DeepReviewGateBlocked,
    /// The Carmack review gate passed.
    CarmackReviewGatePassed,
    /// The Carmack review gate blocked.
    CarmackReviewGateBlocked,
    /// UI smoke testing passed.
    UiSmokePassed,
    /// UI smoke testing failed.
    UiSmokeFailed,
    /// Video capture started.
    VideoCaptureStarted,
    /// Video capture succeeded.
    VideoCaptureSucceeded,
    /// Video capture failed.
    VideoCaptureFailed,
    /// The PR was linked to the loop.
    PrLinked,
    /// A babysitting-phase gate blocked.
    BabysitBlocked,
    /// Babysitting gates all passed.
    BabysitPassed,
    /// Explicit operator request to mark the loop done.
    MarkDone,
    /// The PR was closed without merging.
    PrClosedUnmerged,
    /// The PR was merged.
    PrMerged,
    /// An operator requested a manual stop.
    ManualStop,
    /// A human explicitly requested to take over feedback handling.
    HumanFeedbackRequested,
}

impl TransitionEvent {
    /// Returns whether this event represents a gate or review blocking outcome.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::ReviewBlocked
                | Self::CiGateBlocked
                | Self::ReviewThreadGateBlocked
                | Self::DeepReviewGateBlocked
                | Self::CarmackReviewGateBlocked
                | Self::BabysitBlocked
        )
    }

    /// Returns whether this event represents a positive gate outcome that
    /// should not by itself advance the loop out of `pr_babysitting`.
    #[must_use]
    pub const fn is_positive_gate_event(self) -> bool {
        matches!(
            self,
            Self::CiGatePassed
                | Self::ReviewThreadGatePassed
                | Self::DeepReviewGatePassed
                | Self::CarmackReviewGatePassed
        )
    }

    /// Returns whether this event increments `fixAttemptCount` when applied.
    #[must_use]
    pub const fn increments_fix_attempt(self) -> bool {
        matches!(
            self,
            Self::ReviewBlocked
                | Self::UiSmokeFailed
                | Self::BabysitBlocked
                | Self::CiGateBlocked
                | Self::ReviewThreadGateBlocked
                | Self::DeepReviewGateBlocked
                | Self::CarmackReviewGateBlocked
        )
    }
}

// ============================================================================
// SECTION: Video Capture Status
// ============================================================================

/// Status of the most recent video-capture attempt for a loop.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCaptureStatus {
    /// No capture has run yet.
    NotStarted,
    /// A capture is in flight.
    Started,
    /// The most recent capture succeeded.
    Succeeded,
    /// The most recent capture failed.
    Failed,
}

// ============================================================================
// SECTION: Loop Row
// ============================================================================

/// Persisted representation of a loop.
///
/// # Invariants
/// - `loop_id` is unique.
/// - `(user_id, thread_id)` has at most one row in an active (non-terminal)
///   state.
/// - `loop_version` is monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRow {
    /// Loop identifier.
    pub loop_id: LoopId,
    /// Owning user.
    pub user_id: UserId,
    /// Repository full name (`owner/name`).
    pub repo_full_name: RepoFullName,
    /// Pull request number, if linked.
    pub pr_number: Option<u64>,
    /// Thread identifier the loop is attached to.
    pub thread_id: ThreadId,
    /// Current lifecycle state.
    pub state: LoopState,
    /// Governs the required plan-artifact status to leave planning.
    pub plan_approval_policy: PlanApprovalPolicy,
    /// Commit SHA at the tip of the PR branch under evaluation.
    pub current_head_sha: Option<HeadSha>,
    /// Monotonically non-decreasing version bumped on each head-SHA change.
    pub loop_version: u64,
    /// Number of times the loop has looped back from a blocked gate.
    pub fix_attempt_count: u32,
    /// Upper bound on `fix_attempt_count` before escalating to a human.
    pub max_fix_attempts: u32,
    /// Active planning-phase artifact, if any.
    pub active_planning_artifact_id: Option<ArtifactId>,
    /// Active implementing-phase artifact, if any.
    pub active_implementing_artifact_id: Option<ArtifactId>,
    /// Active reviewing-phase artifact, if any.
    pub active_reviewing_artifact_id: Option<ArtifactId>,
    /// Active UI-testing-phase artifact, if any.
    pub active_ui_testing_artifact_id: Option<ArtifactId>,
    /// Active PR-linking-phase artifact, if any.
    pub active_pr_linking_artifact_id: Option<ArtifactId>,
    /// Active PR-babysitting-phase artifact, if any.
    pub active_pr_babysitting_artifact_id: Option<ArtifactId>,
    /// Identifier of the canonical, single status comment this loop maintains.
    pub canonical_status_comment_id: Option<String>,
    /// Identifier of the canonical, single check run this loop maintains.
    pub canonical_check_run_id: Option<String>,
    /// Status of the most recent video-capture attempt.
    pub video_capture_status: VideoCaptureStatus,
    /// Object-store key of the most recent successful video artifact.
    pub latest_video_artifact_key: Option<String>,
    /// Classification of the most recent video-capture failure.
    pub latest_video_failure_class: Option<String>,
    /// Raw error message of the most recent video-capture failure.
    pub latest_video_failure_message: Option<String>,
    /// Timestamp of the most recent video-capture failure.
    pub latest_video_failed_at: Option<Timestamp>,
    /// Timestamp of the most recent successful video capture.
    pub latest_video_captured_at: Option<Timestamp>,
    /// Reason recorded when the loop was manually stopped.
    pub stop_reason: Option<String>,
    /// Timestamp the loop row was created.
    pub created_at: Timestamp,
    /// Timestamp the loop row was last updated.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Video Status Update
// ============================================================================

/// Video-capture status fields written alongside a guarded state transition.
///
/// # Invariants
/// - Applied only when the owning [`crate::runtime::state_machine::GateGuardedUpdate`]
///   resolves to [`crate::runtime::state_machine::GuardedUpdateOutcome::Updated`];
///   a guard failure leaves the prior video fields untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatusUpdate {
    /// New video-capture status.
    pub video_capture_status: VideoCaptureStatus,
    /// Object-store key of the captured artifact, on success.
    pub latest_video_artifact_key: Option<String>,
    /// Classification of the failure, on failure.
    pub latest_video_failure_class: Option<String>,
    /// Raw error message of the failure, on failure.
    pub latest_video_failure_message: Option<String>,
    /// Timestamp of the failure, on failure.
    pub latest_video_failed_at: Option<Timestamp>,
    /// Timestamp of the successful capture, on success.
    pub latest_video_captured_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Loop Lease
// ============================================================================

/// Persisted representation of a loop's mutex lease.
///
/// # Invariants
/// - One row per loop.
/// - `lease_epoch` is monotonically increasing across acquires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopLeaseRow {
    /// Owning loop.
    pub loop_id: LoopId,
    /// Current lease holder token, if held.
    pub lease_owner: Option<String>,
    /// Monotonic epoch incremented on every acquire or steal.
    pub lease_epoch: u64,
    /// Expiry of the current lease.
    pub lease_expires_at: Option<Timestamp>,
}
