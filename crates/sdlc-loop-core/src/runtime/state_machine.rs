// crates/sdlc-loop-core/src/runtime/state_machine.rs
// ============================================================================
// Module: SDLC Loop State Machine
// Description: Pure transition resolution and guarded-update decision logic.
// Purpose: Keep the entire phase/transition policy as deterministic,
// exhaustively-matched pure functions independent of any store.
// Dependencies: crate::core::state, crate::core::identifiers
// ============================================================================

//! ## Overview
//! [`resolve_next_state`] is the single source of truth for which event
//! moves a loop from one phase to another. [`persist_guarded_gate_loop_state`]
//! layers the row-state and head/version CAS guards and the fix-attempt
//! budget on top, and returns a decision a store turns into one conditional
//! `UPDATE`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::HeadSha;
use crate::core::state::LoopRow;
use crate::core::state::LoopState;
use crate::core::state::TransitionEvent;
use crate::core::state::VideoStatusUpdate;

// ============================================================================
// SECTION: Transition Resolution
// ============================================================================

/// Resolves the next state for `current_state` given `event`.
///
/// Evaluation order:
/// 1. `done` accepts only the four idempotent remap events; all else is a
///    stale no-op (`None`).
/// 2. Any other terminal state accepts nothing (`None`).
/// 3. Global overrides apply in any active state, ahead of per-state rules.
/// 4. Per-state forward/back transitions.
/// 5. No match is a stale no-op (`None`).
#[must_use]
pub fn resolve_next_state(current_state: LoopState, event: TransitionEvent) -> Option<LoopState> {
    if current_state == LoopState::Done {
        return match event {
            TransitionEvent::VideoCaptureSucceeded
            | TransitionEvent::VideoCaptureFailed
            | TransitionEvent::BabysitPassed
            | TransitionEvent::MarkDone => Some(LoopState::Done),
            _ => None,
        };
    }

    if current_state.is_terminal() {
        return None;
    }

    if let Some(overridden) = resolve_global_override(event) {
        return Some(overridden);
    }

    resolve_per_state_transition(current_state, event)
}

/// Resolves a global-override transition, if `event` is one.
///
/// Global overrides apply in any active state and take precedence over
/// per-state rules.
fn resolve_global_override(event: TransitionEvent) -> Option<LoopState> {
    match event {
        TransitionEvent::PrClosedUnmerged => Some(LoopState::TerminatedPrClosed),
        TransitionEvent::PrMerged => Some(LoopState::TerminatedPrMerged),
        TransitionEvent::ManualStop => Some(LoopState::Stopped),
        TransitionEvent::HumanFeedbackRequested => Some(LoopState::BlockedOnHumanFeedback),
        _ => None,
    }
}

/// Resolves a per-state forward/back transition.
fn resolve_per_state_transition(
    current_state: LoopState,
    event: TransitionEvent,
) -> Option<LoopState> {
    match current_state {
        LoopState::Planning => match event {
            TransitionEvent::PlanCompleted => Some(LoopState::Implementing),
            _ => None,
        },
        LoopState::Implementing => match event {
            TransitionEvent::ImplementationProgress => Some(LoopState::Implementing),
            TransitionEvent::ImplementationCompleted => Some(LoopState::Reviewing),
            _ => None,
        },
        LoopState::Reviewing => match event {
            TransitionEvent::ReviewBlocked
            | TransitionEvent::DeepReviewGateBlocked
            | TransitionEvent::CarmackReviewGateBlocked => Some(LoopState::Implementing),
            TransitionEvent::ReviewPassed => Some(LoopState::UiTesting),
            TransitionEvent::DeepReviewGatePassed | TransitionEvent::CarmackReviewGatePassed => {
                Some(LoopState::Reviewing)
            }
            _ => None,
        },
        LoopState::UiTesting => match event {
            TransitionEvent::UiSmokeFailed | TransitionEvent::VideoCaptureFailed => {
                Some(LoopState::Implementing)
            }
            TransitionEvent::PrLinked | TransitionEvent::VideoCaptureSucceeded => {
                Some(LoopState::PrBabysitting)
            }
            TransitionEvent::UiSmokePassed | TransitionEvent::VideoCaptureStarted => {
                Some(LoopState::UiTesting)
            }
            _ => None,
        },
        LoopState::PrBabysitting => {
            if event.is_blocked() {
                Some(LoopState::Implementing)
            } else if matches!(event, TransitionEvent::BabysitPassed | TransitionEvent::MarkDone) {
                Some(LoopState::Done)
            } else if event.is_positive_gate_event() {
                Some(LoopState::PrBabysitting)
            } else {
                None
            }
        }
        // `blocked_on_human_feedback` only leaves via a global override,
        // already handled above.
        LoopState::BlockedOnHumanFeedback => None,
        LoopState::TerminatedPrClosed
        | LoopState::TerminatedPrMerged
        | LoopState::Done
        | LoopState::Stopped => None,
    }
}

// ============================================================================
// SECTION: Guarded Update
// ============================================================================

/// Input to a guarded gate-driven state transition.
///
/// # Invariants
/// - `expected_state` must equal the row state observed by the caller before
///   this update is applied (the row-state CAS guard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateGuardedUpdate {
    /// State the caller observed before deciding to transition.
    pub expected_state: LoopState,
    /// Event driving the transition.
    pub event: TransitionEvent,
    /// Head SHA the caller's evaluation was performed against, if any.
    pub provided_head_sha: Option<HeadSha>,
    /// Loop version the caller's evaluation was performed against, if any.
    pub provided_loop_version: Option<u64>,
    /// Video-capture status fields to write atomically with the transition,
    /// if this update originates from a video-capture outcome.
    pub video_status: Option<VideoStatusUpdate>,
}

/// Outcome of a guarded gate-driven state transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedUpdateOutcome {
    /// The update applied; carries the resulting row.
    Updated(LoopRow),
    /// The loop was already terminal; no-op.
    TerminalNoop,
    /// A guard failed (stale row state, or stale head/version); no-op.
    StaleNoop,
}

/// Evaluates whether a head/version-guarded update may apply against
/// `current`.
///
/// Both guards must hold:
/// - `current.loop_version <= provided_loop_version`, and
/// - either `current.loop_version < provided_loop_version`, or
///   `current.current_head_sha` is `None`, or it equals `provided_head_sha`.
///
/// When the caller supplies neither `head_sha` nor `loop_version`, the guard
/// is vacuously satisfied.
#[must_use]
fn head_version_guard_holds(current: &LoopRow, update: &GateGuardedUpdate) -> bool {
    let Some(provided_loop_version) = update.provided_loop_version else {
        return true;
    };

    if current.loop_version > provided_loop_version {
        return false;
    }

    current.loop_version < provided_loop_version
        || current.current_head_sha.is_none()
        || current.current_head_sha.as_ref() == update.provided_head_sha.as_ref()
}

/// Resolves a guarded gate-driven transition against a loop row snapshot.
///
/// Applies the row-state CAS guard, the head/version guard, transition
/// resolution, the fix-attempt-budget escalation, and returns the decision a
/// store turns into one conditional `UPDATE`. The returned
/// [`GuardedUpdateOutcome::Updated`] row reflects the new state but the
/// store is responsible for actually persisting it under the same
/// conditions this function checked.
#[must_use]
pub fn persist_guarded_gate_loop_state(
    current: &LoopRow,
    update: &GateGuardedUpdate,
) -> GuardedUpdateOutcome {
    let done_accepts_idempotent_event = current.state == LoopState::Done
        && matches!(
            update.event,
            TransitionEvent::VideoCaptureSucceeded
                | TransitionEvent::VideoCaptureFailed
                | TransitionEvent::BabysitPassed
                | TransitionEvent::MarkDone
        );

    if current.state.is_terminal() && !done_accepts_idempotent_event {
        return GuardedUpdateOutcome::TerminalNoop;
    }

    if current.state != update.expected_state {
        return GuardedUpdateOutcome::StaleNoop;
    }

    if !head_version_guard_holds(current, update) {
        return GuardedUpdateOutcome::StaleNoop;
    }

    let Some(mut next_state) = resolve_next_state(current.state, update.event) else {
        return GuardedUpdateOutcome::StaleNoop;
    };

    let mut fix_attempt_count = current.fix_attempt_count;
    if update.event.increments_fix_attempt() {
        fix_attempt_count += 1;
        if fix_attempt_count > current.max_fix_attempts {
            next_state = LoopState::BlockedOnHumanFeedback;
        }
    }

    let mut next = current.clone();
    next.state = next_state;
    next.fix_attempt_count = fix_attempt_count;
    if let Some(provided_head_sha) = &update.provided_head_sha {
        next.current_head_sha = Some(provided_head_sha.clone());
    }
    if let Some(provided_loop_version) = update.provided_loop_version {
        next.loop_version = provided_loop_version;
    }
    if let Some(video_status) = &update.video_status {
        next.video_capture_status = video_status.video_capture_status;
        next.latest_video_artifact_key = video_status.latest_video_artifact_key.clone();
        next.latest_video_failure_class = video_status.latest_video_failure_class.clone();
        next.latest_video_failure_message = video_status.latest_video_failure_message.clone();
        next.latest_video_failed_at = video_status.latest_video_failed_at;
        next.latest_video_captured_at = video_status.latest_video_captured_at;
    }

    GuardedUpdateOutcome::Updated(next)
}
