// crates/sdlc-loop-core/src/controller.rs
// ============================================================================
// Module: SDLC Loop Controller Facade
// Description: Control-plane operations composed over the store traits.
// Purpose: Expose enroll/lookup/approve/stop as plain methods a binary's
// inbound handlers call directly, without re-deriving the store composition
// at every call site.
// Dependencies: crate::core, crate::interfaces, crate::runtime::state_machine
// ============================================================================

//! ## Overview
//! [`LoopController`] borrows the store traits it needs for the lifetime of
//! a request; it performs no I/O beyond calling into them, so it composes
//! however a binary assembles its concrete stores (one SQLite connection
//! implementing all traits, or separate stores per concern).

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::gates::CiCapabilityState;
use crate::core::gates::GateKind;
use crate::core::gates::GateRunDetail;
use crate::core::gates::GateRunRow;
use crate::core::gates::GateStatus;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::HeadSha;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::RepoFullName;
use crate::core::identifiers::ThreadId;
use crate::core::identifiers::UserId;
use crate::core::state::LoopRow;
use crate::core::state::LoopState;
use crate::core::state::PlanApprovalPolicy;
use crate::core::state::TransitionEvent;
use crate::core::state::VideoCaptureStatus;
use crate::core::state::VideoStatusUpdate;
use crate::core::time::Timestamp;
use crate::interfaces::ArtifactStore;
use crate::interfaces::GateStore;
use crate::interfaces::LoopStore;
use crate::interfaces::OutboxStore;
use crate::interfaces::StoreError;
use crate::runtime::gates::compute_failing_required_checks;
use crate::runtime::gates::decide_ci_gate_status;
use crate::runtime::gates::decide_llm_gate_passed;
use crate::runtime::gates::decide_review_thread_gate_status;
use crate::runtime::gates::can_run_carmack_review;
use crate::runtime::gates::classify_video_capture_failure;
use crate::runtime::gates::normalize_findings;
use crate::runtime::gates::resolve_required_checks;
use crate::runtime::gates::validate_raw_gate_output;
use crate::runtime::state_machine::GateGuardedUpdate;
use crate::runtime::state_machine::GuardedUpdateOutcome;

/// Default fix-attempt budget for a newly enrolled loop.
pub const DEFAULT_MAX_FIX_ATTEMPTS: u32 = 3;

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Facade composing the store traits behind the control-plane operations.
pub struct LoopController<'a> {
    loops: &'a dyn LoopStore,
    artifacts: &'a dyn ArtifactStore,
    outbox: &'a dyn OutboxStore,
    gates: &'a dyn GateStore,
}

impl<'a> LoopController<'a> {
    /// Builds a controller over the given store implementations.
    #[must_use]
    pub const fn new(
        loops: &'a dyn LoopStore,
        artifacts: &'a dyn ArtifactStore,
        outbox: &'a dyn OutboxStore,
        gates: &'a dyn GateStore,
    ) -> Self {
        Self { loops, artifacts, outbox, gates }
    }

    /// Enrolls a new loop for `(repo_full_name, pr_number)`/`(user_id, thread_id)`.
    ///
    /// Callers are responsible for minting a fresh, never-reused [`LoopId`]
    /// and for checking [`Self::get_active_loop_for_pr`]/
    /// [`Self::get_active_loop_for_thread`] first, since this method does not
    /// itself enforce the at-most-one-active-loop invariant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    #[allow(clippy::too_many_arguments, reason = "mirrors the enroll(...) control-plane operation's full parameter set")]
    pub fn enroll(
        &self,
        loop_id: LoopId,
        user_id: UserId,
        repo_full_name: RepoFullName,
        pr_number: Option<u64>,
        thread_id: ThreadId,
        plan_approval_policy: PlanApprovalPolicy,
        max_fix_attempts: u32,
        now: Timestamp,
    ) -> Result<LoopRow, StoreError> {
        let loop_row = LoopRow {
            loop_id,
            user_id,
            repo_full_name,
            pr_number,
            thread_id,
            state: LoopState::Planning,
            plan_approval_policy,
            current_head_sha: None,
            loop_version: 0,
            fix_attempt_count: 0,
            max_fix_attempts,
            active_planning_artifact_id: None,
            active_implementing_artifact_id: None,
            active_reviewing_artifact_id: None,
            active_ui_testing_artifact_id: None,
            active_pr_linking_artifact_id: None,
            active_pr_babysitting_artifact_id: None,
            canonical_status_comment_id: None,
            canonical_check_run_id: None,
            video_capture_status: VideoCaptureStatus::NotStarted,
            latest_video_artifact_key: None,
            latest_video_failure_class: None,
            latest_video_failure_message: None,
            latest_video_failed_at: None,
            latest_video_captured_at: None,
            stop_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.loops.insert_loop(&loop_row)?;
        Ok(loop_row)
    }

    /// Finds the at-most-one active loop for `(repo_full_name, pr_number)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    pub fn get_active_loop_for_pr(
        &self,
        repo_full_name: &RepoFullName,
        pr_number: u64,
    ) -> Result<Option<LoopRow>, StoreError> {
        self.loops.get_active_loop_for_pr(repo_full_name, pr_number)
    }

    /// Finds the at-most-one active loop for `(user_id, thread_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    pub fn get_active_loop_for_thread(
        &self,
        user_id: &UserId,
        thread_id: &ThreadId,
    ) -> Result<Option<LoopRow>, StoreError> {
        self.loops.get_active_loop_for_thread(user_id, thread_id)
    }

    /// Approves a planning-phase artifact, CAS-transitioning it from
    /// `{generated, accepted}` to `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    pub fn approve_plan(&self, artifact_id: &ArtifactId, approved_by_user_id: &UserId) -> Result<bool, StoreError> {
        self.artifacts.approve_plan_artifact(artifact_id, approved_by_user_id)
    }

    /// Manually stops a loop: applies the `manual_stop` global override and
    /// cancels every pending/running outbox row for it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when either the transition or the cancellation
    /// fails outright.
    pub fn manual_stop(
        &self,
        loop_id: &LoopId,
        expected_state: LoopState,
        reason: &str,
    ) -> Result<GuardedUpdateOutcome, StoreError> {
        let outcome = self.loops.apply_guarded_transition(
            loop_id,
            &GateGuardedUpdate {
                expected_state,
                event: TransitionEvent::ManualStop,
                provided_head_sha: None,
                provided_loop_version: None,
                video_status: None,
            },
        )?;
        if matches!(outcome, GuardedUpdateOutcome::Updated(_)) {
            self.outbox.cancel_all_for_loop(loop_id, reason)?;
        }
        Ok(outcome)
    }

    /// Evaluates and persists a CI gate run, transitioning the loop when the
    /// provider reported a capability-supported result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying persistence fails outright.
    #[allow(clippy::too_many_arguments, reason = "mirrors the CI gate evaluation's full input set")]
    pub fn persist_ci_gate_evaluation(
        &self,
        loop_id: &LoopId,
        expected_state: LoopState,
        head_sha: &HeadSha,
        loop_version: u64,
        capability_state: CiCapabilityState,
        ruleset_checks: &[String],
        branch_protection_checks: &[String],
        allowlist_checks: &[String],
        failing_checks: &[String],
        trigger_event: &str,
        now: Timestamp,
    ) -> Result<GateEvaluationOutcome, StoreError> {
        persist_ci_gate_evaluation(
            self.loops,
            self.gates,
            loop_id,
            expected_state,
            head_sha,
            loop_version,
            capability_state,
            ruleset_checks,
            branch_protection_checks,
            allowlist_checks,
            failing_checks,
            trigger_event,
            now,
        )
    }

    /// Evaluates and persists a review-thread gate run, transitioning the
    /// loop unless the upstream reported a transient error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying persistence fails outright.
    pub fn persist_review_thread_gate_evaluation(
        &self,
        loop_id: &LoopId,
        expected_state: LoopState,
        head_sha: &HeadSha,
        loop_version: u64,
        unresolved_thread_count: Option<u32>,
        error_code: Option<&str>,
        trigger_event: &str,
        now: Timestamp,
    ) -> Result<GateEvaluationOutcome, StoreError> {
        persist_review_thread_gate_evaluation(
            self.loops,
            self.gates,
            loop_id,
            expected_state,
            head_sha,
            loop_version,
            unresolved_thread_count,
            error_code,
            trigger_event,
            now,
        )
    }

    /// Validates, persists, and transitions on a Deep Review Gate output.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying persistence fails outright.
    pub fn persist_deep_review_gate_evaluation(
        &self,
        loop_id: &LoopId,
        expected_state: LoopState,
        head_sha: &HeadSha,
        loop_version: u64,
        raw_json: &str,
        trigger_event: &str,
        now: Timestamp,
    ) -> Result<GateEvaluationOutcome, StoreError> {
        persist_deep_review_gate_evaluation(
            self.loops,
            self.gates,
            loop_id,
            expected_state,
            head_sha,
            loop_version,
            raw_json,
            trigger_event,
            now,
        )
    }

    /// Validates, persists, and transitions on a Carmack Review Gate output,
    /// skipping entirely when the gate is not yet eligible to run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying persistence fails outright.
    pub fn persist_carmack_review_gate_evaluation(
        &self,
        loop_id: &LoopId,
        expected_state: LoopState,
        head_sha: &HeadSha,
        loop_version: u64,
        raw_json: &str,
        trigger_event: &str,
        now: Timestamp,
    ) -> Result<GateEvaluationOutcome, StoreError> {
        persist_carmack_review_gate_evaluation(
            self.loops,
            self.gates,
            loop_id,
            expected_state,
            head_sha,
            loop_version,
            raw_json,
            trigger_event,
            now,
        )
    }

    /// Persists a video-capture outcome and applies the guarded transition it
    /// drives.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying persistence fails outright.
    pub fn persist_video_capture_outcome(
        &self,
        loop_id: &LoopId,
        expected_state: LoopState,
        head_sha: &HeadSha,
        loop_version: u64,
        outcome: &VideoCaptureOutcome,
        now: Timestamp,
    ) -> Result<GuardedUpdateOutcome, StoreError> {
        persist_video_capture_outcome(self.loops, loop_id, expected_state, head_sha, loop_version, outcome, now)
    }
}

// ============================================================================
// SECTION: Gate Evaluation Orchestration
// ============================================================================

/// Outcome of one gate-evaluation persistence call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvaluationOutcome {
    /// The gate run was persisted and drove a state transition attempt.
    Transitioned {
        /// The persisted gate run row.
        gate_run: GateRunRow,
        /// The transition attempt's outcome.
        transition: GuardedUpdateOutcome,
    },
    /// The gate run was persisted, but no transition was attempted (the
    /// outcome was a capability or transient error, not a pass/block).
    Recorded {
        /// The persisted gate run row.
        gate_run: GateRunRow,
    },
    /// Nothing was persisted; the gate is not eligible to run yet.
    Skipped,
}

/// Evaluates and persists a CI gate run, transitioning the loop when the
/// provider reported a capability-supported result.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying persistence fails outright.
#[allow(clippy::too_many_arguments, reason = "mirrors the CI gate evaluation's full input set")]
pub fn persist_ci_gate_evaluation(
    loops: &dyn LoopStore,
    gates: &dyn GateStore,
    loop_id: &LoopId,
    expected_state: LoopState,
    head_sha: &HeadSha,
    loop_version: u64,
    capability_state: CiCapabilityState,
    ruleset_checks: &[String],
    branch_protection_checks: &[String],
    allowlist_checks: &[String],
    failing_checks: &[String],
    trigger_event: &str,
    now: Timestamp,
) -> Result<GateEvaluationOutcome, StoreError> {
    let (_, required_checks) =
        resolve_required_checks(ruleset_checks, branch_protection_checks, allowlist_checks);
    let failing_required_checks = compute_failing_required_checks(failing_checks, &required_checks);
    let (status, gate_passed) = decide_ci_gate_status(capability_state, &required_checks, &failing_required_checks);

    let gate_run = GateRunRow {
        loop_id: loop_id.clone(),
        head_sha: head_sha.clone(),
        loop_version,
        gate_kind: GateKind::Ci,
        status,
        gate_passed,
        detail: GateRunDetail::Ci { failing_required_checks, capability_state },
        trigger_event: trigger_event.to_string(),
        evaluated_at: now,
    };
    gates.upsert_gate_run(&gate_run)?;

    if status == GateStatus::CapabilityError {
        return Ok(GateEvaluationOutcome::Recorded { gate_run });
    }

    let event = if gate_passed { TransitionEvent::CiGatePassed } else { TransitionEvent::CiGateBlocked };
    let transition = loops.apply_guarded_transition(
        loop_id,
        &GateGuardedUpdate {
            expected_state,
            event,
            provided_head_sha: Some(head_sha.clone()),
            provided_loop_version: Some(loop_version),
            video_status: None,
        },
    )?;
    Ok(GateEvaluationOutcome::Transitioned { gate_run, transition })
}

/// Evaluates and persists a review-thread gate run, transitioning the loop
/// unless the upstream reported a transient error.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying persistence fails outright.
#[allow(clippy::too_many_arguments, reason = "mirrors the review-thread gate evaluation's full input set")]
pub fn persist_review_thread_gate_evaluation(
    loops: &dyn LoopStore,
    gates: &dyn GateStore,
    loop_id: &LoopId,
    expected_state: LoopState,
    head_sha: &HeadSha,
    loop_version: u64,
    unresolved_thread_count: Option<u32>,
    error_code: Option<&str>,
    trigger_event: &str,
    now: Timestamp,
) -> Result<GateEvaluationOutcome, StoreError> {
    let (status, gate_passed) = decide_review_thread_gate_status(unresolved_thread_count, error_code);

    let gate_run = GateRunRow {
        loop_id: loop_id.clone(),
        head_sha: head_sha.clone(),
        loop_version,
        gate_kind: GateKind::ReviewThread,
        status,
        gate_passed,
        detail: GateRunDetail::ReviewThread {
            unresolved_thread_count,
            error_code: error_code.map(str::to_string),
        },
        trigger_event: trigger_event.to_string(),
        evaluated_at: now,
    };
    gates.upsert_gate_run(&gate_run)?;

    if status == GateStatus::TransientError {
        return Ok(GateEvaluationOutcome::Recorded { gate_run });
    }

    let event =
        if gate_passed { TransitionEvent::ReviewThreadGatePassed } else { TransitionEvent::ReviewThreadGateBlocked };
    let transition = loops.apply_guarded_transition(
        loop_id,
        &GateGuardedUpdate {
            expected_state,
            event,
            provided_head_sha: Some(head_sha.clone()),
            provided_loop_version: Some(loop_version),
            video_status: None,
        },
    )?;
    Ok(GateEvaluationOutcome::Transitioned { gate_run, transition })
}

/// Validates, persists, and transitions on a Deep Review Gate output.
///
/// On schema-validation failure, clears any prior findings and blocks the
/// loop with `deep_review_invalid_output`.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying persistence fails outright.
pub fn persist_deep_review_gate_evaluation(
    loops: &dyn LoopStore,
    gates: &dyn GateStore,
    loop_id: &LoopId,
    expected_state: LoopState,
    head_sha: &HeadSha,
    loop_version: u64,
    raw_json: &str,
    trigger_event: &str,
    now: Timestamp,
) -> Result<GateEvaluationOutcome, StoreError> {
    persist_llm_gate_evaluation(
        loops,
        gates,
        loop_id,
        expected_state,
        head_sha,
        loop_version,
        raw_json,
        trigger_event,
        now,
        GateKind::DeepReview,
        TransitionEvent::DeepReviewGatePassed,
        TransitionEvent::DeepReviewGateBlocked,
        "deep_review_invalid_output",
        |invalid_output, error_code| GateRunDetail::DeepReview { invalid_output, error_code },
    )
}

/// Validates, persists, and transitions on a Carmack Review Gate output,
/// skipping entirely when a passing Deep Review Gate row does not yet exist
/// for `head_sha`.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying persistence fails outright.
pub fn persist_carmack_review_gate_evaluation(
    loops: &dyn LoopStore,
    gates: &dyn GateStore,
    loop_id: &LoopId,
    expected_state: LoopState,
    head_sha: &HeadSha,
    loop_version: u64,
    raw_json: &str,
    trigger_event: &str,
    now: Timestamp,
) -> Result<GateEvaluationOutcome, StoreError> {
    let latest_deep_review = gates.latest_gate_run(loop_id, head_sha, GateKind::DeepReview)?;
    if !can_run_carmack_review(latest_deep_review.as_ref()) {
        return Ok(GateEvaluationOutcome::Skipped);
    }

    persist_llm_gate_evaluation(
        loops,
        gates,
        loop_id,
        expected_state,
        head_sha,
        loop_version,
        raw_json,
        trigger_event,
        now,
        GateKind::CarmackReview,
        TransitionEvent::CarmackReviewGatePassed,
        TransitionEvent::CarmackReviewGateBlocked,
        "carmack_review_invalid_output",
        |invalid_output, error_code| GateRunDetail::CarmackReview { invalid_output, error_code },
    )
}

/// Shared Deep Review / Carmack Review persistence-plus-transition body.
///
/// `detail_for` builds the gate-kind-specific detail payload from
/// `(invalid_output, error_code)`, keeping this function agnostic to which of
/// the two LLM gate kinds it is serving.
#[allow(clippy::too_many_arguments, reason = "internal helper threading both LLM gates' full input set")]
fn persist_llm_gate_evaluation(
    loops: &dyn LoopStore,
    gates: &dyn GateStore,
    loop_id: &LoopId,
    expected_state: LoopState,
    head_sha: &HeadSha,
    loop_version: u64,
    raw_json: &str,
    trigger_event: &str,
    now: Timestamp,
    gate_kind: GateKind,
    passed_event: TransitionEvent,
    blocked_event: TransitionEvent,
    invalid_output_error_code: &str,
    detail_for: impl Fn(bool, Option<String>) -> GateRunDetail,
) -> Result<GateEvaluationOutcome, StoreError> {
    let Ok(output) = validate_raw_gate_output(raw_json) else {
        gates.delete_findings(loop_id, head_sha)?;
        let gate_run = GateRunRow {
            loop_id: loop_id.clone(),
            head_sha: head_sha.clone(),
            loop_version,
            gate_kind,
            status: GateStatus::InvalidOutput,
            gate_passed: false,
            detail: detail_for(true, Some(invalid_output_error_code.to_string())),
            trigger_event: trigger_event.to_string(),
            evaluated_at: now,
        };
        gates.upsert_gate_run(&gate_run)?;
        let transition = loops.apply_guarded_transition(
            loop_id,
            &GateGuardedUpdate {
                expected_state,
                event: blocked_event,
                provided_head_sha: Some(head_sha.clone()),
                provided_loop_version: Some(loop_version),
                video_status: None,
            },
        )?;
        return Ok(GateEvaluationOutcome::Transitioned { gate_run, transition });
    };

    let mut findings = normalize_findings(gate_kind, head_sha, &output.blocking_findings);
    for finding in &mut findings {
        finding.loop_id = loop_id.clone();
    }
    gates.replace_findings(loop_id, head_sha, &findings)?;

    let gate_passed = decide_llm_gate_passed(output.gate_passed, &findings);
    let status = if gate_passed { GateStatus::Passed } else { GateStatus::Blocked };
    let gate_run = GateRunRow {
        loop_id: loop_id.clone(),
        head_sha: head_sha.clone(),
        loop_version,
        gate_kind,
        status,
        gate_passed,
        detail: detail_for(false, None),
        trigger_event: trigger_event.to_string(),
        evaluated_at: now,
    };
    gates.upsert_gate_run(&gate_run)?;

    let event = if gate_passed { passed_event } else { blocked_event };
    let transition = loops.apply_guarded_transition(
        loop_id,
        &GateGuardedUpdate {
            expected_state,
            event,
            provided_head_sha: Some(head_sha.clone()),
            provided_loop_version: Some(loop_version),
            video_status: None,
        },
    )?;
    Ok(GateEvaluationOutcome::Transitioned { gate_run, transition })
}

// ============================================================================
// SECTION: Video Capture Outcome Orchestration
// ============================================================================

/// A video-capture attempt's terminal outcome, as reported by the capture
/// worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCaptureOutcome {
    /// The capture succeeded and produced an artifact.
    Succeeded {
        /// Object-store key of the captured artifact.
        artifact_key: String,
    },
    /// The capture failed.
    Failed {
        /// Raw failure message; classified via [`classify_video_capture_failure`].
        failure_message: String,
    },
}

/// Persists a video-capture outcome and applies the guarded transition it
/// drives.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying persistence fails outright.
pub fn persist_video_capture_outcome(
    loops: &dyn LoopStore,
    loop_id: &LoopId,
    expected_state: LoopState,
    head_sha: &HeadSha,
    loop_version: u64,
    outcome: &VideoCaptureOutcome,
    now: Timestamp,
) -> Result<GuardedUpdateOutcome, StoreError> {
    let (event, video_status) = match outcome {
        VideoCaptureOutcome::Succeeded { artifact_key } => (
            TransitionEvent::VideoCaptureSucceeded,
            VideoStatusUpdate {
                video_capture_status: VideoCaptureStatus::Succeeded,
                latest_video_artifact_key: Some(artifact_key.clone()),
                latest_video_failure_class: None,
                latest_video_failure_message: None,
                latest_video_failed_at: None,
                latest_video_captured_at: Some(now),
            },
        ),
        VideoCaptureOutcome::Failed { failure_message } => (
            TransitionEvent::VideoCaptureFailed,
            VideoStatusUpdate {
                video_capture_status: VideoCaptureStatus::Failed,
                latest_video_artifact_key: None,
                latest_video_failure_class: Some(classify_video_capture_failure(failure_message).as_str().to_string()),
                latest_video_failure_message: Some(failure_message.clone()),
                latest_video_failed_at: Some(now),
                latest_video_captured_at: None,
            },
        ),
    };

    loops.apply_guarded_transition(
        loop_id,
        &GateGuardedUpdate {
            expected_state,
            event,
            provided_head_sha: Some(head_sha.clone()),
            provided_loop_version: Some(loop_version),
            video_status: Some(video_status),
        },
    )
}
