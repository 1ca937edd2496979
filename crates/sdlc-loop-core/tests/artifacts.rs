// crates/sdlc-loop-core/tests/artifacts.rs
// ============================================================================
// Module: Plan Task Completion and Artifact-Bound Transition Tests
// Description: Verifies the planning-exit gate and the artifact precondition
// check used by artifact-bound state transitions.
// ============================================================================

//! ## Overview
//! [`verify_plan_task_completion_for_head`] gates the move out of planning;
//! [`decide_artifact_bound_transition`] gates any transition that requires a
//! specific artifact status (and, where applicable, a matching head SHA).

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use sdlc_loop_core::core::artifacts::ArtifactId;
use sdlc_loop_core::core::artifacts::ArtifactStatus;
use sdlc_loop_core::core::artifacts::Phase;
use sdlc_loop_core::core::artifacts::PhaseArtifactRow;
use sdlc_loop_core::core::artifacts::PlanTaskRow;
use sdlc_loop_core::core::artifacts::PlanTaskStatus;
use sdlc_loop_core::core::identifiers::HeadSha;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::StableTaskId;
use sdlc_loop_core::core::state::PlanApprovalPolicy;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::runtime::artifacts::ArtifactBoundTransitionOutcome;
use sdlc_loop_core::runtime::artifacts::decide_artifact_bound_transition;
use sdlc_loop_core::runtime::artifacts::required_planning_exit_status;
use sdlc_loop_core::runtime::artifacts::verify_plan_task_completion_for_head;

fn task(stable_task_id: &str, status: PlanTaskStatus, evidence_head_sha: Option<&str>) -> PlanTaskRow {
    PlanTaskRow {
        artifact_id: ArtifactId::new("artifact-1"),
        stable_task_id: StableTaskId::new(stable_task_id),
        title: "do the thing".to_string(),
        description: "description".to_string(),
        acceptance_criteria: vec!["works".to_string()],
        status,
        completed_at: None,
        completed_by: None,
        completion_evidence: evidence_head_sha.map(|sha| serde_json::json!({ "headSha": sha })),
    }
}

#[test]
fn an_empty_task_list_never_passes_the_gate() {
    let report = verify_plan_task_completion_for_head(&[], &HeadSha::new("abc"));
    assert!(!report.gate_passed);
    assert!(report.incomplete_task_ids.is_empty());
    assert!(report.invalid_evidence_task_ids.is_empty());
}

#[test]
fn all_tasks_done_with_matching_evidence_passes() {
    let tasks = vec![task("t1", PlanTaskStatus::Done, Some("abc")), task("t2", PlanTaskStatus::Skipped, None)];
    let report = verify_plan_task_completion_for_head(&tasks, &HeadSha::new("abc"));
    assert!(report.gate_passed);
}

#[test]
fn todo_in_progress_and_blocked_tasks_are_reported_as_incomplete() {
    let tasks = vec![
        task("t1", PlanTaskStatus::Todo, None),
        task("t2", PlanTaskStatus::InProgress, None),
        task("t3", PlanTaskStatus::Blocked, None),
    ];
    let report = verify_plan_task_completion_for_head(&tasks, &HeadSha::new("abc"));
    assert!(!report.gate_passed);
    assert_eq!(report.incomplete_task_ids.len(), 3);
    assert!(report.invalid_evidence_task_ids.is_empty());
}

#[test]
fn a_done_task_with_no_evidence_is_invalid() {
    let tasks = vec![task("t1", PlanTaskStatus::Done, None)];
    let report = verify_plan_task_completion_for_head(&tasks, &HeadSha::new("abc"));
    assert!(!report.gate_passed);
    assert_eq!(report.invalid_evidence_task_ids, vec![StableTaskId::new("t1")]);
}

#[test]
fn a_done_task_with_evidence_for_a_different_head_sha_is_invalid() {
    let tasks = vec![task("t1", PlanTaskStatus::Done, Some("old-sha"))];
    let report = verify_plan_task_completion_for_head(&tasks, &HeadSha::new("new-sha"));
    assert!(!report.gate_passed);
    assert_eq!(report.invalid_evidence_task_ids, vec![StableTaskId::new("t1")]);
}

#[test]
fn skipped_tasks_are_exempt_regardless_of_evidence() {
    let tasks = vec![task("t1", PlanTaskStatus::Skipped, None)];
    let report = verify_plan_task_completion_for_head(&tasks, &HeadSha::new("abc"));
    assert!(report.gate_passed);
}

#[test]
fn required_planning_exit_status_follows_the_approval_policy() {
    assert_eq!(required_planning_exit_status(PlanApprovalPolicy::HumanRequired), ArtifactStatus::Approved);
    assert_eq!(required_planning_exit_status(PlanApprovalPolicy::Auto), ArtifactStatus::Accepted);
}

fn artifact(status: ArtifactStatus, head_sha: Option<&str>, loop_version: u64) -> PhaseArtifactRow {
    PhaseArtifactRow {
        artifact_id: ArtifactId::new("artifact-1"),
        loop_id: LoopId::new("loop-1"),
        phase: Phase::Implementing,
        artifact_type: "implementation_summary".to_string(),
        head_sha: head_sha.map(HeadSha::new),
        loop_version,
        status,
        generated_by: "agent".to_string(),
        payload: serde_json::json!({}),
        approved_by_user_id: None,
        created_at: Timestamp::from_unix_millis(0),
    }
}

#[test]
fn a_terminal_loop_state_is_always_a_noop() {
    let a = artifact(ArtifactStatus::Approved, Some("abc"), 1);
    let outcome =
        decide_artifact_bound_transition(Some(&a), ArtifactStatus::Approved, Some(&HeadSha::new("abc")), 5, true, 1);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::TerminalNoop);
}

#[test]
fn a_stale_provided_loop_version_is_a_noop() {
    let a = artifact(ArtifactStatus::Approved, Some("abc"), 1);
    let outcome =
        decide_artifact_bound_transition(Some(&a), ArtifactStatus::Approved, Some(&HeadSha::new("abc")), 2, false, 5);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::StaleNoop);
}

#[test]
fn a_missing_artifact_is_reported_as_not_found() {
    let outcome =
        decide_artifact_bound_transition(None, ArtifactStatus::Approved, Some(&HeadSha::new("abc")), 1, false, 1);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::ArtifactNotFound);
}

#[test]
fn a_wrong_status_fails_the_gate() {
    let a = artifact(ArtifactStatus::Generated, Some("abc"), 1);
    let outcome =
        decide_artifact_bound_transition(Some(&a), ArtifactStatus::Approved, Some(&HeadSha::new("abc")), 1, false, 1);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::ArtifactGateFailed);
}

#[test]
fn a_mismatched_head_sha_fails_the_gate() {
    let a = artifact(ArtifactStatus::Approved, Some("old-sha"), 1);
    let outcome = decide_artifact_bound_transition(
        Some(&a),
        ArtifactStatus::Approved,
        Some(&HeadSha::new("new-sha")),
        1,
        false,
        1,
    );
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::ArtifactGateFailed);
}

#[test]
fn no_expected_head_sha_skips_the_head_sha_check() {
    let a = artifact(ArtifactStatus::Approved, None, 1);
    let outcome = decide_artifact_bound_transition(Some(&a), ArtifactStatus::Approved, None, 1, false, 1);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::Updated);
}

#[test]
fn an_artifact_version_ahead_of_the_provided_loop_version_fails_the_gate() {
    let a = artifact(ArtifactStatus::Approved, Some("abc"), 9);
    let outcome =
        decide_artifact_bound_transition(Some(&a), ArtifactStatus::Approved, Some(&HeadSha::new("abc")), 3, false, 1);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::ArtifactGateFailed);
}

#[test]
fn a_fully_satisfied_precondition_updates() {
    let a = artifact(ArtifactStatus::Approved, Some("abc"), 1);
    let outcome =
        decide_artifact_bound_transition(Some(&a), ArtifactStatus::Approved, Some(&HeadSha::new("abc")), 1, false, 1);
    assert_eq!(outcome, ArtifactBoundTransitionOutcome::Updated);
}
