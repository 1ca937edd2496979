// crates/sdlc-loop-core/tests/gates.rs
// ============================================================================
// Module: Gate Evaluation Tests
// Description: Required-check precedence, optimistic-pass policies, LLM
// output validation and finding normalization, and video-capture
// classification.
// ============================================================================

//! ## Overview
//! Covers the CI, review-thread, and LLM-backed gate decision functions in
//! [`sdlc_loop_core::runtime::gates`], including the required-check
//! precedence order and both optimistic-pass acceptance policies.

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

use sdlc_loop_core::core::gates::CiCapabilityState;
use sdlc_loop_core::core::gates::GateKind;
use sdlc_loop_core::core::gates::GateStatus;
use sdlc_loop_core::core::gates::Severity;
use sdlc_loop_core::core::identifiers::HeadSha;
use sdlc_loop_core::runtime::gates::CiOptimisticPassSnapshot;
use sdlc_loop_core::runtime::gates::RequiredCheckSource;
use sdlc_loop_core::runtime::gates::accepts_ci_optimistic_pass;
use sdlc_loop_core::runtime::gates::accepts_review_thread_optimistic_pass;
use sdlc_loop_core::runtime::gates::classify_video_capture_failure;
use sdlc_loop_core::runtime::gates::compute_failing_required_checks;
use sdlc_loop_core::runtime::gates::decide_ci_gate_status;
use sdlc_loop_core::runtime::gates::decide_llm_gate_passed;
use sdlc_loop_core::runtime::gates::decide_review_thread_gate_status;
use sdlc_loop_core::runtime::gates::normalize_check_list;
use sdlc_loop_core::runtime::gates::normalize_findings;
use sdlc_loop_core::runtime::gates::resolve_required_checks;
use sdlc_loop_core::runtime::gates::validate_raw_gate_output;
use sdlc_loop_core::runtime::gates::VideoCaptureFailureClass;

#[test]
fn required_checks_prefer_ruleset_over_everything_else() {
    let (source, checks) = resolve_required_checks(
        &["build".to_string(), "test".to_string()],
        &["lint".to_string()],
        &["legacy".to_string()],
    );
    assert_eq!(source, RequiredCheckSource::Ruleset);
    assert_eq!(checks, vec!["build".to_string(), "test".to_string()]);
}

#[test]
fn required_checks_fall_back_to_branch_protection() {
    let (source, checks) = resolve_required_checks(&[], &["lint".to_string()], &["legacy".to_string()]);
    assert_eq!(source, RequiredCheckSource::BranchProtection);
    assert_eq!(checks, vec!["lint".to_string()]);
}

#[test]
fn required_checks_fall_back_to_allowlist() {
    let (source, checks) = resolve_required_checks(&[], &[], &["legacy".to_string()]);
    assert_eq!(source, RequiredCheckSource::Allowlist);
    assert_eq!(checks, vec!["legacy".to_string()]);
}

#[test]
fn required_checks_fall_back_to_no_required_when_nothing_is_configured() {
    let (source, checks) = resolve_required_checks(&[], &[], &[]);
    assert_eq!(source, RequiredCheckSource::NoRequired);
    assert!(checks.is_empty());
}

#[test]
fn normalize_check_list_trims_dedupes_and_sorts() {
    let input = vec![
        "  build  ".to_string(),
        "test".to_string(),
        "build".to_string(),
        "".to_string(),
        "  ".to_string(),
    ];
    assert_eq!(normalize_check_list(&input), vec!["build".to_string(), "test".to_string()]);
}

#[test]
fn failing_required_checks_intersects_and_normalizes() {
    let failing = vec!["test".to_string(), "docs".to_string(), "build".to_string()];
    let required = vec!["build".to_string(), "test".to_string()];
    assert_eq!(
        compute_failing_required_checks(&failing, &required),
        vec!["build".to_string(), "test".to_string()]
    );
}

#[test]
fn ci_gate_capability_error_takes_precedence_over_check_results() {
    let (status, passed) =
        decide_ci_gate_status(CiCapabilityState::Forbidden, &["build".to_string()], &["build".to_string()]);
    assert_eq!(status, GateStatus::CapabilityError);
    assert!(!passed);
}

#[test]
fn ci_gate_passes_with_no_required_checks() {
    let (status, passed) = decide_ci_gate_status(CiCapabilityState::Supported, &[], &[]);
    assert_eq!(status, GateStatus::Passed);
    assert!(passed);
}

#[test]
fn ci_gate_passes_with_required_checks_but_none_failing() {
    let (status, passed) =
        decide_ci_gate_status(CiCapabilityState::Supported, &["build".to_string()], &[]);
    assert_eq!(status, GateStatus::Passed);
    assert!(passed);
}

#[test]
fn ci_gate_blocks_on_any_failing_required_check() {
    let (status, passed) = decide_ci_gate_status(
        CiCapabilityState::Supported,
        &["build".to_string()],
        &["build".to_string()],
    );
    assert_eq!(status, GateStatus::Blocked);
    assert!(!passed);
}

#[test]
fn ci_optimistic_pass_rejects_missing_snapshot_source() {
    let snapshot = CiOptimisticPassSnapshot {
        snapshot_source: None,
        snapshot_complete: true,
        snapshot_check_names: vec!["build".to_string()],
    };
    assert!(!accepts_ci_optimistic_pass(&snapshot, &["build".to_string()]));
}

#[test]
fn ci_optimistic_pass_rejects_incomplete_snapshot() {
    let snapshot = CiOptimisticPassSnapshot {
        snapshot_source: Some("github_check_runs".to_string()),
        snapshot_complete: false,
        snapshot_check_names: vec!["build".to_string()],
    };
    assert!(!accepts_ci_optimistic_pass(&snapshot, &["build".to_string()]));
}

#[test]
fn ci_optimistic_pass_rejects_partial_check_coverage() {
    let snapshot = CiOptimisticPassSnapshot {
        snapshot_source: Some("github_check_runs".to_string()),
        snapshot_complete: true,
        snapshot_check_names: vec!["build".to_string()],
    };
    assert!(!accepts_ci_optimistic_pass(&snapshot, &["build".to_string(), "test".to_string()]));
}

#[test]
fn ci_optimistic_pass_accepts_complete_trusted_superset_snapshot() {
    let snapshot = CiOptimisticPassSnapshot {
        snapshot_source: Some("github_check_runs".to_string()),
        snapshot_complete: true,
        snapshot_check_names: vec!["build".to_string(), "test".to_string(), "lint".to_string()],
    };
    assert!(accepts_ci_optimistic_pass(&snapshot, &["build".to_string(), "test".to_string()]));
}

#[test]
fn review_thread_gate_treats_an_error_code_as_transient_regardless_of_count() {
    let (status, passed) = decide_review_thread_gate_status(Some(0), Some("upstream_timeout"));
    assert_eq!(status, GateStatus::TransientError);
    assert!(!passed);
}

#[test]
fn review_thread_gate_passes_only_on_exactly_zero_unresolved() {
    assert_eq!(decide_review_thread_gate_status(Some(0), None).0, GateStatus::Passed);
    assert_eq!(decide_review_thread_gate_status(Some(1), None).0, GateStatus::Blocked);
    assert_eq!(decide_review_thread_gate_status(None, None).0, GateStatus::Blocked);
}

#[test]
fn review_thread_optimistic_pass_requires_a_trusted_source() {
    let trusted = vec!["github_graphql".to_string()];
    assert!(accepts_review_thread_optimistic_pass(Some("github_graphql"), &trusted));
    assert!(!accepts_review_thread_optimistic_pass(Some("webhook_cache"), &trusted));
    assert!(!accepts_review_thread_optimistic_pass(None, &trusted));
}

#[test]
fn raw_gate_output_deserializes_camel_case_wire_payload() {
    let json = r#"{
        "gatePassed": false,
        "blockingFindings": [
            {
                "title": "Missing null check",
                "severity": "high",
                "category": "correctness",
                "detail": "Dereferences without a null guard.",
                "suggestedFix": "Add a guard clause.",
                "isBlocking": true,
                "stableFindingId": "deep_review_abc123"
            }
        ]
    }"#;
    let output = validate_raw_gate_output(json).expect("camelCase payload should validate");
    assert!(!output.gate_passed);
    assert_eq!(output.blocking_findings.len(), 1);
    assert_eq!(output.blocking_findings[0].title, "Missing null check");
    assert_eq!(output.blocking_findings[0].severity, Severity::High);
}

#[test]
fn raw_gate_output_rejects_missing_required_field() {
    let json = r#"{ "blockingFindings": [] }"#;
    assert!(validate_raw_gate_output(json).is_err());
}

#[test]
fn raw_gate_output_defaults_blocking_findings_to_empty() {
    let json = r#"{ "gatePassed": true }"#;
    let output = validate_raw_gate_output(json).expect("should validate");
    assert!(output.blocking_findings.is_empty());
}

#[test]
fn raw_gate_output_tolerates_unknown_fields() {
    let json = r#"{ "gatePassed": true, "modelVersion": "gpt-x", "blockingFindings": [] }"#;
    assert!(validate_raw_gate_output(json).is_ok());
}

#[test]
fn normalize_findings_derives_a_stable_id_when_the_caller_omits_one() {
    let json = r#"{
        "gatePassed": false,
        "blockingFindings": [
            {
                "title": "Leaked credential",
                "severity": "critical",
                "category": "security",
                "detail": "API key committed in plaintext.",
                "isBlocking": true
            }
        ]
    }"#;
    let output = validate_raw_gate_output(json).expect("valid");
    let head_sha = HeadSha::new("deadbeef");
    let rows = normalize_findings(GateKind::DeepReview, &head_sha, &output.blocking_findings);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].stable_finding_id.as_str().starts_with("deep_review_"));
}

#[test]
fn normalize_findings_deduplicates_by_stable_id_keeping_the_latest() {
    let json = r#"{
        "gatePassed": false,
        "blockingFindings": [
            { "title": "a", "severity": "low", "category": "style", "detail": "first", "isBlocking": true, "stableFindingId": "dup" },
            { "title": "b", "severity": "high", "category": "style", "detail": "second", "isBlocking": false, "stableFindingId": "dup" }
        ]
    }"#;
    let output = validate_raw_gate_output(json).expect("valid");
    let head_sha = HeadSha::new("deadbeef");
    let rows = normalize_findings(GateKind::CarmackReview, &head_sha, &output.blocking_findings);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].detail, "second");
    assert!(!rows[0].is_blocking);
}

#[test]
fn llm_gate_passes_only_when_output_says_so_and_no_blocking_findings_remain() {
    let json = r#"{
        "gatePassed": true,
        "blockingFindings": [
            { "title": "a", "severity": "low", "category": "style", "detail": "d", "isBlocking": true }
        ]
    }"#;
    let output = validate_raw_gate_output(json).expect("valid");
    let head_sha = HeadSha::new("deadbeef");
    let rows = normalize_findings(GateKind::DeepReview, &head_sha, &output.blocking_findings);
    assert!(!decide_llm_gate_passed(output.gate_passed, &rows));
}

#[test]
fn video_capture_failure_classification_follows_precedence() {
    assert_eq!(classify_video_capture_failure("401 Unauthorized"), VideoCaptureFailureClass::Auth);
    assert_eq!(classify_video_capture_failure("429 rate limit exceeded"), VideoCaptureFailureClass::Quota);
    assert_eq!(
        classify_video_capture_failure("playwright: selector not found"),
        VideoCaptureFailureClass::Script
    );
    assert_eq!(classify_video_capture_failure("connection reset by peer"), VideoCaptureFailureClass::Infra);
    assert_eq!(
        classify_video_capture_failure("403 forbidden: invalid token, quota exceeded"),
        VideoCaptureFailureClass::Auth,
        "auth markers take precedence over quota markers"
    );
}
