// crates/sdlc-loop-core/tests/cause.rs
// ============================================================================
// Module: Canonical Cause Derivation Tests
// Description: Verifies the (causeType, canonicalCauseId) encoding table.
// ============================================================================

//! ## Overview
//! Every [`SignalInput`] variant must derive the exact `canonicalCauseId`
//! string its encoding row specifies, since duplicate deliveries are
//! deduplicated on this value inside the signal inbox.

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

use sdlc_loop_core::core::identifiers::HeadSha;
use sdlc_loop_core::core::signal::CauseType;
use sdlc_loop_core::runtime::cause::CanonicalCause;
use sdlc_loop_core::runtime::cause::SignalInput;

#[test]
fn daemon_terminal_uses_the_event_id_verbatim() {
    let cause = CanonicalCause::from_signal(&SignalInput::DaemonTerminal {
        event_id: "daemon-evt-1".to_string(),
    });
    assert_eq!(cause.cause_type, CauseType::DaemonTerminal);
    assert_eq!(cause.canonical_cause_id.as_str(), "daemon-evt-1");
    assert_eq!(cause.signal_head_sha, None);
}

#[test]
fn check_run_completed_joins_delivery_and_check_run() {
    let cause = CanonicalCause::from_signal(&SignalInput::CheckRunCompleted {
        delivery_id: "del-1".to_string(),
        check_run_id: "run-2".to_string(),
    });
    assert_eq!(cause.canonical_cause_id.as_str(), "del-1:run-2");
}

#[test]
fn check_suite_completed_joins_delivery_and_check_suite() {
    let cause = CanonicalCause::from_signal(&SignalInput::CheckSuiteCompleted {
        delivery_id: "del-1".to_string(),
        check_suite_id: "suite-3".to_string(),
    });
    assert_eq!(cause.canonical_cause_id.as_str(), "del-1:suite-3");
}

#[test]
fn pull_request_synchronize_carries_the_head_sha_through() {
    let cause = CanonicalCause::from_signal(&SignalInput::PullRequestSynchronize {
        delivery_id: "del-1".to_string(),
        pull_request_id: "pr-9".to_string(),
        head_sha: "abc123".to_string(),
    });
    assert_eq!(cause.canonical_cause_id.as_str(), "del-1:pr-9:abc123");
    assert_eq!(cause.signal_head_sha, Some(HeadSha::new("abc123")));
}

#[test]
fn pull_request_closed_tags_merged_versus_unmerged() {
    let merged = CanonicalCause::from_signal(&SignalInput::PullRequestClosed {
        delivery_id: "del-1".to_string(),
        pull_request_id: "pr-9".to_string(),
        merged: true,
    });
    let unmerged = CanonicalCause::from_signal(&SignalInput::PullRequestClosed {
        delivery_id: "del-1".to_string(),
        pull_request_id: "pr-9".to_string(),
        merged: false,
    });
    assert_eq!(merged.canonical_cause_id.as_str(), "del-1:pr-9:closed:merged");
    assert_eq!(unmerged.canonical_cause_id.as_str(), "del-1:pr-9:closed:unmerged");
    assert_ne!(merged.canonical_cause_id, unmerged.canonical_cause_id);
}

#[test]
fn pull_request_reopened_and_edited_are_distinctly_tagged() {
    let reopened = CanonicalCause::from_signal(&SignalInput::PullRequestReopened {
        delivery_id: "del-1".to_string(),
        pull_request_id: "pr-9".to_string(),
    });
    let edited = CanonicalCause::from_signal(&SignalInput::PullRequestEdited {
        delivery_id: "del-1".to_string(),
        pull_request_id: "pr-9".to_string(),
    });
    assert_eq!(reopened.canonical_cause_id.as_str(), "del-1:pr-9:reopened");
    assert_eq!(edited.canonical_cause_id.as_str(), "del-1:pr-9:edited");
}

#[test]
fn pull_request_review_joins_delivery_review_and_state() {
    let cause = CanonicalCause::from_signal(&SignalInput::PullRequestReview {
        delivery_id: "del-1".to_string(),
        review_id: "rev-4".to_string(),
        review_state: "changes_requested".to_string(),
    });
    assert_eq!(cause.canonical_cause_id.as_str(), "del-1:rev-4:changes_requested");
}

#[test]
fn pull_request_review_comment_joins_delivery_and_comment() {
    let cause = CanonicalCause::from_signal(&SignalInput::PullRequestReviewComment {
        delivery_id: "del-1".to_string(),
        comment_id: "cmt-7".to_string(),
    });
    assert_eq!(cause.canonical_cause_id.as_str(), "del-1:cmt-7");
}

#[test]
fn review_thread_poll_synthetic_joins_loop_window_and_sequence() {
    let cause = CanonicalCause::from_signal(&SignalInput::ReviewThreadPollSynthetic {
        loop_id: "loop-5".to_string(),
        poll_window_start_iso: "2026-01-01T00:00:00Z".to_string(),
        poll_window_end_iso: "2026-01-01T00:05:00Z".to_string(),
        poll_sequence: 3,
    });
    assert_eq!(
        cause.canonical_cause_id.as_str(),
        "loop-5:2026-01-01T00:00:00Z:2026-01-01T00:05:00Z:3"
    );
}

#[test]
fn distinct_poll_sequences_for_the_same_window_do_not_collide() {
    let first = CanonicalCause::from_signal(&SignalInput::ReviewThreadPollSynthetic {
        loop_id: "loop-5".to_string(),
        poll_window_start_iso: "2026-01-01T00:00:00Z".to_string(),
        poll_window_end_iso: "2026-01-01T00:05:00Z".to_string(),
        poll_sequence: 1,
    });
    let second = CanonicalCause::from_signal(&SignalInput::ReviewThreadPollSynthetic {
        loop_id: "loop-5".to_string(),
        poll_window_start_iso: "2026-01-01T00:00:00Z".to_string(),
        poll_window_end_iso: "2026-01-01T00:05:00Z".to_string(),
        poll_sequence: 2,
    });
    assert_ne!(first.canonical_cause_id, second.canonical_cause_id);
}

#[test]
fn cause_type_matches_the_signal_input_variant() {
    let signals = vec![
        SignalInput::DaemonTerminal {
            event_id: "e".to_string(),
        },
        SignalInput::CheckRunCompleted {
            delivery_id: "d".to_string(),
            check_run_id: "c".to_string(),
        },
        SignalInput::PullRequestClosed {
            delivery_id: "d".to_string(),
            pull_request_id: "p".to_string(),
            merged: false,
        },
    ];
    let expected = [CauseType::DaemonTerminal, CauseType::CheckRunCompleted, CauseType::PullRequestClosed];
    for (signal, expect) in signals.iter().zip(expected) {
        assert_eq!(signal.cause_type(), expect);
        assert_eq!(CanonicalCause::from_signal(signal).cause_type, expect);
    }
}
