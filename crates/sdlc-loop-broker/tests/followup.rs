// crates/sdlc-loop-broker/tests/followup.rs
// ============================================================================
// Module: Follow-up Router End-to-End Tests
// Description: Drives the signal-inbox tick with this crate's concrete
// FollowUpRouter implementations standing in for the agent-prompt seam.
// ============================================================================

//! ## Overview
//! `sdlc-loop-core/tests/scenarios.rs` covers the tick's decision logic with
//! a bare test double; this file exercises the same tick against the
//! reference [`CallbackFollowUpRouter`] and [`ChannelFollowUpRouter`] this
//! crate actually ships, confirming a caller can wire either one in without
//! further adaptation.

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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc::channel;

use sdlc_loop_broker::CallbackFollowUpRouter;
use sdlc_loop_broker::ChannelFollowUpRouter;
use sdlc_loop_core::core::identifiers::CanonicalCauseId;
use sdlc_loop_core::core::identifiers::HeadSha;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::RepoFullName;
use sdlc_loop_core::core::identifiers::SignalId;
use sdlc_loop_core::core::identifiers::ThreadId;
use sdlc_loop_core::core::identifiers::UserId;
use sdlc_loop_core::core::signal::CAUSE_IDENTITY_VERSION;
use sdlc_loop_core::core::signal::CauseType;
use sdlc_loop_core::core::signal::SignalInboxRow;
use sdlc_loop_core::core::state::LoopRow;
use sdlc_loop_core::core::state::LoopState;
use sdlc_loop_core::core::state::PlanApprovalPolicy;
use sdlc_loop_core::core::state::VideoCaptureStatus;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::interfaces::LoopStore;
use sdlc_loop_core::interfaces::SignalInboxStore;
use sdlc_loop_core::interfaces::memory::InMemoryGateStore;
use sdlc_loop_core::interfaces::memory::InMemoryLeaseStore;
use sdlc_loop_core::interfaces::memory::InMemoryLoopStore;
use sdlc_loop_core::interfaces::memory::InMemoryOutboxStore;
use sdlc_loop_core::interfaces::memory::InMemorySignalInboxStore;
use sdlc_loop_core::runtime::signal_inbox::SignalInboxStores;
use sdlc_loop_core::runtime::signal_inbox::SignalInboxTickOutcome;
use sdlc_loop_core::runtime::signal_inbox::run_best_effort_signal_inbox_tick;
use serde_json::json;

fn failing_loop_row() -> LoopRow {
    let now = Timestamp::from_unix_millis(1_700_000_000_000);
    LoopRow {
        loop_id: LoopId::new("loop-1"),
        user_id: UserId::new("user-1"),
        repo_full_name: RepoFullName::new("acme/widget"),
        pr_number: Some(7),
        thread_id: ThreadId::new("thread-1"),
        state: LoopState::Implementing,
        plan_approval_policy: PlanApprovalPolicy::Auto,
        current_head_sha: Some(HeadSha::new("sha-loop-1")),
        loop_version: 1,
        fix_attempt_count: 0,
        max_fix_attempts: 3,
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
    }
}

fn failing_check_run_signal() -> SignalInboxRow {
    SignalInboxRow {
        signal_id: SignalId::new("signal-1"),
        loop_id: LoopId::new("loop-1"),
        cause_type: CauseType::CheckRunCompleted,
        canonical_cause_id: CanonicalCauseId::new("delivery-1:7:sha-loop-1"),
        payload: json!({
            "checkName": "CI / tests",
            "checkOutcome": "fail",
            "headSha": "sha-loop-1",
            "failingChecks": ["CI / tests"],
        }),
        received_at: Timestamp::from_unix_millis(1_700_000_000_000),
        processed_at: None,
        cause_identity_version: CAUSE_IDENTITY_VERSION,
    }
}

#[test]
fn a_callback_follow_up_router_receives_the_wrapped_ci_failure_prompt() {
    let loops = InMemoryLoopStore::new();
    let leases = InMemoryLeaseStore::new();
    let signals = InMemorySignalInboxStore::new();
    let gates = InMemoryGateStore::new();
    let outbox = InMemoryOutboxStore::new();
    let trusted_review_thread_sources = vec!["github_graphql".to_string()];

    loops.insert_loop(&failing_loop_row()).unwrap();
    signals.insert_signal(&failing_check_run_signal()).unwrap();

    let captured: Arc<Mutex<Vec<(LoopId, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let router = CallbackFollowUpRouter::new(move |loop_id, message| {
        sink.lock().unwrap().push((loop_id.clone(), message.to_string()));
        Ok(())
    });

    let stores = SignalInboxStores {
        loops: &loops,
        leases: &leases,
        signals: &signals,
        gates: &gates,
        outbox: &outbox,
        follow_up: &router,
        trusted_review_thread_sources: &trusted_review_thread_sources,
    };

    let outcome = run_best_effort_signal_inbox_tick(
        &stores,
        &LoopId::new("loop-1"),
        "worker-1",
        Timestamp::from_unix_millis(1_700_000_001_000),
    )
    .unwrap();
    assert!(matches!(outcome, SignalInboxTickOutcome::Processed { .. }));

    let messages = captured.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, LoopId::new("loop-1"));
    assert!(messages[0].1.contains("[BEGIN_UNTRUSTED_GITHUB_FEEDBACK]"));
    assert!(messages[0].1.contains("CI check failed"));
}

#[test]
fn a_channel_follow_up_router_hands_off_the_wrapped_prompt_for_async_delivery() {
    let loops = InMemoryLoopStore::new();
    let leases = InMemoryLeaseStore::new();
    let signals = InMemorySignalInboxStore::new();
    let gates = InMemoryGateStore::new();
    let outbox = InMemoryOutboxStore::new();
    let trusted_review_thread_sources = vec!["github_graphql".to_string()];

    loops.insert_loop(&failing_loop_row()).unwrap();
    signals.insert_signal(&failing_check_run_signal()).unwrap();

    let (tx, rx) = channel();
    let router = ChannelFollowUpRouter::new(tx);

    let stores = SignalInboxStores {
        loops: &loops,
        leases: &leases,
        signals: &signals,
        gates: &gates,
        outbox: &outbox,
        follow_up: &router,
        trusted_review_thread_sources: &trusted_review_thread_sources,
    };

    let outcome = run_best_effort_signal_inbox_tick(
        &stores,
        &LoopId::new("loop-1"),
        "worker-1",
        Timestamp::from_unix_millis(1_700_000_001_000),
    )
    .unwrap();
    assert!(matches!(outcome, SignalInboxTickOutcome::Processed { .. }));

    let delivered = rx.try_recv().unwrap();
    assert_eq!(delivered.loop_id, LoopId::new("loop-1"));
    assert!(delivered.message.contains("[END_UNTRUSTED_GITHUB_FEEDBACK]"));
    assert!(rx.try_recv().is_err(), "exactly one follow-up should have been routed");
}
