// crates/sdlc-loop-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Integration Tests
// Description: End-to-end tests for every store trait against an in-memory
// database.
// Purpose: Exercise the CAS/guard semantics each trait impl promises,
// including stale-guard no-ops and supersession.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]

use sdlc_loop_core::core::artifacts::ArtifactStatus;
use sdlc_loop_core::core::artifacts::Phase;
use sdlc_loop_core::core::artifacts::PhaseArtifactRow;
use sdlc_loop_core::core::gates::CiCapabilityState;
use sdlc_loop_core::core::gates::GateKind;
use sdlc_loop_core::core::gates::GateRunDetail;
use sdlc_loop_core::core::gates::GateRunRow;
use sdlc_loop_core::core::gates::GateStatus;
use sdlc_loop_core::core::identifiers::ActionKey;
use sdlc_loop_core::core::identifiers::ArtifactId;
use sdlc_loop_core::core::identifiers::CanonicalCauseId;
use sdlc_loop_core::core::identifiers::DeliveryId;
use sdlc_loop_core::core::identifiers::HeadSha;
use sdlc_loop_core::core::identifiers::LoopId;
use sdlc_loop_core::core::identifiers::RepoFullName;
use sdlc_loop_core::core::identifiers::SignalId;
use sdlc_loop_core::core::identifiers::ThreadId;
use sdlc_loop_core::core::identifiers::UserId;
use sdlc_loop_core::core::outbox::ActionKeyedEnqueue;
use sdlc_loop_core::core::outbox::ActionType;
use sdlc_loop_core::core::outbox::OutboxStatus;
use sdlc_loop_core::core::parity::ParityMetricSample;
use sdlc_loop_core::core::parity::ParityTargetClass;
use sdlc_loop_core::core::signal::CauseType;
use sdlc_loop_core::core::signal::SignalInboxRow;
use sdlc_loop_core::core::signal::CAUSE_IDENTITY_VERSION;
use sdlc_loop_core::core::state::LoopRow;
use sdlc_loop_core::core::state::LoopState;
use sdlc_loop_core::core::state::PlanApprovalPolicy;
use sdlc_loop_core::core::state::TransitionEvent;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::interfaces::ArtifactStore;
use sdlc_loop_core::interfaces::GateStore;
use sdlc_loop_core::interfaces::LeaseStore;
use sdlc_loop_core::interfaces::LoopStore;
use sdlc_loop_core::interfaces::OutboxStore;
use sdlc_loop_core::interfaces::ParityStore;
use sdlc_loop_core::interfaces::SignalInboxStore;
use sdlc_loop_core::interfaces::WebhookClaimStore;
use sdlc_loop_core::runtime::lease::LeaseAcquireOutcome;
use sdlc_loop_core::runtime::outbox::OutboxCompleteInput;
use sdlc_loop_core::runtime::outbox::OutboxCompleteOutcome;
use sdlc_loop_core::runtime::state_machine::GateGuardedUpdate;
use sdlc_loop_core::runtime::state_machine::GuardedUpdateOutcome;
use sdlc_loop_core::runtime::webhook_claim::ClaimOutcome;
use sdlc_loop_store_sqlite::SqliteStore;

fn now() -> Timestamp {
    Timestamp::from_unix_millis(1_700_000_000_000)
}

fn sample_loop_row(loop_id: &str) -> LoopRow {
    let created = now();
    LoopRow {
        loop_id: LoopId::new(loop_id),
        user_id: UserId::new("user-1"),
        repo_full_name: RepoFullName::new("acme/widgets"),
        pr_number: None,
        thread_id: ThreadId::new("thread-1"),
        state: LoopState::Planning,
        plan_approval_policy: PlanApprovalPolicy::HumanRequired,
        current_head_sha: None,
        loop_version: 0,
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
        video_capture_status: sdlc_loop_core::core::state::VideoCaptureStatus::NotStarted,
        latest_video_artifact_key: None,
        latest_video_failure_class: None,
        latest_video_failure_message: None,
        latest_video_failed_at: None,
        latest_video_captured_at: None,
        stop_reason: None,
        created_at: created,
        updated_at: created,
    }
}

#[test]
fn loop_store_round_trips_and_finds_active_by_pr_and_thread() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let mut row = sample_loop_row("loop-1");
    row.pr_number = Some(42);
    store.insert_loop(&row).expect("insert loop");

    let loaded = store.get_loop(&row.loop_id).expect("get loop").expect("loop present");
    assert_eq!(loaded, row);

    let by_pr = store
        .get_active_loop_for_pr(&row.repo_full_name, 42)
        .expect("lookup by pr")
        .expect("active loop present");
    assert_eq!(by_pr.loop_id, row.loop_id);

    let by_thread = store
        .get_active_loop_for_thread(&row.user_id, &row.thread_id)
        .expect("lookup by thread")
        .expect("active loop present");
    assert_eq!(by_thread.loop_id, row.loop_id);
}

#[test]
fn apply_guarded_transition_advances_planning_to_implementing() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let row = sample_loop_row("loop-2");
    store.insert_loop(&row).expect("insert loop");

    let update = GateGuardedUpdate {
        expected_state: LoopState::Planning,
        event: TransitionEvent::PlanCompleted,
        provided_head_sha: None,
        provided_loop_version: None,
        video_status: None,
    };
    let outcome = store.apply_guarded_transition(&row.loop_id, &update).expect("apply transition");
    let GuardedUpdateOutcome::Updated(next) = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert_eq!(next.state, LoopState::Implementing);

    let reloaded = store.get_loop(&row.loop_id).expect("get loop").expect("loop present");
    assert_eq!(reloaded.state, LoopState::Implementing);
}

#[test]
fn apply_guarded_transition_rejects_stale_expected_state() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let row = sample_loop_row("loop-3");
    store.insert_loop(&row).expect("insert loop");

    let stale_update = GateGuardedUpdate {
        expected_state: LoopState::Implementing,
        event: TransitionEvent::ImplementationCompleted,
        provided_head_sha: None,
        provided_loop_version: None,
        video_status: None,
    };
    let outcome = store
        .apply_guarded_transition(&row.loop_id, &stale_update)
        .expect("apply transition");
    assert_eq!(outcome, GuardedUpdateOutcome::StaleNoop);

    let reloaded = store.get_loop(&row.loop_id).expect("get loop").expect("loop present");
    assert_eq!(reloaded.state, LoopState::Planning, "stale guard must not mutate the row");
}

#[test]
fn lease_acquire_steal_and_release_cycle() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let row = sample_loop_row("loop-4");
    store.insert_loop(&row).expect("insert loop");

    let first = store.acquire(&row.loop_id, "worker-a", 60_000, now()).expect("acquire");
    assert!(matches!(first, LeaseAcquireOutcome::Acquired { epoch: 1 }));

    let contended = store
        .acquire(&row.loop_id, "worker-b", 60_000, now())
        .expect("acquire contended");
    assert!(matches!(contended, LeaseAcquireOutcome::HeldByOther { .. }));

    let expired_attempt = store
        .acquire(&row.loop_id, "worker-b", 60_000, now().plus_millis(120_000))
        .expect("acquire after expiry");
    assert!(matches!(expired_attempt, LeaseAcquireOutcome::Acquired { epoch: 2 }));

    let released = store
        .release(&row.loop_id, "worker-b", now().plus_millis(120_000))
        .expect("release");
    assert!(released);
}

#[test]
fn webhook_claim_is_exactly_once_and_steals_expired_claims() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let delivery_id = DeliveryId::new("delivery-1");

    let claimed = store
        .claim(&delivery_id, "token-a", "pull_request", now())
        .expect("claim");
    assert_eq!(claimed, ClaimOutcome::ClaimedNew);

    let in_progress = store
        .claim(&delivery_id, "token-b", "pull_request", now())
        .expect("claim while in progress");
    assert_eq!(in_progress, ClaimOutcome::InProgressFresh);

    let completed = store.complete(&delivery_id, "token-a").expect("complete");
    assert!(completed);

    let already_completed = store
        .claim(&delivery_id, "token-c", "pull_request", now())
        .expect("claim after completion");
    assert_eq!(already_completed, ClaimOutcome::AlreadyCompleted);
}

#[test]
fn outbox_enqueue_claim_complete_and_retry_cycle() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let row = sample_loop_row("loop-5");
    store.insert_loop(&row).expect("insert loop");
    store.acquire(&row.loop_id, "worker-a", 60_000, now()).expect("acquire lease");

    let enqueue = ActionKeyedEnqueue {
        loop_id: row.loop_id.clone(),
        transition_seq: 1,
        action_type: ActionType::PublishStatusComment,
        action_key: ActionKey::new("status-comment"),
        payload: serde_json::json!({"body": "hello"}),
    };
    let enqueued = store.enqueue(&enqueue).expect("enqueue");
    assert_eq!(enqueued.status, OutboxStatus::Pending);

    let claimed = store
        .claim(&row.loop_id, "worker-a", 1, None, now())
        .expect("claim outbox")
        .expect("row available");
    assert_eq!(claimed.outbox_id, enqueued.outbox_id);
    assert_eq!(claimed.status, OutboxStatus::Running);

    let retry_input = OutboxCompleteInput {
        succeeded: false,
        retriable: true,
        ..OutboxCompleteInput::default()
    };
    let retry_outcome = store
        .complete(&claimed.outbox_id, "worker-a", &retry_input, now())
        .expect("complete with retry");
    assert!(matches!(retry_outcome, OutboxCompleteOutcome::RetryScheduled { .. }));

    // Not yet eligible for reclaim before its retry time.
    let not_yet = store.claim(&row.loop_id, "worker-a", 1, None, now()).expect("claim too soon");
    assert!(not_yet.is_none());

    let claimed_again = store
        .claim(&row.loop_id, "worker-a", 1, None, now().plus_millis(3_600_000))
        .expect("claim after retry window")
        .expect("row available again");

    let success_outcome = store
        .complete(&claimed_again.outbox_id, "worker-a", &OutboxCompleteInput::default(), now())
        .expect("complete successfully");
    assert_eq!(success_outcome, OutboxCompleteOutcome::Completed);
}

#[test]
fn outbox_enqueue_supersedes_pending_sibling_in_same_group() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let row = sample_loop_row("loop-6");
    store.insert_loop(&row).expect("insert loop");

    let first = store
        .enqueue(&ActionKeyedEnqueue {
            loop_id: row.loop_id.clone(),
            transition_seq: 1,
            action_type: ActionType::PublishStatusComment,
            action_key: ActionKey::new("status-comment-v1"),
            payload: serde_json::json!({"body": "v1"}),
        })
        .expect("enqueue first");

    store
        .enqueue(&ActionKeyedEnqueue {
            loop_id: row.loop_id.clone(),
            transition_seq: 2,
            action_type: ActionType::PublishCheckSummary,
            action_key: ActionKey::new("check-summary-v2"),
            payload: serde_json::json!({"body": "v2"}),
        })
        .expect("enqueue second");

    store.acquire(&row.loop_id, "worker-a", 60_000, now()).expect("acquire lease");
    let claimable = store
        .claim(&row.loop_id, "worker-a", 1, None, now())
        .expect("claim")
        .expect("one claimable row remains");
    assert_ne!(claimable.outbox_id, first.outbox_id, "the superseded sibling must not be claimable");

    let none_left = store.claim(&row.loop_id, "worker-a", 1, None, now()).expect("claim again");
    assert!(none_left.is_none(), "the superseded sibling must never surface");
}

#[test]
fn outbox_cancel_all_for_loop_cancels_pending_rows() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let row = sample_loop_row("loop-7");
    store.insert_loop(&row).expect("insert loop");

    store
        .enqueue(&ActionKeyedEnqueue {
            loop_id: row.loop_id.clone(),
            transition_seq: 1,
            action_type: ActionType::EmitTelemetry,
            action_key: ActionKey::new("telemetry-1"),
            payload: serde_json::json!({}),
        })
        .expect("enqueue");

    let canceled = store.cancel_all_for_loop(&row.loop_id, "manual stop").expect("cancel all");
    assert_eq!(canceled, 1);

    store.acquire(&row.loop_id, "worker-a", 60_000, now()).expect("acquire lease");
    let none_claimable = store.claim(&row.loop_id, "worker-a", 1, None, now()).expect("claim");
    assert!(none_claimable.is_none());
}

#[test]
fn signal_inbox_drains_oldest_unprocessed_first() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let loop_id = LoopId::new("loop-8");

    let older = SignalInboxRow {
        signal_id: SignalId::new("signal-older"),
        loop_id: loop_id.clone(),
        cause_type: CauseType::CheckRunCompleted,
        canonical_cause_id: CanonicalCauseId::new("cause-older"),
        payload: serde_json::json!({}),
        received_at: now(),
        processed_at: None,
        cause_identity_version: CAUSE_IDENTITY_VERSION,
    };
    let newer = SignalInboxRow {
        signal_id: SignalId::new("signal-newer"),
        canonical_cause_id: CanonicalCauseId::new("cause-newer"),
        received_at: now().plus_millis(1_000),
        ..older.clone()
    };
    store.insert_signal(&older).expect("insert older");
    store.insert_signal(&newer).expect("insert newer");

    let next = store.oldest_unprocessed(&loop_id).expect("oldest").expect("present");
    assert_eq!(next.signal_id, older.signal_id);

    let marked = store.mark_processed(&older.signal_id, now()).expect("mark processed");
    assert!(marked);

    let next_after = store.oldest_unprocessed(&loop_id).expect("oldest after").expect("present");
    assert_eq!(next_after.signal_id, newer.signal_id);
}

#[test]
fn gate_store_upsert_ignores_stale_loop_version() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let loop_id = LoopId::new("loop-9");
    let head_sha = HeadSha::new("deadbeef");

    let fresh = GateRunRow {
        loop_id: loop_id.clone(),
        head_sha: head_sha.clone(),
        loop_version: 5,
        gate_kind: GateKind::Ci,
        status: GateStatus::Passed,
        gate_passed: true,
        detail: GateRunDetail::Ci {
            failing_required_checks: vec![],
            capability_state: CiCapabilityState::Supported,
        },
        trigger_event: "ci_gate_passed".to_string(),
        evaluated_at: now(),
    };
    store.upsert_gate_run(&fresh).expect("upsert fresh");

    let stale = GateRunRow {
        loop_version: 2,
        gate_passed: false,
        status: GateStatus::Blocked,
        detail: GateRunDetail::Ci {
            failing_required_checks: vec!["lint".to_string()],
            capability_state: CiCapabilityState::Supported,
        },
        ..fresh.clone()
    };
    store.upsert_gate_run(&stale).expect("upsert stale");

    let loaded = store
        .latest_gate_run(&loop_id, &head_sha, GateKind::Ci)
        .expect("latest")
        .expect("present");
    assert_eq!(loaded, fresh, "a stale loop_version must not overwrite a newer gate run");
}

#[test]
fn artifact_store_supersedes_prior_and_approves_with_cas() {
    let store = SqliteStore::open_in_memory().expect("open store");
    let loop_id = LoopId::new("loop-10");

    let first = PhaseArtifactRow {
        artifact_id: ArtifactId::new("artifact-1"),
        loop_id: loop_id.clone(),
        phase: Phase::Planning,
        artifact_type: "plan".to_string(),
        head_sha: None,
        loop_version: 0,
        status: ArtifactStatus::Generated,
        generated_by: "agent".to_string(),
        payload: serde_json::json!({}),
        approved_by_user_id: None,
        created_at: now(),
    };
    store.create_plan_artifact(&first).expect("create first");

    let second = PhaseArtifactRow {
        artifact_id: ArtifactId::new("artifact-2"),
        created_at: now().plus_millis(1_000),
        ..first.clone()
    };
    store.create_plan_artifact(&second).expect("create second");

    let superseded = store
        .get_artifact(&first.artifact_id)
        .expect("get first")
        .expect("present");
    assert_eq!(superseded.status, ArtifactStatus::Superseded);

    let approved_by = UserId::new("approver-1");
    let approved = store
        .approve_plan_artifact(&second.artifact_id, &approved_by)
        .expect("approve");
    assert!(approved);

    let double_approve = store
        .approve_plan_artifact(&second.artifact_id, &approved_by)
        .expect("approve again");
    assert!(!double_approve, "approving an already-approved artifact must be a no-op");

    let reloaded = store
        .get_artifact(&second.artifact_id)
        .expect("get second")
        .expect("present");
    assert_eq!(reloaded.status, ArtifactStatus::Approved);
    assert_eq!(reloaded.approved_by_user_id, Some(approved_by));
}

#[test]
fn parity_store_filters_samples_by_window() {
    let store = SqliteStore::open_in_memory().expect("open store");

    let inside = ParityMetricSample {
        cause_type: CauseType::PullRequestSynchronize,
        target_class: ParityTargetClass::StateTransition,
        matched: true,
        eligible: true,
        observed_at: now(),
    };
    let outside = ParityMetricSample {
        observed_at: now().plus_millis(10_000_000),
        ..inside
    };
    store.record_sample(&inside).expect("record inside");
    store.record_sample(&outside).expect("record outside");

    let window = store
        .samples_in_window(now(), now().plus_millis(1_000))
        .expect("samples in window");
    assert_eq!(window, vec![inside]);
}
