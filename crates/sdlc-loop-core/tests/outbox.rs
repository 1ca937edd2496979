// crates/sdlc-loop-core/tests/outbox.rs
// ============================================================================
// Module: Outbox Backoff and Completion Tests
// Description: Exponential backoff formula and completion-decision logic.
// ============================================================================

//! ## Overview
//! Verifies the `now + min(maxBackoffMs, baseBackoffMs * 2^max(0,
//! attempt-1))` backoff formula and the completed/retry/failed decision in
//! [`sdlc_loop_core::runtime::outbox`].

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

use proptest::prelude::*;
use sdlc_loop_core::core::outbox::ActionType;
use sdlc_loop_core::core::outbox::SupersessionGroup;
use sdlc_loop_core::core::outbox::normalize_error_message;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::runtime::outbox::OutboxCompleteInput;
use sdlc_loop_core::runtime::outbox::OutboxCompleteOutcome;
use sdlc_loop_core::runtime::outbox::compute_backoff;
use sdlc_loop_core::runtime::outbox::decide_outbox_completion;

#[test]
fn backoff_is_base_delay_on_first_attempt() {
    let now = Timestamp::from_unix_millis(0);
    let backoff = compute_backoff(1, 30_000, 1_800_000, now);
    assert_eq!(backoff.unix_millis(), 30_000);
}

#[test]
fn backoff_doubles_each_attempt_until_the_cap() {
    let now = Timestamp::from_unix_millis(0);
    assert_eq!(compute_backoff(1, 30_000, 1_800_000, now).unix_millis(), 30_000);
    assert_eq!(compute_backoff(2, 30_000, 1_800_000, now).unix_millis(), 60_000);
    assert_eq!(compute_backoff(3, 30_000, 1_800_000, now).unix_millis(), 120_000);
    assert_eq!(compute_backoff(4, 30_000, 1_800_000, now).unix_millis(), 240_000);
}

#[test]
fn backoff_saturates_at_the_max_backoff() {
    let now = Timestamp::from_unix_millis(0);
    let backoff = compute_backoff(10, 30_000, 1_800_000, now);
    assert_eq!(backoff.unix_millis(), 1_800_000);
}

#[test]
fn backoff_treats_attempt_zero_the_same_as_attempt_one() {
    let now = Timestamp::from_unix_millis(0);
    assert_eq!(compute_backoff(0, 30_000, 1_800_000, now), compute_backoff(1, 30_000, 1_800_000, now));
}

proptest! {
    #[test]
    fn backoff_never_exceeds_max_backoff_for_any_attempt(
        attempt in 0u32 .. 64,
        base in 1i64 .. 100_000,
        max in 1i64 .. 2_000_000,
    ) {
        let now = Timestamp::from_unix_millis(1_700_000_000_000);
        let backoff = compute_backoff(attempt, base, max, now);
        let delay = backoff.unix_millis() - now.unix_millis();
        prop_assert!(delay <= max);
        prop_assert!(delay >= 0);
    }

    #[test]
    fn backoff_is_monotonically_non_decreasing_in_attempt(
        attempt in 0u32 .. 63,
        base in 1i64 .. 100_000,
        max in 1i64 .. 2_000_000,
    ) {
        let now = Timestamp::from_unix_millis(1_700_000_000_000);
        let this_attempt = compute_backoff(attempt, base, max, now);
        let next_attempt = compute_backoff(attempt + 1, base, max, now);
        prop_assert!(next_attempt >= this_attempt);
    }
}

#[test]
fn completion_succeeded_always_completes_regardless_of_attempt_count() {
    let input = OutboxCompleteInput {
        succeeded: true,
        ..OutboxCompleteInput::default()
    };
    let now = Timestamp::from_unix_millis(0);
    assert_eq!(decide_outbox_completion(4, &input, now), OutboxCompleteOutcome::Completed);
}

#[test]
fn completion_schedules_a_retry_when_retriable_and_under_the_attempt_budget() {
    let input = OutboxCompleteInput {
        succeeded: false,
        retriable: true,
        max_attempts: 5,
        base_backoff_ms: 30_000,
        max_backoff_ms: 1_800_000,
        ..OutboxCompleteInput::default()
    };
    let now = Timestamp::from_unix_millis(0);
    match decide_outbox_completion(1, &input, now) {
        OutboxCompleteOutcome::RetryScheduled { retry_at } => assert_eq!(retry_at.unix_millis(), 30_000),
        other => panic!("expected RetryScheduled, got {other:?}"),
    }
}

#[test]
fn completion_fails_once_the_attempt_budget_is_exhausted() {
    let input = OutboxCompleteInput {
        succeeded: false,
        retriable: true,
        max_attempts: 5,
        ..OutboxCompleteInput::default()
    };
    let now = Timestamp::from_unix_millis(0);
    assert_eq!(decide_outbox_completion(5, &input, now), OutboxCompleteOutcome::Failed);
}

#[test]
fn completion_fails_immediately_when_not_retriable() {
    let input = OutboxCompleteInput {
        succeeded: false,
        retriable: false,
        ..OutboxCompleteInput::default()
    };
    let now = Timestamp::from_unix_millis(0);
    assert_eq!(decide_outbox_completion(0, &input, now), OutboxCompleteOutcome::Failed);
}

#[test]
fn publish_actions_share_one_supersession_group() {
    assert_eq!(
        ActionType::PublishStatusComment.supersession_group(),
        SupersessionGroup::PublicationStatus
    );
    assert_eq!(
        ActionType::PublishCheckSummary.supersession_group(),
        SupersessionGroup::PublicationStatus
    );
    assert_eq!(ActionType::EnqueueFixTask.supersession_group(), SupersessionGroup::FixTaskEnqueue);
    assert_eq!(ActionType::PublishVideoLink.supersession_group(), SupersessionGroup::PublicationVideo);
    assert_eq!(ActionType::EmitTelemetry.supersession_group(), SupersessionGroup::Telemetry);
}

#[test]
fn error_message_normalization_trims_and_truncates_by_char_count() {
    assert_eq!(normalize_error_message("  boom  "), "boom");
    let long = "x".repeat(2000);
    let normalized = normalize_error_message(&long);
    assert_eq!(normalized.chars().count(), 1000);
}
