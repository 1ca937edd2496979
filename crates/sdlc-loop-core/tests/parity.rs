// crates/sdlc-loop-core/tests/parity.rs
// ============================================================================
// Module: Parity Bucketing and SLO Decision Tests
// Description: Verifies bucket aggregation and the cutover/rollback
// threshold evaluation for the coordinator parity framework.
// ============================================================================

//! ## Overview
//! [`get_parity_bucket_stats`] groups samples by `(causeType, targetClass)`
//! and [`evaluate_parity_slo`] turns those buckets into a cutover/rollback
//! decision; both must treat an empty-eligible bucket as full parity.

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

use sdlc_loop_core::core::parity::ParityBucketStats;
use sdlc_loop_core::core::parity::ParityMetricSample;
use sdlc_loop_core::core::parity::ParityTargetClass;
use sdlc_loop_core::core::signal::CauseType;
use sdlc_loop_core::core::time::Timestamp;
use sdlc_loop_core::runtime::parity::DEFAULT_CUTOVER_THRESHOLD;
use sdlc_loop_core::runtime::parity::DEFAULT_ROLLBACK_THRESHOLD;
use sdlc_loop_core::runtime::parity::ParitySloDecision;
use sdlc_loop_core::runtime::parity::evaluate_parity_slo;
use sdlc_loop_core::runtime::parity::get_parity_bucket_stats;

fn sample(cause_type: CauseType, target_class: ParityTargetClass, eligible: bool, matched: bool) -> ParityMetricSample {
    ParityMetricSample {
        cause_type,
        target_class,
        matched,
        eligible,
        observed_at: Timestamp::from_unix_millis(0),
    }
}

#[test]
fn bucketing_groups_by_cause_and_target_class() {
    let samples = vec![
        sample(CauseType::CheckRunCompleted, ParityTargetClass::GateOutcome, true, true),
        sample(CauseType::CheckRunCompleted, ParityTargetClass::GateOutcome, true, false),
        sample(CauseType::PullRequestSynchronize, ParityTargetClass::StateTransition, true, true),
    ];
    let buckets = get_parity_bucket_stats(&samples);
    assert_eq!(buckets.len(), 2);

    let gate_bucket = buckets
        .iter()
        .find(|b| b.target_class == ParityTargetClass::GateOutcome)
        .expect("gate_outcome bucket must exist");
    assert_eq!(gate_bucket.eligible_count, 2);
    assert_eq!(gate_bucket.matched_count, 1);
    assert!((gate_bucket.parity - 0.5).abs() < f64::EPSILON);
}

#[test]
fn ineligible_samples_do_not_count_toward_either_total() {
    let samples = vec![
        sample(CauseType::CheckRunCompleted, ParityTargetClass::GateOutcome, false, true),
        sample(CauseType::CheckRunCompleted, ParityTargetClass::GateOutcome, true, true),
    ];
    let buckets = get_parity_bucket_stats(&samples);
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].eligible_count, 1);
    assert_eq!(buckets[0].matched_count, 1);
}

#[test]
fn an_empty_sample_slice_produces_no_buckets() {
    assert!(get_parity_bucket_stats(&[]).is_empty());
}

fn bucket(eligible_count: u64, matched_count: u64) -> ParityBucketStats {
    ParityBucketStats {
        cause_type: CauseType::CheckRunCompleted,
        target_class: ParityTargetClass::GateOutcome,
        eligible_count,
        matched_count,
        parity: if eligible_count == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = matched_count as f64 / eligible_count as f64;
            ratio
        },
    }
}

#[test]
fn cutover_requires_every_bucket_at_or_above_the_threshold() {
    let buckets = vec![bucket(1000, 1000), bucket(500, 500)];
    let decision = evaluate_parity_slo(&buckets, false, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert_eq!(
        decision,
        ParitySloDecision {
            cutover_eligible: true,
            rollback_required: false,
        }
    );
}

#[test]
fn a_single_bucket_below_cutover_blocks_cutover_but_not_rollback() {
    let buckets = vec![bucket(1000, 1000), bucket(1000, 995)];
    let decision = evaluate_parity_slo(&buckets, false, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert!(!decision.cutover_eligible);
    assert!(!decision.rollback_required);
}

#[test]
fn a_bucket_below_the_rollback_floor_forces_rollback() {
    let buckets = vec![bucket(1000, 980)];
    let decision = evaluate_parity_slo(&buckets, false, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert_eq!(
        decision,
        ParitySloDecision {
            cutover_eligible: false,
            rollback_required: true,
        }
    );
}

#[test]
fn a_critical_invariant_violation_forces_rollback_even_with_perfect_parity() {
    let buckets = vec![bucket(1000, 1000)];
    let decision = evaluate_parity_slo(&buckets, true, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert!(decision.rollback_required);
    assert!(!decision.cutover_eligible);
}

#[test]
fn an_empty_bucket_set_is_never_cutover_eligible() {
    let decision = evaluate_parity_slo(&[], false, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert!(!decision.cutover_eligible);
    assert!(!decision.rollback_required);
}

#[test]
fn a_bucket_with_zero_eligible_samples_does_not_block_cutover_or_trigger_rollback() {
    let buckets = vec![bucket(1000, 1000), bucket(0, 0)];
    let decision = evaluate_parity_slo(&buckets, false, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert!(!decision.cutover_eligible, "a zero-eligible bucket still fails the eligible_count > 0 cutover check");
    assert!(!decision.rollback_required);
}

#[test]
fn parity_exactly_at_the_rollback_floor_does_not_trigger_rollback() {
    let buckets = vec![bucket(1000, 990)];
    let decision = evaluate_parity_slo(&buckets, false, DEFAULT_CUTOVER_THRESHOLD, DEFAULT_ROLLBACK_THRESHOLD);
    assert!(!decision.rollback_required);
}
