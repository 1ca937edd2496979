// crates/sdlc-loop-core/src/runtime/parity.rs
// ============================================================================
// Module: SDLC Loop Parity SLO Algorithms
// Description: Bucketing and cutover/rollback decision logic for the
// legacy/new coordinator parity framework.
// Purpose: Keep parity aggregation and SLO evaluation as pure functions over
// an in-memory sample slice.
// Dependencies: crate::core::parity, crate::core::signal
// ============================================================================

//! ## Overview
//! Parity samples are loaded by a store (windowed by time) and handed here
//! as a plain slice; this module owns only the arithmetic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::parity::ParityBucketStats;
use crate::core::parity::ParityMetricSample;
use crate::core::parity::ParityTargetClass;
use crate::core::signal::CauseType;

// ============================================================================
// SECTION: Bucketing
// ============================================================================

/// Groups samples by `(causeType, targetClass)` and computes per-bucket
/// parity. A bucket with zero eligible samples reports `parity = 1.0`.
#[must_use]
pub fn get_parity_bucket_stats(samples: &[ParityMetricSample]) -> Vec<ParityBucketStats> {
    let mut buckets: BTreeMap<(CauseType, ParityTargetClass), (u64, u64)> = BTreeMap::new();

    for sample in samples {
        let entry = buckets.entry((sample.cause_type, sample.target_class)).or_insert((0, 0));
        if sample.eligible {
            entry.0 += 1;
            if sample.matched {
                entry.1 += 1;
            }
        }
    }

    buckets
        .into_iter()
        .map(|((cause_type, target_class), (eligible_count, matched_count))| {
            #[allow(
                clippy::cast_precision_loss,
                reason = "sample counts are expected to stay well under f64's exact-integer range"
            )]
            let parity = if eligible_count == 0 {
                1.0
            } else {
                matched_count as f64 / eligible_count as f64
            };
            ParityBucketStats {
                cause_type,
                target_class,
                eligible_count,
                matched_count,
                parity,
            }
        })
        .collect()
}

// ============================================================================
// SECTION: SLO Evaluation
// ============================================================================

/// Outcome of evaluating bucket statistics against the cutover/rollback
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParitySloDecision {
    /// Whether every bucket clears the cutover bar and no critical
    /// invariant violation was observed.
    pub cutover_eligible: bool,
    /// Whether any bucket (or the critical-invariant flag) demands an
    /// immediate rollback.
    pub rollback_required: bool,
}

/// Default parity required for cutover eligibility.
pub const DEFAULT_CUTOVER_THRESHOLD: f64 = 0.999;
/// Default parity floor below which rollback is required.
pub const DEFAULT_ROLLBACK_THRESHOLD: f64 = 0.99;

/// Evaluates cutover eligibility and rollback necessity from bucket
/// statistics.
///
/// `cutover_eligible` requires a non-empty bucket set, every bucket having
/// `eligible_count > 0`, every bucket's parity at or above
/// `cutover_threshold`, and no critical invariant violation.
///
/// `rollback_required` is set by a critical invariant violation, or by any
/// bucket with `eligible_count > 0` whose parity falls below
/// `rollback_threshold`.
#[must_use]
pub fn evaluate_parity_slo(
    bucket_stats: &[ParityBucketStats],
    critical_invariant_violation: bool,
    cutover_threshold: f64,
    rollback_threshold: f64,
) -> ParitySloDecision {
    let cutover_eligible = !critical_invariant_violation
        && !bucket_stats.is_empty()
        && bucket_stats
            .iter()
            .all(|bucket| bucket.eligible_count > 0 && bucket.parity >= cutover_threshold);

    let rollback_required = critical_invariant_violation
        || bucket_stats
            .iter()
            .any(|bucket| bucket.eligible_count > 0 && bucket.parity < rollback_threshold);

    ParitySloDecision {
        cutover_eligible,
        rollback_required,
    }
}
