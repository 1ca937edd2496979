// crates/sdlc-loop-core/src/core/parity.rs
// ============================================================================
// Module: SDLC Loop Parity Telemetry
// Description: Parity metric sample row shape.
// Purpose: Model the append-only sample table backing the parity-SLO
// framework.
// Dependencies: crate::core::time, serde
// ============================================================================

//! ## Overview
//! Parity samples record, for one migrated cause/target pair, whether the
//! new coordinator's decision matched the legacy one. Bucket statistics and
//! SLO evaluation are pure functions in [`crate::runtime::parity`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::signal::CauseType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Parity Metric Sample
// ============================================================================

/// One append-only observation of coordinator parity.
///
/// # Invariants
/// - Never mutated or deleted once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityMetricSample {
    /// External event kind the sample observed.
    pub cause_type: CauseType,
    /// Identifier of the migration target class being compared.
    pub target_class: ParityTargetClass,
    /// Whether the new and legacy coordinators agreed.
    pub matched: bool,
    /// Whether this sample counts toward the parity denominator.
    pub eligible: bool,
    /// Timestamp the sample was observed.
    pub observed_at: Timestamp,
}

/// Coarse classification of what a parity sample is comparing.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityTargetClass {
    /// State-transition decision parity.
    StateTransition,
    /// Gate-evaluation outcome parity.
    GateOutcome,
    /// Outbox action shape parity.
    OutboxAction,
}

/// Aggregate parity statistics for one `(causeType, targetClass)` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParityBucketStats {
    /// The bucket's cause type.
    pub cause_type: CauseType,
    /// The bucket's target class.
    pub target_class: ParityTargetClass,
    /// Number of samples counted toward the denominator.
    pub eligible_count: u64,
    /// Number of eligible samples that matched.
    pub matched_count: u64,
    /// `matched_count / eligible_count`, or `1.0` if `eligible_count == 0`.
    pub parity: f64,
}
