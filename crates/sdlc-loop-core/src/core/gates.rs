// crates/sdlc-loop-core/src/core/gates.rs
// ============================================================================
// Module: SDLC Loop Gate Runs and Findings
// Description: Gate kind, gate run rows, and finding rows.
// Purpose: Model the persisted shape of CI, review-thread, deep-review, and
// Carmack-review gate evaluations.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! All four gate evaluators share one row shape keyed by `(loopId, headSha)`.
//! This module defines that shape plus the finding rows the deep-review and
//! Carmack-review gates produce. Evaluation logic lives in
//! [`crate::runtime::gates`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::HeadSha;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::StableFindingId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Gate Kind
// ============================================================================

/// The four gate kinds the loop evaluates.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Continuous-integration checks gate.
    Ci,
    /// Unresolved PR review-thread count gate.
    ReviewThread,
    /// LLM-based deep-review gate.
    DeepReview,
    /// LLM-based "Carmack" high-bar review gate, gated on deep review.
    CarmackReview,
}

impl GateKind {
    /// Returns the string prefix used when deriving a stable finding id.
    #[must_use]
    pub const fn finding_prefix(self) -> &'static str {
        match self {
            Self::Ci => "ci",
            Self::ReviewThread => "review_thread",
            Self::DeepReview => "deep_review",
            Self::CarmackReview => "carmack_review",
        }
    }
}

// ============================================================================
// SECTION: Gate Status
// ============================================================================

/// Outcome status of a gate run.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// The gate passed.
    Passed,
    /// The gate blocked the loop.
    Blocked,
    /// The CI provider does not support the required capability.
    CapabilityError,
    /// An error that is expected to clear without caller action.
    TransientError,
    /// The LLM output failed schema validation.
    InvalidOutput,
}

// ============================================================================
// SECTION: Gate Run Row
// ============================================================================

/// CI capability state reported by the checks provider.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiCapabilityState {
    /// The provider supports the required-checks query.
    Supported,
    /// The provider forbids the required-checks query for this repository.
    Forbidden,
    /// The provider does not support the required-checks query at all.
    Unsupported,
    /// The provider returned a transient error.
    TransientError,
}

/// Gate-kind-specific fields attached to a gate run.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate_kind", rename_all = "snake_case")]
pub enum GateRunDetail {
    /// CI gate details.
    Ci {
        /// Checks still failing among the required set.
        failing_required_checks: Vec<String>,
        /// Capability state reported by the provider.
        capability_state: CiCapabilityState,
    },
    /// Review-thread gate details.
    ReviewThread {
        /// Count of unresolved review threads.
        unresolved_thread_count: Option<u32>,
        /// Error code supplied by the caller, if any.
        error_code: Option<String>,
    },
    /// Deep-review gate details.
    DeepReview {
        /// Whether the LLM output failed schema validation.
        invalid_output: bool,
        /// Error code, set when `invalid_output` is true.
        error_code: Option<String>,
    },
    /// Carmack-review gate details.
    CarmackReview {
        /// Whether the LLM output failed schema validation.
        invalid_output: bool,
        /// Error code, set when `invalid_output` is true.
        error_code: Option<String>,
    },
}

/// Persisted representation of one gate evaluation.
///
/// # Invariants
/// - `(loop_id, head_sha)` unique per `gate_kind`; upsert on conflict
///   overwrites only when the new `loop_version` is greater or equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRunRow {
    /// Owning loop.
    pub loop_id: LoopId,
    /// Commit SHA this evaluation applies to.
    pub head_sha: HeadSha,
    /// Loop version at evaluation time.
    pub loop_version: u64,
    /// Which gate this row belongs to.
    pub gate_kind: GateKind,
    /// Outcome status.
    pub status: GateStatus,
    /// Whether the gate passed.
    pub gate_passed: bool,
    /// Gate-kind-specific detail fields.
    pub detail: GateRunDetail,
    /// Transition event tag this evaluation was triggered by.
    pub trigger_event: String,
    /// Timestamp of evaluation.
    pub evaluated_at: Timestamp,
}

// ============================================================================
// SECTION: Findings
// ============================================================================

/// Severity of a deep-review or Carmack-review finding.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Must be resolved before the gate can pass.
    Critical,
    /// Should be resolved before the gate can pass.
    High,
    /// Worth fixing but not blocking.
    Medium,
    /// Cosmetic or informational.
    Low,
}

/// A finding produced by the deep-review or Carmack-review gate.
///
/// # Invariants
/// - `(loop_id, head_sha, stable_finding_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRow {
    /// Owning loop.
    pub loop_id: LoopId,
    /// Commit SHA this finding applies to.
    pub head_sha: HeadSha,
    /// Stable identifier, caller-provided or content-hash-derived.
    pub stable_finding_id: StableFindingId,
    /// Finding severity.
    pub severity: Severity,
    /// Finding category.
    pub category: String,
    /// Finding title.
    pub title: String,
    /// Finding detail.
    pub detail: String,
    /// Suggested fix, if provided.
    pub suggested_fix: Option<String>,
    /// Whether this finding blocks the gate.
    pub is_blocking: bool,
    /// Timestamp the finding was resolved, if resolved.
    pub resolved_at: Option<Timestamp>,
    /// Identifier of the event that resolved the finding, if resolved.
    pub resolved_by_event_id: Option<String>,
}

/// Raw LLM gate output prior to validation.
///
/// Deserialization failure of a required field is treated as the
/// schema-failure branch; unknown fields are tolerated but not acted upon.
///
/// Field names follow the wire's `camelCase` convention (`gatePassed`,
/// `blockingFindings`), matching every other JSON payload this crate reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGateOutput {
    /// Whether the LLM judged the gate as passed.
    pub gate_passed: bool,
    /// Findings that block the gate from passing.
    #[serde(default)]
    pub blocking_findings: Vec<RawFinding>,
}

/// Raw finding shape as emitted by an LLM gate evaluator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    /// Finding title.
    pub title: String,
    /// Finding severity.
    pub severity: Severity,
    /// Finding category.
    pub category: String,
    /// Finding detail.
    pub detail: String,
    /// Suggested fix, if provided.
    #[serde(default)]
    pub suggested_fix: Option<String>,
    /// Whether this finding blocks the gate; always `true` on the wire.
    #[serde(default = "default_true")]
    pub is_blocking: bool,
    /// Caller-supplied stable identifier, if provided.
    #[serde(default)]
    pub stable_finding_id: Option<String>,
}

/// Default value for `RawFinding::is_blocking` when omitted.
const fn default_true() -> bool {
    true
}
