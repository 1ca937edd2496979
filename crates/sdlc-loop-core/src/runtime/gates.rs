// crates/sdlc-loop-core/src/runtime/gates.rs
// ============================================================================
// Module: SDLC Loop Gate Evaluation Algorithms
// Description: Pure decision logic for the CI, review-thread, deep-review,
// and Carmack-review gates, plus video-capture failure classification.
// Purpose: Keep required-check precedence, optimistic-pass acceptance, and
// finding normalization as deterministic, independently testable functions.
// Dependencies: crate::core::gates, crate::core::hashing
// ============================================================================

//! ## Overview
//! Each gate evaluator shares one shape: normalize input, decide pass/block,
//! and (for the LLM-backed gates) validate and normalize findings. This
//! module holds the decision half; the transactional upsert-plus-transition
//! half lives in [`crate::controller`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::gates::CiCapabilityState;
use crate::core::gates::FindingRow;
use crate::core::gates::GateKind;
use crate::core::gates::GateRunRow;
use crate::core::gates::GateStatus;
use crate::core::gates::RawFinding;
use crate::core::gates::RawGateOutput;
use crate::core::hashing::derive_stable_finding_id;
use crate::core::identifiers::HeadSha;
use crate::core::identifiers::StableFindingId;

// ============================================================================
// SECTION: CI Gate — Required Check Resolution
// ============================================================================

/// Source a CI gate's required-check list was resolved from.
///
/// # Invariants
/// - Precedence, when more than one list is non-empty, is
///   `ruleset -> branch_protection -> allowlist -> no_required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredCheckSource {
    /// Resolved from the repository's ruleset.
    Ruleset,
    /// Resolved from classic branch protection.
    BranchProtection,
    /// Resolved from a caller-configured allowlist.
    Allowlist,
    /// No required checks are configured anywhere.
    NoRequired,
}

/// Trims, dedupes, and lexically sorts a list of check names.
#[must_use]
pub fn normalize_check_list(checks: &[String]) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for check in checks {
        let trimmed = check.trim();
        if !trimmed.is_empty() {
            set.insert(trimmed.to_string());
        }
    }
    set.into_iter().collect()
}

/// Resolves the required-check source and normalized list by precedence
/// `ruleset -> branch_protection -> allowlist -> no_required`.
#[must_use]
pub fn resolve_required_checks(
    ruleset_checks: &[String],
    branch_protection_checks: &[String],
    allowlist_checks: &[String],
) -> (RequiredCheckSource, Vec<String>) {
    let ruleset = normalize_check_list(ruleset_checks);
    if !ruleset.is_empty() {
        return (RequiredCheckSource::Ruleset, ruleset);
    }
    let branch_protection = normalize_check_list(branch_protection_checks);
    if !branch_protection.is_empty() {
        return (RequiredCheckSource::BranchProtection, branch_protection);
    }
    let allowlist = normalize_check_list(allowlist_checks);
    if !allowlist.is_empty() {
        return (RequiredCheckSource::Allowlist, allowlist);
    }
    (RequiredCheckSource::NoRequired, Vec::new())
}

/// Intersects the normalized failing-check list with the required-check set.
#[must_use]
pub fn compute_failing_required_checks(
    failing_checks: &[String],
    required_checks: &[String],
) -> Vec<String> {
    let required: BTreeSet<&str> = required_checks.iter().map(String::as_str).collect();
    normalize_check_list(failing_checks)
        .into_iter()
        .filter(|check| required.contains(check.as_str()))
        .collect()
}

/// Decides the CI gate status from a capability state and the failing
/// required-check set.
#[must_use]
pub fn decide_ci_gate_status(
    capability_state: CiCapabilityState,
    required_checks: &[String],
    failing_required_checks: &[String],
) -> (GateStatus, bool) {
    if capability_state != CiCapabilityState::Supported {
        return (GateStatus::CapabilityError, false);
    }
    if required_checks.is_empty() || failing_required_checks.is_empty() {
        (GateStatus::Passed, true)
    } else {
        (GateStatus::Blocked, false)
    }
}

// ============================================================================
// SECTION: CI Gate — Optimistic Pass Policy
// ============================================================================

/// A positive CI signal's trust envelope, as required by the optimistic-pass
/// policy: acceptance requires a snapshot source, completeness, and check
/// names covering every known required check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiOptimisticPassSnapshot {
    /// Snapshot source tag (e.g. `"github_check_runs"`), if supplied.
    pub snapshot_source: Option<String>,
    /// Whether the snapshot is declared complete.
    pub snapshot_complete: bool,
    /// Check names covered by the snapshot.
    pub snapshot_check_names: Vec<String>,
}

/// Decides whether a `checkOutcome=pass` signal may be trusted without
/// independently re-querying the provider.
///
/// Acceptance requires a snapshot source, `snapshot_complete == true`, and a
/// check-name list that is a superset of `known_required_checks`.
#[must_use]
pub fn accepts_ci_optimistic_pass(
    snapshot: &CiOptimisticPassSnapshot,
    known_required_checks: &[String],
) -> bool {
    if snapshot.snapshot_source.is_none() || !snapshot.snapshot_complete {
        return false;
    }
    let covered: BTreeSet<&str> = snapshot
        .snapshot_check_names
        .iter()
        .map(String::as_str)
        .collect();
    known_required_checks
        .iter()
        .all(|check| covered.contains(check.as_str()))
}

// ============================================================================
// SECTION: Review-Thread Gate
// ============================================================================

/// Decides the review-thread gate status from an unresolved-thread count and
/// an optional upstream error code.
#[must_use]
pub fn decide_review_thread_gate_status(
    unresolved_thread_count: Option<u32>,
    error_code: Option<&str>,
) -> (GateStatus, bool) {
    if error_code.is_some() {
        return (GateStatus::TransientError, false);
    }
    match unresolved_thread_count {
        Some(0) => (GateStatus::Passed, true),
        _ => (GateStatus::Blocked, false),
    }
}

/// Decides whether an `unresolvedThreadCount=0` signal may be trusted,
/// based on whether its source is in the caller-configured allowlist of
/// authoritative sources.
#[must_use]
pub fn accepts_review_thread_optimistic_pass(
    unresolved_thread_count_source: Option<&str>,
    trusted_sources: &[String],
) -> bool {
    unresolved_thread_count_source
        .is_some_and(|source| trusted_sources.iter().any(|trusted| trusted == source))
}

// ============================================================================
// SECTION: Deep Review / Carmack Review Gates
// ============================================================================

/// Deserializes and validates a raw LLM gate output against the fixed
/// schema. Deserialization failure (missing/mistyped required fields) is the
/// schema-failure branch; unknown fields are tolerated.
///
/// # Errors
///
/// Returns the `serde_json` error describing the first validation failure.
pub fn validate_raw_gate_output(raw_json: &str) -> Result<RawGateOutput, serde_json::Error> {
    serde_json::from_str(raw_json)
}

/// Normalizes raw findings into [`FindingRow`]s, deriving a stable finding
/// id by content hash where the caller did not supply one.
#[must_use]
pub fn normalize_findings(
    gate_kind: GateKind,
    head_sha: &HeadSha,
    raw_findings: &[RawFinding],
) -> Vec<FindingRow> {
    let mut by_id: Vec<(StableFindingId, FindingRow)> = Vec::with_capacity(raw_findings.len());
    for raw in raw_findings {
        let severity_str = format!("{:?}", raw.severity).to_lowercase();
        let stable_finding_id = raw.stable_finding_id.clone().map(StableFindingId::new).unwrap_or_else(|| {
            StableFindingId::new(derive_stable_finding_id(
                gate_kind.finding_prefix(),
                &raw.title,
                &severity_str,
                &raw.category,
                &raw.detail,
            ))
        });
        let row = FindingRow {
            loop_id: crate::core::identifiers::LoopId::new(String::new()),
            head_sha: head_sha.clone(),
            stable_finding_id: stable_finding_id.clone(),
            severity: raw.severity,
            category: raw.category.clone(),
            title: raw.title.clone(),
            detail: raw.detail.clone(),
            suggested_fix: raw.suggested_fix.clone(),
            is_blocking: raw.is_blocking,
            resolved_at: None,
            resolved_by_event_id: None,
        };
        if let Some(existing) = by_id.iter_mut().find(|(id, _)| *id == stable_finding_id) {
            existing.1 = row;
        } else {
            by_id.push((stable_finding_id, row));
        }
    }
    by_id.into_iter().map(|(_, row)| row).collect()
}

/// Decides whether a deep-review or Carmack-review gate passed, given the
/// validated output and the findings that remain blocking after
/// normalization.
#[must_use]
pub fn decide_llm_gate_passed(output_gate_passed: bool, findings: &[FindingRow]) -> bool {
    output_gate_passed && !findings.iter().any(|finding| finding.is_blocking)
}

/// The Carmack review gate only runs when a prior Deep Review gate row
/// exists for the same head SHA with `status=passed && gate_passed=true`.
#[must_use]
pub fn can_run_carmack_review(latest_deep_review: Option<&GateRunRow>) -> bool {
    latest_deep_review.is_some_and(|row| row.status == GateStatus::Passed && row.gate_passed)
}

// ============================================================================
// SECTION: Video Capture Failure Classification
// ============================================================================

/// Deterministic classification of a video-capture failure message.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCaptureFailureClass {
    /// Authentication/authorization failure.
    Auth,
    /// Rate limit or quota exhaustion.
    Quota,
    /// A scripted browser interaction failed.
    Script,
    /// Any other infrastructure failure.
    Infra,
}

impl VideoCaptureFailureClass {
    /// Returns the stable wire string for this class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Script => "script",
            Self::Infra => "infra",
        }
    }
}

/// Classifies a video-capture failure message by lowercased substring match,
/// in precedence order `auth -> quota -> script -> infra`.
#[must_use]
pub fn classify_video_capture_failure(message: &str) -> VideoCaptureFailureClass {
    let lowered = message.to_lowercase();
    const AUTH_MARKERS: &[&str] = &[
        "401",
        "403",
        "unauthorised",
        "unauthorized",
        "forbidden",
        "auth",
        "token",
        "permission denied",
    ];
    const QUOTA_MARKERS: &[&str] = &["429", "quota", "rate limit", "insufficient credits", "billing"];
    const SCRIPT_MARKERS: &[&str] = &[
        "script",
        "selector",
        "assert",
        "dom",
        "playwright",
        "puppeteer",
        "navigation failed",
    ];

    if AUTH_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        VideoCaptureFailureClass::Auth
    } else if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        VideoCaptureFailureClass::Quota
    } else if SCRIPT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        VideoCaptureFailureClass::Script
    } else {
        VideoCaptureFailureClass::Infra
    }
}
