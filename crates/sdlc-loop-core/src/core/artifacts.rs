// crates/sdlc-loop-core/src/core/artifacts.rs
// ============================================================================
// Module: SDLC Loop Phase Artifacts and Plan Tasks
// Description: Phase artifact and plan task row shapes.
// Purpose: Model the per-phase generated artifacts and the plan tasks that
// gate advancement out of planning.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Each phase of a loop produces artifacts (a plan, an implementation
//! snapshot, a review summary, and so on). Only the planning phase further
//! decomposes its artifact into plan tasks whose completion gates the move
//! to implementing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::HeadSha;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::StableTaskId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Phase
// ============================================================================

/// Loop phase an artifact belongs to.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Planning phase.
    Planning,
    /// Implementing phase.
    Implementing,
    /// Reviewing phase.
    Reviewing,
    /// UI testing phase.
    UiTesting,
    /// PR linking phase.
    PrLinking,
    /// PR babysitting phase.
    PrBabysitting,
}

// ============================================================================
// SECTION: Artifact Status
// ============================================================================

/// Lifecycle status of a phase artifact.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Newly generated, awaiting review or approval.
    Generated,
    /// Approved by a human.
    Approved,
    /// Accepted automatically under the `auto` approval policy.
    Accepted,
    /// Replaced by a newer artifact for the same key.
    Superseded,
}

// ============================================================================
// SECTION: Phase Artifact
// ============================================================================

/// A phase-scoped artifact generated by the agent or a gate evaluator.
///
/// # Invariants
/// - `head_sha` is `None` only for `Planning` and `PrLinking` phases.
/// - Creating a new artifact for `(loop_id, phase[, head_sha])` supersedes
///   all prior non-terminal rows with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseArtifactRow {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Owning loop.
    pub loop_id: LoopId,
    /// Phase this artifact belongs to.
    pub phase: Phase,
    /// Caller-defined artifact type tag (e.g. `"plan"`, `"review_summary"`).
    pub artifact_type: String,
    /// Commit SHA the artifact applies to; null only for planning/pr_linking.
    pub head_sha: Option<HeadSha>,
    /// Loop version at creation time.
    pub loop_version: u64,
    /// Lifecycle status.
    pub status: ArtifactStatus,
    /// Identifier of the agent or evaluator that generated this artifact.
    pub generated_by: String,
    /// Opaque artifact payload.
    pub payload: Value,
    /// User who approved this artifact, if approved.
    pub approved_by_user_id: Option<UserId>,
    /// Timestamp the artifact was created.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Plan Task
// ============================================================================

/// Lifecycle status of a plan task.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTaskStatus {
    /// Not started.
    Todo,
    /// In progress.
    InProgress,
    /// Completed.
    Done,
    /// Intentionally skipped; exempt from completion gating.
    Skipped,
    /// Blocked on an external dependency.
    Blocked,
}

/// Who completed a plan task.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletedBy {
    /// Completed by the agent.
    Agent,
    /// Completed by a human.
    Human,
}

/// A single task within a plan artifact.
///
/// # Invariants
/// - `(artifact_id, stable_task_id)` is unique.
/// - `completion_evidence`, when present, must carry a `headSha` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTaskRow {
    /// Owning artifact.
    pub artifact_id: ArtifactId,
    /// Stable task identifier within the artifact.
    pub stable_task_id: StableTaskId,
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Acceptance criteria, one entry per criterion.
    pub acceptance_criteria: Vec<String>,
    /// Lifecycle status.
    pub status: PlanTaskStatus,
    /// Timestamp the task was marked done, if done.
    pub completed_at: Option<Timestamp>,
    /// Who completed the task, if done.
    pub completed_by: Option<CompletedBy>,
    /// Opaque completion evidence; must carry a `headSha` when present.
    pub completion_evidence: Option<Value>,
}

/// Reads the `headSha` field out of a plan task's completion evidence.
#[must_use]
pub fn completion_evidence_head_sha(evidence: &Value) -> Option<&str> {
    evidence.get("headSha").and_then(Value::as_str)
}
