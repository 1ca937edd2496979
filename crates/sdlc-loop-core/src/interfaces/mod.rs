// crates/sdlc-loop-core/src/interfaces/mod.rs
// ============================================================================
// Module: SDLC Loop Store Interfaces
// Description: Backend-agnostic persistence traits for every loop subsystem.
// Purpose: Define the contract a durable store must satisfy without binding
// this crate to any particular database.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Every subsystem (loop registry, lease, webhook claim ledger, outbox,
//! signal inbox, gates, artifacts, parity) is backed by a trait here. No
//! durable implementation lives in this crate; `sdlc-loop-store-sqlite`
//! implements all of them against a single SQLite database. [`memory`]
//! ships a `Mutex`-backed in-memory implementation of every trait for tests
//! and local demos.

/// In-memory implementations of every store trait, for tests and demos.
pub mod memory;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::artifacts::PhaseArtifactRow;
use crate::core::artifacts::PlanTaskRow;
use crate::core::gates::FindingRow;
use crate::core::gates::GateKind;
use crate::core::gates::GateRunRow;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::HeadSha;
use crate::core::identifiers::LoopId;
use crate::core::identifiers::OutboxId;
use crate::core::identifiers::RepoFullName;
use crate::core::identifiers::SignalId;
use crate::core::identifiers::ThreadId;
use crate::core::identifiers::UserId;
use crate::core::outbox::ActionKeyedEnqueue;
use crate::core::outbox::ActionType;
use crate::core::outbox::OutboxRow;
use crate::core::parity::ParityBucketStats;
use crate::core::parity::ParityMetricSample;
use crate::core::signal::SignalInboxRow;
use crate::core::state::LoopRow;
use crate::core::time::Timestamp;
use crate::core::webhook::WebhookDeliveryRow;
use crate::runtime::lease::LeaseAcquireOutcome;
use crate::runtime::outbox::OutboxCompleteInput;
use crate::runtime::outbox::OutboxCompleteOutcome;
use crate::runtime::state_machine::GateGuardedUpdate;
use crate::runtime::state_machine::GuardedUpdateOutcome;
use crate::runtime::webhook_claim::ClaimOutcome;

// ============================================================================
// SECTION: Shared Store Error
// ============================================================================

/// Errors surfaced by any store implementation.
///
/// # Invariants
/// - Variants are stable for programmatic handling by callers classifying
///   retriable versus fatal failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying store reported an I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data failed an integrity or shape check on read.
    #[error("store data corrupt: {0}")]
    Corrupt(String),
    /// The store rejected the operation as invalid.
    #[error("store rejected operation: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Loop Store
// ============================================================================

/// Persistence for loop rows and guarded state transitions.
pub trait LoopStore {
    /// Inserts a newly enrolled loop.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_loop(&self, loop_row: &LoopRow) -> Result<(), StoreError>;

    /// Loads a loop by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_loop(&self, loop_id: &LoopId) -> Result<Option<LoopRow>, StoreError>;

    /// Finds the at-most-one active loop for a `(repo, pr)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_active_loop_for_pr(
        &self,
        repo_full_name: &RepoFullName,
        pr_number: u64,
    ) -> Result<Option<LoopRow>, StoreError>;

    /// Finds the at-most-one active loop for a `(user, thread)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_active_loop_for_thread(
        &self,
        user_id: &UserId,
        thread_id: &ThreadId,
    ) -> Result<Option<LoopRow>, StoreError>;

    /// Applies a head-SHA- and loop-version-guarded state transition as one
    /// conditional update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright
    /// (guard mismatches are reported via [`GuardedUpdateOutcome`], not this
    /// error type).
    fn apply_guarded_transition(
        &self,
        loop_id: &LoopId,
        update: &GateGuardedUpdate,
    ) -> Result<GuardedUpdateOutcome, StoreError>;
}

// ============================================================================
// SECTION: Lease Store
// ============================================================================

/// Persistence for per-loop mutex leases.
pub trait LeaseStore {
    /// Attempts to acquire or renew the lease for `loop_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn acquire(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        lease_ttl_ms: i64,
        now: Timestamp,
    ) -> Result<LeaseAcquireOutcome, StoreError>;

    /// Releases the lease if still owned by `lease_owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn release(&self, loop_id: &LoopId, lease_owner: &str, now: Timestamp)
    -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Webhook Claim Store
// ============================================================================

/// Persistence for the exactly-once webhook/daemon-event admission ledger.
pub trait WebhookClaimStore {
    /// Claims a delivery, stealing an expired, incomplete claim if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn claim(
        &self,
        delivery_id: &DeliveryId,
        claimant_token: &str,
        event_type: &str,
        now: Timestamp,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Marks a delivery complete, iff still owned by `claimant_token`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn complete(&self, delivery_id: &DeliveryId, claimant_token: &str) -> Result<bool, StoreError>;

    /// Expires a claim in place for graceful retry without waiting for TTL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn release(&self, delivery_id: &DeliveryId, claimant_token: &str) -> Result<bool, StoreError>;

    /// Loads a delivery row, mainly for test assertions and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get(&self, delivery_id: &DeliveryId) -> Result<Option<WebhookDeliveryRow>, StoreError>;
}

// ============================================================================
// SECTION: Outbox Store
// ============================================================================

/// Persistence for the transactional outbox and its attempt ledger.
pub trait OutboxStore {
    /// Upserts an outbox row and cancels superseded siblings in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying transaction fails.
    fn enqueue(&self, enqueue: &ActionKeyedEnqueue) -> Result<OutboxRow, StoreError>;

    /// Claims the oldest eligible pending row for a lease-holding worker.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn claim(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        lease_epoch: u64,
        allowed_action_types: Option<&[ActionType]>,
        now: Timestamp,
    ) -> Result<Option<OutboxRow>, StoreError>;

    /// Records the outcome of a claimed attempt and reschedules or
    /// terminates the row accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying transaction fails.
    fn complete(
        &self,
        outbox_id: &OutboxId,
        lease_owner: &str,
        input: &OutboxCompleteInput,
        now: Timestamp,
    ) -> Result<OutboxCompleteOutcome, StoreError>;

    /// Cancels every `pending`/`running` row for a loop, tagging the reason.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn cancel_all_for_loop(&self, loop_id: &LoopId, reason: &str) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Signal Inbox Store
// ============================================================================

/// Persistence for the per-loop queue of external signals.
pub trait SignalInboxStore {
    /// Inserts a newly received signal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_signal(&self, signal: &SignalInboxRow) -> Result<(), StoreError>;

    /// Selects the oldest unprocessed signal for a loop, by `received_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn oldest_unprocessed(&self, loop_id: &LoopId) -> Result<Option<SignalInboxRow>, StoreError>;

    /// Marks a signal processed, guarded on it still being unprocessed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn mark_processed(&self, signal_id: &SignalId, now: Timestamp) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Gate Store
// ============================================================================

/// Persistence for gate runs and their findings.
pub trait GateStore {
    /// Upserts a gate run row, overwriting only with a newer loop version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn upsert_gate_run(&self, row: &GateRunRow) -> Result<(), StoreError>;

    /// Loads the most recent gate run of a kind for `(loop_id, head_sha)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn latest_gate_run(
        &self,
        loop_id: &LoopId,
        head_sha: &HeadSha,
        gate_kind: GateKind,
    ) -> Result<Option<GateRunRow>, StoreError>;

    /// Replaces all findings for `(loop_id, head_sha)` with a new set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying transaction fails.
    fn replace_findings(
        &self,
        loop_id: &LoopId,
        head_sha: &HeadSha,
        findings: &[FindingRow],
    ) -> Result<(), StoreError>;

    /// Deletes all findings for `(loop_id, head_sha)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying delete fails.
    fn delete_findings(&self, loop_id: &LoopId, head_sha: &HeadSha) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Persistence for phase artifacts and plan tasks.
pub trait ArtifactStore {
    /// Supersedes prior non-terminal artifacts for the key, then inserts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying transaction fails.
    fn create_plan_artifact(&self, artifact: &PhaseArtifactRow) -> Result<(), StoreError>;

    /// Loads an artifact by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_artifact(&self, artifact_id: &ArtifactId) -> Result<Option<PhaseArtifactRow>, StoreError>;

    /// CAS-transitions a planning artifact to `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying update fails outright.
    fn approve_plan_artifact(
        &self,
        artifact_id: &ArtifactId,
        approved_by_user_id: &UserId,
    ) -> Result<bool, StoreError>;

    /// Deletes and re-inserts the deduplicated plan task list for an
    /// artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying transaction fails.
    fn replace_plan_tasks(
        &self,
        artifact_id: &ArtifactId,
        tasks: &[PlanTaskRow],
    ) -> Result<(), StoreError>;

    /// Loads all plan tasks for an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_plan_tasks(&self, artifact_id: &ArtifactId) -> Result<Vec<PlanTaskRow>, StoreError>;
}

// ============================================================================
// SECTION: Parity Store
// ============================================================================

/// Persistence for the append-only parity sample table.
pub trait ParityStore {
    /// Appends a parity sample.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn record_sample(&self, sample: &ParityMetricSample) -> Result<(), StoreError>;

    /// Loads every sample observed within `[window_start, window_end]`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn samples_in_window(
        &self,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<Vec<ParityMetricSample>, StoreError>;
}

/// Computes per-bucket parity statistics from a flat sample list.
///
/// Exposed here (rather than only as a store method) so callers can compute
/// stats over an in-memory sample set in tests without a store.
#[must_use]
pub fn bucket_stats_from_samples(samples: &[ParityMetricSample]) -> Vec<ParityBucketStats> {
    crate::runtime::parity::get_parity_bucket_stats(samples)
}
