// crates/sdlc-loop-core/src/interfaces/memory.rs
// ============================================================================
// Module: SDLC Loop In-Memory Stores
// Description: Simple in-memory implementations of every store trait, for
// tests and local demos.
// Purpose: Exercise the control-plane and runtime decision logic against a
// real trait implementation without pulling in a database.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! These stores are not intended for production use: every lookup is a
//! linear scan and no query is indexed. `sdlc-loop-store-sqlite` is the
//! durable, indexed implementation of the same traits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use crate::core::artifacts::ArtifactStatus;
use crate::core::artifacts::PhaseArtifactRow;
use crate::core::artifacts::Phase;
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
use crate::core::outbox::CanceledReason;
use crate::core::outbox::OutboxRow;
use crate::core::outbox::OutboxStatus;
use crate::core::parity::ParityMetricSample;
use crate::core::signal::SignalInboxRow;
use crate::core::state::LoopLeaseRow;
use crate::core::state::LoopRow;
use crate::core::time::Timestamp;
use crate::core::webhook::WebhookDeliveryRow;
use crate::interfaces::ArtifactStore;
use crate::interfaces::GateStore;
use crate::interfaces::LeaseStore;
use crate::interfaces::LoopStore;
use crate::interfaces::OutboxStore;
use crate::interfaces::ParityStore;
use crate::interfaces::SignalInboxStore;
use crate::interfaces::StoreError;
use crate::interfaces::WebhookClaimStore;
use crate::runtime::lease::LeaseAcquireOutcome;
use crate::runtime::lease::decide_lease_acquire;
use crate::runtime::lease::decide_lease_release;
use crate::runtime::outbox::OutboxCompleteInput;
use crate::runtime::outbox::OutboxCompleteOutcome;
use crate::runtime::outbox::decide_outbox_completion;
use crate::runtime::state_machine::GateGuardedUpdate;
use crate::runtime::state_machine::GuardedUpdateOutcome;
use crate::runtime::state_machine::persist_guarded_gate_loop_state;
use crate::runtime::webhook_claim::ClaimOutcome;
use crate::runtime::webhook_claim::WEBHOOK_CLAIM_TTL_MS;
use crate::runtime::webhook_claim::decide_claim;

fn poisoned(what: &str) -> StoreError {
    StoreError::Io(format!("{what} mutex poisoned"))
}

// ============================================================================
// SECTION: Loop Store
// ============================================================================

/// In-memory [`LoopStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryLoopStore {
    rows: Mutex<Vec<LoopRow>>,
}

impl InMemoryLoopStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopStore for InMemoryLoopStore {
    fn insert_loop(&self, loop_row: &LoopRow) -> Result<(), StoreError> {
        self.rows.lock().map_err(|_| poisoned("loop store"))?.push(loop_row.clone());
        Ok(())
    }

    fn get_loop(&self, loop_id: &LoopId) -> Result<Option<LoopRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| poisoned("loop store"))?;
        Ok(rows.iter().find(|row| &row.loop_id == loop_id).cloned())
    }

    fn get_active_loop_for_pr(
        &self,
        repo_full_name: &RepoFullName,
        pr_number: u64,
    ) -> Result<Option<LoopRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| poisoned("loop store"))?;
        Ok(rows
            .iter()
            .find(|row| {
                !row.state.is_terminal() && &row.repo_full_name == repo_full_name && row.pr_number == Some(pr_number)
            })
            .cloned())
    }

    fn get_active_loop_for_thread(
        &self,
        user_id: &UserId,
        thread_id: &ThreadId,
    ) -> Result<Option<LoopRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| poisoned("loop store"))?;
        Ok(rows
            .iter()
            .find(|row| !row.state.is_terminal() && &row.user_id == user_id && &row.thread_id == thread_id)
            .cloned())
    }

    fn apply_guarded_transition(
        &self,
        loop_id: &LoopId,
        update: &GateGuardedUpdate,
    ) -> Result<GuardedUpdateOutcome, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("loop store"))?;
        let Some(row) = rows.iter_mut().find(|row| &row.loop_id == loop_id) else {
            return Ok(GuardedUpdateOutcome::StaleNoop);
        };
        let outcome = persist_guarded_gate_loop_state(row, update);
        if let GuardedUpdateOutcome::Updated(next) = &outcome {
            *row = next.clone();
        }
        Ok(outcome)
    }
}

// ============================================================================
// SECTION: Lease Store
// ============================================================================

/// In-memory [`LeaseStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    rows: Mutex<Vec<LoopLeaseRow>>,
}

impl InMemoryLeaseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn acquire(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        lease_ttl_ms: i64,
        now: Timestamp,
    ) -> Result<LeaseAcquireOutcome, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("lease store"))?;
        let existing = rows.iter().find(|row| &row.loop_id == loop_id);
        let outcome = decide_lease_acquire(existing, lease_owner, now);
        if let LeaseAcquireOutcome::Acquired { epoch } = outcome {
            let next = LoopLeaseRow {
                loop_id: loop_id.clone(),
                lease_owner: Some(lease_owner.to_string()),
                lease_epoch: epoch,
                lease_expires_at: Some(now.plus_millis(lease_ttl_ms)),
            };
            match rows.iter_mut().find(|row| &row.loop_id == loop_id) {
                Some(row) => *row = next,
                None => rows.push(next),
            }
        }
        Ok(outcome)
    }

    fn release(&self, loop_id: &LoopId, lease_owner: &str, now: Timestamp) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("lease store"))?;
        let existing = rows.iter().find(|row| &row.loop_id == loop_id);
        let released = decide_lease_release(existing, lease_owner);
        if released {
            if let Some(row) = rows.iter_mut().find(|row| &row.loop_id == loop_id) {
                row.lease_owner = None;
                row.lease_expires_at = Some(now);
            }
        }
        Ok(released)
    }
}

// ============================================================================
// SECTION: Webhook Claim Store
// ============================================================================

/// In-memory [`WebhookClaimStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryWebhookClaimStore {
    rows: Mutex<Vec<WebhookDeliveryRow>>,
}

impl InMemoryWebhookClaimStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WebhookClaimStore for InMemoryWebhookClaimStore {
    fn claim(
        &self,
        delivery_id: &DeliveryId,
        claimant_token: &str,
        event_type: &str,
        now: Timestamp,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("webhook claim store"))?;
        let existing = rows.iter().find(|row| &row.delivery_id == delivery_id);
        let outcome = decide_claim(existing, now);
        if matches!(outcome, ClaimOutcome::ClaimedNew | ClaimOutcome::StaleStolen) {
            let next = WebhookDeliveryRow {
                delivery_id: delivery_id.clone(),
                claimant_token: claimant_token.to_string(),
                claim_expires_at: now.plus_millis(WEBHOOK_CLAIM_TTL_MS),
                completed_at: None,
                event_type: event_type.to_string(),
                created_at: existing.map_or(now, |row| row.created_at),
            };
            match rows.iter_mut().find(|row| &row.delivery_id == delivery_id) {
                Some(row) => *row = next,
                None => rows.push(next),
            }
        }
        Ok(outcome)
    }

    fn complete(&self, delivery_id: &DeliveryId, claimant_token: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("webhook claim store"))?;
        let Some(row) = rows.iter_mut().find(|row| &row.delivery_id == delivery_id) else {
            return Ok(false);
        };
        if row.claimant_token != claimant_token || row.completed_at.is_some() {
            return Ok(false);
        }
        row.completed_at = Some(row.claim_expires_at);
        Ok(true)
    }

    fn release(&self, delivery_id: &DeliveryId, claimant_token: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("webhook claim store"))?;
        let Some(row) = rows.iter_mut().find(|row| &row.delivery_id == delivery_id) else {
            return Ok(false);
        };
        if row.claimant_token != claimant_token || row.completed_at.is_some() {
            return Ok(false);
        }
        row.claim_expires_at = row.created_at;
        Ok(true)
    }

    fn get(&self, delivery_id: &DeliveryId) -> Result<Option<WebhookDeliveryRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| poisoned("webhook claim store"))?;
        Ok(rows.iter().find(|row| &row.delivery_id == delivery_id).cloned())
    }
}

// ============================================================================
// SECTION: Outbox Store
// ============================================================================

/// In-memory [`OutboxStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    state: Mutex<OutboxState>,
}

#[derive(Debug, Default)]
struct OutboxState {
    rows: Vec<OutboxRow>,
    next_id: u64,
}

impl InMemoryOutboxStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutboxStore for InMemoryOutboxStore {
    fn enqueue(&self, enqueue: &ActionKeyedEnqueue) -> Result<OutboxRow, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned("outbox store"))?;
        let supersession_group = enqueue.action_type.supersession_group();

        if let Some(existing) = state
            .rows
            .iter()
            .position(|row| row.loop_id == enqueue.loop_id && row.action_key == enqueue.action_key)
        {
            let row = &mut state.rows[existing];
            row.transition_seq = enqueue.transition_seq;
            row.action_type = enqueue.action_type;
            row.supersession_group = supersession_group;
            row.payload = enqueue.payload.clone();
            row.status = OutboxStatus::Pending;
            row.attempt_count = 0;
            row.next_retry_at = None;
            row.claimed_by = None;
            row.claimed_at = None;
            row.completed_at = None;
            row.last_error_class = None;
            row.last_error_code = None;
            row.last_error_message = None;
            row.superseded_by_outbox_id = None;
            row.canceled_reason = None;
            let refreshed = row.clone();

            for sibling in &mut state.rows {
                if sibling.outbox_id != refreshed.outbox_id
                    && sibling.loop_id == enqueue.loop_id
                    && sibling.supersession_group == supersession_group
                    && matches!(sibling.status, OutboxStatus::Pending | OutboxStatus::Running)
                {
                    sibling.status = OutboxStatus::Canceled;
                    sibling.canceled_reason = Some(CanceledReason::SupersededByNewerTransition);
                    sibling.superseded_by_outbox_id = Some(refreshed.outbox_id.clone());
                }
            }
            return Ok(refreshed);
        }

        state.next_id += 1;
        let outbox_id = OutboxId::new(format!("outbox-{}", state.next_id));
        let created_at = Timestamp::from_unix_millis(0);
        let row = OutboxRow {
            outbox_id: outbox_id.clone(),
            loop_id: enqueue.loop_id.clone(),
            transition_seq: enqueue.transition_seq,
            action_type: enqueue.action_type,
            supersession_group,
            action_key: enqueue.action_key.clone(),
            payload: enqueue.payload.clone(),
            status: OutboxStatus::Pending,
            attempt_count: 0,
            next_retry_at: None,
            claimed_by: None,
            claimed_at: None,
            completed_at: None,
            last_error_class: None,
            last_error_code: None,
            last_error_message: None,
            superseded_by_outbox_id: None,
            canceled_reason: None,
            created_at,
        };

        for sibling in &mut state.rows {
            if sibling.loop_id == enqueue.loop_id
                && sibling.supersession_group == supersession_group
                && matches!(sibling.status, OutboxStatus::Pending | OutboxStatus::Running)
            {
                sibling.status = OutboxStatus::Canceled;
                sibling.canceled_reason = Some(CanceledReason::SupersededByNewerTransition);
                sibling.superseded_by_outbox_id = Some(outbox_id.clone());
            }
        }
        state.rows.push(row.clone());
        Ok(row)
    }

    fn claim(
        &self,
        loop_id: &LoopId,
        lease_owner: &str,
        _lease_epoch: u64,
        allowed_action_types: Option<&[ActionType]>,
        now: Timestamp,
    ) -> Result<Option<OutboxRow>, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned("outbox store"))?;
        let candidate_index = state
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                &row.loop_id == loop_id
                    && row.status == OutboxStatus::Pending
                    && row.next_retry_at.is_none_or(|retry_at| retry_at <= now)
                    && allowed_action_types.is_none_or(|allowed| allowed.contains(&row.action_type))
            })
            .min_by_key(|(_, row)| row.transition_seq)
            .map(|(index, _)| index);

        let Some(index) = candidate_index else {
            return Ok(None);
        };
        let row = &mut state.rows[index];
        row.status = OutboxStatus::Running;
        row.claimed_by = Some(lease_owner.to_string());
        row.claimed_at = Some(now);
        row.attempt_count += 1;
        Ok(Some(row.clone()))
    }

    fn complete(
        &self,
        outbox_id: &OutboxId,
        lease_owner: &str,
        input: &OutboxCompleteInput,
        now: Timestamp,
    ) -> Result<OutboxCompleteOutcome, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned("outbox store"))?;
        let Some(row) = state.rows.iter_mut().find(|row| &row.outbox_id == outbox_id) else {
            return Ok(OutboxCompleteOutcome::NotRunningOrNotOwner);
        };
        if row.status != OutboxStatus::Running || row.claimed_by.as_deref() != Some(lease_owner) {
            return Ok(OutboxCompleteOutcome::NotRunningOrNotOwner);
        }

        let outcome = decide_outbox_completion(row.attempt_count, input, now);
        match &outcome {
            OutboxCompleteOutcome::Completed => {
                row.status = OutboxStatus::Completed;
                row.completed_at = Some(now);
            }
            OutboxCompleteOutcome::RetryScheduled { retry_at } => {
                row.status = OutboxStatus::Pending;
                row.next_retry_at = Some(*retry_at);
                row.claimed_by = None;
                row.last_error_class = input.error_class;
                row.last_error_code.clone_from(&input.error_code);
                row.last_error_message = input.error_message.as_deref().map(crate::core::outbox::normalize_error_message);
            }
            OutboxCompleteOutcome::Failed => {
                row.status = OutboxStatus::Failed;
                row.last_error_class = input.error_class;
                row.last_error_code.clone_from(&input.error_code);
                row.last_error_message = input.error_message.as_deref().map(crate::core::outbox::normalize_error_message);
            }
            // `decide_outbox_completion` never constructs this variant; it
            // only ever reaches the caller as the early "not running" guard
            // above, never from this decision function.
            OutboxCompleteOutcome::NotRunningOrNotOwner => {}
        }
        Ok(outcome)
    }

    fn cancel_all_for_loop(&self, loop_id: &LoopId, _reason: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned("outbox store"))?;
        let mut canceled = 0_u64;
        for row in &mut state.rows {
            if &row.loop_id == loop_id && matches!(row.status, OutboxStatus::Pending | OutboxStatus::Running) {
                row.status = OutboxStatus::Canceled;
                row.canceled_reason = Some(CanceledReason::CanceledDueToStop);
                canceled += 1;
            }
        }
        Ok(canceled)
    }
}

// ============================================================================
// SECTION: Signal Inbox Store
// ============================================================================

/// In-memory [`SignalInboxStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemorySignalInboxStore {
    rows: Mutex<Vec<SignalInboxRow>>,
}

impl InMemorySignalInboxStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalInboxStore for InMemorySignalInboxStore {
    fn insert_signal(&self, signal: &SignalInboxRow) -> Result<(), StoreError> {
        self.rows.lock().map_err(|_| poisoned("signal inbox store"))?.push(signal.clone());
        Ok(())
    }

    fn oldest_unprocessed(&self, loop_id: &LoopId) -> Result<Option<SignalInboxRow>, StoreError> {
        let rows = self.rows.lock().map_err(|_| poisoned("signal inbox store"))?;
        Ok(rows
            .iter()
            .filter(|row| &row.loop_id == loop_id && row.processed_at.is_none())
            .min_by_key(|row| row.received_at)
            .cloned())
    }

    fn mark_processed(&self, signal_id: &SignalId, now: Timestamp) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("signal inbox store"))?;
        let Some(row) = rows.iter_mut().find(|row| &row.signal_id == signal_id) else {
            return Ok(false);
        };
        if row.processed_at.is_some() {
            return Ok(false);
        }
        row.processed_at = Some(now);
        Ok(true)
    }
}

// ============================================================================
// SECTION: Gate Store
// ============================================================================

/// In-memory [`GateStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryGateStore {
    runs: Mutex<Vec<GateRunRow>>,
    findings: Mutex<Vec<FindingRow>>,
}

impl InMemoryGateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GateStore for InMemoryGateStore {
    fn upsert_gate_run(&self, row: &GateRunRow) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().map_err(|_| poisoned("gate store"))?;
        match runs
            .iter_mut()
            .find(|existing| existing.loop_id == row.loop_id && existing.head_sha == row.head_sha && existing.gate_kind == row.gate_kind)
        {
            Some(existing) if row.loop_version >= existing.loop_version => *existing = row.clone(),
            Some(_) => {}
            None => runs.push(row.clone()),
        }
        Ok(())
    }

    fn latest_gate_run(
        &self,
        loop_id: &LoopId,
        head_sha: &HeadSha,
        gate_kind: GateKind,
    ) -> Result<Option<GateRunRow>, StoreError> {
        let runs = self.runs.lock().map_err(|_| poisoned("gate store"))?;
        Ok(runs
            .iter()
            .find(|row| &row.loop_id == loop_id && &row.head_sha == head_sha && row.gate_kind == gate_kind)
            .cloned())
    }

    fn replace_findings(&self, loop_id: &LoopId, head_sha: &HeadSha, findings: &[FindingRow]) -> Result<(), StoreError> {
        let mut all = self.findings.lock().map_err(|_| poisoned("gate store"))?;
        all.retain(|row| &row.loop_id != loop_id || &row.head_sha != head_sha);
        all.extend_from_slice(findings);
        Ok(())
    }

    fn delete_findings(&self, loop_id: &LoopId, head_sha: &HeadSha) -> Result<(), StoreError> {
        let mut all = self.findings.lock().map_err(|_| poisoned("gate store"))?;
        all.retain(|row| &row.loop_id != loop_id || &row.head_sha != head_sha);
        Ok(())
    }
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// In-memory [`ArtifactStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<Vec<PhaseArtifactRow>>,
    tasks: Mutex<Vec<PlanTaskRow>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn artifact_key_matches(a: &PhaseArtifactRow, loop_id: &LoopId, phase: Phase, head_sha: Option<&HeadSha>) -> bool {
    a.loop_id == *loop_id && a.phase == phase && a.head_sha.as_ref() == head_sha
}

impl ArtifactStore for InMemoryArtifactStore {
    fn create_plan_artifact(&self, artifact: &PhaseArtifactRow) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.lock().map_err(|_| poisoned("artifact store"))?;
        for existing in artifacts.iter_mut() {
            if artifact_key_matches(existing, &artifact.loop_id, artifact.phase, artifact.head_sha.as_ref())
                && existing.status != ArtifactStatus::Superseded
            {
                existing.status = ArtifactStatus::Superseded;
            }
        }
        artifacts.push(artifact.clone());
        Ok(())
    }

    fn get_artifact(&self, artifact_id: &ArtifactId) -> Result<Option<PhaseArtifactRow>, StoreError> {
        let artifacts = self.artifacts.lock().map_err(|_| poisoned("artifact store"))?;
        Ok(artifacts.iter().find(|row| &row.artifact_id == artifact_id).cloned())
    }

    fn approve_plan_artifact(&self, artifact_id: &ArtifactId, approved_by_user_id: &UserId) -> Result<bool, StoreError> {
        let mut artifacts = self.artifacts.lock().map_err(|_| poisoned("artifact store"))?;
        let Some(row) = artifacts.iter_mut().find(|row| &row.artifact_id == artifact_id) else {
            return Ok(false);
        };
        if !matches!(row.status, ArtifactStatus::Generated | ArtifactStatus::Accepted) {
            return Ok(false);
        }
        row.status = ArtifactStatus::Approved;
        row.approved_by_user_id = Some(approved_by_user_id.clone());
        Ok(true)
    }

    fn replace_plan_tasks(&self, artifact_id: &ArtifactId, tasks: &[PlanTaskRow]) -> Result<(), StoreError> {
        let mut all = self.tasks.lock().map_err(|_| poisoned("artifact store"))?;
        all.retain(|row| &row.artifact_id != artifact_id);
        let mut deduped: Vec<PlanTaskRow> = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Some(existing) = deduped.iter_mut().find(|row| row.stable_task_id == task.stable_task_id) {
                *existing = task.clone();
            } else {
                deduped.push(task.clone());
            }
        }
        all.extend(deduped);
        Ok(())
    }

    fn get_plan_tasks(&self, artifact_id: &ArtifactId) -> Result<Vec<PlanTaskRow>, StoreError> {
        let all = self.tasks.lock().map_err(|_| poisoned("artifact store"))?;
        Ok(all.iter().filter(|row| &row.artifact_id == artifact_id).cloned().collect())
    }
}

// ============================================================================
// SECTION: Parity Store
// ============================================================================

/// In-memory [`ParityStore`] for tests and local demos.
#[derive(Debug, Default)]
pub struct InMemoryParityStore {
    samples: Mutex<Vec<ParityMetricSample>>,
}

impl InMemoryParityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParityStore for InMemoryParityStore {
    fn record_sample(&self, sample: &ParityMetricSample) -> Result<(), StoreError> {
        self.samples.lock().map_err(|_| poisoned("parity store"))?.push(*sample);
        Ok(())
    }

    fn samples_in_window(
        &self,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<Vec<ParityMetricSample>, StoreError> {
        let samples = self.samples.lock().map_err(|_| poisoned("parity store"))?;
        Ok(samples
            .iter()
            .filter(|sample| sample.observed_at >= window_start && sample.observed_at <= window_end)
            .copied()
            .collect())
    }
}
