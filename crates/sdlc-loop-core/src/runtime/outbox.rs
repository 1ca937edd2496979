// crates/sdlc-loop-core/src/runtime/outbox.rs
// ============================================================================
// Module: SDLC Loop Outbox Algorithms
// Description: Backoff computation and completion-outcome decision logic.
// Purpose: Keep the retry/backoff/attempt-ledger policy as pure functions
// independent of any store.
// Dependencies: crate::core::outbox, crate::core::time
// ============================================================================

//! ## Overview
//! Enqueue and claim are single-transaction store operations (see
//! [`crate::interfaces::OutboxStore`]); the backoff formula and the
//! completed/retry-scheduled/failed decision are pure and live here so they
//! can be unit- and property-tested without a database.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::outbox::ErrorClass;
use crate::core::outbox::normalize_error_message;
use crate::core::time::Timestamp;
use time::Duration;

// ============================================================================
// SECTION: Backoff
// ============================================================================

/// Default maximum claim attempts before an outbox row is marked `failed`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default base backoff in milliseconds.
pub const DEFAULT_BASE_BACKOFF_MS: i64 = 30_000;
/// Default maximum backoff in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: i64 = 1_800_000;

/// Computes `now + min(maxBackoffMs, baseBackoffMs * 2^max(0, attempt-1))`.
#[must_use]
pub fn compute_backoff(attempt: u32, base_backoff_ms: i64, max_backoff_ms: i64, now: Timestamp) -> Timestamp {
    let exponent = attempt.saturating_sub(1);
    let multiplier = 1_i64.checked_shl(exponent).unwrap_or(i64::MAX);
    let scaled = base_backoff_ms.saturating_mul(multiplier);
    let delay_ms = scaled.min(max_backoff_ms);
    now + Duration::milliseconds(delay_ms)
}

// ============================================================================
// SECTION: Completion Decision
// ============================================================================

/// Input to a claimed outbox attempt's completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxCompleteInput {
    /// Whether the attempt succeeded.
    pub succeeded: bool,
    /// Whether a failed attempt is eligible for retry.
    pub retriable: bool,
    /// Error classification, required when `succeeded` is `false`.
    pub error_class: Option<ErrorClass>,
    /// Caller-supplied error code, required when `succeeded` is `false`.
    pub error_code: Option<String>,
    /// Raw error message, required when `succeeded` is `false`.
    pub error_message: Option<String>,
    /// Maximum attempts before the row is marked `failed` permanently.
    pub max_attempts: u32,
    /// Base backoff in milliseconds.
    pub base_backoff_ms: i64,
    /// Maximum backoff in milliseconds.
    pub max_backoff_ms: i64,
}

impl Default for OutboxCompleteInput {
    fn default() -> Self {
        Self {
            succeeded: true,
            retriable: false,
            error_class: None,
            error_code: None,
            error_message: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Decision reached for a claimed outbox row's completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxCompleteOutcome {
    /// The claim was refused: the row was not `running` under this owner.
    NotRunningOrNotOwner,
    /// The attempt succeeded; the row is now `completed`.
    Completed,
    /// The attempt failed but will retry at the given time.
    RetryScheduled {
        /// Time the row becomes claimable again.
        retry_at: Timestamp,
    },
    /// The attempt failed and the row is now permanently `failed`.
    Failed,
}

/// Decides the completion outcome for a claimed row at `attempt_count`.
///
/// Does not itself verify row ownership; callers (stores) perform that CAS
/// check and call this only once the row is confirmed `running` under the
/// caller's lease.
#[must_use]
pub fn decide_outbox_completion(
    attempt_count: u32,
    input: &OutboxCompleteInput,
    now: Timestamp,
) -> OutboxCompleteOutcome {
    if input.succeeded {
        return OutboxCompleteOutcome::Completed;
    }

    if input.retriable && attempt_count < input.max_attempts {
        let retry_at = compute_backoff(attempt_count, input.base_backoff_ms, input.max_backoff_ms, now);
        return OutboxCompleteOutcome::RetryScheduled { retry_at };
    }

    OutboxCompleteOutcome::Failed
}

/// Normalizes an error message for storage, delegating to the shared
/// truncation rule.
#[must_use]
pub fn normalize_outbox_error_message(message: &str) -> String {
    normalize_error_message(message)
}
