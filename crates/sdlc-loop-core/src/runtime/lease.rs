// crates/sdlc-loop-core/src/runtime/lease.rs
// ============================================================================
// Module: SDLC Loop Lease
// Description: Acquire/release decision logic and outcome types for the
// per-loop mutex lease.
// Purpose: Keep the TTL/epoch/steal policy as a pure decision over a lease
// row snapshot, independent of any store.
// Dependencies: crate::core::{state, time}
// ============================================================================

//! ## Overview
//! A lease is a TTL-bounded, CAS-owned token granting exclusive mutation
//! rights over a loop and its outbox rows. This module decides, given the
//! currently observed lease row, whether an acquire succeeds, steals an
//! expired claim, or is refused.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::state::LoopLeaseRow;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Outcome of a lease acquire attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseAcquireOutcome {
    /// The lease was acquired (or renewed by its current owner).
    Acquired {
        /// Epoch assigned to this acquisition.
        epoch: u64,
    },
    /// The lease is held by a different, still-live owner.
    HeldByOther {
        /// The current holder's token.
        owner: String,
        /// The current holder's lease expiry.
        expires_at: Timestamp,
    },
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Decides the outcome of an acquire attempt against an observed lease row.
///
/// Mirrors an `INSERT ... ON CONFLICT DO UPDATE ... WHERE` in one decision:
/// a missing row or an expired/unowned row is acquired with `epoch + 1`
/// (`1` if no row existed); an unexpired row owned by someone else is
/// refused.
#[must_use]
pub fn decide_lease_acquire(
    existing: Option<&LoopLeaseRow>,
    lease_owner: &str,
    now: Timestamp,
) -> LeaseAcquireOutcome {
    let Some(existing) = existing else {
        return LeaseAcquireOutcome::Acquired { epoch: 1 };
    };

    let expired_or_unheld = existing
        .lease_expires_at
        .is_none_or(|expires_at| expires_at <= now);
    let owned_by_caller = existing.lease_owner.as_deref() == Some(lease_owner);

    if owned_by_caller || expired_or_unheld {
        return LeaseAcquireOutcome::Acquired {
            epoch: existing.lease_epoch + 1,
        };
    }

    LeaseAcquireOutcome::HeldByOther {
        owner: existing.lease_owner.clone().unwrap_or_default(),
        expires_at: existing.lease_expires_at.unwrap_or(now),
    }
}

/// Decides whether a release may apply: only when `lease_owner` still
/// matches the observed row's owner.
#[must_use]
pub fn decide_lease_release(existing: Option<&LoopLeaseRow>, lease_owner: &str) -> bool {
    existing.is_some_and(|row| row.lease_owner.as_deref() == Some(lease_owner))
}
