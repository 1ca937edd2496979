// crates/sdlc-loop-core/src/observability.rs
// ============================================================================
// Module: SDLC Loop Observability Events
// Description: Structured skip-path warning events.
// Purpose: Give every silently-skipped decision a typed, loggable shape
// instead of a bare log line, so a caller's logging layer can attach
// whatever sink it wants.
// Dependencies: crate::core::{identifiers, signal}
// ============================================================================

//! ## Overview
//! This crate never calls into a logging framework directly. Functions that
//! can skip persistence or dispatch (optimistic CI pass without a trusted
//! snapshot, a malformed signal payload, a stolen lease) return an
//! [`ObservabilityEvent`] alongside their outcome so the caller can log it
//! with whatever tracing subscriber the binary wires up.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::LoopId;
use crate::core::identifiers::SignalId;
use crate::core::signal::CauseType;

// ============================================================================
// SECTION: Event
// ============================================================================

/// Stable reason a skip-path observability event was emitted.
///
/// # Invariants
/// - Variants are stable for serialization and dashboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A `checkOutcome=pass` signal lacked a trusted snapshot.
    OptimisticPassWithoutTrustedSnapshot,
    /// A signal payload was missing a required field.
    MissingCheckOutcome,
    /// A lease was stolen from an expired, incomplete claim.
    LeaseStolen,
}

impl SkipReason {
    /// Returns the stable wire string for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OptimisticPassWithoutTrustedSnapshot => "optimistic_pass_without_trusted_snapshot",
            Self::MissingCheckOutcome => "missing_check_outcome",
            Self::LeaseStolen => "lease_stolen",
        }
    }
}

/// A structured warning describing a skip path, carrying the loop, signal,
/// and cause context a dashboard needs to correlate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityEvent {
    /// Owning loop, if known at the point the skip occurred.
    pub loop_id: Option<LoopId>,
    /// Originating signal, if known at the point the skip occurred.
    pub signal_id: Option<SignalId>,
    /// Cause type, if known at the point the skip occurred.
    pub cause_type: Option<CauseType>,
    /// Reason the skip occurred.
    pub reason: SkipReason,
}

impl ObservabilityEvent {
    /// Builds an event with every context field populated.
    #[must_use]
    pub const fn new(
        loop_id: Option<LoopId>,
        signal_id: Option<SignalId>,
        cause_type: Option<CauseType>,
        reason: SkipReason,
    ) -> Self {
        Self {
            loop_id,
            signal_id,
            cause_type,
            reason,
        }
    }
}
