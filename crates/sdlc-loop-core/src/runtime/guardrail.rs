// crates/sdlc-loop-core/src/runtime/guardrail.rs
// ============================================================================
// Module: SDLC Loop Guardrails
// Description: Fixed-precedence admission guard for loop work.
// Purpose: Decide, before any gate evaluation or signal dispatch, whether a
// loop is allowed to proceed at all.
// Dependencies: crate::core::time
// ============================================================================

//! ## Overview
//! Guardrails are evaluated once per worker tick, ahead of any gate or
//! outbox work. Precedence is fixed and the first matching reason wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Reason a guardrail denied further work on a loop.
///
/// # Invariants
/// - Variants are stable for serialization and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailReason {
    /// The global kill switch is enabled.
    KillSwitch,
    /// The loop is already in a terminal state.
    TerminalState,
    /// The caller does not hold a valid lease.
    LeaseInvalid,
    /// The loop is within its cooldown window.
    Cooldown,
    /// The loop has reached its maximum iteration count.
    MaxIterations,
    /// Manual intent is required but was not granted.
    ManualIntentDenied,
}

impl GuardrailReason {
    /// Returns the stable wire string for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KillSwitch => "kill_switch",
            Self::TerminalState => "terminal_state",
            Self::LeaseInvalid => "lease_invalid",
            Self::Cooldown => "cooldown",
            Self::MaxIterations => "max_iterations",
            Self::ManualIntentDenied => "manual_intent_denied",
        }
    }
}

/// Outcome of a guardrail evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailDecision {
    /// The loop may proceed.
    Allowed,
    /// The loop may not proceed, for the given reason.
    Denied(GuardrailReason),
}

impl GuardrailDecision {
    /// Returns whether this decision allows the loop to proceed.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates loop guardrails in fixed precedence order: `kill_switch`,
/// `terminal_state`, `lease_invalid`, `cooldown`, `max_iterations`,
/// `manual_intent_denied`. The first matching reason wins.
#[must_use]
#[allow(
    clippy::fn_params_excessive_bools,
    reason = "mirrors the boolean guard inputs named in the source contract"
)]
pub fn evaluate_loop_guardrails(
    kill_switch_enabled: bool,
    is_terminal_state: bool,
    has_valid_lease: bool,
    cooldown_until: Option<Timestamp>,
    iteration_count: u32,
    max_iterations: Option<u32>,
    manual_intent_allowed: bool,
    now: Timestamp,
) -> GuardrailDecision {
    if kill_switch_enabled {
        return GuardrailDecision::Denied(GuardrailReason::KillSwitch);
    }
    if is_terminal_state {
        return GuardrailDecision::Denied(GuardrailReason::TerminalState);
    }
    if !has_valid_lease {
        return GuardrailDecision::Denied(GuardrailReason::LeaseInvalid);
    }
    if let Some(cooldown_until) = cooldown_until
        && cooldown_until > now
    {
        return GuardrailDecision::Denied(GuardrailReason::Cooldown);
    }
    if let Some(max_iterations) = max_iterations
        && iteration_count >= max_iterations
    {
        return GuardrailDecision::Denied(GuardrailReason::MaxIterations);
    }
    if !manual_intent_allowed {
        return GuardrailDecision::Denied(GuardrailReason::ManualIntentDenied);
    }
    GuardrailDecision::Allowed
}
