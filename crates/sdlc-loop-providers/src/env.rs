// crates/sdlc-loop-providers/src/env.rs
// ============================================================================
// Module: Environment Runtime Config Provider
// Description: Typed, parse-or-default reader for the loop controller's
// environment-derived runtime configuration.
// Purpose: Expose deterministic access to process environment state without
// requiring a caller to re-derive parsing or default-value rules.
// Dependencies: sdlc-loop-core, thiserror
// ============================================================================

//! ## Overview
//! Every runtime knob has a documented default and a dedicated environment
//! variable. [`EnvSource`] abstracts the lookup so tests can supply a fixed
//! override map instead of mutating the real process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// SECTION: Environment Variable Names
// ============================================================================

/// Database connection string (path or DSN) for the durable store.
pub const ENV_DATABASE_URL: &str = "SDLC_LOOP_DATABASE_URL";
/// Loop lease TTL, in seconds.
pub const ENV_LEASE_TTL_SECONDS: &str = "SDLC_LOOP_LEASE_TTL_SECONDS";
/// Outbox exponential backoff base delay, in milliseconds.
pub const ENV_OUTBOX_BASE_BACKOFF_MS: &str = "SDLC_LOOP_OUTBOX_BASE_BACKOFF_MS";
/// Outbox exponential backoff ceiling, in milliseconds.
pub const ENV_OUTBOX_MAX_BACKOFF_MS: &str = "SDLC_LOOP_OUTBOX_MAX_BACKOFF_MS";
/// Maximum outbox delivery attempts before a row is marked `failed`.
pub const ENV_OUTBOX_MAX_ATTEMPTS: &str = "SDLC_LOOP_OUTBOX_MAX_ATTEMPTS";
/// Maximum fix attempts before a loop escalates to `blocked_on_human_feedback`.
pub const ENV_MAX_FIX_ATTEMPTS: &str = "SDLC_LOOP_MAX_FIX_ATTEMPTS";
/// Maximum loop iterations the guardrail allows; unset means unlimited.
pub const ENV_MAX_ITERATIONS: &str = "SDLC_LOOP_MAX_ITERATIONS";
/// Global kill switch; when true, the guardrail denies every signal.
pub const ENV_KILL_SWITCH: &str = "SDLC_LOOP_KILL_SWITCH";
/// Cooldown window applied after a manual stop, in seconds.
pub const ENV_COOLDOWN_SECONDS: &str = "SDLC_LOOP_COOLDOWN_SECONDS";
/// Parity ratio at or above which cutover to the new coordinator is eligible.
pub const ENV_PARITY_CUTOVER_THRESHOLD: &str = "SDLC_LOOP_PARITY_CUTOVER_THRESHOLD";
/// Parity ratio below which rollback to the old coordinator is required.
pub const ENV_PARITY_ROLLBACK_THRESHOLD: &str = "SDLC_LOOP_PARITY_ROLLBACK_THRESHOLD";
/// Gate evaluator LLM invocation timeout, in seconds.
pub const ENV_GATE_LLM_TIMEOUT_SECONDS: &str = "SDLC_LOOP_GATE_LLM_TIMEOUT_SECONDS";

// ============================================================================
// SECTION: Defaults
// ============================================================================

const DEFAULT_DATABASE_URL: &str = "sdlc_loop.db";
const DEFAULT_LEASE_TTL_SECONDS: u64 = 60;
const DEFAULT_OUTBOX_BASE_BACKOFF_MS: u64 = 30_000;
const DEFAULT_OUTBOX_MAX_BACKOFF_MS: u64 = 30 * 60 * 1000;
const DEFAULT_OUTBOX_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_MAX_FIX_ATTEMPTS: u32 = 3;
const DEFAULT_KILL_SWITCH: bool = false;
const DEFAULT_COOLDOWN_SECONDS: u64 = 0;
const DEFAULT_PARITY_CUTOVER_THRESHOLD: f64 = 0.999;
const DEFAULT_PARITY_ROLLBACK_THRESHOLD: f64 = 0.99;
const DEFAULT_GATE_LLM_TIMEOUT_SECONDS: u64 = 180;

// ============================================================================
// SECTION: Environment Source
// ============================================================================

/// Source of environment variable lookups.
///
/// # Invariants
/// - `overrides`, when present, is consulted instead of the process
///   environment so tests get deterministic, isolated reads.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    overrides: Option<BTreeMap<String, String>>,
}

impl EnvSource {
    /// Reads from the real process environment.
    #[must_use]
    pub const fn from_process() -> Self {
        Self {
            overrides: None,
        }
    }

    /// Reads from a fixed override map instead of the process environment.
    #[must_use]
    pub fn from_overrides(overrides: BTreeMap<String, String>) -> Self {
        Self {
            overrides: Some(overrides),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match &self.overrides {
            Some(map) => map.get(key).cloned(),
            None => env::var(key).ok(),
        }
    }
}

// ============================================================================
// SECTION: Runtime Configuration
// ============================================================================

/// Typed runtime configuration resolved from the environment.
///
/// # Invariants
/// - Every field has a default; a present-but-malformed value is rejected
///   rather than silently falling back to the default.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Connection string (path or DSN) for the durable store.
    pub database_url: String,
    /// Loop lease TTL.
    pub lease_ttl_seconds: u64,
    /// Outbox exponential backoff base delay.
    pub outbox_base_backoff_ms: u64,
    /// Outbox exponential backoff ceiling.
    pub outbox_max_backoff_ms: u64,
    /// Maximum outbox delivery attempts before a row is marked `failed`.
    pub outbox_max_attempts: u32,
    /// Maximum fix attempts before a loop escalates to human feedback.
    pub max_fix_attempts: u32,
    /// Maximum loop iterations the guardrail allows; `None` is unlimited.
    pub max_iterations: Option<u32>,
    /// Global kill switch; when true, the guardrail denies every signal.
    pub kill_switch_enabled: bool,
    /// Cooldown window applied after a manual stop.
    pub cooldown_seconds: u64,
    /// Parity ratio at or above which cutover is eligible.
    pub parity_cutover_threshold: f64,
    /// Parity ratio below which rollback is required.
    pub parity_rollback_threshold: f64,
    /// Gate evaluator LLM invocation timeout.
    pub gate_llm_timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            lease_ttl_seconds: DEFAULT_LEASE_TTL_SECONDS,
            outbox_base_backoff_ms: DEFAULT_OUTBOX_BASE_BACKOFF_MS,
            outbox_max_backoff_ms: DEFAULT_OUTBOX_MAX_BACKOFF_MS,
            outbox_max_attempts: DEFAULT_OUTBOX_MAX_ATTEMPTS,
            max_fix_attempts: DEFAULT_MAX_FIX_ATTEMPTS,
            max_iterations: None,
            kill_switch_enabled: DEFAULT_KILL_SWITCH,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            parity_cutover_threshold: DEFAULT_PARITY_CUTOVER_THRESHOLD,
            parity_rollback_threshold: DEFAULT_PARITY_ROLLBACK_THRESHOLD,
            gate_llm_timeout_seconds: DEFAULT_GATE_LLM_TIMEOUT_SECONDS,
        }
    }
}

/// Resolves a [`RuntimeConfig`] from the given environment source.
///
/// # Errors
///
/// Returns [`ProvidersError`] when a present environment variable fails to
/// parse as the type its field expects.
pub fn load_runtime_config(source: &EnvSource) -> Result<RuntimeConfig, ProvidersError> {
    let defaults = RuntimeConfig::default();
    Ok(RuntimeConfig {
        database_url: source.get(ENV_DATABASE_URL).unwrap_or(defaults.database_url),
        lease_ttl_seconds: parse_or_default(source, ENV_LEASE_TTL_SECONDS, defaults.lease_ttl_seconds)?,
        outbox_base_backoff_ms: parse_or_default(
            source,
            ENV_OUTBOX_BASE_BACKOFF_MS,
            defaults.outbox_base_backoff_ms,
        )?,
        outbox_max_backoff_ms: parse_or_default(
            source,
            ENV_OUTBOX_MAX_BACKOFF_MS,
            defaults.outbox_max_backoff_ms,
        )?,
        outbox_max_attempts: parse_or_default(
            source,
            ENV_OUTBOX_MAX_ATTEMPTS,
            defaults.outbox_max_attempts,
        )?,
        max_fix_attempts: parse_or_default(source, ENV_MAX_FIX_ATTEMPTS, defaults.max_fix_attempts)?,
        max_iterations: parse_optional(source, ENV_MAX_ITERATIONS)?,
        kill_switch_enabled: parse_or_default(source, ENV_KILL_SWITCH, defaults.kill_switch_enabled)?,
        cooldown_seconds: parse_or_default(source, ENV_COOLDOWN_SECONDS, defaults.cooldown_seconds)?,
        parity_cutover_threshold: parse_or_default(
            source,
            ENV_PARITY_CUTOVER_THRESHOLD,
            defaults.parity_cutover_threshold,
        )?,
        parity_rollback_threshold: parse_or_default(
            source,
            ENV_PARITY_ROLLBACK_THRESHOLD,
            defaults.parity_rollback_threshold,
        )?,
        gate_llm_timeout_seconds: parse_or_default(
            source,
            ENV_GATE_LLM_TIMEOUT_SECONDS,
            defaults.gate_llm_timeout_seconds,
        )?,
    })
}

fn parse_or_default<T>(source: &EnvSource, key: &str, default: T) -> Result<T, ProvidersError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|err| ProvidersError::InvalidValue {
            key: key.to_string(),
            value: raw,
            reason: err.to_string(),
        }),
    }
}

fn parse_optional<T>(source: &EnvSource, key: &str) -> Result<Option<T>, ProvidersError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| ProvidersError::InvalidValue {
                key: key.to_string(),
                value: raw,
                reason: err.to_string(),
            }),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors resolving runtime configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvidersError {
    /// An environment variable was present but did not parse as expected.
    #[error("environment variable {key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        /// Name of the offending environment variable.
        key: String,
        /// Raw value that failed to parse.
        value: String,
        /// Human-readable parse failure reason.
        reason: String,
    },
}
