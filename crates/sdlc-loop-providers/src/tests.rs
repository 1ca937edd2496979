// crates/sdlc-loop-providers/src/tests.rs
// ============================================================================
// Module: Environment Runtime Config Provider Tests
// Description: Unit tests for `load_runtime_config` and `EnvSource`.
// Purpose: Pin parse-or-default behavior and malformed-value rejection.
// Dependencies: sdlc-loop-providers::env
// ============================================================================

use std::collections::BTreeMap;

use crate::env::load_runtime_config;
use crate::env::EnvSource;
use crate::env::ProvidersError;
use crate::env::ENV_COOLDOWN_SECONDS;
use crate::env::ENV_KILL_SWITCH;
use crate::env::ENV_LEASE_TTL_SECONDS;
use crate::env::ENV_MAX_ITERATIONS;
use crate::env::ENV_OUTBOX_BASE_BACKOFF_MS;
use crate::env::ENV_PARITY_CUTOVER_THRESHOLD;
use crate::RuntimeConfig;

fn overrides(entries: &[(&str, &str)]) -> EnvSource {
    let map: BTreeMap<String, String> =
        entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    EnvSource::from_overrides(map)
}

#[test]
fn empty_overrides_resolve_to_documented_defaults() {
    let source = overrides(&[]);
    let config = load_runtime_config(&source).expect("defaults always parse");
    assert_eq!(config, RuntimeConfig::default());
}

#[test]
fn lease_ttl_override_is_applied() {
    let source = overrides(&[(ENV_LEASE_TTL_SECONDS, "120")]);
    let config = load_runtime_config(&source).expect("valid override parses");
    assert_eq!(config.lease_ttl_seconds, 120);
}

#[test]
fn malformed_numeric_value_is_rejected() {
    let source = overrides(&[(ENV_LEASE_TTL_SECONDS, "not-a-number")]);
    let err = load_runtime_config(&source).expect_err("malformed value must fail closed");
    match err {
        ProvidersError::InvalidValue { key, value, .. } => {
            assert_eq!(key, ENV_LEASE_TTL_SECONDS);
            assert_eq!(value, "not-a-number");
        }
    }
}

#[test]
fn max_iterations_defaults_to_unlimited() {
    let source = overrides(&[]);
    let config = load_runtime_config(&source).expect("defaults always parse");
    assert_eq!(config.max_iterations, None);
}

#[test]
fn max_iterations_override_is_applied() {
    let source = overrides(&[(ENV_MAX_ITERATIONS, "3")]);
    let config = load_runtime_config(&source).expect("valid override parses");
    assert_eq!(config.max_iterations, Some(3));
}

#[test]
fn kill_switch_accepts_bool_literal() {
    let source = overrides(&[(ENV_KILL_SWITCH, "true")]);
    let config = load_runtime_config(&source).expect("valid override parses");
    assert!(config.kill_switch_enabled);
}

#[test]
fn parity_threshold_accepts_float() {
    let source = overrides(&[(ENV_PARITY_CUTOVER_THRESHOLD, "0.95")]);
    let config = load_runtime_config(&source).expect("valid override parses");
    assert!((config.parity_cutover_threshold - 0.95).abs() < f64::EPSILON);
}

#[test]
fn cooldown_seconds_override_is_applied() {
    let source = overrides(&[(ENV_COOLDOWN_SECONDS, "45")]);
    let config = load_runtime_config(&source).expect("valid override parses");
    assert_eq!(config.cooldown_seconds, 45);
}

#[test]
fn outbox_base_backoff_matches_documented_default() {
    let source = overrides(&[]);
    let config = load_runtime_config(&source).expect("defaults always parse");
    assert_eq!(config.outbox_base_backoff_ms, 30_000);
}
