// crates/sdlc-loop-config/src/config.rs
// ============================================================================
// Module: SDLC Loop Configuration
// Description: Configuration loading, environment overlay, and validation.
// Purpose: Provide a strict, fail-closed config model layered over the
// environment-derived runtime defaults.
// Dependencies: sdlc-loop-core, sdlc-loop-providers, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from an optional TOML file. Any field the file
//! omits falls back to the value `sdlc-loop-providers` resolved from the
//! environment; any field present in the file overrides it. The merged
//! result is validated for internal consistency before it is handed back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use sdlc_loop_providers::RuntimeConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "sdlc-loop.toml";
/// Environment variable used to override the config file path.
pub(crate) const CONFIG_ENV_VAR: &str = "SDLC_LOOP_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Default trusted source for authoritative unresolved-thread counts.
const DEFAULT_TRUSTED_SOURCE: &str = "github_graphql";

// ============================================================================
// SECTION: Raw (File) Configuration
// ============================================================================

/// Raw, partially-populated configuration as deserialized from TOML.
///
/// Every field is optional; an absent field is filled from the
/// environment-derived [`RuntimeConfig`] during [`LoopControllerConfig::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    lease_ttl_seconds: Option<u64>,
    #[serde(default)]
    max_fix_attempts: Option<u32>,
    #[serde(default)]
    max_iterations: Option<u32>,
    #[serde(default)]
    kill_switch_enabled: Option<bool>,
    #[serde(default)]
    cooldown_seconds: Option<u64>,
    #[serde(default)]
    gate_llm_timeout_seconds: Option<u64>,
    #[serde(default)]
    outbox: RawOutboxConfig,
    #[serde(default)]
    parity: RawParityConfig,
    #[serde(default)]
    signal_inbox: RawSignalInboxConfig,
}

/// Raw outbox section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawOutboxConfig {
    #[serde(default)]
    base_backoff_ms: Option<u64>,
    #[serde(default)]
    max_backoff_ms: Option<u64>,
    #[serde(default)]
    max_attempts: Option<u32>,
}

/// Raw parity section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawParityConfig {
    #[serde(default)]
    cutover_threshold: Option<f64>,
    #[serde(default)]
    rollback_threshold: Option<f64>,
}

/// Raw signal inbox section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawSignalInboxConfig {
    #[serde(default)]
    review_thread_trusted_sources: Option<Vec<String>>,
}

// ============================================================================
// SECTION: Resolved Configuration
// ============================================================================

/// Fully-resolved, validated loop controller configuration.
///
/// # Invariants
/// - Every field is present; file values win over environment defaults.
/// - [`LoopControllerConfig::resolve`] always validates before returning.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopControllerConfig {
    /// Connection string (path or DSN) for the durable store.
    pub database_url: String,
    /// Loop lease TTL, in seconds.
    pub lease_ttl_seconds: u64,
    /// Maximum fix attempts before a loop escalates to human feedback.
    pub max_fix_attempts: u32,
    /// Maximum loop iterations the guardrail allows; `None` is unlimited.
    pub max_iterations: Option<u32>,
    /// Global kill switch; when true, the guardrail denies every signal.
    pub kill_switch_enabled: bool,
    /// Cooldown window applied after a manual stop, in seconds.
    pub cooldown_seconds: u64,
    /// Gate evaluator LLM invocation timeout, in seconds.
    pub gate_llm_timeout_seconds: u64,
    /// Transactional outbox retry configuration.
    pub outbox: OutboxConfig,
    /// Parity-SLO cutover/rollback configuration.
    pub parity: ParityConfig,
    /// Signal inbox follow-up routing configuration.
    pub signal_inbox: SignalInboxConfig,
}

/// Transactional outbox retry configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutboxConfig {
    /// Exponential backoff base delay, in milliseconds.
    pub base_backoff_ms: u64,
    /// Exponential backoff ceiling, in milliseconds.
    pub max_backoff_ms: u64,
    /// Maximum delivery attempts before a row is marked `failed`.
    pub max_attempts: u32,
}

/// Parity-SLO cutover/rollback configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParityConfig {
    /// Parity ratio at or above which cutover is eligible.
    pub cutover_threshold: f64,
    /// Parity ratio below which rollback is required.
    pub rollback_threshold: f64,
}

/// Signal inbox follow-up routing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalInboxConfig {
    /// Sources trusted to report an authoritative unresolved-thread count.
    pub review_thread_trusted_sources: Vec<String>,
}

impl LoopControllerConfig {
    /// Loads the configuration file (if any) and resolves it against the
    /// given environment-derived defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, exceeds the
    /// size limit, is not valid UTF-8 or TOML, or fails validation.
    pub fn load(path: Option<&Path>, defaults: &RuntimeConfig) -> Result<Self, ConfigError> {
        let raw = match resolve_path(path)? {
            Some(resolved) => read_raw_config(&resolved)?,
            None => RawConfig::default(),
        };
        Self::resolve(raw, defaults)
    }

    fn resolve(raw: RawConfig, defaults: &RuntimeConfig) -> Result<Self, ConfigError> {
        let config = Self {
            database_url: raw.database_url.unwrap_or_else(|| defaults.database_url.clone()),
            lease_ttl_seconds: raw.lease_ttl_seconds.unwrap_or(defaults.lease_ttl_seconds),
            max_fix_attempts: raw.max_fix_attempts.unwrap_or(defaults.max_fix_attempts),
            max_iterations: raw.max_iterations.or(defaults.max_iterations),
            kill_switch_enabled: raw.kill_switch_enabled.unwrap_or(defaults.kill_switch_enabled),
            cooldown_seconds: raw.cooldown_seconds.unwrap_or(defaults.cooldown_seconds),
            gate_llm_timeout_seconds: raw
                .gate_llm_timeout_seconds
                .unwrap_or(defaults.gate_llm_timeout_seconds),
            outbox: OutboxConfig {
                base_backoff_ms: raw.outbox.base_backoff_ms.unwrap_or(defaults.outbox_base_backoff_ms),
                max_backoff_ms: raw.outbox.max_backoff_ms.unwrap_or(defaults.outbox_max_backoff_ms),
                max_attempts: raw.outbox.max_attempts.unwrap_or(defaults.outbox_max_attempts),
            },
            parity: ParityConfig {
                cutover_threshold: raw
                    .parity
                    .cutover_threshold
                    .unwrap_or(defaults.parity_cutover_threshold),
                rollback_threshold: raw
                    .parity
                    .rollback_threshold
                    .unwrap_or(defaults.parity_rollback_threshold),
            },
            signal_inbox: SignalInboxConfig {
                review_thread_trusted_sources: raw
                    .signal_inbox
                    .review_thread_trusted_sources
                    .unwrap_or_else(|| vec![DEFAULT_TRUSTED_SOURCE.to_string()]),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a field is out of its allowed
    /// range or two fields contradict each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("database_url must be non-empty".to_string()));
        }
        if self.lease_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("lease_ttl_seconds must be greater than zero".to_string()));
        }
        if self.max_fix_attempts == 0 {
            return Err(ConfigError::Invalid("max_fix_attempts must be greater than zero".to_string()));
        }
        if let Some(max_iterations) = self.max_iterations {
            if max_iterations == 0 {
                return Err(ConfigError::Invalid(
                    "max_iterations must be greater than zero when set".to_string(),
                ));
            }
        }
        self.outbox.validate()?;
        self.parity.validate()?;
        if self.signal_inbox.review_thread_trusted_sources.is_empty() {
            return Err(ConfigError::Invalid(
                "signal_inbox.review_thread_trusted_sources must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl OutboxConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_backoff_ms == 0 {
            return Err(ConfigError::Invalid("outbox.base_backoff_ms must be greater than zero".to_string()));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(ConfigError::Invalid(
                "outbox.max_backoff_ms must be greater than or equal to base_backoff_ms".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("outbox.max_attempts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

impl ParityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.cutover_threshold) {
            return Err(ConfigError::Invalid(
                "parity.cutover_threshold must be within [0.0, 1.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rollback_threshold) {
            return Err(ConfigError::Invalid(
                "parity.rollback_threshold must be within [0.0, 1.0]".to_string(),
            ));
        }
        if self.rollback_threshold > self.cutover_threshold {
            return Err(ConfigError::Invalid(
                "parity.rollback_threshold must not exceed cutover_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Path Resolution and File Reading
// ============================================================================

/// Resolves the config file path; returns `None` when no file is configured
/// and the default filename does not exist on disk.
fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return Ok(Some(PathBuf::from(env_path)));
    }
    let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
    if default_path.is_file() {
        return Ok(Some(default_path));
    }
    Ok(None)
}

fn read_raw_config(path: &Path) -> Result<RawConfig, ConfigError> {
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content =
        std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading the configuration file.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}
