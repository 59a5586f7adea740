//! Scope configuration.
//!
//! Values come from code, from environment variables, or (with the `config`
//! feature) from JSON or YAML documents.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{ScopeError, ScopeResult};

const DEFAULT_ENV_PREFIX: &str = "FERROUS_SCOPES";

/// Tuning for the context directories and built-in logging.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{ScopeConfig, UiScope};
///
/// let config = ScopeConfig {
///     purge_interval: 8,
///     ..ScopeConfig::default()
/// };
/// config.validate().unwrap();
///
/// let scope = UiScope::with_config(config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScopeConfig {
    /// Initial capacity of each directory and storage map
    pub initial_capacity: usize,
    /// Directory hits between sweeps for unreachable handles (insertions always sweep)
    pub purge_interval: usize,
    /// Whether [`TracingObserver`](crate::TracingObserver) built from this config logs cache hits
    pub trace_cache_hits: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            purge_interval: 64,
            trace_cache_hits: false,
        }
    }
}

impl ScopeConfig {
    /// Rejects values that would make the directories misbehave.
    pub fn validate(&self) -> ScopeResult<()> {
        if self.initial_capacity > 1 << 20 {
            return Err(ScopeError::Config(format!(
                "initial_capacity {} is unreasonably large",
                self.initial_capacity
            )));
        }
        Ok(())
    }

    /// Reads `FERROUS_SCOPES_*` variables over the defaults.
    pub fn from_env() -> ScopeResult<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Reads `{PREFIX}_INITIAL_CAPACITY`, `{PREFIX}_PURGE_INTERVAL` and
    /// `{PREFIX}_TRACE_CACHE_HITS`. Unset variables keep their defaults.
    pub fn from_env_with_prefix(prefix: &str) -> ScopeResult<Self> {
        let prefix = prefix.to_uppercase();
        let mut config = Self::default();

        if let Some(value) = read_var(&prefix, "INITIAL_CAPACITY") {
            config.initial_capacity = parse_usize("initial_capacity", &value)?;
        }
        if let Some(value) = read_var(&prefix, "PURGE_INTERVAL") {
            config.purge_interval = parse_usize("purge_interval", &value)?;
        }
        if let Some(value) = read_var(&prefix, "TRACE_CACHE_HITS") {
            config.trace_cache_hits = parse_bool("trace_cache_hits", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> ScopeResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ScopeError::Config(format!("invalid JSON configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_yaml_str(yaml: &str) -> ScopeResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ScopeError::Config(format!("invalid YAML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

fn read_var(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{}_{}", prefix, name)).ok()
}

fn parse_usize(field: &str, value: &str) -> ScopeResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ScopeError::Config(format!("{} must be a non-negative integer, got {:?}", field, value)))
}

fn parse_bool(field: &str, value: &str) -> ScopeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScopeError::Config(format!("{} must be a boolean, got {:?}", field, value))),
    }
}
