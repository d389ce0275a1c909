//! Runner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning knobs shared by every call a runner serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Sleep between promise-state polls while draining an entry point.
    #[serde(with = "humantime_serde")]
    pub promise_poll_interval: Duration,

    /// Budget used when a descriptor's `max_execution_duration` is zero.
    #[serde(with = "humantime_serde")]
    pub default_max_execution_duration: Duration,

    /// How long past the deadline the controller keeps waiting for a worker
    /// stuck in a non-preemptible host call before reporting a timeout.
    #[serde(with = "humantime_serde")]
    pub abandon_grace: Duration,

    /// Engine heap limit per call.
    pub memory_limit_bytes: Option<usize>,

    /// Engine stack limit per call.
    pub max_stack_size_bytes: Option<usize>,

    /// Most nodes one script value may expand to when converted to host
    /// JSON. Shared references count once per occurrence.
    pub max_converted_nodes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            promise_poll_interval: Duration::from_millis(1),
            default_max_execution_duration: Duration::from_secs(30),
            abandon_grace: Duration::from_secs(1),
            memory_limit_bytes: None,
            max_stack_size_bytes: None,
            max_converted_nodes: 100_000,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `HOOKRUN_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `HOOKRUN_PROMISE_POLL_INTERVAL` | `promise_poll_interval` |
    /// | `HOOKRUN_DEFAULT_MAX_EXECUTION_DURATION` | `default_max_execution_duration` |
    /// | `HOOKRUN_ABANDON_GRACE` | `abandon_grace` |
    /// | `HOOKRUN_MEMORY_LIMIT_BYTES` | `memory_limit_bytes` |
    /// | `HOOKRUN_MAX_STACK_SIZE_BYTES` | `max_stack_size_bytes` |
    /// | `HOOKRUN_MAX_CONVERTED_NODES` | `max_converted_nodes` |
    ///
    /// Durations use humantime syntax (`"250ms"`, `"30s"`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = duration_var(&lookup, "HOOKRUN_PROMISE_POLL_INTERVAL")? {
            config.promise_poll_interval = value;
        }
        if let Some(value) = duration_var(&lookup, "HOOKRUN_DEFAULT_MAX_EXECUTION_DURATION")? {
            config.default_max_execution_duration = value;
        }
        if let Some(value) = duration_var(&lookup, "HOOKRUN_ABANDON_GRACE")? {
            config.abandon_grace = value;
        }
        if let Some(value) = bytes_var(&lookup, "HOOKRUN_MEMORY_LIMIT_BYTES")? {
            config.memory_limit_bytes = Some(value);
        }
        if let Some(value) = bytes_var(&lookup, "HOOKRUN_MAX_STACK_SIZE_BYTES")? {
            config.max_stack_size_bytes = Some(value);
        }
        if let Some(value) = bytes_var(&lookup, "HOOKRUN_MAX_CONVERTED_NODES")? {
            config.max_converted_nodes = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.promise_poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "promise_poll_interval",
                value: self.promise_poll_interval,
            });
        }
        if self.default_max_execution_duration.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "default_max_execution_duration",
                value: self.default_max_execution_duration,
            });
        }
        if self.max_converted_nodes == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_converted_nodes",
            });
        }
        Ok(())
    }

    /// The budget for one call: the descriptor's limit, or the default when it is zero.
    pub fn effective_max_duration(&self, requested: Duration) -> Duration {
        if requested.is_zero() {
            self.default_max_execution_duration
        } else {
            requested
        }
    }
}

fn duration_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    lookup(key)
        .map(|value| {
            humantime::parse_duration(value.trim()).map_err(|source| ConfigError::InvalidDuration {
                key: key.to_owned(),
                value,
                source,
            })
        })
        .transpose()
}

fn bytes_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>, ConfigError> {
    lookup(key)
        .map(|value| {
            value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidNumber {
                key: key.to_owned(),
                value,
            })
        })
        .transpose()
}
