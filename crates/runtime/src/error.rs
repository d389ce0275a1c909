//! Runtime crate error types.

use std::time::Duration;

/// Error returned by a host function.
///
/// Thrown inside the sandbox as an `Error` named `HostError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct NativeError {
    message: String,
}

impl NativeError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message shown to the script.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for NativeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<hookrun_core::ContextError> for NativeError {
    fn from(err: hookrun_core::ContextError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors from loading or validating [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document is malformed or has wrongly typed fields.
    #[error("invalid runtime config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment variable holds an unparsable duration.
    #[error("invalid duration in {key}: {value:?}")]
    InvalidDuration {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Parser error.
        #[source]
        source: humantime::DurationError,
    },

    /// An environment variable holds an unparsable byte count.
    #[error("invalid byte count in {key}: {value:?}")]
    InvalidNumber {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },

    /// A duration that must be positive is zero.
    #[error("{field} must be greater than zero, got {value:?}")]
    ZeroDuration {
        /// Field name.
        field: &'static str,
        /// Configured value.
        value: Duration,
    },

    /// A count that must be positive is zero.
    #[error("{field} must be greater than zero")]
    ZeroLimit {
        /// Field name.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_display_is_message() {
        let err = NativeError::new("claim not allowed");
        assert_eq!(err.to_string(), "claim not allowed");
        assert_eq!(err.message(), "claim not allowed");
    }

    #[test]
    fn context_errors_convert() {
        let err: NativeError = hookrun_core::ContextError::KeyNotFound { key: "idToken".into() }.into();
        assert_eq!(err.message(), "key not found: idToken");
    }

    #[test]
    fn zero_duration_display() {
        let err = ConfigError::ZeroDuration {
            field: "promise_poll_interval",
            value: Duration::ZERO,
        };
        assert_eq!(err.to_string(), "promise_poll_interval must be greater than zero, got 0ns");
    }
}
