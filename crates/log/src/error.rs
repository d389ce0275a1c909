//! Error types

use thiserror::Error;

/// Result alias for logger setup.
pub type LogResult<T> = Result<T, LogError>;

/// Logger setup failure.
#[derive(Debug, Error)]
pub enum LogError {
    /// The level directive could not be parsed.
    #[error("invalid log filter {directive:?}: {reason}")]
    Filter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("a global logger is already installed")]
    AlreadyInitialized,
}
