#![warn(missing_docs)]

//! # Hookrun Log
//!
//! Logging setup for hosts embedding Hookrun.
//!
//! The runtime crates only emit `tracing` events. This crate installs the
//! subscriber that renders them: pretty for development, JSON for
//! production, captured output for tests.
//!
//! ```rust,ignore
//! let _guard = hookrun_log::init()?;
//! tracing::info!("host started");
//! ```

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format, Writer};
pub use error::{LogError, LogResult};

/// Install a global logger configured from the environment.
///
/// # Errors
///
/// See [`LoggerBuilder::build`].
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::from_env())
}

/// Install a global logger from `config`.
///
/// # Errors
///
/// See [`LoggerBuilder::build`].
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Route logs into libtest's captured output. Safe to call from every test.
pub fn init_test() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if let Err(error) = init_with(Config::test()) {
            eprintln!("test logger not installed: {error}");
        }
    });
}
