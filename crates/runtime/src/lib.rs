#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Hookrun Runtime
//!
//! QuickJS sandbox runtime for tenant workflows.
//!
//! This crate provides:
//! - [`QuickJsRunner`] -- the [`Runner`](hookrun_core::Runner) implementation
//! - [`NativeRegistry`] -- the tree of host functions workflows may bind to
//! - [`ProgramCache`] -- compiled bytecode keyed by source digest
//! - [`RuntimeConfig`] -- poll interval, default deadline and engine limits
//! - [`SetupHook`] -- per-call hooks around sandbox setup
//!
//! Every call builds a fresh engine on a blocking worker, installs only
//! the capabilities the workflow requested, evaluates the cached program
//! and then either invokes its entry point or reads its exports. A
//! per-call watchdog interrupts the engine on deadline or cancellation.

pub mod builtins;
pub mod cache;
pub mod clock;
pub mod config;
mod convert;
mod drain;
pub mod error;
mod execution;
pub mod hooks;
mod introspection;
pub mod registry;
pub mod runner;
mod sandbox;
pub mod watchdog;

pub use builtins::BUILTIN_NAMES;
pub use cache::{CompiledProgram, ProgramCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::RuntimeConfig;
pub use error::{ConfigError, NativeError};
pub use hooks::SetupHook;
pub use registry::{ApiBuilder, HostFunction, MountPlan, NativeRegistry, SealedRegistry};
pub use runner::{QuickJsRunner, RUNNER_NAME, register_quickjs};
pub use watchdog::{InterruptSignal, Watchdog};
