#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Hookrun Core
//!
//! Core types and traits for the Hookrun workflow sandbox.
//!
//! This crate provides:
//! - [`WorkflowDescriptor`] -- the immutable per-call input (source, bindings, limits)
//! - [`Runner`] -- the execute / introspect surface consumed by host applications
//! - [`RunContext`] and [`CallContext`] -- per-call mutable state and cancellation
//! - [`RuntimeError`] -- the error taxonomy shared by every runner
//! - [`RunnerRegistry`] -- name-based lookup of runner implementations
//!
//! It has no dependency on any script engine; engines live in their own
//! crates and implement [`Runner`].

pub mod binding;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod options;
pub mod result;
pub mod runner;

pub use binding::BindingSettings;
pub use context::{CallContext, ContextError, RunContext};
pub use descriptor::{RuntimeLimits, SourceContentType, SourceDescriptor, WorkflowDescriptor};
pub use error::{ExecutionFailure, InterruptReason, RuntimeError};
pub use logging::{LogLevel, TracingLogger, WorkflowLogger};
pub use options::{IntrospectionOptions, StartOptions};
pub use result::{ExecutionMetadata, ExecutionResult, IntrospectedExport, IntrospectionResult};
pub use runner::{Runner, RunnerFactory, RunnerRegistry};
