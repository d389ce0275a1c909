//! Runtime error types.

use std::fmt;

use crate::result::ExecutionMetadata;

/// Why a running script was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptReason {
    /// The call's maximum execution duration elapsed.
    Deadline,
    /// The caller cancelled its context.
    Cancelled,
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deadline => "deadline exceeded",
            Self::Cancelled => "context cancelled",
        })
    }
}

/// Errors returned by a runner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The source could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The parsed source could not be compiled.
    #[error("compile error: {0}")]
    Compile(String),

    /// The module's top-level body threw, or the sandbox could not be built.
    #[error("setup error: {0}")]
    Setup(String),

    /// `module.exports.default` is not defined.
    #[error("no default export found")]
    NoDefaultExport,

    /// The default export is an object without the requested entry point.
    #[error("entry point not found: {entry_point}")]
    EntryPointMissing {
        /// Requested method name.
        entry_point: String,
    },

    /// The requested entry point exists but cannot be called.
    #[error("entry point is not callable: {entry_point}")]
    EntryPointNotCallable {
        /// Requested method name.
        entry_point: String,
    },

    /// The entry point threw synchronously.
    #[error("invocation error: {0}")]
    Invocation(String),

    /// The entry point's promise was rejected.
    #[error("{0}")]
    RejectedPromise(String),

    /// The script was interrupted by the watchdog.
    #[error("execution interrupted: {reason}")]
    Timeout {
        /// What tripped the interrupt.
        reason: InterruptReason,
    },

    /// The execution worker panicked; the panic was contained.
    #[error("execution panicked: {0}")]
    PanicRecovered(String),

    /// No runner is registered under the name.
    #[error("runner not found: {name}")]
    RunnerNotFound {
        /// The runner name that was looked up.
        name: String,
    },

    /// A script value crossing into the host had more nodes than allowed.
    #[error("value exceeds the conversion limit of {limit} nodes")]
    ValueTooLarge {
        /// Configured node budget.
        limit: usize,
    },

    /// Engine allocation or bookkeeping failure.
    #[error("runtime error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the call was interrupted by deadline or cancellation.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The runtime never retries; retry policy belongs to the host.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Error of [`Runner::execute`](crate::Runner::execute): the cause plus the
/// metadata gathered before it occurred.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    /// What went wrong.
    #[source]
    pub error: RuntimeError,
    /// Timing of the failed call.
    pub metadata: ExecutionMetadata,
}

impl ExecutionFailure {
    /// Pair an error with its call metadata.
    pub fn new(error: RuntimeError, metadata: ExecutionMetadata) -> Self {
        Self { error, metadata }
    }

    /// The underlying error.
    pub fn error(&self) -> &RuntimeError {
        &self.error
    }

    /// Timing of the failed call.
    pub fn execution_metadata(&self) -> ExecutionMetadata {
        self.metadata
    }

    /// Discard the metadata.
    pub fn into_error(self) -> RuntimeError {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    #[test]
    fn entry_point_display() {
        let err = RuntimeError::EntryPointMissing {
            entry_point: "handle".into(),
        };
        assert_eq!(err.to_string(), "entry point not found: handle");
    }

    #[test]
    fn rejected_promise_displays_reason_verbatim() {
        let err = RuntimeError::RejectedPromise("boom".into());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn value_too_large_names_the_limit() {
        let err = RuntimeError::ValueTooLarge { limit: 500 };
        assert_eq!(err.to_string(), "value exceeds the conversion limit of 500 nodes");
        assert!(!err.is_timeout());
    }

    #[rstest]
    #[case(InterruptReason::Deadline, "execution interrupted: deadline exceeded")]
    #[case(InterruptReason::Cancelled, "execution interrupted: context cancelled")]
    fn timeout_display(#[case] reason: InterruptReason, #[case] expected: &str) {
        let err = RuntimeError::Timeout { reason };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), expected);
    }

    #[rstest]
    #[case(RuntimeError::Parse("x".into()))]
    #[case(RuntimeError::Timeout { reason: InterruptReason::Deadline })]
    #[case(RuntimeError::PanicRecovered("x".into()))]
    fn nothing_is_retryable(#[case] err: RuntimeError) {
        assert!(!err.is_retryable());
    }

    #[test]
    fn failure_keeps_metadata() {
        let metadata = ExecutionMetadata::started(Utc::now());
        let failure = ExecutionFailure::new(RuntimeError::NoDefaultExport, metadata);
        assert_eq!(failure.to_string(), "no default export found");
        assert_eq!(failure.execution_metadata(), metadata);
        assert_eq!(failure.into_error(), RuntimeError::NoDefaultExport);
    }
}
