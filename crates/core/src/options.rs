//! Per-call options.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::logging::WorkflowLogger;

/// Options for [`Runner::execute`](crate::Runner::execute).
#[derive(Clone, Default)]
pub struct StartOptions {
    /// Method invoked on the default export when it is not itself callable.
    pub entry_point: String,
    /// Positional arguments, converted to script values in order.
    pub arguments: Vec<Value>,
    /// Sink for the workflow's `console` output.
    pub logger: Option<Arc<dyn WorkflowLogger>>,
}

impl StartOptions {
    /// Start the named entry point with no arguments.
    pub fn entry_point(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            ..Self::default()
        }
    }

    /// Append a positional argument.
    #[must_use]
    pub fn with_argument(mut self, argument: Value) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Replace all positional arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Route `console` output to `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn WorkflowLogger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOptions")
            .field("entry_point", &self.entry_point)
            .field("arguments", &self.arguments)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Options for [`Runner::introspect`](crate::Runner::introspect).
#[derive(Clone, Default)]
pub struct IntrospectionOptions {
    /// Export names to read from `module.exports`.
    pub exports: Vec<String>,
    /// Sink for `console` output produced by the module's top-level body.
    pub logger: Option<Arc<dyn WorkflowLogger>>,
}

impl IntrospectionOptions {
    /// Introspect the given exports.
    pub fn exports<I, S>(exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exports: exports.into_iter().map(Into::into).collect(),
            logger: None,
        }
    }

    /// Route `console` output to `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn WorkflowLogger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl fmt::Debug for IntrospectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionOptions")
            .field("exports", &self.exports)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}
