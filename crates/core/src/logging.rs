//! Log sink contract for workflow `console` output.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a workflow log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// `console.log` / `console.info`.
    Info,
    /// `console.debug`.
    Debug,
    /// `console.warn`.
    Warning,
    /// `console.error`.
    Error,
    /// Suppressed output.
    Silent,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Silent => "silent",
        })
    }
}

/// Receives log lines emitted by a workflow.
///
/// One logger is supplied per call, so output from one tenant's workflow
/// never lands in another call's sink.
pub trait WorkflowLogger: Send + Sync {
    /// Record one `console.*` invocation with its converted arguments.
    fn log(&self, level: LogLevel, args: &[Value]);
}

/// Forwards workflow output to `tracing` under the `hookrun::workflow` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    workflow: Option<String>,
}

impl TracingLogger {
    /// Create a logger that tags every event with a workflow name.
    pub fn named(workflow: impl Into<String>) -> Self {
        Self {
            workflow: Some(workflow.into()),
        }
    }
}

/// Render console arguments the way a terminal would: strings bare,
/// everything else as compact JSON, separated by spaces.
pub fn render_args(args: &[Value]) -> String {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        match arg {
            Value::String(s) => line.push_str(s),
            other => line.push_str(&other.to_string()),
        }
    }
    line
}

impl WorkflowLogger for TracingLogger {
    fn log(&self, level: LogLevel, args: &[Value]) {
        let workflow = self.workflow.as_deref().unwrap_or("");
        let message = render_args(args);
        match level {
            LogLevel::Info => tracing::info!(target: "hookrun::workflow", workflow, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "hookrun::workflow", workflow, "{message}"),
            LogLevel::Warning => tracing::warn!(target: "hookrun::workflow", workflow, "{message}"),
            LogLevel::Error => tracing::error!(target: "hookrun::workflow", workflow, "{message}"),
            LogLevel::Silent => {}
        }
    }
}
