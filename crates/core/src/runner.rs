//! The runner surface and name-based runner lookup.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::context::CallContext;
use crate::descriptor::WorkflowDescriptor;
use crate::error::{ExecutionFailure, RuntimeError};
use crate::options::{IntrospectionOptions, StartOptions};
use crate::result::{ExecutionResult, IntrospectionResult};

/// A script engine able to run and inspect workflows.
///
/// Implementations must be safe to call concurrently; every call builds its
/// own isolated sandbox.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run the workflow's entry point to completion.
    ///
    /// The returned metadata is populated whether or not the call succeeds.
    async fn execute(
        &self,
        ctx: &CallContext,
        workflow: &WorkflowDescriptor,
        options: StartOptions,
    ) -> Result<ExecutionResult, ExecutionFailure>;

    /// Load the workflow and read the requested exports without invoking
    /// any entry point.
    async fn introspect(
        &self,
        ctx: &CallContext,
        workflow: &WorkflowDescriptor,
        options: IntrospectionOptions,
    ) -> Result<IntrospectionResult, RuntimeError>;
}

/// Produces a runner handle on lookup.
pub type RunnerFactory = Arc<dyn Fn() -> Arc<dyn Runner> + Send + Sync>;

/// Thread-safe registry of runners keyed by engine name (e.g. `"quickjs"`).
#[derive(Default)]
pub struct RunnerRegistry {
    factories: DashMap<String, RunnerFactory>,
}

impl RunnerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner factory. An existing factory under `name` is replaced.
    pub fn register(&self, name: impl Into<String>, factory: RunnerFactory) {
        let name = name.into();
        tracing::info!(runner = %name, "registered runner");
        self.factories.insert(name, factory);
    }

    /// Look up a runner by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Runner>, RuntimeError> {
        let factory = self
            .factories
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RuntimeError::RunnerNotFound { name: name.to_owned() })?;
        Ok(factory())
    }

    /// Whether a runner is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered runner names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerRegistry").field("names", &self.names()).finish()
    }
}
