//! QuickJS-backed [`Runner`].
//!
//! [`QuickJsRunner`] is the execution and introspection controller. Every
//! call gets its own engine on a blocking worker thread, guarded by a
//! [`Watchdog`](crate::watchdog::Watchdog) and by panic containment around
//! the whole worker body.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hookrun_core::{
    CallContext, ExecutionFailure, ExecutionMetadata, ExecutionResult, InterruptReason, IntrospectionOptions,
    IntrospectionResult, RunContext, Runner, RunnerRegistry, RuntimeError, StartOptions, WorkflowDescriptor,
    WorkflowLogger,
};
use tokio::sync::oneshot;

use crate::cache::ProgramCache;
use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::hooks::SetupHook;
use crate::registry::SealedRegistry;
use crate::sandbox::{self, Environment, Fault, Session};
use crate::watchdog::{InterruptSignal, Watchdog};
use crate::{execution, introspection};

/// Name under which [`register_quickjs`] registers the runner.
pub const RUNNER_NAME: &str = "quickjs";

/// Runs workflows in QuickJS sandboxes.
///
/// Cloning is cheap; clones share the program cache, registry, clock,
/// configuration and setup hooks.
#[derive(Clone)]
pub struct QuickJsRunner {
    env: Environment,
}

impl QuickJsRunner {
    /// Create a runner exposing `registry` with the default configuration.
    pub fn new(registry: SealedRegistry) -> Self {
        Self {
            env: Environment {
                registry,
                cache: Arc::new(ProgramCache::new()),
                clock: Arc::new(SystemClock),
                config: Arc::new(RuntimeConfig::default()),
                hooks: Arc::new(Vec::new()),
            },
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.env.config = Arc::new(config);
        self
    }

    /// Replace the time source seen by workflows and metadata.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.env.clock = clock;
        self
    }

    /// Add a setup hook. Hooks run in insertion order.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn SetupHook>) -> Self {
        Arc::make_mut(&mut self.env.hooks).push(hook);
        self
    }

    /// The shared program cache.
    pub fn cache(&self) -> &ProgramCache {
        &self.env.cache
    }

    /// The capabilities exposed to workflows.
    pub fn registry(&self) -> &SealedRegistry {
        &self.env.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.env.config
    }

    /// Build a sandbox for `workflow` on a blocking worker and run `job` in it.
    ///
    /// Returns when the job reports, when the caller cancels, or when the
    /// worker overruns its deadline by more than the abandon grace,
    /// whichever comes first.
    async fn supervise<T, F>(
        &self,
        caller: &CallContext,
        workflow: &WorkflowDescriptor,
        logger: Option<Arc<dyn WorkflowLogger>>,
        run_context: RunContext,
        job: F,
    ) -> Result<T, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T, RuntimeError> + Send + 'static,
    {
        let mut call = caller.child();
        for hook in self.env.hooks.iter() {
            hook.before_setup(&mut call);
        }

        let max_duration = self.env.config.effective_max_duration(workflow.limits.max_execution_duration);
        let interrupt = InterruptSignal::new();
        let _watchdog = Watchdog::arm(interrupt.clone(), call.cancellation().clone(), max_duration);
        let cancellation = call.cancellation().clone();

        let session = Session {
            workflow: workflow.clone(),
            call,
            run_context,
            logger,
            interrupt: interrupt.clone(),
            fault: Fault::default(),
            env: self.env.clone(),
        };

        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&session))).unwrap_or_else(|payload| {
                let message = sandbox::panic_message(payload.as_ref());
                tracing::error!(%message, "execution worker panicked");
                Err(RuntimeError::PanicRecovered(message))
            });
            if tx.send(outcome).is_err() {
                tracing::debug!("controller stopped waiting, dropping late result");
            }
        });

        tokio::select! {
            biased;
            received = rx => received.unwrap_or_else(|_| {
                Err(RuntimeError::PanicRecovered("execution worker exited without reporting a result".into()))
            }),
            () = cancellation.cancelled() => {
                interrupt.trip(InterruptReason::Cancelled);
                Err(RuntimeError::Timeout {
                    reason: interrupt.reason().unwrap_or(InterruptReason::Cancelled),
                })
            }
            () = tokio::time::sleep(max_duration.saturating_add(self.env.config.abandon_grace)) => {
                interrupt.trip(InterruptReason::Deadline);
                tracing::warn!(
                    ?max_duration,
                    "workflow ignored its interrupt, abandoning worker"
                );
                Err(RuntimeError::Timeout {
                    reason: interrupt.reason().unwrap_or(InterruptReason::Deadline),
                })
            }
        }
    }
}

#[async_trait]
impl Runner for QuickJsRunner {
    async fn execute(
        &self,
        ctx: &CallContext,
        workflow: &WorkflowDescriptor,
        options: StartOptions,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        let mut metadata = ExecutionMetadata::started(self.env.clock.now());
        let started = Instant::now();
        let run_context = RunContext::new();
        let poll_interval = self.env.config.promise_poll_interval;
        tracing::debug!(
            entry_point = %options.entry_point,
            arguments = options.arguments.len(),
            "executing workflow"
        );

        let logger = options.logger.clone();
        let result = self
            .supervise(ctx, workflow, logger, run_context.clone(), move |session| {
                let limits = session.limits();
                session.run(|ctx| execution::run_entry_point(ctx, &options, &limits, poll_interval))
            })
            .await;

        metadata.execution_duration = started.elapsed();
        match result {
            Ok(exit_result) => {
                metadata.has_run_to_completion = true;
                tracing::info!(duration = ?metadata.execution_duration, "workflow completed");
                Ok(ExecutionResult::new(exit_result, run_context, metadata))
            }
            Err(error) => {
                tracing::info!(duration = ?metadata.execution_duration, %error, "workflow failed");
                Err(ExecutionFailure::new(error, metadata))
            }
        }
    }

    async fn introspect(
        &self,
        ctx: &CallContext,
        workflow: &WorkflowDescriptor,
        options: IntrospectionOptions,
    ) -> Result<IntrospectionResult, RuntimeError> {
        let IntrospectionOptions { exports, logger } = options;
        tracing::debug!(exports = ?exports, "introspecting workflow");
        self.supervise(ctx, workflow, logger, RunContext::new(), move |session| {
            let limits = session.limits();
            session.run(|ctx| introspection::read_exports(ctx, &exports, &limits))
        })
        .await
    }
}

/// Register `runner` in `registry` under [`RUNNER_NAME`].
pub fn register_quickjs(registry: &RunnerRegistry, runner: QuickJsRunner) {
    let runner: Arc<dyn Runner> = Arc::new(runner);
    registry.register(RUNNER_NAME, Arc::new(move || Arc::clone(&runner)));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Counting(parking_lot::Mutex<(usize, usize)>);

    impl SetupHook for Counting {
        fn before_setup(&self, _call: &mut CallContext) {
            self.0.lock().0 += 1;
        }

        fn after_setup(&self, _call: &CallContext) {
            self.0.lock().1 += 1;
        }
    }

    #[test]
    fn builders_replace_settings() {
        let config = RuntimeConfig {
            abandon_grace: Duration::from_millis(5),
            ..RuntimeConfig::default()
        };
        let runner = QuickJsRunner::new(SealedRegistry::empty())
            .with_config(config.clone())
            .with_hook(Arc::new(Counting::default()))
            .with_hook(Arc::new(Counting::default()));
        assert_eq!(runner.config(), &config);
        assert_eq!(runner.env.hooks.len(), 2);
        assert!(runner.cache().is_empty());
        assert!(runner.registry().api_names().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hooks_run_around_failed_setup() {
        let hook = Arc::new(Counting::default());
        let runner = QuickJsRunner::new(SealedRegistry::empty()).with_hook(hook.clone());
        let result = runner
            .introspect(
                &CallContext::new(),
                &WorkflowDescriptor::from_source("this is not javascript"),
                IntrospectionOptions::exports(["default"]),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::Parse(_))), "{result:?}");
        assert_eq!(*hook.0.lock(), (1, 1));
    }

    #[test]
    fn registers_under_engine_name() {
        let registry = RunnerRegistry::new();
        register_quickjs(&registry, QuickJsRunner::new(SealedRegistry::empty()));
        assert!(registry.contains(RUNNER_NAME));
        assert!(registry.resolve(RUNNER_NAME).is_ok());
    }
}
