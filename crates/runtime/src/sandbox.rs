//! Sandbox session: one fresh engine instance per call.
//!
//! A [`Session`] owns everything a single call needs on its worker thread.
//! [`Session::run`] allocates the engine, resolves the compiled program,
//! installs the time source and requested capabilities, evaluates the
//! module body, then hands the live context to the call's body.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use hookrun_core::{BindingSettings, CallContext, RunContext, RuntimeError, WorkflowDescriptor, WorkflowLogger};
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Module, Object, Runtime, Value};

use crate::builtins::{self, Scope};
use crate::cache::{CompiledProgram, ProgramCache};
use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::convert;
use crate::drain::{self, Settled};
use crate::hooks::SetupHook;
use crate::registry::{HostFunction, MountPlan, SealedRegistry};
use crate::watchdog::InterruptSignal;

/// Module name under which workflow sources are compiled.
const MODULE_NAME: &str = "workflow";

/// Process-wide state shared by every call of one runner.
#[derive(Clone)]
pub(crate) struct Environment {
    pub(crate) registry: SealedRegistry,
    pub(crate) cache: Arc<ProgramCache>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Arc<RuntimeConfig>,
    pub(crate) hooks: Arc<Vec<Arc<dyn SetupHook>>>,
}

/// First panic raised by a host callback during a call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Fault(Arc<OnceLock<String>>);

impl Fault {
    /// Run `f`, recording its panic instead of unwinding into the engine.
    pub(crate) fn guard<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(%message, "host callback panicked");
                let _ = self.0.set(message);
                None
            }
        }
    }

    pub(crate) fn message(&self) -> Option<String> {
        self.0.get().cloned()
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

struct Sandbox {
    context: Context,
    program: Arc<CompiledProgram>,
    // Dropped last.
    _runtime: Runtime,
}

/// Everything one call owns.
pub(crate) struct Session {
    pub(crate) workflow: WorkflowDescriptor,
    pub(crate) call: CallContext,
    pub(crate) run_context: RunContext,
    pub(crate) logger: Option<Arc<dyn WorkflowLogger>>,
    pub(crate) interrupt: InterruptSignal,
    pub(crate) fault: Fault,
    pub(crate) env: Environment,
}

impl Session {
    /// Set the sandbox up and run `body` against it.
    ///
    /// Setup hooks observe the end of setup whether or not it succeeded. A
    /// recorded host panic overrides any other outcome.
    pub(crate) fn run<T>(
        &self,
        body: impl for<'js> FnOnce(&Ctx<'js>) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let outcome = match self.open() {
            Ok(sandbox) => sandbox.context.with(|ctx| {
                let installed = self.install(&ctx, &sandbox.program);
                self.after_setup();
                installed?;
                self.interrupt.check()?;
                body(&ctx)
            }),
            Err(err) => {
                self.after_setup();
                Err(err)
            }
        };
        match self.fault.message() {
            Some(message) => Err(RuntimeError::PanicRecovered(message)),
            None => outcome,
        }
    }

    /// Conversion bounds for values leaving this call's sandbox.
    pub(crate) fn limits(&self) -> convert::Limits {
        convert::Limits::new(self.interrupt.clone(), self.env.config.max_converted_nodes)
    }

    fn after_setup(&self) {
        for hook in self.env.hooks.iter() {
            hook.after_setup(&self.call);
        }
    }

    fn open(&self) -> Result<Sandbox, RuntimeError> {
        let runtime = Runtime::new().map_err(|err| RuntimeError::Internal(format!("engine allocation failed: {err}")))?;
        if let Some(limit) = self.env.config.memory_limit_bytes {
            runtime.set_memory_limit(limit);
        }
        if let Some(limit) = self.env.config.max_stack_size_bytes {
            runtime.set_max_stack_size(limit);
        }
        let interrupt = self.interrupt.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || interrupt.is_tripped())));

        let program = self.resolve_program(&runtime)?;
        let context =
            Context::full(&runtime).map_err(|err| RuntimeError::Internal(format!("context allocation failed: {err}")))?;
        Ok(Sandbox {
            context,
            program,
            _runtime: runtime,
        })
    }

    fn resolve_program(&self, runtime: &Runtime) -> Result<Arc<CompiledProgram>, RuntimeError> {
        let hash = self.workflow.content_hash();
        tracing::debug!(
            hash = %hash,
            build_hash = %self.workflow.processed_source.build_hash,
            "resolving workflow program"
        );
        self.env
            .cache
            .get_or_compile(&hash, || compile(runtime, self.workflow.source()))
    }

    fn install<'js>(&self, ctx: &Ctx<'js>, program: &CompiledProgram) -> Result<(), RuntimeError> {
        builtins::install_clock(ctx, Arc::clone(&self.env.clock)).map_err(|err| self.setup_error(ctx, err))?;

        let limits = self.limits();
        let scope = Scope {
            logger: self.logger.as_ref(),
            fault: &self.fault,
            limits: &limits,
        };
        for (name, settings) in &self.workflow.requested_bindings {
            if builtins::install(ctx, name, &scope).map_err(|err| self.setup_error(ctx, err))? {
                tracing::debug!(binding = %name, "installed built-in capability");
            }
            match self.env.registry.resolve(name) {
                Some(plan) => self.mount(ctx, &plan, settings).map_err(|err| self.setup_error(ctx, err))?,
                None if !builtins::BUILTIN_NAMES.contains(&name.as_str()) => {
                    tracing::debug!(binding = %name, "requested binding is not available");
                }
                None => {}
            }
        }
        builtins::ensure_module_scaffold(ctx).map_err(|err| self.setup_error(ctx, err))?;

        self.evaluate(ctx, program)
    }

    fn evaluate<'js>(&self, ctx: &Ctx<'js>, program: &CompiledProgram) -> Result<(), RuntimeError> {
        // SAFETY: the bytecode was written by `Module::write_le` of this build
        // of the engine and is never modified after caching.
        #[allow(unsafe_code)]
        let module = unsafe { Module::load(ctx.clone(), program.bytecode()) }
            .map_err(|err| self.setup_error(ctx, err))?;
        let (_module, promise) = module.eval().map_err(|err| self.setup_error(ctx, err))?;
        match drain::settle(ctx, &promise, &self.interrupt, self.env.config.promise_poll_interval)? {
            Settled::Fulfilled(_) => Ok(()),
            Settled::Rejected(reason) => Err(self.interrupt.explain(RuntimeError::Setup(convert::describe(ctx, reason)))),
        }
    }

    fn setup_error(&self, ctx: &Ctx<'_>, err: rquickjs::Error) -> RuntimeError {
        self.interrupt.explain(RuntimeError::Setup(convert::engine_message(ctx, err)))
    }

    fn mount<'js>(&self, ctx: &Ctx<'js>, plan: &MountPlan, settings: &BindingSettings) -> rquickjs::Result<()> {
        let mut target = ctx.globals();
        for segment in &plan.path {
            target = namespace(ctx, &target, segment)?;
        }
        for (name, function) in &plan.functions {
            let trampoline = self.trampoline(ctx, name, Arc::clone(function), settings.clone())?;
            target.set(name.as_str(), trampoline)?;
        }
        tracing::debug!(
            path = %plan.path.join("."),
            functions = ?plan.function_names(),
            "mounted native capability"
        );
        Ok(())
    }

    fn trampoline<'js>(
        &self,
        ctx: &Ctx<'js>,
        name: &str,
        function: HostFunction,
        settings: BindingSettings,
    ) -> rquickjs::Result<Function<'js>> {
        let call = self.call.clone();
        let run_context = self.run_context.clone();
        let fault = self.fault.clone();
        let limits = self.limits();
        let name = name.to_owned();
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                let args = limits.from_js_all(&ctx, &args.0).map_err(|err| err.throw(&ctx))?;
                match fault.guard(|| function(&call, &settings, &run_context, args)) {
                    Some(Ok(value)) => convert::to_js(&ctx, &value),
                    Some(Err(err)) => Err(convert::host_error(&ctx, err.message())),
                    None => Err(convert::host_error(&ctx, &format!("host function {name} panicked"))),
                }
            },
        )
    }
}

/// Reuse the object under `name` on `parent`, creating it when absent.
fn namespace<'js>(ctx: &Ctx<'js>, parent: &Object<'js>, name: &str) -> rquickjs::Result<Object<'js>> {
    let existing: Value<'js> = parent.get(name)?;
    if !existing.is_function() {
        if let Some(object) = existing.as_object() {
            return Ok(object.clone());
        }
    }
    let object = Object::new(ctx.clone())?;
    parent.set(name, object.clone())?;
    Ok(object)
}

/// Parse and compile `source` to module bytecode in a scratch context.
fn compile(runtime: &Runtime, source: &[u8]) -> Result<Vec<u8>, RuntimeError> {
    let source = std::str::from_utf8(source)
        .map_err(|err| RuntimeError::Parse(format!("workflow source is not valid UTF-8: {err}")))?;
    let scratch =
        Context::full(runtime).map_err(|err| RuntimeError::Internal(format!("context allocation failed: {err}")))?;
    scratch.with(|ctx| {
        let module = Module::declare(ctx.clone(), MODULE_NAME, source)
            .map_err(|err| RuntimeError::Parse(convert::engine_message(&ctx, err)))?;
        module
            .write_le()
            .map_err(|err| RuntimeError::Compile(convert::engine_message(&ctx, err)))
    })
}

/// `module.exports` of the evaluated workflow, if it is an object.
pub(crate) fn module_exports<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Option<Object<'js>>> {
    let module: Value<'js> = ctx.globals().get("module")?;
    let Some(module) = module.as_object() else {
        return Ok(None);
    };
    let exports: Value<'js> = module.get("exports")?;
    Ok(exports.as_object().cloned())
}
