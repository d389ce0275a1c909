//! Built-in capabilities installed by binding name.

mod console;
mod url;

use std::sync::Arc;

use hookrun_core::WorkflowLogger;
use rquickjs::{Ctx, Function, Object, Value};

use crate::clock::Clock;
use crate::convert::Limits;
use crate::sandbox::Fault;

const CLOCK_PRELUDE: &str = include_str!("clock.js");

/// Binding names served by the runtime itself.
pub const BUILTIN_NAMES: [&str; 3] = ["console", "module", "url"];

/// Per-call state a built-in may wire into the sandbox.
pub(crate) struct Scope<'a> {
    pub(crate) logger: Option<&'a Arc<dyn WorkflowLogger>>,
    pub(crate) fault: &'a Fault,
    pub(crate) limits: &'a Limits,
}

/// Install the built-in named `name`. Returns `false` when no built-in has that name.
pub(crate) fn install<'js>(ctx: &Ctx<'js>, name: &str, scope: &Scope<'_>) -> rquickjs::Result<bool> {
    match name {
        "console" => console::install(ctx, scope.logger.cloned(), scope.fault, scope.limits)?,
        "url" => url::install(ctx)?,
        "module" => install_module(ctx)?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// Install `module = { exports: {} }` unless a `module` global already exists.
pub(crate) fn ensure_module_scaffold(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let existing: Value<'_> = ctx.globals().get("module")?;
    if existing.is_undefined() {
        install_module(ctx)?;
    }
    Ok(())
}

fn install_module<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let module = Object::new(ctx.clone())?;
    let exports = Object::new(ctx.clone())?;
    module.set("exports", exports.clone())?;
    let globals = ctx.globals();
    globals.set("module", module)?;
    globals.set("exports", exports)
}

/// Route every wall-clock read of `Date` to `clock`: `Date.now()`, `Date()`
/// and `new Date()` without arguments.
pub(crate) fn install_clock<'js>(ctx: &Ctx<'js>, clock: Arc<dyn Clock>) -> rquickjs::Result<()> {
    let now = Function::new(ctx.clone(), move || clock.now_millis() as f64)?;
    let prelude: Function<'js> = ctx.eval(CLOCK_PRELUDE)?;
    prelude.call((now,))
}
