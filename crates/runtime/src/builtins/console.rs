//! The `console` capability.

use std::sync::Arc;

use hookrun_core::{LogLevel, WorkflowLogger};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

use crate::convert::{self, Limits};
use crate::sandbox::Fault;

const METHODS: [(&str, LogLevel); 5] = [
    ("log", LogLevel::Info),
    ("info", LogLevel::Info),
    ("debug", LogLevel::Debug),
    ("warn", LogLevel::Warning),
    ("error", LogLevel::Error),
];

/// Install `console` writing to `logger`. Without a logger every call is discarded.
pub(super) fn install<'js>(
    ctx: &Ctx<'js>,
    logger: Option<Arc<dyn WorkflowLogger>>,
    fault: &Fault,
    limits: &Limits,
) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for (name, level) in METHODS {
        let logger = logger.clone();
        let fault = fault.clone();
        let limits = limits.clone();
        let method = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                let Some(logger) = &logger else {
                    return Ok(());
                };
                let values = limits.from_js_all(&ctx, &args.0).map_err(|err| err.throw(&ctx))?;
                match fault.guard(|| logger.log(level, &values)) {
                    Some(()) => Ok(()),
                    None => Err(convert::host_error(&ctx, "log sink panicked")),
                }
            },
        )?;
        console.set(name, method)?;
    }
    ctx.globals().set("console", console)
}
