//! Entry-point resolution and invocation.

use std::time::Duration;

use hookrun_core::{RuntimeError, StartOptions};
use rquickjs::function::Args;
use rquickjs::{Ctx, Function, Object, Promise, Value};
use serde_json::Value as Json;

use crate::convert::{self, Limits};
use crate::drain::{self, Settled};
use crate::sandbox;

struct EntryPoint<'js> {
    function: Function<'js>,
    this: Value<'js>,
}

/// Resolve the entry point, call it and drain the returned promise.
///
/// A thenable that is not a native promise is adopted through
/// `Promise.resolve`. Any other return value counts as fulfilled.
pub(crate) fn run_entry_point<'js>(
    ctx: &Ctx<'js>,
    options: &StartOptions,
    limits: &Limits,
    poll_interval: Duration,
) -> Result<Json, RuntimeError> {
    let interrupt = limits.interrupt();
    let entry = resolve_entry_point(ctx, &options.entry_point)?;

    let args = build_args(ctx, &entry.this, &options.arguments)
        .map_err(|err| interrupt.explain(RuntimeError::Internal(convert::engine_message(ctx, err))))?;

    let returned: Value<'js> = entry
        .function
        .call_arg(args)
        .map_err(|err| interrupt.explain(RuntimeError::Invocation(convert::engine_message(ctx, err))))?;

    let settled = match returned.try_into_promise() {
        Ok(promise) => drain::settle(ctx, &promise, interrupt, poll_interval)?,
        Err(value) if is_thenable(&value) => {
            let promise = adopt(ctx, value)
                .map_err(|err| interrupt.explain(RuntimeError::Invocation(convert::engine_message(ctx, err))))?;
            drain::settle(ctx, &promise, interrupt, poll_interval)?
        }
        Err(value) => Settled::Fulfilled(value),
    };
    match settled {
        Settled::Fulfilled(value) => limits.from_js(ctx, &value).map_err(|err| err.into_runtime(ctx, interrupt)),
        Settled::Rejected(reason) => Err(interrupt.explain(RuntimeError::RejectedPromise(convert::describe(ctx, reason)))),
    }
}

fn is_thenable(value: &Value<'_>) -> bool {
    value
        .as_object()
        .and_then(|object| object.get::<_, Value<'_>>("then").ok())
        .is_some_and(|then| then.is_function())
}

/// `Promise.resolve(value)`.
fn adopt<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Promise<'js>> {
    let constructor: Object<'js> = ctx.globals().get("Promise")?;
    let resolve: Function<'js> = constructor.get("resolve")?;
    let mut args = Args::new(ctx.clone(), 1);
    args.this(constructor)?;
    args.push_arg(value)?;
    resolve.call_arg(args)
}

fn build_args<'js>(ctx: &Ctx<'js>, this: &Value<'js>, arguments: &[Json]) -> rquickjs::Result<Args<'js>> {
    let mut args = Args::new(ctx.clone(), arguments.len());
    args.this(this.clone())?;
    for argument in arguments {
        args.push_arg(convert::to_js(ctx, argument)?)?;
    }
    Ok(args)
}

fn resolve_entry_point<'js>(ctx: &Ctx<'js>, entry_point: &str) -> Result<EntryPoint<'js>, RuntimeError> {
    let engine = |err: rquickjs::Error| RuntimeError::Internal(convert::engine_message(ctx, err));

    let exports = sandbox::module_exports(ctx).map_err(engine)?.ok_or(RuntimeError::NoDefaultExport)?;
    let default: Value<'js> = exports.get("default").map_err(engine)?;
    if default.is_undefined() || default.is_null() {
        return Err(RuntimeError::NoDefaultExport);
    }
    if let Some(function) = default.as_function() {
        return Ok(EntryPoint {
            function: function.clone(),
            this: Value::new_undefined(ctx.clone()),
        });
    }

    let missing = || RuntimeError::EntryPointMissing {
        entry_point: entry_point.to_owned(),
    };
    let object = default.as_object().ok_or_else(missing)?;
    let member: Value<'js> = object.get(entry_point).map_err(engine)?;
    if member.is_undefined() {
        return Err(missing());
    }
    let function = member.as_function().ok_or_else(|| RuntimeError::EntryPointNotCallable {
        entry_point: entry_point.to_owned(),
    })?;
    Ok(EntryPoint {
        function: function.clone(),
        this: default.clone(),
    })
}
