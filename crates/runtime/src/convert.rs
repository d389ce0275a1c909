//! Conversion between engine values and `serde_json::Value`.

use rquickjs::function::Args;
use rquickjs::{Array, Coerced, Ctx, FromJs, Function, Object, Value};
use hookrun_core::RuntimeError;
use serde_json::{Map, Number, Value as Json};

use crate::watchdog::InterruptSignal;

/// Nesting beyond this depth converts to `null`.
pub(crate) const MAX_DEPTH: usize = 64;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Host JSON to an engine value.
pub(crate) fn to_js<'js>(ctx: &Ctx<'js>, value: &Json) -> rquickjs::Result<Value<'js>> {
    match value {
        Json::Null => Ok(Value::new_null(ctx.clone())),
        Json::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        Json::Number(n) => Ok(match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
            Some(i) => Value::new_int(ctx.clone(), i),
            None => Value::new_float(ctx.clone(), n.as_f64().unwrap_or(f64::NAN)),
        }),
        Json::String(s) => Ok(rquickjs::String::from_str(ctx.clone(), s)?.into_value()),
        Json::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, to_js(ctx, item)?)?;
            }
            Ok(array.into_value())
        }
        Json::Object(entries) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in entries {
                object.set(key.as_str(), to_js(ctx, item)?)?;
            }
            Ok(object.into_value())
        }
    }
}

/// Why an engine value could not be converted to host JSON.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConvertError {
    /// The engine failed while reading the value.
    #[error(transparent)]
    Engine(#[from] rquickjs::Error),

    /// The call was interrupted mid-conversion.
    #[error("conversion interrupted")]
    Interrupted,

    /// The value expands past the node budget.
    #[error("value exceeds the conversion limit of {limit} nodes")]
    TooLarge {
        /// Configured node budget.
        limit: usize,
    },
}

impl ConvertError {
    /// The call-level error for a failed conversion of a result or export.
    pub(crate) fn into_runtime(self, ctx: &Ctx<'_>, interrupt: &InterruptSignal) -> RuntimeError {
        match self {
            Self::Engine(err) => interrupt.explain(RuntimeError::Internal(engine_message(ctx, err))),
            Self::Interrupted => interrupt.explain(RuntimeError::Internal(Self::Interrupted.to_string())),
            Self::TooLarge { limit } => RuntimeError::ValueTooLarge { limit },
        }
    }

    /// An exception for a conversion that failed inside a host callback.
    pub(crate) fn throw(self, ctx: &Ctx<'_>) -> rquickjs::Error {
        match self {
            Self::Engine(err) => err,
            other => host_error(ctx, &other.to_string()),
        }
    }
}

/// Bounds on converting engine values to host JSON during one call.
#[derive(Debug, Clone)]
pub(crate) struct Limits {
    interrupt: InterruptSignal,
    max_nodes: usize,
}

impl Limits {
    pub(crate) fn new(interrupt: InterruptSignal, max_nodes: usize) -> Self {
        Self { interrupt, max_nodes }
    }

    pub(crate) fn interrupt(&self) -> &InterruptSignal {
        &self.interrupt
    }

    /// Engine value to host JSON, following `JSON.stringify` rules.
    ///
    /// Objects with a callable `toJSON` convert through it. Functions and
    /// symbols become `null` in arrays and at the top level and are skipped as
    /// object properties. Every emitted node spends one unit of the budget and
    /// checks the interrupt.
    pub(crate) fn from_js<'js>(&self, ctx: &Ctx<'js>, value: &Value<'js>) -> Result<Json, ConvertError> {
        let mut remaining = self.max_nodes;
        self.convert(ctx, value, 0, &mut remaining)
    }

    /// Convert every value, sharing one budget.
    pub(crate) fn from_js_all<'js>(&self, ctx: &Ctx<'js>, values: &[Value<'js>]) -> Result<Vec<Json>, ConvertError> {
        let mut remaining = self.max_nodes;
        values
            .iter()
            .map(|value| self.convert(ctx, value, 0, &mut remaining))
            .collect()
    }

    fn convert<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: &Value<'js>,
        depth: usize,
        remaining: &mut usize,
    ) -> Result<Json, ConvertError> {
        if self.interrupt.is_tripped() {
            return Err(ConvertError::Interrupted);
        }
        *remaining = remaining.checked_sub(1).ok_or(ConvertError::TooLarge {
            limit: self.max_nodes,
        })?;

        if depth > MAX_DEPTH || value.is_undefined() || value.is_null() || skipped(value) {
            return Ok(Json::Null);
        }
        if let Some(b) = value.as_bool() {
            return Ok(Json::Bool(b));
        }
        if let Some(i) = value.as_int() {
            return Ok(Json::from(i));
        }
        if let Some(f) = value.as_float() {
            return Ok(number(f));
        }
        if let Some(s) = value.as_string() {
            return Ok(Json::String(s.to_string()?));
        }
        if let Some(array) = value.as_array() {
            let mut items = Vec::with_capacity(array.len().min(*remaining));
            for i in 0..array.len() {
                let item: Value<'js> = array.get(i)?;
                items.push(self.convert(ctx, &item, depth + 1, remaining)?);
            }
            return Ok(Json::Array(items));
        }
        let Some(object) = value.as_object() else {
            return Ok(Json::Null);
        };

        let to_json: Value<'js> = object.get("toJSON")?;
        if let Some(method) = to_json.as_function() {
            let replaced = call_method(ctx, method, object)?;
            return self.convert(ctx, &replaced, depth + 1, remaining);
        }

        let mut entries = Map::new();
        for prop in object.props::<String, Value<'js>>() {
            let (key, item) = prop?;
            if item.is_undefined() || skipped(&item) {
                continue;
            }
            entries.insert(key, self.convert(ctx, &item, depth + 1, remaining)?);
        }
        Ok(Json::Object(entries))
    }
}

fn skipped(value: &Value<'_>) -> bool {
    value.is_function() || value.is_symbol()
}

#[allow(clippy::float_cmp)]
fn number(f: f64) -> Json {
    if f.trunc() == f && f.abs() < MAX_SAFE_INTEGER {
        Json::from(f as i64)
    } else {
        Number::from_f64(f).map_or(Json::Null, Json::Number)
    }
}

fn call_method<'js>(ctx: &Ctx<'js>, method: &Function<'js>, this: &Object<'js>) -> rquickjs::Result<Value<'js>> {
    let mut args = Args::new(ctx.clone(), 0);
    args.this(this.clone())?;
    method.call_arg(args)
}

/// Human-readable form of a thrown or rejected value: its string form,
/// followed by its `stack` when present, with host error prefixes removed.
pub(crate) fn describe<'js>(ctx: &Ctx<'js>, reason: Value<'js>) -> String {
    let stack = reason
        .as_object()
        .and_then(|object| object.get::<_, Option<String>>("stack").ok().flatten())
        .filter(|stack| !stack.trim().is_empty());
    let text = Coerced::<String>::from_js(ctx, reason)
        .map_or_else(|err| format!("unprintable script error: {err}"), |coerced| coerced.0);
    let message = match stack {
        Some(stack) => format!("{text}\n{}", stack.trim_end()),
        None => text,
    };
    strip_host_prefix(&message)
}

/// Message of an engine error, reading the pending exception when there is one.
pub(crate) fn engine_message(ctx: &Ctx<'_>, error: rquickjs::Error) -> String {
    match error {
        rquickjs::Error::Exception => describe(ctx, ctx.catch()),
        other => other.to_string(),
    }
}

pub(crate) const HOST_ERROR_NAME: &str = "HostError";

fn strip_host_prefix(message: &str) -> String {
    message.replace(&format!("{HOST_ERROR_NAME}: "), "")
}

/// Throw an `Error` named `HostError` into the sandbox.
pub(crate) fn host_error(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    match build_host_error(ctx, message) {
        Ok(error) => ctx.throw(error),
        Err(err) => err,
    }
}

fn build_host_error<'js>(ctx: &Ctx<'js>, message: &str) -> rquickjs::Result<Value<'js>> {
    let constructor: Function<'js> = ctx.globals().get("Error")?;
    let error: Object<'js> = constructor.call((message,))?;
    error.set("name", HOST_ERROR_NAME)?;
    Ok(error.into_value())
}
