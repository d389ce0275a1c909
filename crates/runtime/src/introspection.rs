//! Export introspection.

use hookrun_core::{IntrospectedExport, IntrospectionResult, RuntimeError};
use rquickjs::{Ctx, Value};

use crate::convert::{self, Limits};
use crate::sandbox;

/// Read the named exports of the evaluated workflow without calling anything.
pub(crate) fn read_exports<'js>(
    ctx: &Ctx<'js>,
    names: &[String],
    limits: &Limits,
) -> Result<IntrospectionResult, RuntimeError> {
    let engine = |err: rquickjs::Error| RuntimeError::Internal(convert::engine_message(ctx, err));
    let exports = sandbox::module_exports(ctx).map_err(engine)?;

    let mut result = IntrospectionResult::new();
    for name in names {
        let value: Value<'js> = match &exports {
            Some(exports) => exports.get(name.as_str()).map_err(engine)?,
            None => Value::new_undefined(ctx.clone()),
        };
        let export = if value.is_undefined() {
            IntrospectedExport::absent()
        } else {
            IntrospectedExport::present(
                limits
                    .from_js(ctx, &value)
                    .map_err(|err| err.into_runtime(ctx, limits.interrupt()))?,
            )
        };
        tracing::debug!(export = %name, present = export.has_export(), "introspected export");
        result.record(name.clone(), export);
    }
    Ok(result)
}
