//! Shared fixtures for runtime integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use hookrun_core::{LogLevel, WorkflowDescriptor, WorkflowLogger};
use hookrun_runtime::{NativeError, NativeRegistry, QuickJsRunner, SealedRegistry};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Request-scoped value host functions read back from the call context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant(pub String);

/// Registry exposing the test capabilities:
///
/// - `kinde.echo(...args)` returns its arguments as an array
/// - `kinde.settings()` returns the binding settings it was mounted with
/// - `kinde.idToken.setCustomClaim(key, value)` records a claim in the run context
/// - `kinde.idToken.fail()` returns a host error
/// - `host.panic()` panics
/// - `host.sleep(ms)` blocks the worker thread
/// - `host.tenant()` returns the [`Tenant`] extension, or null
/// - `scenario.nativeFn()` stores `{"a": "b"}` under `k` in the run context
pub fn registry() -> SealedRegistry {
    let mut registry = NativeRegistry::new();
    {
        let mut kinde = registry.register_api("kinde");
        kinde
            .register_function("echo", |_, _, _, args| Ok(Value::Array(args)))
            .register_function("settings", |_, settings, _, _| Ok(Value::Object(settings.as_map().clone())));
        kinde
            .register_api("idToken")
            .register_function("setCustomClaim", |_, _, run_context, args| {
                let key = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| NativeError::new("claim key must be a string"))?
                    .to_owned();
                let value = args.get(1).cloned().unwrap_or(Value::Null);
                run_context.update_map("idToken", |claims| claims.insert(key, value));
                Ok(Value::Null)
            })
            .register_function("fail", |_, _, _, _| Err(NativeError::new("claim rejected")));
    }
    registry
        .register_api("host")
        .register_function("panic", |_, _, _, _| panic!("host exploded"))
        .register_function("sleep", |_, _, _, args| {
            let millis = args.first().and_then(Value::as_u64).unwrap_or(0);
            std::thread::sleep(std::time::Duration::from_millis(millis));
            Ok(Value::Null)
        })
        .register_function("tenant", |call, _, _, _| {
            Ok(call.extension::<Tenant>().map_or(Value::Null, |tenant| json!(tenant.0)))
        });
    registry.register_api("scenario").register_function("nativeFn", |_, _, run_context, _| {
        run_context.set_value("k", json!({"a": "b"}));
        Ok(Value::Null)
    });
    registry.seal()
}

/// Runner over [`registry`], with test logging installed.
pub fn runner() -> QuickJsRunner {
    hookrun_log::init_test();
    QuickJsRunner::new(registry())
}

/// Descriptor for `source` requesting `bindings`.
pub fn workflow(source: &str, bindings: &[&str]) -> WorkflowDescriptor {
    bindings
        .iter()
        .fold(WorkflowDescriptor::from_source(source), |workflow, binding| workflow.with_binding(*binding))
}

/// Logger that keeps every line.
#[derive(Default)]
pub struct CapturingLogger {
    lines: Mutex<Vec<(LogLevel, Vec<Value>)>>,
}

impl CapturingLogger {
    pub fn lines(&self) -> Vec<(LogLevel, Vec<Value>)> {
        self.lines.lock().clone()
    }
}

impl WorkflowLogger for CapturingLogger {
    fn log(&self, level: LogLevel, args: &[Value]) {
        self.lines.lock().push((level, args.to_vec()));
    }
}

/// Logger whose sink panics.
pub struct PanickingLogger;

impl WorkflowLogger for PanickingLogger {
    fn log(&self, _level: LogLevel, _args: &[Value]) {
        panic!("sink exploded");
    }
}

pub fn capturing() -> Arc<CapturingLogger> {
    Arc::new(CapturingLogger::default())
}
