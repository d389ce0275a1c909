//! Deadlines, cancellation, panic containment and call isolation.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use hookrun_core::{CallContext, InterruptReason, Runner, RuntimeError, StartOptions};
use hookrun_runtime::{QuickJsRunner, RuntimeConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{PanickingLogger, runner, workflow};

const SPIN: &str = "module.exports.default = { handle() { while (true) {} } };";
const SPIN_ASYNC: &str = r#"
    module.exports.default = {
        async handle() {
            await Promise.resolve();
            for (;;) {}
        },
    };
"#;

#[tokio::test(flavor = "multi_thread")]
async fn busy_loop_hits_deadline() {
    let workflow = workflow(SPIN, &[]).with_max_execution_duration(Duration::from_millis(200));
    let failure = runner()
        .execute(&CallContext::new(), &workflow, StartOptions::entry_point("handle"))
        .await
        .unwrap_err();

    assert_eq!(
        failure.error(),
        &RuntimeError::Timeout {
            reason: InterruptReason::Deadline
        }
    );
    let metadata = failure.execution_metadata();
    assert!(!metadata.has_run_to_completion);
    assert!(metadata.execution_duration >= Duration::from_millis(200), "{metadata:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn loop_after_await_hits_deadline() {
    let workflow = workflow(SPIN_ASYNC, &[]).with_max_execution_duration(Duration::from_millis(100));
    let failure = runner()
        .execute(&CallContext::new(), &workflow, StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    assert!(failure.error().is_timeout(), "{:?}", failure.error());
}

#[tokio::test(flavor = "multi_thread")]
async fn never_settling_promise_hits_deadline() {
    let source = "module.exports.default = { handle() { return new Promise(() => {}); } };";
    let workflow = workflow(source, &[]).with_max_execution_duration(Duration::from_millis(50));
    let failure = runner()
        .execute(&CallContext::new(), &workflow, StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    assert_eq!(
        failure.error(),
        &RuntimeError::Timeout {
            reason: InterruptReason::Deadline
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn top_level_loop_hits_deadline() {
    let workflow = workflow("for (;;) {}", &[]).with_max_execution_duration(Duration::from_millis(50));
    let result = runner()
        .introspect(&CallContext::new(), &workflow, hookrun_core::IntrospectionOptions::exports(["default"]))
        .await;
    assert_eq!(
        result.unwrap_err(),
        RuntimeError::Timeout {
            reason: InterruptReason::Deadline
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn caller_cancellation_interrupts() {
    let token = CancellationToken::new();
    let ctx = CallContext::new().with_cancellation(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let failure = runner()
        .execute(&ctx, &workflow(SPIN, &[]), StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(
        failure.error(),
        &RuntimeError::Timeout {
            reason: InterruptReason::Cancelled
        }
    );
    assert!(!failure.execution_metadata().has_run_to_completion);
}

#[tokio::test(flavor = "multi_thread")]
async fn already_cancelled_context_never_completes() {
    let ctx = CallContext::new();
    ctx.cancellation().cancel();
    let source = "module.exports.default = { handle() { return 1; } };";
    let failure = runner()
        .execute(&ctx, &workflow(source, &[]), StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    assert!(failure.error().is_timeout(), "{:?}", failure.error());
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_duration_uses_configured_default() {
    let config = RuntimeConfig {
        default_max_execution_duration: Duration::from_millis(80),
        ..RuntimeConfig::default()
    };
    let runner = QuickJsRunner::new(common::registry()).with_config(config);
    let failure = runner
        .execute(
            &CallContext::new(),
            &workflow(SPIN, &[]).with_max_execution_duration(Duration::ZERO),
            StartOptions::entry_point("handle"),
        )
        .await
        .unwrap_err();
    assert!(failure.error().is_timeout());
    assert!(failure.execution_metadata().execution_duration >= Duration::from_millis(80));
}

#[tokio::test(flavor = "multi_thread")]
async fn blocked_host_call_is_abandoned_after_grace() {
    let config = RuntimeConfig {
        abandon_grace: Duration::from_millis(150),
        ..RuntimeConfig::default()
    };
    let runner = QuickJsRunner::new(common::registry()).with_config(config);
    let blocking = workflow("module.exports.default = () => host.sleep(3000);", &["host.sleep"])
        .with_max_execution_duration(Duration::from_millis(100));

    let started = Instant::now();
    let failure = runner
        .execute(&CallContext::new(), &blocking, StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(
        failure.error(),
        &RuntimeError::Timeout {
            reason: InterruptReason::Deadline
        }
    );
    assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2000), "{elapsed:?}");
    assert!(!failure.execution_metadata().has_run_to_completion);

    let healthy = workflow("module.exports.default = () => 'still serving';", &[]);
    let result = runner
        .execute(&CallContext::new(), &healthy, StartOptions::entry_point("handle"))
        .await
        .unwrap();
    assert_eq!(result.exit_result(), &json!("still serving"));
}

const FAN_OUT: &str = "let o = {}; for (let i = 0; i < 40; i++) { o = { a: o, b: o }; }";

#[tokio::test(flavor = "multi_thread")]
async fn shared_reference_fan_out_hits_node_budget() {
    let source = format!("module.exports.default = () => {{ {FAN_OUT} return o; }};");
    let workflow = workflow(&source, &[]).with_max_execution_duration(Duration::from_millis(100));

    let started = Instant::now();
    let failure = runner()
        .execute(&CallContext::new(), &workflow, StartOptions::entry_point("handle"))
        .await
        .unwrap_err();

    assert_eq!(failure.error(), &RuntimeError::ValueTooLarge { limit: 100_000 });
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_host_arguments_throw_into_the_script() {
    let config = RuntimeConfig {
        max_converted_nodes: 1_000,
        ..RuntimeConfig::default()
    };
    let runner = QuickJsRunner::new(common::registry()).with_config(config);
    let source = format!(
        r#"
        module.exports.default = () => {{
            {FAN_OUT}
            const seen = [];
            try {{ kinde.echo(o); }} catch (error) {{ seen.push(error.message); }}
            try {{ console.log(o); }} catch (error) {{ seen.push(error.message); }}
            return seen;
        }};
        "#
    );
    let result = runner
        .execute(
            &CallContext::new(),
            &workflow(&source, &["kinde.echo", "console"]),
            StartOptions::entry_point("handle").with_logger(common::capturing()),
        )
        .await
        .unwrap();
    let message = "value exceeds the conversion limit of 1000 nodes";
    assert_eq!(result.exit_result(), &json!([message, message]));
}

#[tokio::test(flavor = "multi_thread")]
async fn host_panic_is_recovered() {
    let source = "module.exports.default = { handle() { host.panic(); return 'unreachable'; } };";
    let failure = runner()
        .execute(&CallContext::new(), &workflow(source, &["host.panic"]), StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    assert_eq!(failure.error(), &RuntimeError::PanicRecovered("host exploded".into()));
}

#[tokio::test(flavor = "multi_thread")]
async fn panic_is_reported_even_if_script_swallows_it() {
    let source = r#"
        module.exports.default = {
            handle() {
                try { host.panic(); } catch (error) {}
                return "swallowed";
            },
        };
    "#;
    let failure = runner()
        .execute(&CallContext::new(), &workflow(source, &["host.panic"]), StartOptions::entry_point("handle"))
        .await
        .unwrap_err();
    assert!(matches!(failure.error(), RuntimeError::PanicRecovered(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn log_sink_panic_is_recovered() {
    let source = "module.exports.default = { handle() { console.log('x'); } };";
    let failure = runner()
        .execute(
            &CallContext::new(),
            &workflow(source, &["console"]),
            StartOptions::entry_point("handle").with_logger(Arc::new(PanickingLogger)),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.error(), &RuntimeError::PanicRecovered("sink exploded".into()));
}

#[tokio::test(flavor = "multi_thread")]
async fn runner_survives_panics() {
    let runner = runner();
    let panicking = workflow("module.exports.default = () => host.panic();", &["host.panic"]);
    let healthy = workflow("module.exports.default = () => 'fine';", &[]);

    assert!(runner
        .execute(&CallContext::new(), &panicking, StartOptions::entry_point("handle"))
        .await
        .is_err());
    let result = runner
        .execute(&CallContext::new(), &healthy, StartOptions::entry_point("handle"))
        .await
        .unwrap();
    assert_eq!(result.exit_result(), &json!("fine"));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_calls_are_isolated() {
    let runner = runner();
    let source = r#"
        globalThis.counter = (globalThis.counter || 0) + 1;
        module.exports.default = {
            async handle(id) {
                kinde.idToken.setCustomClaim("id", id);
                await Promise.resolve();
                return { id, counter: globalThis.counter };
            },
        };
    "#;
    let workflow = workflow(source, &["kinde.idToken.setCustomClaim"]);

    let calls = (0..16).map(|id| {
        let runner = runner.clone();
        let workflow = workflow.clone();
        tokio::spawn(async move {
            runner
                .execute(&CallContext::new(), &workflow, StartOptions::entry_point("handle").with_argument(json!(id)))
                .await
        })
    });
    let results = futures_join(calls).await;

    for (id, result) in results.into_iter().enumerate() {
        let result = result.unwrap();
        assert_eq!(result.exit_result(), &json!({"id": id, "counter": 1}));
        assert_eq!(result.context().value_as_map("idToken").unwrap()["id"], json!(id));
    }
    assert_eq!(runner.cache().len(), 1);
}

async fn futures_join<T: Send + 'static>(handles: impl Iterator<Item = tokio::task::JoinHandle<T>>) -> Vec<T> {
    let mut results = Vec::new();
    for handle in handles.collect::<Vec<_>>() {
        results.push(handle.await.unwrap());
    }
    results
}
