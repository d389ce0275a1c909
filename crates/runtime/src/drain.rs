//! Promise draining.

use std::time::Duration;

use hookrun_core::RuntimeError;
use rquickjs::promise::PromiseState;
use rquickjs::{Ctx, Promise, Value};

use crate::convert;
use crate::watchdog::InterruptSignal;

/// Final state of a promise.
pub(crate) enum Settled<'js> {
    Fulfilled(Value<'js>),
    Rejected(Value<'js>),
}

/// Run the job queue until `promise` leaves the pending state.
///
/// While the promise waits on nothing the engine can make progress on, the
/// loop sleeps `poll_interval` between checks. A tripped `interrupt` ends the
/// wait with a timeout.
pub(crate) fn settle<'js>(
    ctx: &Ctx<'js>,
    promise: &Promise<'js>,
    interrupt: &InterruptSignal,
    poll_interval: Duration,
) -> Result<Settled<'js>, RuntimeError> {
    loop {
        while !interrupt.is_tripped() && ctx.execute_pending_job() {}

        match promise.state() {
            PromiseState::Resolved => {
                return match promise.result::<Value<'js>>() {
                    Some(Ok(value)) => Ok(Settled::Fulfilled(value)),
                    Some(Err(err)) => Err(interrupt.explain(RuntimeError::Internal(convert::engine_message(ctx, err)))),
                    None => Ok(Settled::Fulfilled(Value::new_undefined(ctx.clone()))),
                };
            }
            PromiseState::Rejected => {
                interrupt.check()?;
                let reason = match promise.result::<Value<'js>>() {
                    Some(Err(rquickjs::Error::Exception)) => ctx.catch(),
                    Some(Err(err)) => return Err(RuntimeError::Internal(convert::engine_message(ctx, err))),
                    Some(Ok(value)) => value,
                    None => Value::new_undefined(ctx.clone()),
                };
                return Ok(Settled::Rejected(reason));
            }
            PromiseState::Pending => {
                interrupt.check()?;
                std::thread::sleep(poll_interval);
            }
        }
    }
}
