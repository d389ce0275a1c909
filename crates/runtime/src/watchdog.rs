//! Per-call watchdog.
//!
//! A background task races the call's deadline against the caller's
//! cancellation token. Whichever fires first trips a shared
//! [`InterruptSignal`], which the engine's interrupt handler and the
//! promise-drain loop both observe.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use hookrun_core::{InterruptReason, RuntimeError};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Shared interrupt flag of one call.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<InterruptReason>>,
}

impl InterruptSignal {
    /// Create an untripped signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an interrupt. The first reason recorded wins.
    pub fn trip(&self, reason: InterruptReason) {
        if self.reason.set(reason).is_ok() {
            tracing::warn!(%reason, "interrupting workflow");
        }
        self.token.cancel();
    }

    /// Whether an interrupt has been requested.
    pub fn is_tripped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why the interrupt was requested, if it was.
    pub fn reason(&self) -> Option<InterruptReason> {
        self.reason.get().copied()
    }

    /// `Err(Timeout)` once tripped.
    pub fn check(&self) -> Result<(), RuntimeError> {
        match self.reason() {
            Some(reason) => Err(RuntimeError::Timeout { reason }),
            None => Ok(()),
        }
    }

    /// Map an engine failure: once tripped, every failure is a timeout.
    pub(crate) fn explain(&self, error: RuntimeError) -> RuntimeError {
        match self.reason() {
            Some(reason) => RuntimeError::Timeout { reason },
            None => error,
        }
    }
}

/// Handle to a running watchdog. Dropping it stops the watchdog.
#[derive(Debug)]
pub struct Watchdog {
    _disarm: DropGuard,
}

impl Watchdog {
    /// Spawn a watchdog on the current tokio runtime.
    ///
    /// Trips `signal` with [`InterruptReason::Deadline`] after `max_duration`
    /// or with [`InterruptReason::Cancelled`] when `caller` is cancelled.
    pub fn arm(signal: InterruptSignal, caller: CancellationToken, max_duration: Duration) -> Self {
        let done = CancellationToken::new();
        let finished = done.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(max_duration) => signal.trip(InterruptReason::Deadline),
                () = caller.cancelled() => signal.trip(InterruptReason::Cancelled),
                () = finished.cancelled() => {
                    tracing::trace!("watchdog disarmed");
                }
            }
        });
        Self {
            _disarm: done.drop_guard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for(signal: &InterruptSignal) {
        signal.token.cancelled().await;
    }

    #[tokio::test]
    async fn deadline_trips_signal() {
        let signal = InterruptSignal::new();
        let _watchdog = Watchdog::arm(signal.clone(), CancellationToken::new(), Duration::from_millis(20));
        wait_for(&signal).await;
        assert_eq!(signal.reason(), Some(InterruptReason::Deadline));
        assert_eq!(
            signal.check(),
            Err(RuntimeError::Timeout {
                reason: InterruptReason::Deadline
            })
        );
    }

    #[tokio::test]
    async fn cancellation_trips_signal() {
        let signal = InterruptSignal::new();
        let caller = CancellationToken::new();
        let _watchdog = Watchdog::arm(signal.clone(), caller.clone(), Duration::from_secs(60));
        caller.cancel();
        wait_for(&signal).await;
        assert_eq!(signal.reason(), Some(InterruptReason::Cancelled));
    }

    #[tokio::test]
    async fn dropped_watchdog_never_trips() {
        let signal = InterruptSignal::new();
        let watchdog = Watchdog::arm(signal.clone(), CancellationToken::new(), Duration::from_millis(10));
        drop(watchdog);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!signal.is_tripped());
        assert!(signal.check().is_ok());
    }

    #[test]
    fn first_reason_wins() {
        let signal = InterruptSignal::new();
        signal.trip(InterruptReason::Cancelled);
        signal.trip(InterruptReason::Deadline);
        assert_eq!(signal.reason(), Some(InterruptReason::Cancelled));
        assert_eq!(
            signal.explain(RuntimeError::Invocation("interrupted".into())),
            RuntimeError::Timeout {
                reason: InterruptReason::Cancelled
            }
        );
    }
}
