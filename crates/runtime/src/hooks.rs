//! Setup hooks.

use hookrun_core::CallContext;

/// Observes sandbox setup for every call of a runner.
///
/// `before_setup` runs on the async side before the sandbox exists and may
/// attach extensions that host functions later read through
/// [`CallContext::extension`]. `after_setup` runs on the worker once setup
/// has finished, whether or not it succeeded.
pub trait SetupHook: Send + Sync {
    /// Called before the sandbox is built.
    fn before_setup(&self, _call: &mut CallContext) {}

    /// Called once setup has finished.
    fn after_setup(&self, _call: &CallContext) {}
}
