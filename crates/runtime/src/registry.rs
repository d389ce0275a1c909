//! Native capability registry.
//!
//! Host applications describe the functions they expose to workflows as a
//! tree of named APIs. The tree is built once with [`NativeRegistry`], then
//! frozen with [`NativeRegistry::seal`]; the resulting [`SealedRegistry`] is
//! read-only and shared by every call.
//!
//! ```rust,ignore
//! use hookrun_runtime::registry::NativeRegistry;
//!
//! let mut registry = NativeRegistry::new();
//! let mut kinde = registry.register_api("kinde");
//! kinde.register_function("fetch", fetch);
//! kinde
//!     .register_api("idToken")
//!     .register_function("setCustomClaim", set_custom_claim);
//! let registry = registry.seal();
//! ```
//!
//! A workflow requesting `kinde.idToken.setCustomClaim` sees only that
//! function; requesting `kinde` sees every function registered directly on
//! `kinde` (but not those of `kinde.idToken`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hookrun_core::{BindingSettings, CallContext, RunContext};
use serde_json::Value;

use crate::error::NativeError;

/// A host function callable from workflows.
///
/// Receives the call's context, the settings of the binding request that
/// mounted it, the call's run context, and the script arguments.
pub type HostFunction =
    Arc<dyn Fn(&CallContext, &BindingSettings, &RunContext, Vec<Value>) -> Result<Value, NativeError> + Send + Sync>;

#[derive(Clone, Default)]
struct NativeModule {
    functions: BTreeMap<String, HostFunction>,
    modules: BTreeMap<String, NativeModule>,
}

/// Mutable registry used during host initialization.
#[derive(Default)]
pub struct NativeRegistry {
    modules: BTreeMap<String, NativeModule>,
}

impl NativeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or reopen the top-level API `name`.
    pub fn register_api(&mut self, name: impl Into<String>) -> ApiBuilder<'_> {
        ApiBuilder {
            module: self.modules.entry(name.into()).or_default(),
        }
    }

    /// Freeze the registry.
    pub fn seal(self) -> SealedRegistry {
        tracing::debug!(apis = ?self.modules.keys().collect::<Vec<_>>(), "native registry sealed");
        SealedRegistry {
            modules: Arc::new(self.modules),
        }
    }
}

/// Adds functions and child APIs to one registry node.
pub struct ApiBuilder<'a> {
    module: &'a mut NativeModule,
}

impl ApiBuilder<'_> {
    /// Register a function on this API. An existing function of the same name is replaced.
    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&CallContext, &BindingSettings, &RunContext, Vec<Value>) -> Result<Value, NativeError>
            + Send
            + Sync
            + 'static,
    {
        self.module.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Create or reopen the child API `name`.
    pub fn register_api(&mut self, name: impl Into<String>) -> ApiBuilder<'_> {
        ApiBuilder {
            module: self.module.modules.entry(name.into()).or_default(),
        }
    }
}

/// What one binding request mounts into a sandbox.
#[derive(Clone)]
pub struct MountPlan {
    /// Namespace objects from the global scope down to the mount target,
    /// e.g. `["kinde", "idToken"]`.
    pub path: Vec<String>,
    /// Functions to set on the target object.
    pub functions: Vec<(String, HostFunction)>,
}

impl MountPlan {
    /// Names of the mounted functions.
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Debug for MountPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountPlan")
            .field("path", &self.path)
            .field("functions", &self.function_names())
            .finish()
    }
}

/// Read-only registry shared by every call. Cheap to clone.
#[derive(Clone, Default)]
pub struct SealedRegistry {
    modules: Arc<BTreeMap<String, NativeModule>>,
}

impl SealedRegistry {
    /// A registry exposing nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Names of top-level APIs.
    pub fn api_names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Resolve a dotted binding request against the tree.
    ///
    /// Returns `None` when the first segment names no API. Walking stops at
    /// the first leaf function; an empty remainder mounts every function
    /// registered directly on the reached node; an unknown segment yields a
    /// plan with no functions.
    pub fn resolve(&self, request: &str) -> Option<MountPlan> {
        let mut segments = request.split('.');
        let root = segments.next()?;
        let mut node = self.modules.get(root)?;
        let mut path = vec![root.to_owned()];

        loop {
            match segments.next() {
                None | Some("") => {
                    let functions = node
                        .functions
                        .iter()
                        .map(|(name, function)| (name.clone(), Arc::clone(function)))
                        .collect();
                    return Some(MountPlan { path, functions });
                }
                Some(segment) => {
                    if let Some(child) = node.modules.get(segment) {
                        path.push(segment.to_owned());
                        node = child;
                    } else if let Some(function) = node.functions.get(segment) {
                        return Some(MountPlan {
                            path,
                            functions: vec![(segment.to_owned(), Arc::clone(function))],
                        });
                    } else {
                        tracing::debug!(request, segment, "binding request names no registered capability");
                        return Some(MountPlan {
                            path,
                            functions: Vec::new(),
                        });
                    }
                }
            }
        }
    }
}

impl fmt::Debug for SealedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedRegistry").field("apis", &self.api_names()).finish()
    }
}
