//! Per-call context types.
//!
//! [`CallContext`] flows *into* a call: it carries the caller's cancellation
//! token and request-scoped values that host functions may read.
//! [`RunContext`] flows *out* of a call: a mutable key-value store written by
//! host functions during execution and handed back to the caller.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Errors from typed [`RunContext`] reads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// No value is stored under the key.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// A value exists but is not a JSON object.
    #[error("value is not a map: {key}")]
    NotAMap {
        /// The key that was looked up.
        key: String,
    },
}

/// Mutable side-channel state of a single call.
///
/// Cloning yields another handle to the same store. A fresh store is created
/// for every call and is never shared between calls.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    data: Arc<RwLock<Map<String, Value>>>,
}

impl RunContext {
    /// Create an empty run context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value by key.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Store a value, replacing any previous one.
    pub fn set_value(&self, key: impl Into<String>, value: Value) {
        self.data.write().insert(key.into(), value);
    }

    /// Apply `update` to the object stored under `key`, creating it when absent.
    ///
    /// A non-object value under `key` is replaced by an empty object first.
    pub fn update_map<R>(&self, key: &str, update: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut data = self.data.write();
        let mut map = match data.remove(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let output = update(&mut map);
        data.insert(key.to_owned(), Value::Object(map));
        output
    }

    /// Remove a value by key, returning it.
    pub fn remove_value(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    /// Snapshot of every stored value.
    pub fn values(&self) -> Map<String, Value> {
        self.data.read().clone()
    }

    /// Read the object stored under `key`.
    ///
    /// # Errors
    ///
    /// [`ContextError::KeyNotFound`] if nothing is stored under `key`,
    /// [`ContextError::NotAMap`] if the stored value is not an object.
    pub fn value_as_map(&self, key: &str) -> Result<Map<String, Value>, ContextError> {
        match self.data.read().get(key) {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(ContextError::NotAMap { key: key.to_owned() }),
            None => Err(ContextError::KeyNotFound { key: key.to_owned() }),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

/// Cancellable context supplied by the caller of `execute` / `introspect`.
///
/// Host functions receive the call's context, so values inserted into
/// [`extensions`](Self::extensions) by the embedding application (request
/// ids, tenant handles, clients) are reachable from native callbacks.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: CancellationToken,
    extensions: http::Extensions,
}

impl CallContext {
    /// Create a context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Attach a request-scoped value.
    #[must_use]
    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Derive a context whose token is cancelled with this one, but can
    /// also be cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            extensions: self.extensions.clone(),
        }
    }

    /// The cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Read a request-scoped value.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Request-scoped values.
    pub fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    /// Mutable request-scoped values.
    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn value_as_map_reports_missing_key() {
        let ctx = RunContext::new();
        assert_eq!(
            ctx.value_as_map("idToken"),
            Err(ContextError::KeyNotFound { key: "idToken".into() })
        );
    }

    #[test]
    fn value_as_map_rejects_non_objects() {
        let ctx = RunContext::new();
        ctx.set_value("idToken", json!("not a map"));
        assert_eq!(
            ctx.value_as_map("idToken"),
            Err(ContextError::NotAMap { key: "idToken".into() })
        );
    }

    #[test]
    fn clones_share_state() {
        let ctx = RunContext::new();
        let handle = ctx.clone();
        handle.set_value("k", json!({"a": "b"}));
        assert_eq!(ctx.value_as_map("k").unwrap(), json!({"a": "b"}).as_object().cloned().unwrap());
    }

    #[test]
    fn update_map_creates_and_merges() {
        let ctx = RunContext::new();
        ctx.update_map("accessToken", |map| map.insert("a".into(), json!(1)));
        ctx.update_map("accessToken", |map| map.insert("b".into(), json!(2)));
        assert_eq!(ctx.get_value("accessToken"), Some(json!({"a": 1, "b": 2})));

        ctx.set_value("scalar", json!(3));
        ctx.update_map("scalar", |map| map.insert("c".into(), json!(4)));
        assert_eq!(ctx.get_value("scalar"), Some(json!({"c": 4})));
    }

    #[test]
    fn child_context_follows_parent_cancellation() {
        let parent = CallContext::new().with_extension(42_u32);
        let child = parent.child();
        assert_eq!(child.extension::<u32>(), Some(&42));

        child.cancellation().cancel();
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancellation().cancel();
        assert!(second.is_cancelled());
    }
}
