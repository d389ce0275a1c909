//! Per-capability binding settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque settings bag attached to a single binding request.
///
/// Serialized transparently as its settings object, so
/// `{"kinde.idToken": {"resetClaims": true}}` deserializes into a binding
/// named `kinde.idToken` whose settings hold `resetClaims`. Keys are never
/// validated by the runtime and unknown keys survive a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingSettings {
    settings: Map<String, Value>,
}

impl BindingSettings {
    /// Create an empty settings bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a settings bag from an existing JSON object.
    #[must_use]
    pub fn from_map(settings: Map<String, Value>) -> Self {
        Self { settings }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Look up a single setting.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Read a boolean setting, treating absent or non-boolean values as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.settings.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Borrow the underlying settings object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Consume into the underlying settings object.
    pub fn into_map(self) -> Map<String, Value> {
        self.settings
    }

    /// Whether no settings are present.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

impl From<Map<String, Value>> for BindingSettings {
    fn from(settings: Map<String, Value>) -> Self {
        Self::from_map(settings)
    }
}
