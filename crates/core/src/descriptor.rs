//! Workflow descriptor: the immutable input of every call.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::binding::BindingSettings;

/// How the descriptor's source bytes are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceContentType {
    /// UTF-8 script text.
    #[default]
    Text,
    /// Raw bytes delivered by the bundler; still decoded as UTF-8 script text.
    Binary,
}

/// The bundled workflow source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Script source. Encoded as a base64 string on the wire.
    #[serde(with = "base64_bytes")]
    pub source: Vec<u8>,
    /// Encoding of [`source`](Self::source).
    #[serde(default)]
    pub source_type: SourceContentType,
    /// Bundler-provided build identifier. Informational only.
    #[serde(default)]
    pub build_hash: String,
}

/// Resource limits applied to one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLimits {
    /// Wall-clock budget for setup plus execution. Zero means "use the runner default".
    #[serde(with = "humantime_serde", default)]
    pub max_execution_duration: Duration,
}

/// Everything a runner needs to execute or introspect a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescriptor {
    /// Bundled source.
    pub processed_source: SourceDescriptor,
    /// Requested capabilities keyed by dotted name, e.g. `kinde.idToken`.
    #[serde(rename = "bindings", default)]
    pub requested_bindings: BTreeMap<String, BindingSettings>,
    /// Execution limits.
    #[serde(rename = "runtime_limits", default)]
    pub limits: RuntimeLimits,
}

impl WorkflowDescriptor {
    /// Create a text descriptor from script source.
    pub fn from_source(source: impl Into<Vec<u8>>) -> Self {
        Self {
            processed_source: SourceDescriptor {
                source: source.into(),
                source_type: SourceContentType::Text,
                build_hash: String::new(),
            },
            ..Self::default()
        }
    }

    /// Request a capability binding with empty settings.
    #[must_use]
    pub fn with_binding(self, name: impl Into<String>) -> Self {
        self.with_binding_settings(name, BindingSettings::new())
    }

    /// Request a capability binding with explicit settings.
    #[must_use]
    pub fn with_binding_settings(mut self, name: impl Into<String>, settings: BindingSettings) -> Self {
        self.requested_bindings.insert(name.into(), settings);
        self
    }

    /// Set the maximum execution duration.
    #[must_use]
    pub fn with_max_execution_duration(mut self, duration: Duration) -> Self {
        self.limits.max_execution_duration = duration;
        self
    }

    /// Script source bytes.
    pub fn source(&self) -> &[u8] {
        &self.processed_source.source
    }

    /// Deterministic content digest of the source: lowercase hex SHA-256.
    ///
    /// This is the program cache key. Byte-identical sources always hash
    /// identically, regardless of bindings, limits, or `build_hash`.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.processed_source.source))
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
