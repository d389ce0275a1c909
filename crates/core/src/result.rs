//! Call results: execution outcome, metadata and introspected exports.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::binding::BindingSettings;
use crate::context::RunContext;

/// Timing and completion facts of one call. Populated on every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Wall-clock time at which setup began.
    pub started_at: DateTime<Utc>,
    /// Time from setup start until the controller returned.
    #[serde(with = "humantime_serde")]
    pub execution_duration: Duration,
    /// Whether the entry point's promise was fulfilled.
    pub has_run_to_completion: bool,
}

impl ExecutionMetadata {
    /// Metadata for a call that started at `started_at` and has not finished.
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            execution_duration: Duration::ZERO,
            has_run_to_completion: false,
        }
    }
}

/// Successful outcome of [`Runner::execute`](crate::Runner::execute).
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    exit_result: Value,
    context: RunContext,
    metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// Assemble a result.
    pub fn new(exit_result: Value, context: RunContext, metadata: ExecutionMetadata) -> Self {
        Self {
            exit_result,
            context,
            metadata,
        }
    }

    /// Timing and completion facts.
    pub fn execution_metadata(&self) -> ExecutionMetadata {
        self.metadata
    }

    /// Value the entry point's promise resolved to.
    pub fn exit_result(&self) -> &Value {
        &self.exit_result
    }

    /// Values written by host functions during the call.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Split into parts.
    pub fn into_parts(self) -> (Value, RunContext, ExecutionMetadata) {
        (self.exit_result, self.context, self.metadata)
    }
}

/// One export read during introspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntrospectedExport {
    present: bool,
    value: Value,
    bindings: BTreeMap<String, BindingSettings>,
}

impl IntrospectedExport {
    /// Marker for an export that does not exist.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Record a materialized export, extracting its declared `bindings`.
    ///
    /// A `bindings` property that is not a map of settings objects yields
    /// no declared bindings.
    pub fn present(value: Value) -> Self {
        let bindings = value
            .get("bindings")
            .cloned()
            .and_then(|raw| {
                serde_json::from_value::<BTreeMap<String, BindingSettings>>(raw)
                    .map_err(|error| {
                        tracing::debug!(%error, "export declares malformed bindings");
                    })
                    .ok()
            })
            .unwrap_or_default();
        Self {
            present: true,
            value,
            bindings,
        }
    }

    /// Whether the export exists.
    pub fn has_export(&self) -> bool {
        self.present
    }

    /// Materialized value; `null` when absent.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The value as an object; empty when absent or not an object.
    pub fn value_as_map(&self) -> Map<String, Value> {
        self.value.as_object().cloned().unwrap_or_default()
    }

    /// Capabilities this export declares through its `bindings` property.
    pub fn bindings(&self) -> &BTreeMap<String, BindingSettings> {
        &self.bindings
    }
}

/// Outcome of [`Runner::introspect`](crate::Runner::introspect).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntrospectionResult {
    exports: BTreeMap<String, IntrospectedExport>,
}

impl IntrospectionResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for one requested export.
    pub fn record(&mut self, name: impl Into<String>, export: IntrospectedExport) {
        self.exports.insert(name.into(), export);
    }

    /// Look up an export. Names that were never requested read as absent.
    pub fn export(&self, name: &str) -> IntrospectedExport {
        self.exports.get(name).cloned().unwrap_or_default()
    }

    /// Declared bindings of the named export.
    pub fn bindings_from(&self, export_name: &str) -> BTreeMap<String, BindingSettings> {
        self.exports
            .get(export_name)
            .map(|export| export.bindings.clone())
            .unwrap_or_default()
    }

    /// Deserialize the named export into a typed settings structure.
    ///
    /// Returns `Ok(None)` when the export is absent.
    pub fn settings<T: DeserializeOwned>(&self, export_name: &str) -> serde_json::Result<Option<T>> {
        match self.exports.get(export_name) {
            Some(export) if export.present => serde_json::from_value(export.value.clone()).map(Some),
            _ => Ok(None),
        }
    }

    /// Names of every requested export, present or not.
    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct WorkflowSettings {
        id: String,
        trigger: String,
    }

    fn sample() -> IntrospectionResult {
        let mut result = IntrospectionResult::new();
        result.record(
            "workflowSettings",
            IntrospectedExport::present(json!({
                "id": "tokenGen",
                "trigger": "onTokenGeneration",
                "bindings": {
                    "console": {},
                    "kinde.idToken": {"resetClaims": true}
                }
            })),
        );
        result.record("default", IntrospectedExport::absent());
        result
    }

    #[test]
    fn declared_bindings_are_extracted() {
        let result = sample();
        let bindings = result.bindings_from("workflowSettings");
        assert_eq!(bindings.keys().collect::<Vec<_>>(), vec!["console", "kinde.idToken"]);
        assert!(bindings["kinde.idToken"].flag("resetClaims"));
    }

    #[test]
    fn absent_exports_are_not_errors() {
        let result = sample();
        let default = result.export("default");
        assert!(!default.has_export());
        assert_eq!(default.value(), &Value::Null);
        assert!(default.value_as_map().is_empty());
        assert!(!result.export("neverRequested").has_export());
    }

    #[test]
    fn malformed_bindings_yield_none() {
        let export = IntrospectedExport::present(json!({"bindings": ["console"]}));
        assert!(export.has_export());
        assert!(export.bindings().is_empty());
    }

    #[test]
    fn typed_settings() {
        let result = sample();
        let settings: Option<WorkflowSettings> = result.settings("workflowSettings").unwrap();
        assert_eq!(
            settings,
            Some(WorkflowSettings {
                id: "tokenGen".into(),
                trigger: "onTokenGeneration".into(),
            })
        );
        let missing: Option<WorkflowSettings> = result.settings("default").unwrap();
        assert_eq!(missing, None);
    }
}
