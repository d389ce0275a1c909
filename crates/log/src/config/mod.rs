//! Logger configuration

mod presets;

use serde::{Deserialize, Serialize};

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `EnvFilter` directive, e.g. `info` or `hookrun_runtime=debug,info`.
    pub level: String,
    /// Output format.
    pub format: Format,
    /// Output destination.
    pub writer: Writer,
    /// What each line shows.
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::default(),
            writer: Writer::default(),
            display: DisplayConfig::default(),
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, human oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

impl Format {
    /// Parse a format name. Unknown names fall back to [`Format::Compact`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Writer {
    /// Standard output.
    Stdout,
    /// Standard error.
    #[default]
    Stderr,
    /// libtest's captured output.
    Test,
}

/// Display options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct DisplayConfig {
    /// ANSI colors.
    pub colors: bool,
    /// Timestamps.
    pub time: bool,
    /// Source file and line.
    pub source: bool,
    /// Event target.
    pub target: bool,
    /// Thread ids.
    pub thread_ids: bool,
    /// Flatten event fields into the top-level JSON object.
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            time: true,
            source: false,
            target: true,
            thread_ids: false,
            flatten: false,
        }
    }
}

impl DisplayConfig {
    /// Override options from `HOOKRUN_LOG_*` variables read through `lookup`.
    pub(crate) fn apply_lookup(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        let flag = |key: &str, current: bool| {
            lookup(key).map_or(current, |value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
        };
        self.colors = flag("HOOKRUN_LOG_COLORS", self.colors);
        self.time = flag("HOOKRUN_LOG_TIME", self.time);
        self.source = flag("HOOKRUN_LOG_SOURCE", self.source);
        self.thread_ids = flag("HOOKRUN_LOG_THREAD_IDS", self.thread_ids);
    }
}
