//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Format, Writer};

impl Config {
    /// Create configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from variables read through `lookup`.
    ///
    /// The level comes from `HOOKRUN_LOG`, then `RUST_LOG`; the format from
    /// `HOOKRUN_LOG_FORMAT`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = lookup("HOOKRUN_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }
        if let Some(format) = lookup("HOOKRUN_LOG_FORMAT") {
            config.format = Format::from_name(&format);
        }
        config.display.apply_lookup(&lookup);

        config
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            writer: Writer::Stdout,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
        }
    }

    /// Test configuration (captured by libtest)
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            format: Format::Compact,
            writer: Writer::Test,
            display: DisplayConfig {
                colors: false,
                time: false,
                ..DisplayConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn hookrun_log_wins_over_rust_log() {
        let config = Config::from_lookup(lookup(&[("HOOKRUN_LOG", "debug"), ("RUST_LOG", "warn")]));
        assert_eq!(config.level, "debug");

        let config = Config::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn format_and_display_flags() {
        let config = Config::from_lookup(lookup(&[
            ("HOOKRUN_LOG_FORMAT", "JSON"),
            ("HOOKRUN_LOG_COLORS", "false"),
            ("HOOKRUN_LOG_SOURCE", "1"),
        ]));
        assert_eq!(config.format, Format::Json);
        assert!(!config.display.colors);
        assert!(config.display.source);
        assert!(config.display.time);
    }

    #[test]
    fn unknown_format_is_compact() {
        assert_eq!(Format::from_name("logfmt"), Format::Compact);
    }
}
