//! Logger builder implementation

use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::fmt::{self, MakeWriter, TestWriter};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{Config, Format, Writer};
use crate::error::{LogError, LogResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// For a scoped logger, dropping the guard restores the previous default
/// subscriber. A global logger stays installed for the life of the process.
#[derive(Debug)]
pub struct LoggerGuard {
    _scope: Option<DefaultGuard>,
}

/// Apply display options and box the layer. `without_time` changes the
/// layer type, so both arms box separately.
macro_rules! styled {
    ($layer:expr, $display:expr, $writer:expr) => {{
        let display = $display;
        let layer = $layer
            .with_writer($writer)
            .with_ansi(display.colors)
            .with_target(display.target)
            .with_file(display.source)
            .with_line_number(display.source)
            .with_thread_ids(display.thread_ids);
        if display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Install the logger as the global default.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The level directive cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        self.layer()?
            .with_subscriber(Registry::default())
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;
        Ok(LoggerGuard { _scope: None })
    }

    /// Install the logger as the default of the current thread until the
    /// guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the level directive cannot be parsed.
    pub fn build_scoped(self) -> LogResult<LoggerGuard> {
        let scope = self.layer()?.with_subscriber(Registry::default()).set_default();
        Ok(LoggerGuard { _scope: Some(scope) })
    }

    fn layer(&self) -> LogResult<tracing_subscriber::filter::Filtered<BoxedLayer, EnvFilter, Registry>> {
        let filter = EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            directive: self.config.level.clone(),
            reason: e.to_string(),
        })?;
        let layer = match self.config.writer {
            Writer::Stdout => format_layer(&self.config, std::io::stdout),
            Writer::Stderr => format_layer(&self.config, std::io::stderr),
            Writer::Test => format_layer(&self.config, TestWriter::new),
        };
        Ok(layer.with_filter(filter))
    }
}

fn format_layer<W>(config: &Config, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let display = &config.display;
    match config.format {
        Format::Pretty => styled!(fmt::layer().pretty(), display, writer),
        Format::Compact => styled!(fmt::layer().compact(), display, writer),
        Format::Json => styled!(fmt::layer().json().flatten_event(display.flatten), display, writer),
    }
}
