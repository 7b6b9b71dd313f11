//! Logging configuration and setup.
//!
//! Log records always go to stderr: the tools print their results on
//! stdout.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::StyleKitError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    Compact,
    /// One JSON object per record.
    Json,
}

impl FromStr for LogFormat {
    type Err = StyleKitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(StyleKitError::InvalidArgument(format!(
                "unknown log format: {}",
                other
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level used when neither `filter` nor `RUST_LOG` is set.
    pub level: Level,
    pub format: LogFormat,
    /// Include source file and line.
    pub include_location: bool,
    /// Log span enter and close events.
    pub include_span_events: bool,
    /// Colored output; ignored by the JSON format.
    pub ansi: bool,
    /// Directive string, e.g. "stylekit_css=trace,stylekit_dom=debug".
    /// Takes precedence over `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            include_location: false,
            include_span_events: false,
            ansi: true,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            include_location: true,
            ..Default::default()
        }
    }

    pub fn trace() -> Self {
        Self {
            level: Level::TRACE,
            format: LogFormat::Pretty,
            include_location: true,
            include_span_events: true,
            ..Default::default()
        }
    }

    /// Machine-readable records for log collectors.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            ansi: false,
            ..Default::default()
        }
    }

    /// Pick a preset from a `-v` count: 0 = warnings, 1 = debug, 2+ = trace.
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => Self::default(),
            1 => Self::debug(),
            _ => Self::trace(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter from the custom directives, then `RUST_LOG`, then `level`.
    /// Invalid directives fall through to the next source.
    pub fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str().to_ascii_lowercase());
        match &self.filter {
            Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(self.span_events());
        match self.format {
            LogFormat::Pretty => base
                .with_ansi(self.ansi)
                .with_file(self.include_location)
                .with_line_number(self.include_location)
                .boxed(),
            LogFormat::Compact => base.compact().with_ansi(self.ansi).boxed(),
            LogFormat::Json => base.json().with_ansi(false).boxed(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `false` when a subscriber was already installed; the existing
/// one is kept.
pub fn init_logging(config: LogConfig) -> bool {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
        .try_init()
        .is_ok()
}
