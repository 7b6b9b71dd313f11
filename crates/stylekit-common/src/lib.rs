//! # StyleKit Common
//!
//! Error types and logging configuration shared by the StyleKit crates and
//! tools.
//!
//! ## Features
//!
//! - Umbrella error type tagged with the pipeline stage that failed
//! - Logging configuration and setup
//! - Result and Option extension traits for attaching context

use std::fmt;

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Boxed error source carried by [`StyleKitError::Failed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Processing stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Stylesheet parsing and declarations.
    Css,
    /// XHTML parsing and document building.
    Document,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Css => "css",
            Stage::Document => "document",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Css => f.write_str("CSS"),
            Stage::Document => f.write_str("Document"),
        }
    }
}

/// Unified error type for StyleKit front ends.
#[derive(Error, Debug)]
pub enum StyleKitError {
    /// A stage failed; `context` says what was being processed.
    #[error("{stage} error: {context}")]
    Failed {
        stage: Stage,
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lookup of an element, attribute or file that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A broken invariant; carries the backtrace of the failure site.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl StyleKitError {
    pub fn failed(stage: Stage, context: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            context: context.into(),
            source: None,
        }
    }

    pub fn failed_with<E>(stage: Stage, context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            stage,
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn css(context: impl Into<String>) -> Self {
        Self::failed(Stage::Css, context)
    }

    pub fn document(context: impl Into<String>) -> Self {
        Self::failed(Stage::Document, context)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Stage of a `Failed` error.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StyleKitError::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Short machine-readable category, logged by the tools.
    pub fn category(&self) -> &'static str {
        match self {
            StyleKitError::Failed { stage, .. } => stage.as_str(),
            StyleKitError::Io(_) => "io",
            StyleKitError::NotFound(_) => "not_found",
            StyleKitError::InvalidArgument(_) => "invalid_argument",
            StyleKitError::Internal { .. } => "internal",
        }
    }

    /// Process exit code: 2 usage, 3 missing input, 4 bad input, 70 bug.
    pub fn exit_code(&self) -> i32 {
        match self {
            StyleKitError::InvalidArgument(_) => 2,
            StyleKitError::Io(_) | StyleKitError::NotFound(_) => 3,
            StyleKitError::Failed { .. } => 4,
            StyleKitError::Internal { .. } => 70,
        }
    }
}

pub type Result<T> = std::result::Result<T, StyleKitError>;

/// Attach stage and context to foreign errors.
pub trait ResultExt<T> {
    fn stage_context(self, stage: Stage, context: impl Into<String>) -> Result<T>;

    fn css_context(self, context: impl Into<String>) -> Result<T>
    where
        Self: Sized,
    {
        self.stage_context(Stage::Css, context)
    }

    fn document_context(self, context: impl Into<String>) -> Result<T>
    where
        Self: Sized,
    {
        self.stage_context(Stage::Document, context)
    }
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn stage_context(self, stage: Stage, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| StyleKitError::failed_with(stage, context, e))
    }
}

pub trait OptionExt<T> {
    /// `None` becomes [`StyleKitError::NotFound`] naming `what`.
    fn ok_or_not_found(self, what: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| StyleKitError::NotFound(what.into()))
    }
}
