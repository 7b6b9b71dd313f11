//! # StyleKit DOM
//!
//! Element trees for StyleKit rich-text documents.
//!
//! ## Design Goals
//!
//! 1. **Streaming build**: one pass over the XHTML token stream, no intermediate tree
//! 2. **Arena storage**: elements and style nodes are addressed by index and dropped together
//! 3. **Styled elements**: every element refers to a style node for cascade queries
//! 4. **Atomic replacement**: a failed build never disturbs the committed document

pub mod builder;
pub mod document;
pub mod element;
pub mod model;

pub use builder::{is_xhtml, wrap_xhtml, DocumentBuilder};
pub use document::Document;
pub use element::{Element, ElementId, ElementKind, Table};
pub use model::{ChangeEvent, ChangeListener, HtmlTextModel, SimpleTextModel, TextModel};

use thiserror::Error;

/// Errors that can occur while building a document.
#[derive(Error, Debug)]
pub enum DomError {
    #[error("Duplicate element id: {0}")]
    DuplicateId(String),

    #[error("Document root must be <html>, found {0}")]
    MissingHtml(String),

    #[error("Malformed document at {line}:{column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error(transparent)]
    Html(#[from] stylekit_html::ParseError),

    #[error(transparent)]
    Css(#[from] stylekit_css::CssError),
}

/// Result type for document operations.
pub type DomResult<T> = Result<T, DomError>;
