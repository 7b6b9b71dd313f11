//! # StyleKit HTML
//!
//! Tokenizer for the XHTML subset accepted by StyleKit documents.
//!
//! The source is read into memory up front with [`read_source`]; tokens are
//! then pulled one at a time from a [`Tokenizer`]. Structure (nesting, the
//! meaning of tags) is left to the document builder in `stylekit-dom`.

pub mod entities;
pub mod tokenizer;

use std::io::Read;

use thiserror::Error;

pub use tokenizer::{tokenize, Token, Tokenizer};

/// Errors that can occur during XHTML tokenizing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unexpected end of input in {0}")]
    UnexpectedEof(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for XHTML parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Read a whole UTF-8 document from `reader`.
pub fn read_source<R: Read>(mut reader: R) -> ParseResult<String> {
    let mut source = String::new();
    reader.read_to_string(&mut source)?;
    Ok(source)
}
