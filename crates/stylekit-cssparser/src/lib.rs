//! # StyleKit CSS Parser
//!
//! Tokenizer and grammar for the CSS subset understood by StyleKit:
//! selector rules (`div.a > p#x, span:hover { prop: value; }`) and
//! at-rules (`@font-face { ... }`), parsed into a small AST.
//!
//! Declaration values are not interpreted here; they are carried as trimmed
//! raw text and handed to the declaration parser in `stylekit-css`.

use thiserror::Error;

pub mod parser;
pub mod scanner;

pub use parser::{parse_stylesheet, parse_stylesheet_str};
pub use scanner::{LexState, Scanner, Token};

/// Errors that can occur while parsing CSS.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Input that no lexical rule accepts.
    #[error("Lexical error at line {line}, column {column}: unexpected {text:?}")]
    Lex {
        line: usize,
        column: usize,
        text: String,
    },

    /// A well-formed token in a place the grammar does not allow.
    #[error("Unexpected {found} at line {line}, column {column}")]
    UnexpectedToken {
        found: String,
        line: usize,
        column: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed stylesheet AST.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StylesheetAst {
    pub rules: Vec<RuleAst>,
    pub at_rules: Vec<AtRuleAst>,
}

/// A selector rule: one or more selector chains sharing a declaration block.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleAst {
    pub selectors: Vec<SelectorAst>,
    pub declarations: Vec<DeclarationAst>,
}

/// One selector chain.
///
/// `links[0]` is the subject (the compound that must match the element
/// itself); following links are its ancestors, outermost last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorAst {
    pub links: Vec<CompoundAst>,
}

/// A compound selector such as `div.note#intro:hover`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundAst {
    /// Tag name; `None` for `*` or when omitted.
    pub element: Option<String>,
    pub class_name: Option<String>,
    pub id: Option<String>,
    pub pseudo_class: Option<String>,
    /// Must match the keyed ancestor directly above the previous link's match
    /// (written `ancestor > child`).
    pub direct_child: bool,
}

/// A declaration with its raw, trimmed value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationAst {
    pub property: String,
    pub value: String,
    /// Line the property name started on.
    pub line: usize,
}

/// An at-rule block, e.g. `@font-face { font-family: x; src: url(y) }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRuleAst {
    pub name: String,
    pub declarations: Vec<DeclarationAst>,
}

impl AtRuleAst {
    /// Value of the last declaration named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|d| d.property == key)
            .map(|d| d.value.as_str())
    }
}
