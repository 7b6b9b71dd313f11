//! # StyleKit CSS
//!
//! Typed style attributes and cascade resolution for StyleKit documents.
//!
//! ## Design Goals
//!
//! 1. **Attribute registry**: one explicit, immutable table of typed attributes
//! 2. **Declarations**: turn `property: value` text into typed attribute writes
//! 3. **Cascade**: match selector chains against style nodes, ordered by specificity
//! 4. **Inheritance**: resolve inherited attributes through the ancestor chain
//!
//! ## Example
//!
//! ```
//! use stylekit_css::{attrs, AttributeRegistry, Color, Style, StyleSheet, StyleSheetKey,
//!     StyleSheetResolver, StyleTree};
//!
//! let registry = AttributeRegistry::standard();
//! let mut sheet = StyleSheet::new(registry.clone());
//! sheet.parse_str("div.a { color: #112233 } .a { color: #445566 }").unwrap();
//!
//! let mut tree = StyleTree::new(registry);
//! let node = tree.push(None, Some(StyleSheetKey::new("div", Some("a"), None)), Style::new());
//!
//! let pass = sheet.layout();
//! let color = tree.get(node, attrs::COLOR, Some(pass.resolver()));
//! assert_eq!(color, Color::from_rgb(0x11, 0x22, 0x33));
//! ```

use thiserror::Error;

pub mod attribute;
pub mod declaration;
pub mod node;
pub mod selector;
pub mod style;
pub mod stylesheet;
pub mod value;

pub use attribute::{
    attrs, AttrType, AttrValue, Attribute, AttributeDescriptor, AttributeRegistry,
    AttributeRegistryBuilder, BoxAttribute, FontFamilies, ValueType, Variant,
};
pub use declaration::{apply, apply_inline, Diagnostic};
pub use node::{StyleId, StyleSheetKey, StyleTree, TreeId};
pub use selector::{Selector, SelectorLink};
pub use style::Style;
pub use stylesheet::{
    AtRule, FontFace, FontRegistrar, LayoutPass, StyleSheet, StyleSheetResolver, StyleSheetSet,
};
pub use value::{
    Clear, Color, Display, FloatPosition, HAlignment, OrderedListType, TextDecoration, Unit,
    VAlignment, Value,
};

/// Errors that can occur in CSS operations.
#[derive(Error, Debug)]
pub enum CssError {
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Malformed value: {0}")]
    MalformedValue(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Attribute ordinal out of range: {0}")]
    OutOfRange(usize),

    #[error("Type mismatch for {attribute}: expected {expected}, found {found}")]
    TypeMismatch {
        attribute: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error(transparent)]
    Parse(#[from] stylekit_cssparser::ParseError),
}

impl CssError {
    /// Whether the error only invalidates a single declaration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CssError::UnknownProperty(_) | CssError::MalformedValue(_)
        )
    }
}

pub type CssResult<T> = Result<T, CssError>;
