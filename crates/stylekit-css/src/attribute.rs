//! Style attribute registry.
//!
//! Every style attribute has a descriptor with a stable ordinal, an
//! inheritance flag, a value type and a default. The standard attributes are
//! registered first, in a fixed order, so the typed handles in [`attrs`] are
//! valid for every registry built by [`AttributeRegistryBuilder`]. Custom
//! attributes receive the ordinals that follow.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::value::{
    Clear, Color, Display, FloatPosition, HAlignment, OrderedListType, TextDecoration, VAlignment,
    Value,
};
use crate::{CssError, CssResult};

/// Font family list; most styles name one or two families.
pub type FontFamilies = SmallVec<[String; 2]>;

/// Type tag of an attribute, checked on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    HAlignment,
    VAlignment,
    Value,
    TextDecoration,
    FontFamilies,
    Integer,
    Bool,
    String,
    OrderedListType,
    Color,
    Clear,
    Display,
    FloatPosition,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Untyped attribute value as stored in a [`crate::Style`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    HAlignment(HAlignment),
    VAlignment(VAlignment),
    Value(Value),
    TextDecoration(TextDecoration),
    FontFamilies(FontFamilies),
    Integer(i32),
    Bool(bool),
    String(String),
    OrderedListType(OrderedListType),
    Color(Color),
    Clear(Clear),
    Display(Display),
    FloatPosition(FloatPosition),
}

impl AttrValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AttrValue::HAlignment(_) => ValueType::HAlignment,
            AttrValue::VAlignment(_) => ValueType::VAlignment,
            AttrValue::Value(_) => ValueType::Value,
            AttrValue::TextDecoration(_) => ValueType::TextDecoration,
            AttrValue::FontFamilies(_) => ValueType::FontFamilies,
            AttrValue::Integer(_) => ValueType::Integer,
            AttrValue::Bool(_) => ValueType::Bool,
            AttrValue::String(_) => ValueType::String,
            AttrValue::OrderedListType(_) => ValueType::OrderedListType,
            AttrValue::Color(_) => ValueType::Color,
            AttrValue::Clear(_) => ValueType::Clear,
            AttrValue::Display(_) => ValueType::Display,
            AttrValue::FloatPosition(_) => ValueType::FloatPosition,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::HAlignment(v) => v.fmt(f),
            AttrValue::VAlignment(v) => v.fmt(f),
            AttrValue::Value(v) => v.fmt(f),
            AttrValue::TextDecoration(v) => v.fmt(f),
            AttrValue::FontFamilies(v) => f.write_str(&v.join(", ")),
            AttrValue::Integer(v) => v.fmt(f),
            AttrValue::Bool(v) => v.fmt(f),
            AttrValue::String(v) => f.write_str(v),
            AttrValue::OrderedListType(v) => match v {
                OrderedListType::Decimal => f.write_str("decimal"),
                OrderedListType::Roman { lowercase: true } => f.write_str("lower-roman"),
                OrderedListType::Roman { lowercase: false } => f.write_str("upper-roman"),
                OrderedListType::Chars(list) => write!(f, "chars({})", list),
            },
            AttrValue::Color(v) => v.fmt(f),
            AttrValue::Clear(v) => v.fmt(f),
            AttrValue::Display(v) => v.fmt(f),
            AttrValue::FloatPosition(v) => v.fmt(f),
        }
    }
}

/// Rust types that can be stored in an attribute.
///
/// `Option<T>` is an attribute type too: it describes an attribute with no
/// default (for example the hover color).
pub trait AttrType: Sized + Default {
    const VALUE_TYPE: ValueType;

    fn into_attr_value(self) -> Option<AttrValue>;

    fn from_attr_value(value: Option<&AttrValue>) -> Option<Self>;
}

macro_rules! attr_type {
    ($ty:ty, $variant:ident) => {
        impl AttrType for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn into_attr_value(self) -> Option<AttrValue> {
                Some(AttrValue::$variant(self))
            }

            fn from_attr_value(value: Option<&AttrValue>) -> Option<Self> {
                match value {
                    Some(AttrValue::$variant(v)) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

attr_type!(HAlignment, HAlignment);
attr_type!(VAlignment, VAlignment);
attr_type!(Value, Value);
attr_type!(TextDecoration, TextDecoration);
attr_type!(FontFamilies, FontFamilies);
attr_type!(i32, Integer);
attr_type!(bool, Bool);
attr_type!(String, String);
attr_type!(OrderedListType, OrderedListType);
attr_type!(Color, Color);
attr_type!(Clear, Clear);
attr_type!(Display, Display);
attr_type!(FloatPosition, FloatPosition);

impl<T: AttrType> AttrType for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;

    fn into_attr_value(self) -> Option<AttrValue> {
        self.and_then(T::into_attr_value)
    }

    fn from_attr_value(value: Option<&AttrValue>) -> Option<Self> {
        match value {
            None => Some(None),
            Some(_) => T::from_attr_value(value).map(Some),
        }
    }
}

/// Typed handle to a registered attribute.
pub struct Attribute<T> {
    ordinal: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Attribute<T> {
    pub const fn new(ordinal: usize) -> Self {
        Self {
            ordinal,
            _marker: PhantomData,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl<T> Clone for Attribute<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Attribute<T> {}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({})", self.ordinal)
    }
}

impl<T> PartialEq for Attribute<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal
    }
}

impl<T> Eq for Attribute<T> {}

/// Namespace an attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Base,
    /// Used while the pointer hovers the element.
    Hover,
}

/// Descriptor of one attribute.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub ordinal: usize,
    pub name: String,
    pub inherited: bool,
    pub value_type: ValueType,
    pub default: Option<AttrValue>,
    pub variant: Variant,
    hover: Option<usize>,
}

/// Four box sides of a margin or padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxAttribute {
    pub top: Attribute<Value>,
    pub left: Attribute<Value>,
    pub right: Attribute<Value>,
    pub bottom: Attribute<Value>,
}

/// Handles for the standard attributes.
pub mod attrs {
    use super::{Attribute, BoxAttribute, FontFamilies};
    use crate::value::*;

    // inherited
    pub const HORIZONTAL_ALIGNMENT: Attribute<HAlignment> = Attribute::new(0);
    pub const VERTICAL_ALIGNMENT: Attribute<VAlignment> = Attribute::new(1);
    pub const TEXT_INDENT: Attribute<Value> = Attribute::new(2);
    pub const TEXT_DECORATION: Attribute<TextDecoration> = Attribute::new(3);
    pub const TEXT_DECORATION_HOVER: Attribute<TextDecoration> = Attribute::new(4);
    pub const FONT_FAMILIES: Attribute<FontFamilies> = Attribute::new(5);
    pub const FONT_SIZE: Attribute<Value> = Attribute::new(6);
    pub const FONT_WEIGHT: Attribute<i32> = Attribute::new(7);
    pub const FONT_ITALIC: Attribute<bool> = Attribute::new(8);
    pub const TAB_SIZE: Attribute<i32> = Attribute::new(9);
    pub const LIST_STYLE_IMAGE: Attribute<String> = Attribute::new(10);
    pub const LIST_STYLE_TYPE: Attribute<OrderedListType> = Attribute::new(11);
    pub const PREFORMATTED: Attribute<bool> = Attribute::new(12);
    pub const BREAKWORD: Attribute<bool> = Attribute::new(13);
    pub const COLOR: Attribute<Color> = Attribute::new(14);
    pub const COLOR_HOVER: Attribute<Option<Color>> = Attribute::new(15);
    pub const INHERIT_HOVER: Attribute<bool> = Attribute::new(16);

    // not inherited
    pub const CLEAR: Attribute<Clear> = Attribute::new(17);
    pub const DISPLAY: Attribute<Display> = Attribute::new(18);
    pub const FLOAT_POSITION: Attribute<FloatPosition> = Attribute::new(19);
    pub const WIDTH: Attribute<Value> = Attribute::new(20);
    pub const HEIGHT: Attribute<Value> = Attribute::new(21);
    pub const BACKGROUND_IMAGE: Attribute<Option<String>> = Attribute::new(22);
    pub const BACKGROUND_COLOR: Attribute<Color> = Attribute::new(23);
    pub const BACKGROUND_COLOR_HOVER: Attribute<Color> = Attribute::new(24);
    pub const MARGIN_TOP: Attribute<Value> = Attribute::new(25);
    pub const MARGIN_LEFT: Attribute<Value> = Attribute::new(26);
    pub const MARGIN_RIGHT: Attribute<Value> = Attribute::new(27);
    pub const MARGIN_BOTTOM: Attribute<Value> = Attribute::new(28);
    pub const PADDING_TOP: Attribute<Value> = Attribute::new(29);
    pub const PADDING_LEFT: Attribute<Value> = Attribute::new(30);
    pub const PADDING_RIGHT: Attribute<Value> = Attribute::new(31);
    pub const PADDING_BOTTOM: Attribute<Value> = Attribute::new(32);

    pub const MARGIN: BoxAttribute = BoxAttribute {
        top: MARGIN_TOP,
        left: MARGIN_LEFT,
        right: MARGIN_RIGHT,
        bottom: MARGIN_BOTTOM,
    };
    pub const PADDING: BoxAttribute = BoxAttribute {
        top: PADDING_TOP,
        left: PADDING_LEFT,
        right: PADDING_RIGHT,
        bottom: PADDING_BOTTOM,
    };

    /// Number of standard attributes.
    pub const STANDARD_COUNT: usize = 33;
}

/// Collects attribute descriptors before freezing them into a registry.
pub struct AttributeRegistryBuilder {
    descriptors: Vec<AttributeDescriptor>,
}

impl AttributeRegistryBuilder {
    /// A builder holding the standard attributes.
    pub fn new() -> Self {
        use crate::value::Value as V;

        let mut b = Self {
            descriptors: Vec::with_capacity(attrs::STANDARD_COUNT),
        };
        b.register("horizontal-alignment", true, HAlignment::Left);
        b.register("vertical-alignment", true, VAlignment::Bottom);
        b.register("text-indent", true, V::ZERO_PX);
        b.register("text-decoration", true, TextDecoration::None);
        b.register_hover("text-decoration-hover", 3);
        b.register(
            "font-families",
            true,
            FontFamilies::from_iter([String::from("default")]),
        );
        b.register("font-size", true, V::px(14.0));
        b.register("font-weight", true, 400i32);
        b.register("font-italic", true, false);
        b.register("tab-size", true, 8i32);
        b.register("list-style-image", true, String::from("ul-bullet"));
        b.register("list-style-type", true, OrderedListType::Decimal);
        b.register("preformatted", true, false);
        b.register("break-word", true, false);
        b.register("color", true, Color::WHITE);
        b.register_hover("color-hover", 14);
        b.register("inherit-hover", true, false);

        b.register("clear", false, Clear::None);
        b.register("display", false, Display::Inline);
        b.register("float-position", false, FloatPosition::None);
        b.register("width", false, V::AUTO);
        b.register("height", false, V::AUTO);
        b.register::<Option<String>>("background-image", false, None);
        b.register("background-color", false, Color::TRANSPARENT);
        b.register_hover("background-color-hover", 23);
        for name in [
            "margin-top",
            "margin-left",
            "margin-right",
            "margin-bottom",
            "padding-top",
            "padding-left",
            "padding-right",
            "padding-bottom",
        ] {
            b.register(name, false, V::ZERO_PX);
        }
        debug_assert_eq!(b.descriptors.len(), attrs::STANDARD_COUNT);
        b
    }

    /// Append a descriptor with the next free ordinal.
    pub fn register<T: AttrType>(
        &mut self,
        name: impl Into<String>,
        inherited: bool,
        default: T,
    ) -> Attribute<T> {
        let ordinal = self.descriptors.len();
        self.descriptors.push(AttributeDescriptor {
            ordinal,
            name: name.into(),
            inherited,
            value_type: T::VALUE_TYPE,
            default: default.into_attr_value(),
            variant: Variant::Base,
            hover: None,
        });
        Attribute::new(ordinal)
    }

    /// Hover twin of the standard attribute `base`. The color twin has no
    /// default; the others share the base default.
    fn register_hover(&mut self, name: &str, base: usize) {
        let ordinal = self.descriptors.len();
        let (inherited, value_type, default) = {
            let b = &self.descriptors[base];
            let default = if b.value_type == ValueType::Color && b.inherited {
                None
            } else {
                b.default.clone()
            };
            (b.inherited, b.value_type, default)
        };
        self.descriptors[base].hover = Some(ordinal);
        self.descriptors.push(AttributeDescriptor {
            ordinal,
            name: name.to_string(),
            inherited,
            value_type,
            default,
            variant: Variant::Hover,
            hover: None,
        });
    }

    pub fn build(self) -> Arc<AttributeRegistry> {
        let by_name = self
            .descriptors
            .iter()
            .map(|d| (d.name.clone(), d.ordinal))
            .collect();
        debug!(attributes = self.descriptors.len(), "attribute registry built");
        Arc::new(AttributeRegistry {
            descriptors: self.descriptors,
            by_name,
        })
    }
}

impl Default for AttributeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable attribute table.
#[derive(Debug)]
pub struct AttributeRegistry {
    descriptors: Vec<AttributeDescriptor>,
    by_name: HashMap<String, usize>,
}

impl AttributeRegistry {
    /// Registry with only the standard attributes.
    pub fn standard() -> Arc<AttributeRegistry> {
        AttributeRegistryBuilder::new().build()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, ordinal: usize) -> CssResult<&AttributeDescriptor> {
        self.descriptors
            .get(ordinal)
            .ok_or(CssError::OutOfRange(ordinal))
    }

    pub fn by_name(&self, name: &str) -> CssResult<&AttributeDescriptor> {
        self.by_name
            .get(name)
            .map(|&ordinal| &self.descriptors[ordinal])
            .ok_or_else(|| CssError::UnknownAttribute(name.to_string()))
    }

    /// Ordinal of the hover twin of `ordinal`, if it has one.
    pub fn hover_variant(&self, ordinal: usize) -> Option<usize> {
        self.descriptors.get(ordinal).and_then(|d| d.hover)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.descriptors.iter()
    }

    /// Fail with `TypeMismatch` unless `value` fits attribute `ordinal`.
    pub fn check(&self, ordinal: usize, value: &AttrValue) -> CssResult<()> {
        let d = self.descriptor(ordinal)?;
        if d.value_type != value.value_type() {
            return Err(CssError::TypeMismatch {
                attribute: d.name.clone(),
                expected: d.value_type,
                found: value.value_type(),
            });
        }
        Ok(())
    }
}
