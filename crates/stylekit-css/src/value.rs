//! Typed attribute values: lengths, colors and keyword enums.

use std::fmt;

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Unit of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Px,
    Pt,
    /// Relative to the font size.
    Em,
    /// Relative to the x-height of the font.
    Ex,
    Percent,
    Auto,
}

impl Unit {
    /// Whether the unit can only be resolved once the font is known.
    pub fn is_font_based(self) -> bool {
        matches!(self, Unit::Em | Unit::Ex)
    }

    pub fn postfix(self) -> &'static str {
        match self {
            Unit::Px => "px",
            Unit::Pt => "pt",
            Unit::Em => "em",
            Unit::Ex => "ex",
            Unit::Percent => "%",
            Unit::Auto => "auto",
        }
    }
}

/// A number with a unit, e.g. `1.5em`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    pub value: f32,
    pub unit: Unit,
}

impl Value {
    pub const ZERO_PX: Value = Value {
        value: 0.0,
        unit: Unit::Px,
    };
    pub const AUTO: Value = Value {
        value: 0.0,
        unit: Unit::Auto,
    };

    pub fn new(value: f32, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn px(value: f32) -> Self {
        Self::new(value, Unit::Px)
    }

    /// Compute the absolute pixel value.
    pub fn to_px(&self, font_size: f32, x_height: f32, container_size: f32) -> f32 {
        match self.unit {
            Unit::Px => self.value,
            Unit::Pt => self.value * 4.0 / 3.0,
            Unit::Em => self.value * font_size,
            Unit::Ex => self.value * x_height,
            Unit::Percent => self.value / 100.0 * container_size,
            Unit::Auto => 0.0,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO_PX
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit == Unit::Auto {
            return f.write_str("auto");
        }
        write!(f, "{}{}", self.value, self.unit.postfix())
    }
}

/// An ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::from_argb(0);
    pub const BLACK: Color = Color::from_argb(0xFF000000);
    pub const WHITE: Color = Color::from_argb(0xFFFFFFFF);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { a, r, g, b }
    }

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 255, r, g, b }
    }

    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub fn argb(&self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Look up a named color, ignoring case.
    pub fn by_name(name: &str) -> Option<Color> {
        NAMED_COLORS.get(name.to_ascii_lowercase().as_str()).copied()
    }

    /// Parse `#rgb`, `#argb`, `#rrggbb`, `#aarrggbb` or a color name.
    pub fn parse(value: &str) -> Option<Color> {
        let Some(hex) = value.strip_prefix('#') else {
            return Color::by_name(value);
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let n = u32::from_str_radix(hex, 16).ok()?;
        let nibble = |shift: u32| ((n >> shift) & 0xF) * 0x11;
        match hex.len() {
            3 => Some(Color::from_argb(
                0xFF000000 | nibble(8) << 16 | nibble(4) << 8 | nibble(0),
            )),
            4 => Some(Color::from_argb(
                nibble(12) << 24 | nibble(8) << 16 | nibble(4) << 8 | nibble(0),
            )),
            6 => Some(Color::from_argb(0xFF000000 | n)),
            8 => Some(Color::from_argb(n)),
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:06x}", self.argb() & 0xFFFFFF)
        } else {
            write!(f, "#{:08x}", self.argb())
        }
    }
}

lazy_static! {
    static ref NAMED_COLORS: HashMap<&'static str, Color> = {
        let mut m = HashMap::new();
        for (name, argb) in [
            ("black", 0xFF000000),
            ("silver", 0xFFC0C0C0),
            ("gray", 0xFF808080),
            ("white", 0xFFFFFFFF),
            ("maroon", 0xFF800000),
            ("red", 0xFFFF0000),
            ("purple", 0xFF800080),
            ("fuchsia", 0xFFFF00FF),
            ("green", 0xFF008000),
            ("lime", 0xFF00FF00),
            ("olive", 0xFF808000),
            ("orange", 0xFFFFA500),
            ("yellow", 0xFFFFFF00),
            ("navy", 0xFF000080),
            ("blue", 0xFF0000FF),
            ("teal", 0xFF008080),
            ("aqua", 0xFF00FFFF),
            ("skyblue", 0xFF87CEEB),
            ("lightblue", 0xFFADD8E6),
            ("lightcoral", 0xFFF08080),
            ("lightcyan", 0xFFE0FFFF),
            ("lightgray", 0xFFD3D3D3),
            ("lightgreen", 0xFF90EE90),
            ("lightpink", 0xFFFFB6C1),
            ("lightsalmon", 0xFFFFA07A),
            ("lightskyblue", 0xFF87CEFA),
            ("lightyellow", 0xFFFFFFE0),
            ("transparent", 0x00000000),
        ] {
            m.insert(name, Color::from_argb(argb));
        }
        m
    };
}

/// Generates a keyword enum with a case-insensitive `from_keyword`.
macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $kw:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn from_keyword(keyword: &str) -> Option<Self> {
                $(if keyword.eq_ignore_ascii_case($kw) {
                    return Some($name::$variant);
                })+
                None
            }

            pub fn keyword(self) -> &'static str {
                match self {
                    $($name::$variant => $kw),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.keyword())
            }
        }
    };
}

keyword_enum! {
    /// `text-align`
    HAlignment {
        #[default]
        Left => "left",
        Right => "right",
        Center => "center",
        Justify => "justify",
    }
}

keyword_enum! {
    /// `vertical-align`
    VAlignment {
        Top => "top",
        Middle => "middle",
        #[default]
        Bottom => "bottom",
        Fill => "fill",
    }
}

keyword_enum! {
    Display {
        #[default]
        Inline => "inline",
        Block => "block",
    }
}

keyword_enum! {
    Clear {
        #[default]
        None => "none",
        Left => "left",
        Right => "right",
        Both => "both",
    }
}

keyword_enum! {
    /// `float`
    FloatPosition {
        #[default]
        None => "none",
        Left => "left",
        Right => "right",
    }
}

keyword_enum! {
    TextDecoration {
        #[default]
        None => "none",
        Underline => "underline",
        LineThrough => "line-through",
    }
}

/// Largest number [`OrderedListType::Roman`] renders as a numeral.
pub const MAX_ROMAN: i32 = 39999;

const ROMAN: [(i32, &str); 17] = [
    (10000, "ↂ"),
    (9000, "Mↂ"),
    (5000, "ↁ"),
    (4000, "Mↁ"),
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Numbering scheme of an ordered list (`list-style-type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderedListType {
    #[default]
    Decimal,
    Roman {
        lowercase: bool,
    },
    /// Bijective numbering over a character list (`a`..`z`, `aa`, ...).
    Chars(&'static str),
}

impl OrderedListType {
    /// Look up a `list-style-type` keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        LIST_TYPES
            .get(keyword.to_ascii_lowercase().as_str())
            .copied()
    }

    /// Render list item number `nr`. Numbers the scheme cannot express fall
    /// back to decimal.
    pub fn format(&self, nr: i32) -> String {
        match *self {
            OrderedListType::Decimal => nr.to_string(),
            OrderedListType::Roman { lowercase } => {
                if !(1..=MAX_ROMAN).contains(&nr) {
                    return nr.to_string();
                }
                let mut out = String::new();
                let mut rest = nr;
                for (value, numeral) in ROMAN {
                    while rest >= value {
                        out.push_str(numeral);
                        rest -= value;
                    }
                }
                if lowercase {
                    out.to_lowercase()
                } else {
                    out
                }
            }
            OrderedListType::Chars(list) => {
                if nr < 1 {
                    return nr.to_string();
                }
                let chars: Vec<char> = list.chars().collect();
                let n = chars.len() as i32;
                let mut rest = nr;
                let mut out = Vec::new();
                loop {
                    rest -= 1;
                    out.push(chars[(rest % n) as usize]);
                    rest /= n;
                    if rest == 0 {
                        break;
                    }
                }
                out.iter().rev().collect()
            }
        }
    }
}

const UPPER_ALPHA: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER_ALPHA: &str = "abcdefghijklmnopqrstuvwxyz";

lazy_static! {
    static ref LIST_TYPES: HashMap<&'static str, OrderedListType> = {
        let mut m = HashMap::new();
        m.insert("decimal", OrderedListType::Decimal);
        m.insert("upper-alpha", OrderedListType::Chars(UPPER_ALPHA));
        m.insert("lower-alpha", OrderedListType::Chars(LOWER_ALPHA));
        m.insert("upper-latin", OrderedListType::Chars(UPPER_ALPHA));
        m.insert("lower-latin", OrderedListType::Chars(LOWER_ALPHA));
        m.insert("upper-roman", OrderedListType::Roman { lowercase: false });
        m.insert("lower-roman", OrderedListType::Roman { lowercase: true });
        m.insert("lower-greek", OrderedListType::Chars("αβγδεζηθικλμνξοπρστυφχψω"));
        m.insert(
            "upper-norwegian",
            OrderedListType::Chars("ABCDEFGHIJKLMNOPQRSTUVWXYZÆØÅ"),
        );
        m.insert(
            "lower-norwegian",
            OrderedListType::Chars("abcdefghijklmnopqrstuvwxyzæøå"),
        );
        m.insert(
            "upper-russian-short",
            OrderedListType::Chars("АБВГДЕЖЗИКЛМНОПРСТУФХЦЧШЩЭЮЯ"),
        );
        m.insert(
            "lower-russian-short",
            OrderedListType::Chars("абвгдежзиклмнопрстуфхцчшщэюя"),
        );
        m
    };
}
