//! `property: value` declarations to typed attribute writes.

use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing::{trace, warn};

use crate::attribute::{attrs, AttrType, Attribute, AttributeRegistry, BoxAttribute, FontFamilies};
use crate::style::Style;
use crate::value::{
    Clear, Color, Display, FloatPosition, HAlignment, OrderedListType, TextDecoration, Unit,
    VAlignment, Value,
};
use crate::{CssError, CssResult};

lazy_static! {
    static ref PRE: HashMap<&'static str, bool> = HashMap::from([("pre", true), ("normal", false)]);
    static ref BREAKWORD: HashMap<&'static str, bool> =
        HashMap::from([("normal", false), ("break-word", true)]);
    static ref ITALIC: HashMap<&'static str, bool> =
        HashMap::from([("normal", false), ("italic", true), ("oblique", true)]);
    static ref WEIGHTS: HashMap<&'static str, i32> =
        HashMap::from([("normal", 400), ("bold", 700)]);
    static ref INHERIT_HOVER: HashMap<&'static str, bool> =
        HashMap::from([("inherit", true), ("normal", false)]);
}

/// A declaration that could not be applied.
#[derive(Debug)]
pub struct Diagnostic {
    pub property: String,
    pub value: String,
    pub error: CssError,
}

fn malformed(what: impl Into<String>) -> CssError {
    CssError::MalformedValue(what.into())
}

fn lookup<T: Copy>(table: &HashMap<&'static str, T>, value: &str) -> CssResult<T> {
    table
        .get(value.to_ascii_lowercase().as_str())
        .copied()
        .ok_or_else(|| malformed(format!("unknown keyword '{}'", value)))
}

fn keyword<T>(parse: impl Fn(&str) -> Option<T>, value: &str) -> CssResult<T> {
    parse(value).ok_or_else(|| malformed(format!("unknown keyword '{}'", value)))
}

/// Parse `12px`, `1.5em`, `50%`, `0` or `auto`.
pub fn parse_value_unit(value: &str) -> CssResult<Value> {
    let value = value.trim();
    if value == "0" {
        return Ok(Value::ZERO_PX);
    }
    if value.eq_ignore_ascii_case("auto") {
        return Ok(Value::AUTO);
    }
    let (number, unit) = if let Some(n) = value.strip_suffix("px") {
        (n, Unit::Px)
    } else if let Some(n) = value.strip_suffix("pt") {
        (n, Unit::Pt)
    } else if let Some(n) = value.strip_suffix("em") {
        (n, Unit::Em)
    } else if let Some(n) = value.strip_suffix("ex") {
        (n, Unit::Ex)
    } else if let Some(n) = value.strip_suffix('%') {
        (n, Unit::Percent)
    } else {
        return Err(malformed(format!("unknown numeric suffix: {}", value)));
    };
    let number: f32 = number
        .trim()
        .parse()
        .map_err(|_| malformed(format!("not a number: {}", value)))?;
    Ok(Value::new(number, unit))
}

/// Parse a whitespace separated list of values.
pub fn parse_value_units(value: &str) -> CssResult<Vec<Value>> {
    value.split_whitespace().map(parse_value_unit).collect()
}

/// Parse a color: `rgb(...)`, `rgba(...)`, hex or name.
pub fn parse_color(value: &str) -> CssResult<Color> {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix("rgb(").and_then(|v| v.strip_suffix(')')) {
        let c = parse_rgba(inner, 3)?;
        return Ok(Color::new(c[0], c[1], c[2], 255));
    }
    if let Some(inner) = value.strip_prefix("rgba(").and_then(|v| v.strip_suffix(')')) {
        let c = parse_rgba(inner, 4)?;
        return Ok(Color::new(c[0], c[1], c[2], c[3]));
    }
    Color::parse(value).ok_or_else(|| malformed(format!("unknown color: {}", value)))
}

fn parse_rgba(value: &str, count: usize) -> CssResult<Vec<u8>> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != count {
        return Err(malformed(format!(
            "{} color components required, got {}",
            count,
            parts.len()
        )));
    }
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let bad = || malformed(format!("bad color component: {}", part));
            let v = if i == 3 {
                let alpha: f32 = part.parse().map_err(|_| bad())?;
                (alpha * 255.0).round() as i64
            } else if let Some(pct) = part.strip_suffix('%') {
                let pct: i64 = pct.trim().parse().map_err(|_| bad())?;
                255 * pct / 100
            } else {
                part.parse::<i64>().map_err(|_| bad())?
            };
            Ok(v.clamp(0, 255) as u8)
        })
        .collect()
}

/// Remove a `url(...)` wrapper and the quotes around its argument.
pub fn strip_url(value: &str) -> &str {
    let value = value.trim();
    match value.strip_prefix("url(").and_then(|v| v.strip_suffix(')')) {
        Some(inner) => strip_quotes(inner.trim()),
        None => value,
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse a comma separated list of optionally quoted strings.
pub fn parse_list(value: &str) -> CssResult<FontFamilies> {
    let mut out = FontFamilies::new();
    let mut rest = value.trim_start();
    while !rest.is_empty() {
        let first = rest.chars().next().unwrap_or(',');
        let (item, tail) = if first == '"' || first == '\'' {
            let body = &rest[1..];
            let end = body
                .find(first)
                .ok_or_else(|| malformed(format!("unterminated string in list: {}", value)))?;
            let tail = body[end + 1..].trim_start();
            if !tail.is_empty() && !tail.starts_with(',') {
                return Err(malformed(format!("',' expected in list: {}", value)));
            }
            (&body[..end], tail)
        } else {
            match rest.find(',') {
                Some(end) => (rest[..end].trim(), &rest[end..]),
                None => (rest.trim(), ""),
            }
        };
        if !item.is_empty() {
            out.push(item.to_string());
        }
        rest = tail.strip_prefix(',').unwrap_or(tail).trim_start();
    }
    Ok(out)
}

fn set<T: AttrType>(
    registry: &AttributeRegistry,
    style: &mut Style,
    attribute: Attribute<T>,
    value: T,
) -> CssResult<()> {
    style.set(registry, attribute, value)
}

fn apply_box(
    registry: &AttributeRegistry,
    style: &mut Style,
    property: &str,
    side: &str,
    value: &str,
    b: BoxAttribute,
) -> CssResult<()> {
    let single = |attr| -> CssResult<(Attribute<Value>, Value)> { Ok((attr, parse_value_unit(value)?)) };
    let writes: Vec<(Attribute<Value>, Value)> = match side {
        "-top" => vec![single(b.top)?],
        "-left" => vec![single(b.left)?],
        "-right" => vec![single(b.right)?],
        "-bottom" => vec![single(b.bottom)?],
        "" => {
            let v = parse_value_units(value)?;
            match v.as_slice() {
                [all] => vec![(b.top, *all), (b.left, *all), (b.right, *all), (b.bottom, *all)],
                [tb, lr] => vec![(b.top, *tb), (b.left, *lr), (b.right, *lr), (b.bottom, *tb)],
                [t, lr, bottom] => {
                    vec![(b.top, *t), (b.left, *lr), (b.right, *lr), (b.bottom, *bottom)]
                }
                [t, r, bottom, l] => {
                    vec![(b.top, *t), (b.left, *l), (b.right, *r), (b.bottom, *bottom)]
                }
                _ => {
                    return Err(malformed(format!(
                        "invalid number of box values: {}",
                        v.len()
                    )))
                }
            }
        }
        _ => return Err(CssError::UnknownProperty(property.to_string())),
    };
    for (attr, v) in writes {
        set(registry, style, attr, v)?;
    }
    Ok(())
}

/// Split off the first space separated word.
fn split_word(value: &str) -> (&str, &str) {
    match value.find(' ') {
        Some(end) => (&value[..end], value[end..].trim_start()),
        None => (value, ""),
    }
}

fn apply_font(
    registry: &AttributeRegistry,
    style: &mut Style,
    property: &str,
    value: &str,
) -> CssResult<()> {
    match property {
        "font-family" => {
            let families = parse_list(value)?;
            if families.is_empty() {
                return Err(malformed("empty font family list"));
            }
            set(registry, style, attrs::FONT_FAMILIES, families)
        }
        "font-weight" => {
            let weight = match lookup(&*WEIGHTS, value) {
                Ok(w) => w,
                Err(_) => value
                    .parse()
                    .map_err(|_| malformed(format!("bad font weight: {}", value)))?,
            };
            set(registry, style, attrs::FONT_WEIGHT, weight)
        }
        "font-size" => set(registry, style, attrs::FONT_SIZE, parse_value_unit(value)?),
        "font-style" => set(registry, style, attrs::FONT_ITALIC, lookup(&*ITALIC, value)?),
        "font" => {
            // parse every part before writing any of them
            let mut rest = value.trim();
            let (word, tail) = split_word(rest);
            let weight = lookup(&*WEIGHTS, word).ok();
            if weight.is_some() {
                rest = tail;
            }
            let (word, tail) = split_word(rest);
            let italic = lookup(&*ITALIC, word).ok();
            if italic.is_some() {
                rest = tail;
            }
            let mut size = None;
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                let (word, tail) = split_word(rest);
                size = Some(parse_value_unit(word)?);
                rest = tail;
            }
            let families = parse_list(rest)?;

            if let Some(weight) = weight {
                set(registry, style, attrs::FONT_WEIGHT, weight)?;
            }
            if let Some(italic) = italic {
                set(registry, style, attrs::FONT_ITALIC, italic)?;
            }
            if let Some(size) = size {
                set(registry, style, attrs::FONT_SIZE, size)?;
            }
            if !families.is_empty() {
                set(registry, style, attrs::FONT_FAMILIES, families)?;
            }
            Ok(())
        }
        _ => Err(CssError::UnknownProperty(property.to_string())),
    }
}

/// Apply one declaration to `style`.
pub fn apply(
    registry: &AttributeRegistry,
    style: &mut Style,
    property: &str,
    value: &str,
) -> CssResult<()> {
    let value = value.trim();
    trace!(property, value, "apply declaration");
    if value.is_empty() {
        return Err(malformed(format!("empty value for '{}'", property)));
    }
    if let Some(side) = property.strip_prefix("margin") {
        return apply_box(registry, style, property, side, value, attrs::MARGIN);
    }
    if let Some(side) = property.strip_prefix("padding") {
        return apply_box(registry, style, property, side, value, attrs::PADDING);
    }
    if property.starts_with("font") {
        return apply_font(registry, style, property, value);
    }
    match property {
        "text-indent" => set(registry, style, attrs::TEXT_INDENT, parse_value_unit(value)?),
        "-twl-font" => set(
            registry,
            style,
            attrs::FONT_FAMILIES,
            FontFamilies::from_iter([value.to_string()]),
        ),
        "-twl-hover" => set(registry, style, attrs::INHERIT_HOVER, lookup(&*INHERIT_HOVER, value)?),
        "text-align" => set(
            registry,
            style,
            attrs::HORIZONTAL_ALIGNMENT,
            keyword(HAlignment::from_keyword, value)?,
        ),
        "text-decoration" => set(
            registry,
            style,
            attrs::TEXT_DECORATION,
            keyword(TextDecoration::from_keyword, value)?,
        ),
        "vertical-align" => set(
            registry,
            style,
            attrs::VERTICAL_ALIGNMENT,
            keyword(VAlignment::from_keyword, value)?,
        ),
        "white-space" => set(registry, style, attrs::PREFORMATTED, lookup(&*PRE, value)?),
        "word-wrap" => set(registry, style, attrs::BREAKWORD, lookup(&*BREAKWORD, value)?),
        "list-style-image" => set(
            registry,
            style,
            attrs::LIST_STYLE_IMAGE,
            strip_url(value).to_string(),
        ),
        "list-style-type" => set(
            registry,
            style,
            attrs::LIST_STYLE_TYPE,
            keyword(OrderedListType::from_keyword, value)?,
        ),
        "clear" => set(registry, style, attrs::CLEAR, keyword(Clear::from_keyword, value)?),
        "float" => set(
            registry,
            style,
            attrs::FLOAT_POSITION,
            keyword(FloatPosition::from_keyword, value)?,
        ),
        "display" => set(registry, style, attrs::DISPLAY, keyword(Display::from_keyword, value)?),
        "width" => set(registry, style, attrs::WIDTH, parse_value_unit(value)?),
        "height" => set(registry, style, attrs::HEIGHT, parse_value_unit(value)?),
        "background-image" => set(
            registry,
            style,
            attrs::BACKGROUND_IMAGE,
            Some(strip_url(value).to_string()),
        ),
        "background-color" | "-twl-background-color" => {
            set(registry, style, attrs::BACKGROUND_COLOR, parse_color(value)?)
        }
        "color" => set(registry, style, attrs::COLOR, parse_color(value)?),
        "tab-size" | "-moz-tab-size" => {
            if value == "inherit" {
                style.remove(attrs::TAB_SIZE.ordinal());
                Ok(())
            } else {
                let size: i32 = value
                    .parse()
                    .map_err(|_| malformed(format!("bad tab size: {}", value)))?;
                set(registry, style, attrs::TAB_SIZE, size)
            }
        }
        _ => Err(CssError::UnknownProperty(property.to_string())),
    }
}

/// Split inline style text into `(property, value)` pairs. Separators inside
/// quotes are kept. Segments without a `:` yield an empty property.
fn split_inline(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut quote = None;
    let mut start = 0;
    fn push<'a>(out: &mut Vec<(&'a str, &'a str)>, segment: &'a str) {
        let segment = segment.trim();
        if segment.is_empty() {
            return;
        }
        match segment.split_once(':') {
            Some((k, v)) => out.push((k.trim(), v.trim())),
            None => out.push(("", segment)),
        }
    }
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ';') => {
                push(&mut out, &text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&mut out, &text[start..]);
    out
}

/// Apply an inline `style="..."` attribute. A failing declaration is skipped
/// and reported; the others still apply.
pub fn apply_inline(registry: &AttributeRegistry, style: &mut Style, text: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (property, value) in split_inline(text) {
        let result = if property.is_empty() {
            Err(malformed(format!("missing ':' in '{}'", value)))
        } else {
            apply(registry, style, property, value)
        };
        if let Err(error) = result {
            warn!(property, value, %error, "skipping inline declaration");
            diagnostics.push(Diagnostic {
                property: property.to_string(),
                value: value.to_string(),
                error,
            });
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> Arc<AttributeRegistry> {
        AttributeRegistry::standard()
    }

    fn applied(property: &str, value: &str) -> Style {
        let registry = registry();
        let mut style = Style::new();
        apply(&registry, &mut style, property, value).unwrap();
        style
    }

    #[test]
    fn test_value_units() {
        assert_eq!(parse_value_unit("10px").unwrap(), Value::px(10.0));
        assert_eq!(parse_value_unit("1.5em").unwrap(), Value::new(1.5, Unit::Em));
        assert_eq!(parse_value_unit("2ex").unwrap(), Value::new(2.0, Unit::Ex));
        assert_eq!(parse_value_unit("12pt").unwrap(), Value::new(12.0, Unit::Pt));
        assert_eq!(parse_value_unit("50%").unwrap(), Value::new(50.0, Unit::Percent));
        assert_eq!(parse_value_unit("0").unwrap(), Value::ZERO_PX);
        assert_eq!(parse_value_unit("auto").unwrap(), Value::AUTO);
        assert!(matches!(parse_value_unit("10vw"), Err(CssError::MalformedValue(_))));
        assert!(matches!(parse_value_unit("xpx"), Err(CssError::MalformedValue(_))));
    }

    #[test]
    fn test_box_shorthand() {
        let s = applied("margin", "1px 2px 3px 4px");
        assert_eq!(s.get(attrs::MARGIN_TOP), Some(Value::px(1.0)));
        assert_eq!(s.get(attrs::MARGIN_RIGHT), Some(Value::px(2.0)));
        assert_eq!(s.get(attrs::MARGIN_BOTTOM), Some(Value::px(3.0)));
        assert_eq!(s.get(attrs::MARGIN_LEFT), Some(Value::px(4.0)));

        let s = applied("padding", "1px 2px");
        assert_eq!(s.get(attrs::PADDING_TOP), Some(Value::px(1.0)));
        assert_eq!(s.get(attrs::PADDING_BOTTOM), Some(Value::px(1.0)));
        assert_eq!(s.get(attrs::PADDING_LEFT), Some(Value::px(2.0)));
        assert_eq!(s.get(attrs::PADDING_RIGHT), Some(Value::px(2.0)));

        let s = applied("margin", "1px 2px 3px");
        assert_eq!(s.get(attrs::MARGIN_TOP), Some(Value::px(1.0)));
        assert_eq!(s.get(attrs::MARGIN_LEFT), Some(Value::px(2.0)));
        assert_eq!(s.get(attrs::MARGIN_RIGHT), Some(Value::px(2.0)));
        assert_eq!(s.get(attrs::MARGIN_BOTTOM), Some(Value::px(3.0)));

        let s = applied("margin-left", "7px");
        assert_eq!(s.get(attrs::MARGIN_LEFT), Some(Value::px(7.0)));
        assert_eq!(s.iter().count(), 1);
    }

    #[test]
    fn test_box_shorthand_bad_count() {
        let registry = registry();
        let mut style = Style::new();
        let err = apply(&registry, &mut style, "margin", "1px 2px 3px 4px 5px").unwrap_err();
        assert!(matches!(err, CssError::MalformedValue(_)));
        assert!(style.is_empty());
        assert!(matches!(
            apply(&registry, &mut style, "margin-middle", "1px"),
            Err(CssError::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_colors() {
        assert_eq!(parse_color("rgb(255, 0, 10)").unwrap(), Color::from_rgb(255, 0, 10));
        assert_eq!(parse_color("rgb(100%, 50%, 0%)").unwrap(), Color::from_rgb(255, 127, 0));
        assert_eq!(parse_color("rgb(300, -5, 0)").unwrap(), Color::from_rgb(255, 0, 0));
        assert_eq!(parse_color("rgba(1, 2, 3, 0.5)").unwrap(), Color::new(1, 2, 3, 128));
        assert_eq!(parse_color("#112233").unwrap(), Color::from_rgb(0x11, 0x22, 0x33));
        assert_eq!(parse_color("navy").unwrap(), Color::from_rgb(0, 0, 0x80));
        assert!(matches!(parse_color("rgb(1, 2)"), Err(CssError::MalformedValue(_))));
        assert!(matches!(parse_color("rgba(1, 2, 3)"), Err(CssError::MalformedValue(_))));
        assert!(matches!(parse_color("blurple"), Err(CssError::MalformedValue(_))));
    }

    #[test]
    fn test_font_shorthand() {
        let s = applied("font", "bold italic 12px \"Deja Vu\", serif");
        assert_eq!(s.get(attrs::FONT_WEIGHT), Some(700));
        assert_eq!(s.get(attrs::FONT_ITALIC), Some(true));
        assert_eq!(s.get(attrs::FONT_SIZE), Some(Value::px(12.0)));
        let families: Vec<String> = s.get(attrs::FONT_FAMILIES).unwrap().into_iter().collect();
        assert_eq!(families, vec!["Deja Vu", "serif"]);

        let s = applied("font", "10pt mono");
        assert_eq!(s.get(attrs::FONT_WEIGHT), None);
        assert_eq!(s.get(attrs::FONT_SIZE), Some(Value::new(10.0, Unit::Pt)));
    }

    #[test]
    fn test_font_longhands() {
        assert_eq!(applied("font-weight", "600").get(attrs::FONT_WEIGHT), Some(600));
        assert_eq!(applied("font-weight", "normal").get(attrs::FONT_WEIGHT), Some(400));
        assert_eq!(applied("font-style", "oblique").get(attrs::FONT_ITALIC), Some(true));
        let s = applied("font-family", "'a b' , c");
        assert_eq!(s.get(attrs::FONT_FAMILIES).unwrap().as_slice(), ["a b", "c"]);
        let s = applied("-twl-font", "title");
        assert_eq!(s.get(attrs::FONT_FAMILIES).unwrap().as_slice(), ["title"]);
    }

    #[test]
    fn test_enums_and_urls() {
        assert_eq!(
            applied("text-align", "center").get(attrs::HORIZONTAL_ALIGNMENT),
            Some(HAlignment::Center)
        );
        assert_eq!(applied("white-space", "pre").get(attrs::PREFORMATTED), Some(true));
        assert_eq!(applied("word-wrap", "break-word").get(attrs::BREAKWORD), Some(true));
        assert_eq!(applied("-twl-hover", "inherit").get(attrs::INHERIT_HOVER), Some(true));
        assert_eq!(applied("display", "block").get(attrs::DISPLAY), Some(Display::Block));
        assert_eq!(
            applied("list-style-type", "upper-roman").get(attrs::LIST_STYLE_TYPE),
            Some(OrderedListType::Roman { lowercase: false })
        );
        assert_eq!(
            applied("background-image", "url('img/bg.png')").get(attrs::BACKGROUND_IMAGE),
            Some(Some("img/bg.png".to_string()))
        );
        assert_eq!(
            applied("list-style-image", "dot").get(attrs::LIST_STYLE_IMAGE),
            Some("dot".to_string())
        );
        let registry = registry();
        let mut style = Style::new();
        assert!(matches!(
            apply(&registry, &mut style, "float", "middle"),
            Err(CssError::MalformedValue(_))
        ));
        assert!(matches!(
            apply(&registry, &mut style, "border", "1px"),
            Err(CssError::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_tab_size_inherit_clears() {
        let registry = registry();
        let mut style = Style::new();
        apply(&registry, &mut style, "tab-size", "4").unwrap();
        assert_eq!(style.get(attrs::TAB_SIZE), Some(4));
        apply(&registry, &mut style, "-moz-tab-size", "inherit").unwrap();
        assert_eq!(style.get(attrs::TAB_SIZE), None);
    }

    #[test]
    fn test_inline_recovery() {
        let registry = registry();
        let mut style = Style::new();
        let diagnostics = apply_inline(
            &registry,
            &mut style,
            "color: red; margin: 1px 2px 3px 4px 5px; bogus: 1; width: 10px; junk",
        );
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].property, "margin");
        assert!(matches!(diagnostics[0].error, CssError::MalformedValue(_)));
        assert!(matches!(diagnostics[1].error, CssError::UnknownProperty(_)));
        assert_eq!(style.get(attrs::COLOR), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(style.get(attrs::WIDTH), Some(Value::px(10.0)));
        assert_eq!(style.get(attrs::MARGIN_TOP), None);
    }

    #[test]
    fn test_failed_font_shorthand_writes_nothing() {
        let registry = registry();
        let mut style = Style::new();
        let result = apply(&registry, &mut style, "font", "bold italic 12zz Arial");
        assert!(matches!(result, Err(CssError::MalformedValue(_))));
        assert!(style.is_empty());

        let diagnostics = apply_inline(&registry, &mut style, "font: bold 1x2 serif; color: red");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].property, "font");
        assert_eq!(style.get(attrs::FONT_WEIGHT), None);
        assert_eq!(style.get(attrs::COLOR), Some(Color::from_rgb(255, 0, 0)));
    }

    #[test]
    fn test_inline_quotes_keep_separators() {
        let pairs = split_inline("font-family: 'a;b'; color: red;");
        assert_eq!(pairs, vec![("font-family", "'a;b'"), ("color", "red")]);
    }
}
