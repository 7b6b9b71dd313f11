//! Character and entity reference decoding.

use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref ENTITIES: HashMap<&'static str, char> = {
        let mut m = HashMap::new();
        // XML predefined
        m.insert("lt", '<');
        m.insert("gt", '>');
        m.insert("amp", '&');
        m.insert("quot", '"');
        m.insert("apos", '\'');
        // Common XHTML entities used in rich text
        m.insert("nbsp", '\u{00A0}');
        m.insert("shy", '\u{00AD}');
        m.insert("copy", '\u{00A9}');
        m.insert("reg", '\u{00AE}');
        m.insert("trade", '\u{2122}');
        m.insert("hellip", '\u{2026}');
        m.insert("mdash", '\u{2014}');
        m.insert("ndash", '\u{2013}');
        m.insert("ldquo", '\u{201C}');
        m.insert("rdquo", '\u{201D}');
        m.insert("lsquo", '\u{2018}');
        m.insert("rsquo", '\u{2019}');
        m.insert("laquo", '\u{00AB}');
        m.insert("raquo", '\u{00BB}');
        m.insert("bull", '\u{2022}');
        m.insert("middot", '\u{00B7}');
        m.insert("times", '\u{00D7}');
        m.insert("divide", '\u{00F7}');
        m.insert("euro", '\u{20AC}');
        m.insert("pound", '\u{00A3}');
        m.insert("yen", '\u{00A5}');
        m.insert("cent", '\u{00A2}');
        m.insert("deg", '\u{00B0}');
        m.insert("plusmn", '\u{00B1}');
        m.insert("para", '\u{00B6}');
        m.insert("sect", '\u{00A7}');
        m.insert("frac12", '\u{00BD}');
        m.insert("frac14", '\u{00BC}');
        m.insert("frac34", '\u{00BE}');
        m.insert("larr", '\u{2190}');
        m.insert("rarr", '\u{2192}');
        m.insert("uarr", '\u{2191}');
        m.insert("darr", '\u{2193}');
        m
    };
}

/// Longest reference name considered before giving up.
const MAX_REFERENCE_LEN: usize = 32;

/// The character a named reference stands for.
pub fn lookup(name: &str) -> Option<char> {
    ENTITIES.get(name).copied()
}

/// Replace `&name;`, `&#nnn;` and `&#xhh;` references in `input`.
///
/// References that do not resolve are copied through unchanged.
pub fn decode(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let name_len = after
            .char_indices()
            .take_while(|&(i, c)| i < MAX_REFERENCE_LEN && (c.is_ascii_alphanumeric() || c == '#'))
            .count();
        let name = &after[..name_len];
        let terminated = after[name_len..].starts_with(';');

        let decoded = if terminated && !name.is_empty() {
            match name.strip_prefix('#') {
                Some(number) => decode_numeric(number),
                None => lookup(name),
            }
        } else {
            None
        };

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &after[name_len + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_numeric(number: &str) -> Option<char> {
    let code_point = match number.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => number.parse().ok()?,
    };
    char::from_u32(code_point)
}
