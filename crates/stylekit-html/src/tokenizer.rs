//! XHTML tokenizer.
//!
//! A pull tokenizer over an in-memory document. Each call to
//! [`Tokenizer::next_token`] yields one tag, text run or comment. Doctype
//! declarations and processing instructions (`<?xml ...?>`) are consumed
//! silently; CDATA sections come out as raw text.

use tracing::trace;

use crate::entities;
use crate::{ParseError, ParseResult};

/// Token types emitted by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Start tag, e.g. `<div class="a">` or `<br/>`.
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    /// End tag, e.g. `</div>`.
    EndTag { name: String },
    /// Character data with references decoded.
    Text(String),
    Comment(String),
}

impl Token {
    /// Value of attribute `name` on a start tag.
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Token::StartTag { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Token::StartTag { name, .. } | Token::EndTag { name } => Some(name),
            _ => None,
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

/// XHTML tokenizer.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    token_line: usize,
    token_column: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
        }
    }

    /// Line and column (1-based) where the last returned token started.
    pub fn position(&self) -> (usize, usize) {
        (self.token_line, self.token_column)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Move over the next `len` bytes, tracking line and column.
    fn advance(&mut self, len: usize) {
        for c in self.input[self.pos..self.pos + len].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += len;
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.advance(c.len_utf8());
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        let len = self.rest().len() - self.rest().trim_start().len();
        self.advance(len);
    }

    /// Text up to `delimiter`, consuming the delimiter too.
    fn take_until(&mut self, delimiter: &str, context: &'static str) -> ParseResult<&'a str> {
        let rest = self.rest();
        match rest.find(delimiter) {
            Some(end) => {
                self.advance(end + delimiter.len());
                Ok(&rest[..end])
            }
            None => {
                self.advance(rest.len());
                Err(ParseError::UnexpectedEof(context))
            }
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn read_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(c) if is_name_start(c) => {}
            Some(c) => return Err(self.syntax_error(format!("unexpected character '{}'", c))),
            None => return Err(ParseError::UnexpectedEof("tag")),
        }
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(_, c)| !is_name_char(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.advance(len);
        Ok(rest[..len].to_ascii_lowercase())
    }

    fn read_attr_value(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let raw = self.take_until(if quote == '"' { "\"" } else { "'" }, "attribute value")?;
                Ok(entities::decode(raw))
            }
            Some(_) => {
                let rest = self.rest();
                let mut len = 0;
                for (i, c) in rest.char_indices() {
                    if c.is_whitespace() || c == '>' || rest[i..].starts_with("/>") {
                        break;
                    }
                    len = i + c.len_utf8();
                }
                if len == 0 {
                    return Err(self.syntax_error("missing attribute value"));
                }
                self.advance(len);
                Ok(entities::decode(&rest[..len]))
            }
            None => Err(ParseError::UnexpectedEof("attribute value")),
        }
    }

    fn start_tag(&mut self) -> ParseResult<Token> {
        self.bump();
        let name = self.read_name()?;
        let mut attrs: Vec<(String, String)> = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            match self.peek() {
                Some('>') => {
                    self.bump();
                    break false;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() != Some('>') {
                        return Err(self.syntax_error("expected '>' after '/'"));
                    }
                    self.bump();
                    break true;
                }
                Some(c) if is_name_start(c) => {
                    let attr = self.read_name()?;
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        self.read_attr_value()?
                    } else {
                        String::new()
                    };
                    if attrs.iter().any(|(n, _)| *n == attr) {
                        return Err(self.syntax_error(format!("duplicate attribute '{}'", attr)));
                    }
                    attrs.push((attr, value));
                }
                Some(c) => {
                    return Err(self.syntax_error(format!("unexpected character '{}' in <{}>", c, name)))
                }
                None => return Err(ParseError::UnexpectedEof("start tag")),
            }
        };
        Ok(Token::StartTag {
            name,
            attrs,
            self_closing,
        })
    }

    fn end_tag(&mut self) -> ParseResult<Token> {
        self.advance(2);
        let name = self.read_name()?;
        self.skip_whitespace();
        match self.bump() {
            Some('>') => Ok(Token::EndTag { name }),
            Some(c) => Err(self.syntax_error(format!("unexpected character '{}' in </{}>", c, name))),
            None => Err(ParseError::UnexpectedEof("end tag")),
        }
    }

    /// Skip `<!DOCTYPE ...>`, including a bracketed internal subset.
    fn skip_declaration(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(ParseError::UnexpectedEof("declaration"))
    }

    /// The next token, or `None` at end of input.
    pub fn next_token(&mut self) -> ParseResult<Option<Token>> {
        loop {
            if self.pos >= self.input.len() {
                return Ok(None);
            }
            self.token_line = self.line;
            self.token_column = self.column;
            let rest = self.rest();

            let token = if !rest.starts_with('<') {
                let len = rest.find('<').unwrap_or(rest.len());
                self.advance(len);
                Token::Text(entities::decode(&rest[..len]))
            } else if rest.starts_with("<!--") {
                self.advance(4);
                Token::Comment(self.take_until("-->", "comment")?.to_string())
            } else if rest.starts_with("<![CDATA[") {
                self.advance(9);
                Token::Text(self.take_until("]]>", "CDATA section")?.to_string())
            } else if rest.starts_with("<!") {
                self.skip_declaration()?;
                continue;
            } else if rest.starts_with("<?") {
                self.take_until("?>", "processing instruction")?;
                continue;
            } else if rest.starts_with("</") {
                self.end_tag()?
            } else {
                self.start_tag()?
            };

            trace!(line = self.token_line, column = self.token_column, ?token, "xhtml token");
            return Ok(Some(token));
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = ParseResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.pos = self.input.len();
                Some(Err(e))
            }
        }
    }
}

/// Tokenize a whole document.
pub fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    Tokenizer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    fn end(name: &str) -> Token {
        Token::EndTag {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_simple_tags() {
        let tokens = tokenize("<div><p>Hello</p></div>").unwrap();
        assert_eq!(
            tokens,
            vec![
                start("div"),
                start("p"),
                Token::Text("Hello".into()),
                end("p"),
                end("div")
            ]
        );
    }

    #[test]
    fn test_self_closing_tag() {
        let tokens = tokenize("<br/><img src=\"a.png\" />").unwrap();
        assert!(matches!(
            tokens[0],
            Token::StartTag { ref name, self_closing: true, .. } if name == "br"
        ));
        assert!(matches!(tokens[1], Token::StartTag { self_closing: true, .. }));
        assert_eq!(tokens[1].attr("src"), Some("a.png"));
    }

    #[test]
    fn test_attributes() {
        let tokens =
            tokenize("<td colspan=2 class='x y' style=\"color: red; font: 'A B'\">").unwrap();
        let tag = &tokens[0];
        assert_eq!(tag.attr("colspan"), Some("2"));
        assert_eq!(tag.attr("class"), Some("x y"));
        assert_eq!(tag.attr("style"), Some("color: red; font: 'A B'"));
        assert_eq!(tag.attr("missing"), None);
    }

    #[test]
    fn test_attribute_order_and_empty_value() {
        let tokens = tokenize("<button name=\"go\" disabled value=\"1\">").unwrap();
        if let Token::StartTag { attrs, .. } = &tokens[0] {
            let names: Vec<_> = attrs.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, vec!["name", "disabled", "value"]);
        } else {
            panic!("Expected StartTag");
        }
        assert_eq!(tokens[0].attr("disabled"), Some(""));
    }

    #[test]
    fn test_entities_decoded() {
        let tokens = tokenize("<a href=\"?a=1&amp;b=2\">x &lt; y&nbsp;z</a>").unwrap();
        assert_eq!(tokens[0].attr("href"), Some("?a=1&b=2"));
        assert_eq!(tokens[1], Token::Text("x < y\u{00A0}z".into()));
    }

    #[test]
    fn test_declarations_skipped() {
        let doc = "<?xml version=\"1.0\"?>\n<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" [ <!ENTITY x \"y\"> ]><html/>";
        let tokens = tokenize(doc).unwrap();
        assert_eq!(tokens[0], Token::Text("\n".into()));
        assert!(matches!(tokens[1], Token::StartTag { ref name, self_closing: true, .. } if name == "html"));
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_comment_and_cdata() {
        let tokens = tokenize("<!-- a <b> -->x<![CDATA[<raw> &amp;]]>").unwrap();
        assert_eq!(tokens[0], Token::Comment(" a <b> ".into()));
        assert_eq!(tokens[1], Token::Text("x".into()));
        assert_eq!(tokens[2], Token::Text("<raw> &amp;".into()));
    }

    #[test]
    fn test_names_lowercased() {
        let tokens = tokenize("<DIV ID=\"a\"></Div>").unwrap();
        assert_eq!(tokens[0].name(), Some("div"));
        assert_eq!(tokens[0].attr("id"), Some("a"));
        assert_eq!(tokens[1], end("div"));
    }

    #[test]
    fn test_malformed_tag() {
        let err = tokenize("<p>\n  <div<p>").unwrap_err();
        match err {
            ParseError::Syntax { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 7);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(matches!(tokenize("< p>"), Err(ParseError::Syntax { .. })));
        assert!(matches!(tokenize("<a x=\"1\" x=\"2\">"), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_unexpected_eof() {
        assert!(matches!(tokenize("<p class=\"a"), Err(ParseError::UnexpectedEof(_))));
        assert!(matches!(tokenize("<!-- open"), Err(ParseError::UnexpectedEof("comment"))));
        assert!(matches!(tokenize("<p"), Err(ParseError::UnexpectedEof(_))));
    }

    #[test]
    fn test_position_tracking() {
        let mut tokenizer = Tokenizer::new("<html>\n  <body>");
        tokenizer.next_token().unwrap();
        assert_eq!(tokenizer.position(), (1, 1));
        tokenizer.next_token().unwrap();
        assert_eq!(tokenizer.position(), (1, 7));
        tokenizer.next_token().unwrap();
        assert_eq!(tokenizer.position(), (2, 3));
        assert_eq!(tokenizer.next_token().unwrap(), None);
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut tokenizer = Tokenizer::new("<p>a</p <q>");
        assert!(tokenizer.next().unwrap().is_ok());
        assert!(tokenizer.next().unwrap().is_ok());
        assert!(tokenizer.next().unwrap().is_err());
        assert!(tokenizer.next().is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").unwrap().is_empty());
    }
}
