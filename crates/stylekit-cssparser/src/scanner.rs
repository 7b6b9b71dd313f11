//! Streaming CSS-subset scanner.
//!
//! The scanner is context sensitive: `:` is a pseudo-class marker inside a
//! selector but a property separator inside a block, and everything between
//! that separator and the next `;` or `}` is collected verbatim as the
//! declaration value. The lexical sub-states below track which rule set is
//! active.

use std::collections::VecDeque;
use std::fmt;
use std::io::Read;

use tracing::trace;

use crate::{ParseError, ParseResult};

/// Number of bytes pulled from the reader per refill.
const CHUNK_SIZE: usize = 4096;

/// Tokens produced by the [`Scanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// An identifier; the text is available through [`Scanner::text`].
    Ident,
    /// `*`
    Star,
    /// `.`
    Dot,
    /// `#`
    Hash,
    /// `>`
    Gt,
    /// `,`
    Comma,
    /// `{`
    StyleBegin,
    /// `}`
    StyleEnd,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `@`
    AtRule,
    /// End of input.
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Ident => "identifier",
            Token::Star => "'*'",
            Token::Dot => "'.'",
            Token::Hash => "'#'",
            Token::Gt => "'>'",
            Token::Comma => "','",
            Token::StyleBegin => "'{'",
            Token::StyleEnd => "'}'",
            Token::Colon => "':'",
            Token::Semicolon => "';'",
            Token::AtRule => "'@'",
            Token::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// Lexical sub-state of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    /// Selectors and at-rule names.
    Initial,
    /// Inside a `{ }` block, expecting property names.
    Style,
    /// Collecting a declaration value.
    Value,
    /// Inside a single-quoted string within a value.
    String1,
    /// Inside a double-quoted string within a value.
    String2,
}

/// Refillable character buffer over a byte reader.
///
/// Bytes are decoded incrementally; a multi-byte sequence split across two
/// reads is held back until the rest arrives.
struct CharSource<R> {
    reader: R,
    chars: VecDeque<char>,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: Read> CharSource<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            chars: VecDeque::new(),
            pending: Vec::new(),
            eof: false,
        }
    }

    /// Pull one more chunk. Returns `false` once the reader is exhausted.
    fn refill(&mut self) -> ParseResult<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = loop {
            match self.reader.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            self.eof = true;
            if !self.pending.is_empty() {
                return Err(invalid_utf8());
            }
            return Ok(false);
        }
        self.pending.extend_from_slice(&chunk[..n]);
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                self.chars.extend(s.chars());
                self.pending.clear();
            }
            Err(e) => {
                if e.error_len().is_some() {
                    return Err(invalid_utf8());
                }
                let valid = e.valid_up_to();
                // valid_up_to guarantees this prefix decodes
                let s = std::str::from_utf8(&self.pending[..valid]).map_err(|_| invalid_utf8())?;
                self.chars.extend(s.chars());
                self.pending.drain(..valid);
            }
        }
        Ok(true)
    }

    fn peek(&mut self, offset: usize) -> ParseResult<Option<char>> {
        while self.chars.len() <= offset {
            if !self.refill()? {
                return Ok(None);
            }
        }
        Ok(self.chars.get(offset).copied())
    }

    fn next(&mut self) -> ParseResult<Option<char>> {
        // a refill may decode zero chars when a chunk ends mid-sequence
        while self.chars.is_empty() {
            if !self.refill()? {
                return Ok(None);
            }
        }
        Ok(self.chars.pop_front())
    }
}

fn invalid_utf8() -> ParseError {
    ParseError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "stylesheet is not valid UTF-8",
    ))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\u{000B}' | '\u{000C}')
}

/// CSS-subset scanner.
pub struct Scanner<R> {
    source: CharSource<R>,
    state: LexState,
    text: String,
    value: String,
    saw_whitespace: bool,
    line: usize,
    column: usize,
    token_line: usize,
    token_column: usize,
    last: Token,
}

impl<R: Read> Scanner<R> {
    /// Create a scanner reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            source: CharSource::new(reader),
            state: LexState::Initial,
            text: String::new(),
            value: String::new(),
            saw_whitespace: false,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            last: Token::Eof,
        }
    }

    /// Current lexical sub-state.
    pub fn state(&self) -> LexState {
        self.state
    }

    /// Text of the most recent token.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw text collected for the current declaration value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether whitespace was skipped since the last reset, identifier or `*`.
    pub fn saw_whitespace(&self) -> bool {
        self.saw_whitespace
    }

    /// Forget previously seen whitespace; used at the start of a compound selector.
    pub fn reset_whitespace(&mut self) {
        self.saw_whitespace = false;
    }

    /// Line of the most recent token (1-based).
    pub fn line(&self) -> usize {
        self.token_line
    }

    /// Column of the most recent token (1-based).
    pub fn column(&self) -> usize {
        self.token_column
    }

    fn bump(&mut self) -> ParseResult<Option<char>> {
        let c = self.source.next()?;
        if let Some(c) = c {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        Ok(c)
    }

    fn lex_error(&self, text: impl Into<String>) -> ParseError {
        ParseError::Lex {
            line: self.token_line,
            column: self.token_column,
            text: text.into(),
        }
    }

    /// Error for the most recent token not fitting the grammar.
    pub fn unexpected(&self) -> ParseError {
        let found = match self.last {
            Token::Ident => format!("\"{}\"", self.text),
            other => other.to_string(),
        };
        ParseError::UnexpectedToken {
            found,
            line: self.token_line,
            column: self.token_column,
        }
    }

    /// Read the next token and fail unless it is `expected`.
    pub fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.next_token()? != expected {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn skip_comment(&mut self) -> ParseResult<()> {
        // opening "/*" already consumed
        loop {
            match self.bump()? {
                Some('*') if self.source.peek(0)? == Some('/') => {
                    self.bump()?;
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(self.lex_error("/*")),
            }
        }
    }

    fn read_ident(&mut self, first: char) -> ParseResult<()> {
        self.text.clear();
        self.text.push(first);
        while let Some(c) = self.source.peek(0)? {
            if !is_ident_char(c) {
                break;
            }
            self.bump()?;
            self.text.push(c);
        }
        Ok(())
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> ParseResult<Token> {
        let token = self.scan()?;
        trace!(?token, state = ?self.state, line = self.token_line, column = self.token_column, "css token");
        self.last = token;
        Ok(token)
    }

    fn scan(&mut self) -> ParseResult<Token> {
        loop {
            self.token_line = self.line;
            self.token_column = self.column;
            match self.state {
                LexState::Initial | LexState::Style => {
                    let Some(c) = self.bump()? else {
                        return Ok(Token::Eof);
                    };
                    if is_space(c) {
                        if self.state == LexState::Initial {
                            self.saw_whitespace = true;
                        }
                        continue;
                    }
                    if c == '/' && self.source.peek(0)? == Some('*') {
                        self.bump()?;
                        self.skip_comment()?;
                        continue;
                    }
                    if is_ident_start(c) {
                        self.read_ident(c)?;
                        self.saw_whitespace = false;
                        return Ok(Token::Ident);
                    }
                    if self.state == LexState::Style {
                        match c {
                            ':' => {
                                self.state = LexState::Value;
                                self.value.clear();
                                return Ok(Token::Colon);
                            }
                            '}' => {
                                self.state = LexState::Initial;
                                return Ok(Token::StyleEnd);
                            }
                            // empty declaration
                            ';' => continue,
                            other => return Err(self.lex_error(other.to_string())),
                        }
                    }
                    let token = match c {
                        '*' => {
                            self.saw_whitespace = false;
                            Token::Star
                        }
                        '.' => Token::Dot,
                        '#' => Token::Hash,
                        '>' => Token::Gt,
                        ',' => Token::Comma,
                        ':' => Token::Colon,
                        '@' => Token::AtRule,
                        '{' => {
                            self.state = LexState::Style;
                            Token::StyleBegin
                        }
                        other => return Err(self.lex_error(other.to_string())),
                    };
                    return Ok(token);
                }
                LexState::Value => {
                    let Some(c) = self.bump()? else {
                        return Ok(Token::Eof);
                    };
                    match c {
                        ';' => {
                            self.state = LexState::Style;
                            return Ok(Token::Semicolon);
                        }
                        '}' => {
                            self.state = LexState::Initial;
                            return Ok(Token::StyleEnd);
                        }
                        '\'' => {
                            self.state = LexState::String1;
                            self.value.push(c);
                        }
                        '"' => {
                            self.state = LexState::String2;
                            self.value.push(c);
                        }
                        other => self.value.push(other),
                    }
                }
                LexState::String1 | LexState::String2 => {
                    let quote = if self.state == LexState::String1 { '\'' } else { '"' };
                    let Some(c) = self.bump()? else {
                        return Err(self.lex_error(quote.to_string()));
                    };
                    if c == quote {
                        self.state = LexState::Value;
                    }
                    self.value.push(c);
                }
            }
        }
    }
}

impl<'a> Scanner<&'a [u8]> {
    /// Scanner over an in-memory string.
    pub fn for_str(css: &'a str) -> Self {
        Scanner::new(css.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(css: &str) -> Vec<Token> {
        let mut scanner = Scanner::for_str(css);
        let mut out = Vec::new();
        loop {
            let t = scanner.next_token().unwrap();
            out.push(t);
            if t == Token::Eof {
                break;
            }
        }
        out
    }

    #[test]
    fn test_selector_tokens() {
        assert_eq!(
            tokens("div.a > p#x, *:hover"),
            vec![
                Token::Ident,
                Token::Dot,
                Token::Ident,
                Token::Gt,
                Token::Ident,
                Token::Hash,
                Token::Ident,
                Token::Comma,
                Token::Star,
                Token::Colon,
                Token::Ident,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_colon_changes_meaning_inside_block() {
        let mut scanner = Scanner::for_str("p { color: red; }");
        assert_eq!(scanner.next_token().unwrap(), Token::Ident);
        assert_eq!(scanner.next_token().unwrap(), Token::StyleBegin);
        assert_eq!(scanner.state(), LexState::Style);
        assert_eq!(scanner.next_token().unwrap(), Token::Ident);
        assert_eq!(scanner.text(), "color");
        assert_eq!(scanner.next_token().unwrap(), Token::Colon);
        assert_eq!(scanner.state(), LexState::Value);
        assert_eq!(scanner.next_token().unwrap(), Token::Semicolon);
        assert_eq!(scanner.value().trim(), "red");
        assert_eq!(scanner.next_token().unwrap(), Token::StyleEnd);
        assert_eq!(scanner.state(), LexState::Initial);
    }

    #[test]
    fn test_quoted_value_keeps_separators() {
        let mut scanner = Scanner::for_str("p{font-family: \"a;b}\", 'c;d'}");
        scanner.next_token().unwrap();
        scanner.next_token().unwrap();
        scanner.next_token().unwrap();
        scanner.next_token().unwrap();
        assert_eq!(scanner.next_token().unwrap(), Token::StyleEnd);
        assert_eq!(scanner.value().trim(), "\"a;b}\", 'c;d'");
    }

    #[test]
    fn test_whitespace_flag() {
        let mut scanner = Scanner::for_str("div .a");
        scanner.next_token().unwrap();
        assert!(!scanner.saw_whitespace());
        assert_eq!(scanner.next_token().unwrap(), Token::Dot);
        assert!(scanner.saw_whitespace());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("/* a */ p /* b */ { /* c */ }"),
            vec![Token::Ident, Token::StyleBegin, Token::StyleEnd, Token::Eof]
        );
    }

    #[test]
    fn test_lex_error_position() {
        let mut scanner = Scanner::for_str("p\n  $");
        scanner.next_token().unwrap();
        match scanner.next_token() {
            Err(ParseError::Lex { line, column, text }) => {
                assert_eq!(line, 2);
                assert_eq!(column, 3);
                assert_eq!(text, "$");
            }
            other => panic!("expected lex error, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string() {
        let mut scanner = Scanner::for_str("p{a:'x");
        for _ in 0..4 {
            scanner.next_token().unwrap();
        }
        assert!(matches!(scanner.next_token(), Err(ParseError::Lex { .. })));
    }

    /// Reader handing out one byte per call, to exercise refills mid-sequence.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_refill_across_multibyte_chars() {
        let css = "p{font-family: 'Ünïcødé'}";
        let mut scanner = Scanner::new(Trickle(css.as_bytes()));
        for _ in 0..4 {
            scanner.next_token().unwrap();
        }
        assert_eq!(scanner.next_token().unwrap(), Token::StyleEnd);
        assert_eq!(scanner.value().trim(), "'Ünïcødé'");
    }

    #[test]
    fn test_invalid_utf8_is_io_error() {
        let bytes: &[u8] = &[b'p', 0xFF, b'{'];
        let mut scanner = Scanner::new(bytes);
        assert!(matches!(scanner.next_token(), Err(ParseError::Io(_))));
    }
}
