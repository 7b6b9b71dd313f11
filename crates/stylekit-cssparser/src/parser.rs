//! Stylesheet grammar.
//!
//! ```text
//! stylesheet  := (rule | at_rule)* EOF
//! at_rule     := '@' IDENT '{' declarations
//! rule        := selector (',' selector)* '{' declarations
//! selector    := compound (('>')? compound)*
//! compound    := (IDENT | '*')? ('.' IDENT | '#' IDENT | ':' IDENT)*
//! declarations:= (IDENT ':' VALUE (';' | '}'))* '}'
//! ```
//!
//! Two compounds are separated by whitespace (descendant) or `>` (direct
//! child). Inside a compound, `.`, `#` and `:` suffixes must follow without
//! whitespace.

use std::io::Read;

use tracing::debug;

use crate::scanner::{Scanner, Token};
use crate::{AtRuleAst, CompoundAst, DeclarationAst, ParseResult, RuleAst, SelectorAst, StylesheetAst};

/// Parse a stylesheet from a byte stream.
pub fn parse_stylesheet<R: Read>(reader: R) -> ParseResult<StylesheetAst> {
    let mut parser = Parser {
        scanner: Scanner::new(reader),
    };
    let ast = parser.stylesheet()?;
    debug!(
        rules = ast.rules.len(),
        at_rules = ast.at_rules.len(),
        "parsed stylesheet"
    );
    Ok(ast)
}

/// Parse a stylesheet held in memory.
pub fn parse_stylesheet_str(css: &str) -> ParseResult<StylesheetAst> {
    parse_stylesheet(css.as_bytes())
}

struct Parser<R> {
    scanner: Scanner<R>,
}

impl<R: Read> Parser<R> {
    fn stylesheet(&mut self) -> ParseResult<StylesheetAst> {
        let mut out = StylesheetAst::default();
        loop {
            match self.scanner.next_token()? {
                Token::Eof => return Ok(out),
                Token::AtRule => out.at_rules.push(self.at_rule()?),
                first => out.rules.push(self.rule(first)?),
            }
        }
    }

    fn at_rule(&mut self) -> ParseResult<AtRuleAst> {
        self.scanner.expect(Token::Ident)?;
        let name = self.scanner.text().to_string();
        self.scanner.expect(Token::StyleBegin)?;
        let declarations = self.declarations()?;
        Ok(AtRuleAst { name, declarations })
    }

    fn rule(&mut self, first: Token) -> ParseResult<RuleAst> {
        let mut selectors = Vec::new();
        let mut what = first;
        loop {
            let (selector, next) = self.selector(what)?;
            selectors.push(selector);
            match next {
                Token::Comma => what = self.scanner.next_token()?,
                Token::StyleBegin => break,
                _ => return Err(self.scanner.unexpected()),
            }
        }
        let declarations = self.declarations()?;
        Ok(RuleAst {
            selectors,
            declarations,
        })
    }

    /// Parse one selector chain starting at `what`. Returns the chain and the
    /// token that ended it (`,` or `{`).
    fn selector(&mut self, mut what: Token) -> ParseResult<(SelectorAst, Token)> {
        // collected outermost first, reversed at the end
        let mut links: Vec<CompoundAst> = Vec::new();
        loop {
            self.scanner.reset_whitespace();
            let mut compound = CompoundAst::default();
            match what {
                Token::Dot | Token::Hash | Token::Colon => {}
                Token::Ident => {
                    compound.element = Some(self.scanner.text().to_string());
                    what = self.scanner.next_token()?;
                }
                Token::Star => what = self.scanner.next_token()?,
                _ => return Err(self.scanner.unexpected()),
            }
            while matches!(what, Token::Dot | Token::Hash | Token::Colon)
                && !self.scanner.saw_whitespace()
            {
                self.scanner.expect(Token::Ident)?;
                let text = Some(self.scanner.text().to_string());
                match what {
                    Token::Dot => compound.class_name = text,
                    Token::Hash => compound.id = text,
                    _ => compound.pseudo_class = text,
                }
                what = self.scanner.next_token()?;
            }
            links.push(compound);
            match what {
                Token::Gt => {
                    if let Some(last) = links.last_mut() {
                        last.direct_child = true;
                    }
                    what = self.scanner.next_token()?;
                }
                Token::Comma | Token::StyleBegin => break,
                _ => {}
            }
        }
        links.reverse();
        Ok((SelectorAst { links }, what))
    }

    fn declarations(&mut self) -> ParseResult<Vec<DeclarationAst>> {
        let mut out = Vec::new();
        loop {
            match self.scanner.next_token()? {
                Token::StyleEnd => return Ok(out),
                Token::Ident => {}
                _ => return Err(self.scanner.unexpected()),
            }
            let property = self.scanner.text().to_string();
            let line = self.scanner.line();
            self.scanner.expect(Token::Colon)?;
            let end = self.scanner.next_token()?;
            if end != Token::Semicolon && end != Token::StyleEnd {
                return Err(self.scanner.unexpected());
            }
            out.push(DeclarationAst {
                property,
                value: self.scanner.value().trim().to_string(),
                line,
            });
            if end == Token::StyleEnd {
                return Ok(out);
            }
        }
    }
}
