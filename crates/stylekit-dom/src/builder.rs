//! Streaming construction of a [`Document`] from XHTML.
//!
//! The builder keeps a stack of style nodes. Every start tag pushes a node
//! keyed by `(tag, class, id)`, with the tag's inline `style` declarations as
//! its raw values, and the matching end tag pops it. The children of a
//! container element are parsed under an extra keyless node, so text placed
//! directly in a container inherits from it without matching selectors.
//! Character data is buffered and flushed into a text element at every tag
//! boundary.

use std::sync::Arc;

use stylekit_css::{apply_inline, AttributeRegistry, Style, StyleId, StyleSheetKey};
use stylekit_html::{Token, Tokenizer};
use tracing::{debug, trace, warn};

use crate::document::Document;
use crate::element::{Element, ElementId, ElementKind, Table};
use crate::{DomError, DomResult};

/// Whether `doc` already starts like an XHTML document.
pub fn is_xhtml(doc: &str) -> bool {
    doc.len() > 5
        && (doc.starts_with("<?xml") || doc.starts_with("<!DOCTYPE") || doc.starts_with("<html>"))
}

/// Wrap plain markup into a minimal `<html><body>` shell unless it already
/// is a document.
pub fn wrap_xhtml(doc: &str) -> String {
    if is_xhtml(doc) {
        doc.to_string()
    } else {
        format!("<html><body>{}</body></html>", doc)
    }
}

/// Upper bound for `colspan` while the column count is not yet known.
const MAX_COLSPAN: usize = 1000;

fn is_heading(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 2 && bytes[0] == b'h' && (b'0'..=b'6').contains(&bytes[1])
}

fn attr<'t>(attrs: &'t [(String, String)], name: &str) -> Option<&'t str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Tag events with self-closing tags expanded and nesting checked.
#[derive(Debug)]
enum Event {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Text(String),
}

struct EventReader<'a> {
    tokenizer: Tokenizer<'a>,
    open: Vec<String>,
    pending_end: bool,
}

impl<'a> EventReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            tokenizer: Tokenizer::new(source),
            open: Vec::new(),
            pending_end: false,
        }
    }

    fn malformed(&self, message: String) -> DomError {
        let (line, column) = self.tokenizer.position();
        DomError::Malformed {
            line,
            column,
            message,
        }
    }

    fn int_attr(&self, attrs: &[(String, String)], name: &str, default: i32) -> DomResult<i32> {
        match attr(attrs, name) {
            Some(value) => value.trim().parse().map_err(|_| {
                self.malformed(format!("attribute {}=\"{}\" is not an integer", name, value))
            }),
            None => Ok(default),
        }
    }

    /// Next event, or `None` once the input is exhausted with every
    /// element closed.
    fn next(&mut self) -> DomResult<Option<Event>> {
        if self.pending_end {
            self.pending_end = false;
            if let Some(name) = self.open.pop() {
                return Ok(Some(Event::End { name }));
            }
        }
        loop {
            let token = match self.tokenizer.next_token()? {
                Some(token) => token,
                None => {
                    return match self.open.last() {
                        Some(open) => Err(DomError::UnexpectedEof(open.clone())),
                        None => Ok(None),
                    };
                }
            };
            match token {
                Token::Comment(_) => continue,
                Token::Text(text) => return Ok(Some(Event::Text(text))),
                Token::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    self.pending_end = self_closing;
                    self.open.push(name.clone());
                    return Ok(Some(Event::Start { name, attrs }));
                }
                Token::EndTag { name } => {
                    return match self.open.pop() {
                        Some(open) if open == name => Ok(Some(Event::End { name })),
                        Some(open) => Err(self.malformed(format!(
                            "</{}> does not close <{}>",
                            name, open
                        ))),
                        None => Err(self.malformed(format!("unexpected </{}>", name))),
                    };
                }
            }
        }
    }

    /// Like [`next`](Self::next), but end of input is an error.
    fn next_required(&mut self) -> DomResult<Event> {
        self.next()?
            .ok_or_else(|| DomError::UnexpectedEof("document".to_string()))
    }
}

/// Builds [`Document`]s against one attribute registry.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    registry: Arc<AttributeRegistry>,
}

impl DocumentBuilder {
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        &self.registry
    }

    /// Build a document from XHTML source. The root element must be `html`.
    pub fn build(&self, source: &str) -> DomResult<Document> {
        let build = Build {
            reader: EventReader::new(source),
            doc: Document::new(self.registry.clone()),
            style_stack: Vec::new(),
            text: String::new(),
            container: None,
        };
        let doc = build.run()?;
        debug!(
            elements = doc.len(),
            roots = doc.roots().len(),
            styles = doc.styles().len(),
            links = doc.stylesheet_links().len(),
            "document built"
        );
        Ok(doc)
    }
}

struct Build<'a> {
    reader: EventReader<'a>,
    doc: Document,
    style_stack: Vec<StyleId>,
    text: String,
    container: Option<ElementId>,
}

impl Build<'_> {
    fn run(mut self) -> DomResult<Document> {
        let root = loop {
            match self.reader.next()? {
                Some(Event::Start { name, .. }) => break name,
                Some(Event::Text(text)) if text.trim().is_empty() => continue,
                Some(_) => {
                    return Err(self.reader.malformed("content before the root element".into()))
                }
                None => return Err(DomError::MissingHtml("an empty document".into())),
            }
        };
        if root != "html" {
            return Err(DomError::MissingHtml(format!("<{}>", root)));
        }

        let root_style = self.doc.styles_mut().push(None, None, Style::new());
        self.style_stack.push(root_style);

        loop {
            match self.reader.next_required()? {
                Event::Start { name, attrs } => match name.as_str() {
                    "head" => self.parse_head()?,
                    "body" => {
                        let style = self.push_style(&name, &attrs);
                        let body = self.new_element(style, ElementKind::Block(Vec::new()));
                        self.doc.push_root(body);
                        self.doc.register(body)?;
                        self.parse_container(body)?;
                    }
                    _ => {
                        trace!(tag = %name, "skipping element outside of body");
                        self.skip_element()?;
                    }
                },
                Event::End { .. } => break,
                Event::Text(_) => {}
            }
        }

        while let Some(event) = self.reader.next()? {
            match event {
                Event::Text(text) if text.trim().is_empty() => {}
                _ => {
                    return Err(self
                        .reader
                        .malformed("content after the root element".into()))
                }
            }
        }
        Ok(self.doc)
    }

    fn current_style(&self) -> StyleId {
        // the root style is pushed before anything else and never popped
        self.style_stack[self.style_stack.len() - 1]
    }

    /// Push a keyed style node for a start tag.
    fn push_style(&mut self, name: &str, attrs: &[(String, String)]) -> StyleId {
        let key = StyleSheetKey::new(name, attr(attrs, "class"), attr(attrs, "id"));
        let mut raw = Style::new();
        if let Some(inline) = attr(attrs, "style") {
            let registry = self.doc.registry().clone();
            let skipped = apply_inline(&registry, &mut raw, inline);
            if !skipped.is_empty() {
                debug!(tag = %key, skipped = skipped.len(), "inline style declarations skipped");
            }
        }
        let parent = self.current_style();
        let style = self.doc.styles_mut().push(Some(parent), Some(key), raw);
        self.style_stack.push(style);
        style
    }

    fn push_anonymous_style(&mut self) {
        let parent = self.current_style();
        let style = self.doc.styles_mut().push(Some(parent), None, Style::new());
        self.style_stack.push(style);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn new_element(&mut self, style: StyleId, kind: ElementKind) -> ElementId {
        self.doc.push_element(Element::new(style, kind))
    }

    /// Flush buffered character data into a text element.
    ///
    /// Whitespace-only runs between tags are dropped.
    fn finish_text(&mut self) -> DomResult<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        let Some(container) = self.container else {
            return Ok(());
        };
        if text.trim().is_empty() {
            return Ok(());
        }
        let style = self.current_style();
        let element = self.new_element(style, ElementKind::Text(text));
        self.doc.register(element)?;
        self.doc.append_child(container, element);
        Ok(())
    }

    fn add_to_container(&mut self, element: ElementId) -> DomResult<()> {
        if let Some(container) = self.container {
            self.doc.append_child(container, element);
        }
        self.doc.register(element)
    }

    /// Parse the children of `container` up to its end tag, under a fresh
    /// keyless style.
    fn parse_container(&mut self, container: ElementId) -> DomResult<()> {
        let previous = self.container.replace(container);
        self.push_anonymous_style();
        self.parse_main()?;
        self.pop_style();
        self.container = previous;
        Ok(())
    }

    /// Parse content up to the end tag of the element opened last. The
    /// end tag pops the current style.
    fn parse_main(&mut self) -> DomResult<()> {
        loop {
            match self.reader.next_required()? {
                Event::Start { name, attrs } => self.start_element(name, attrs)?,
                Event::End { .. } => {
                    self.finish_text()?;
                    self.pop_style();
                    return Ok(());
                }
                Event::Text(text) => self.text.push_str(&text),
            }
        }
    }

    fn start_element(&mut self, name: String, attrs: Vec<(String, String)>) -> DomResult<()> {
        if name == "head" {
            return self.parse_head();
        }
        self.finish_text()?;
        let style = self.push_style(&name, &attrs);

        let container_kind = match name.as_str() {
            "p" => Some(ElementKind::Paragraph(Vec::new())),
            "ul" => Some(ElementKind::Container(Vec::new())),
            "li" => Some(ElementKind::ListItem(Vec::new())),
            "div" => Some(ElementKind::Block(Vec::new())),
            _ if is_heading(&name) => Some(ElementKind::Block(Vec::new())),
            "a" => attr(&attrs, "href").map(|href| ElementKind::Link {
                href: href.to_string(),
                children: Vec::new(),
            }),
            _ => None,
        };
        if let Some(kind) = container_kind {
            let element = self.new_element(style, kind);
            self.parse_container(element)?;
            return self.add_to_container(element);
        }

        let leaf = match name.as_str() {
            "img" => Some(ElementKind::Image {
                src: attr(&attrs, "src").unwrap_or_default().to_string(),
                alt: attr(&attrs, "alt").map(str::to_string),
            }),
            "button" => Some(ElementKind::Widget {
                name: attr(&attrs, "name").unwrap_or_default().to_string(),
                param: attr(&attrs, "value").unwrap_or_default().to_string(),
            }),
            "br" => Some(ElementKind::LineBreak),
            "ol" => {
                let element = self.parse_ordered_list(style, &attrs)?;
                return self.add_to_container(element);
            }
            "table" => {
                let element = self.parse_table(style, &attrs)?;
                return self.add_to_container(element);
            }
            _ => None,
        };
        if let Some(kind) = leaf {
            let element = self.new_element(style, kind);
            self.add_to_container(element)?;
        }
        // content of leaves and unknown tags continues under the pushed style
        self.parse_main()
    }

    /// Collect stylesheet links and the title. Produces no elements.
    fn parse_head(&mut self) -> DomResult<()> {
        let mut depth = 0usize;
        loop {
            match self.reader.next_required()? {
                Event::Start { name, attrs } => match name.as_str() {
                    "link" => {
                        let href = attr(&attrs, "href");
                        if attr(&attrs, "rel") == Some("stylesheet")
                            && attr(&attrs, "type") == Some("text/css")
                        {
                            if let Some(href) = href {
                                self.doc.add_stylesheet_link(href.to_string());
                            }
                        }
                        depth += 1;
                    }
                    "title" => {
                        let title = self.read_text()?;
                        self.doc.set_title(title.trim().to_string());
                    }
                    _ => depth += 1,
                },
                Event::End { .. } => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Event::Text(_) => {}
            }
        }
    }

    /// Text content up to the end tag of the element opened last.
    fn read_text(&mut self) -> DomResult<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.reader.next_required()? {
                Event::Text(t) => text.push_str(&t),
                Event::Start { .. } => depth += 1,
                Event::End { .. } => {
                    if depth == 0 {
                        return Ok(text);
                    }
                    depth -= 1;
                }
            }
        }
    }

    fn skip_element(&mut self) -> DomResult<()> {
        self.read_text().map(|_| ())
    }

    fn parse_ordered_list(
        &mut self,
        style: StyleId,
        attrs: &[(String, String)],
    ) -> DomResult<ElementId> {
        let start = self.reader.int_attr(attrs, "start", 1)?;
        let list = self.new_element(
            style,
            ElementKind::OrderedList {
                start,
                items: Vec::new(),
            },
        );
        let mut depth = 0usize;
        loop {
            match self.reader.next_required()? {
                Event::Start { name, attrs } => {
                    let item_style = self.push_style(&name, &attrs);
                    if name == "li" {
                        let item = self.new_element(item_style, ElementKind::Container(Vec::new()));
                        self.parse_container(item)?;
                        self.doc.register(item)?;
                        self.doc.append_child(list, item);
                    } else {
                        depth += 1;
                    }
                }
                Event::End { .. } => {
                    self.pop_style();
                    if depth == 0 {
                        return Ok(list);
                    }
                    depth -= 1;
                }
                Event::Text(_) => {}
            }
        }
    }

    /// Gather rows and cells; the table element is created at `</table>`.
    fn parse_table(
        &mut self,
        style: StyleId,
        attrs: &[(String, String)],
    ) -> DomResult<ElementId> {
        let cell_spacing = self.reader.int_attr(attrs, "cellspacing", 0)?;
        let cell_padding = self.reader.int_attr(attrs, "cellpadding", 0)?;
        let mut rows: Vec<Vec<Option<ElementId>>> = Vec::new();
        let mut row_styles = Vec::new();
        let mut columns = 0usize;
        let mut depth = 0usize;

        loop {
            match self.reader.next_required()? {
                Event::Start { name, attrs } => {
                    let tag_style = self.push_style(&name, &attrs);
                    match name.as_str() {
                        "td" | "th" => {
                            let limit = if columns > 0 { columns } else { MAX_COLSPAN };
                            let colspan =
                                (self.reader.int_attr(&attrs, "colspan", 1)?.max(1) as usize).min(limit);
                            if rows.is_empty() {
                                return Err(self
                                    .reader
                                    .malformed(format!("<{}> outside of <tr>", name)));
                            }
                            let cell = self.new_element(
                                tag_style,
                                ElementKind::TableCell {
                                    colspan,
                                    children: Vec::new(),
                                },
                            );
                            self.parse_container(cell)?;
                            self.doc.register(cell)?;
                            if let Some(row) = rows.last_mut() {
                                row.push(Some(cell));
                                row.extend(std::iter::repeat(None).take(colspan - 1));
                            }
                        }
                        "tr" => {
                            rows.push(Vec::new());
                            row_styles.push(tag_style);
                            depth += 1;
                        }
                        _ => depth += 1,
                    }
                }
                Event::End { name } => {
                    self.pop_style();
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if name == "tr" && columns == 0 {
                        columns = rows.last().map_or(0, Vec::len);
                    }
                }
                Event::Text(_) => {}
            }
        }

        if columns == 0 {
            columns = rows.first().map_or(0, Vec::len);
        }
        let mut cells = Vec::with_capacity(rows.len() * columns);
        for (index, mut row) in rows.into_iter().enumerate() {
            if row.len() > columns {
                warn!(row = index, slots = row.len(), columns, "table row truncated");
            }
            row.resize(columns, None);
            cells.extend(row);
        }
        trace!(columns, rows = row_styles.len(), "table built");

        Ok(self.new_element(
            style,
            ElementKind::Table(Table {
                columns,
                cell_spacing,
                cell_padding,
                cells,
                row_styles,
            }),
        ))
    }
}
