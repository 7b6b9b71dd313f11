//! Text models: the document holders an embedding text area reads from.

use std::io::Read;
use std::sync::Arc;

use stylekit_css::{attrs, AttributeRegistry, Style};
use tracing::{debug, error};

use crate::builder::{wrap_xhtml, DocumentBuilder};
use crate::document::Document;
use crate::element::{Element, ElementId, ElementKind};
use crate::{DomError, DomResult};

/// Notification sent after every document build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Whether the build committed a new document.
    pub committed: bool,
}

/// A change listener callback.
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + 'static>;

#[derive(Default)]
struct Listeners(Vec<ChangeListener>);

impl Listeners {
    fn notify(&self, event: ChangeEvent) {
        for listener in &self.0 {
            listener(&event);
        }
    }
}

/// Read access shared by the text models.
pub trait TextModel {
    fn document(&self) -> &Document;

    fn add_change_listener(&mut self, listener: ChangeListener);

    /// Root-level elements; iterate again to restart.
    fn roots(&self) -> &[ElementId] {
        self.document().roots()
    }
}

/// Holds the last successfully built XHTML document.
pub struct HtmlTextModel {
    builder: DocumentBuilder,
    document: Document,
    listeners: Listeners,
}

impl HtmlTextModel {
    /// Create a model without content.
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            document: Document::new(registry.clone()),
            builder: DocumentBuilder::new(registry),
            listeners: Listeners::default(),
        }
    }

    /// Parse `html`, wrapping it into `<html><body>` first unless it
    /// already starts like a document.
    pub fn set_html(&mut self, html: &str) -> DomResult<()> {
        self.parse_xhtml(&wrap_xhtml(html))
    }

    /// Parse an XHTML document whose root element is `html`.
    ///
    /// On failure the previous document stays in place. Listeners are
    /// notified either way.
    pub fn parse_xhtml(&mut self, source: &str) -> DomResult<()> {
        let result = self.builder.build(source);
        self.commit(result)
    }

    /// Read `reader` to the end and parse it as XHTML.
    pub fn parse_xhtml_reader<R: Read>(&mut self, reader: R) -> DomResult<()> {
        let result = stylekit_html::read_source(reader)
            .map_err(DomError::from)
            .and_then(|source| self.builder.build(&source));
        self.commit(result)
    }

    fn commit(&mut self, result: DomResult<Document>) -> DomResult<()> {
        let outcome = match result {
            Ok(document) => {
                self.document = document;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Unable to parse XHTML document");
                Err(e)
            }
        };
        self.listeners.notify(ChangeEvent {
            committed: outcome.is_ok(),
        });
        outcome
    }

    /// Notify listeners that the document was modified externally.
    pub fn dom_modified(&self) {
        self.listeners.notify(ChangeEvent { committed: true });
    }

    pub fn title(&self) -> Option<&str> {
        self.document.title()
    }

    pub fn stylesheet_links(&self) -> &[String] {
        self.document.stylesheet_links()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementId> {
        self.document.get_element_by_id(id)
    }
}

impl TextModel for HtmlTextModel {
    fn document(&self) -> &Document {
        &self.document
    }

    fn add_change_listener(&mut self, listener: ChangeListener) {
        self.listeners.0.push(listener);
    }
}

/// A single run of text under one style.
pub struct SimpleTextModel {
    style: Style,
    text: String,
    document: Document,
    listeners: Listeners,
}

impl SimpleTextModel {
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            style: Style::new(),
            text: String::new(),
            document: Document::new(registry),
            listeners: Listeners::default(),
        }
    }

    /// Create a model showing `text` preformatted.
    pub fn with_text(registry: Arc<AttributeRegistry>, text: &str) -> DomResult<Self> {
        let mut model = Self::new(registry);
        model.set_text(text, true)?;
        Ok(model)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Base style for the text. Takes effect on the next [`set_text`](Self::set_text).
    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Replace the text. The element's style is the base style with
    /// `preformatted` set.
    pub fn set_text(&mut self, text: &str, preformatted: bool) -> DomResult<()> {
        let mut document = Document::new(self.document.registry().clone());
        let base = document.styles_mut().push(None, None, self.style.clone());
        let style = document
            .styles_mut()
            .derive_with(base, attrs::PREFORMATTED, preformatted)?;
        let element = document.push_element(Element::new(style, ElementKind::Text(text.to_string())));
        document.push_root(element);
        debug!(len = text.len(), preformatted, "simple text set");

        self.document = document;
        self.text = text.to_string();
        self.listeners.notify(ChangeEvent { committed: true });
        Ok(())
    }
}

impl TextModel for SimpleTextModel {
    fn document(&self) -> &Document {
        &self.document
    }

    fn add_change_listener(&mut self, listener: ChangeListener) {
        self.listeners.0.push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(model: &mut dyn TextModel) -> Rc<RefCell<Vec<bool>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        model.add_change_listener(Box::new(move |e: &ChangeEvent| sink.borrow_mut().push(e.committed)));
        seen
    }

    #[test]
    fn test_set_html_wraps_fragments() {
        let mut model = HtmlTextModel::new(AttributeRegistry::standard());
        model.set_html("Hello <b>world</b>").unwrap();
        let doc = model.document();
        assert_eq!(model.roots().len(), 1);
        assert_eq!(doc.text_content(model.roots()[0]), "Hello world");
    }

    #[test]
    fn test_failed_build_keeps_document_and_notifies() {
        let mut model = HtmlTextModel::new(AttributeRegistry::standard());
        let seen = recorder(&mut model);
        model
            .parse_xhtml("<html><body><p id=\"a\">kept</p></body></html>")
            .unwrap();
        assert!(model.parse_xhtml("<html><body><p>").is_err());
        assert_eq!(*seen.borrow(), vec![true, false]);
        let kept = model.get_element_by_id("a").unwrap();
        assert_eq!(model.document().text_content(kept), "kept");
    }

    #[test]
    fn test_reader_errors_notify() {
        let mut model = HtmlTextModel::new(AttributeRegistry::standard());
        let seen = recorder(&mut model);
        let bytes: &[u8] = &[0xff, 0xfe];
        assert!(model.parse_xhtml_reader(bytes).is_err());
        model
            .parse_xhtml_reader("<html><head><title>T</title></head></html>".as_bytes())
            .unwrap();
        assert_eq!(model.title(), Some("T"));
        model.dom_modified();
        assert_eq!(*seen.borrow(), vec![false, true, true]);
    }

    #[test]
    fn test_simple_text_model() {
        let registry = AttributeRegistry::standard();
        let mut base = Style::new();
        base.set(&registry, attrs::FONT_SIZE, stylekit_css::Value::px(20.0))
            .unwrap();

        let mut model = SimpleTextModel::new(registry);
        let seen = recorder(&mut model);
        model.set_style(base);
        model.set_text("a  b", true).unwrap();
        assert_eq!(model.text(), "a  b");

        let doc = model.document();
        let root = model.roots()[0];
        assert_eq!(doc.element(root).text(), Some("a  b"));
        assert!(doc.get(root, attrs::PREFORMATTED, None));
        assert_eq!(doc.get(root, attrs::FONT_SIZE, None), stylekit_css::Value::px(20.0));

        model.set_text("c", false).unwrap();
        let root = model.roots()[0];
        assert!(!model.document().get(root, attrs::PREFORMATTED, None));
        assert_eq!(*seen.borrow(), vec![true, true]);
    }

    #[test]
    fn test_with_text() {
        let model = SimpleTextModel::with_text(AttributeRegistry::standard(), "x").unwrap();
        let root = model.roots()[0];
        assert!(model.document().get(root, attrs::PREFORMATTED, None));
    }
}
