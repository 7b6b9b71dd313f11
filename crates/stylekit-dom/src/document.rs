//! A built document: element arena, style tree and head metadata.

use std::collections::HashMap;
use std::sync::Arc;

use stylekit_css::{AttrType, Attribute, AttributeRegistry, StyleSheetResolver, StyleTree};

use crate::element::{Element, ElementId, ElementKind};
use crate::{DomError, DomResult};

/// A complete document.
///
/// Elements and style nodes are created during one build and dropped
/// together when the document is replaced.
#[derive(Debug)]
pub struct Document {
    styles: StyleTree,
    elements: Vec<Element>,
    roots: Vec<ElementId>,
    elements_by_id: HashMap<String, ElementId>,
    stylesheet_links: Vec<String>,
    title: Option<String>,
}

impl Document {
    /// Create a new empty document.
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            styles: StyleTree::new(registry),
            elements: Vec::new(),
            roots: Vec::new(),
            elements_by_id: HashMap::new(),
            stylesheet_links: Vec::new(),
            title: None,
        }
    }

    pub fn styles(&self) -> &StyleTree {
        &self.styles
    }

    pub(crate) fn styles_mut(&mut self) -> &mut StyleTree {
        &mut self.styles
    }

    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        self.styles.registry()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Root-level elements in document order.
    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.raw()]
    }

    /// Get element by its `id` attribute.
    pub fn get_element_by_id(&self, id: &str) -> Option<ElementId> {
        self.elements_by_id.get(id).copied()
    }

    /// `href`s of `<link rel="stylesheet" type="text/css">` in the head.
    pub fn stylesheet_links(&self) -> &[String] {
        &self.stylesheet_links
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Resolved value of `attribute` for `element`.
    pub fn get<T: AttrType>(
        &self,
        element: ElementId,
        attribute: Attribute<T>,
        resolver: Option<&dyn StyleSheetResolver>,
    ) -> T {
        self.styles
            .get(self.element(element).style, attribute, resolver)
    }

    /// Concatenated text of `id` and its descendants, table cells included.
    pub fn text_content(&self, id: ElementId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: ElementId, result: &mut String) {
        let element = self.element(id);
        match &element.kind {
            ElementKind::Text(text) => result.push_str(text),
            ElementKind::LineBreak => result.push('\n'),
            ElementKind::Table(table) => {
                for cell in table.slots().iter().flatten() {
                    self.collect_text(*cell, result);
                }
            }
            _ => {
                for child in element.children() {
                    self.collect_text(*child, result);
                }
            }
        }
    }

    /// Visit every element depth-first, roots first. The callback receives
    /// the nesting depth.
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(ElementId, usize),
    {
        for root in &self.roots {
            self.traverse_element(*root, 0, &mut callback);
        }
    }

    fn traverse_element<F>(&self, id: ElementId, depth: usize, callback: &mut F)
    where
        F: FnMut(ElementId, usize),
    {
        callback(id, depth);
        let element = self.element(id);
        if let ElementKind::Table(table) = &element.kind {
            for cell in table.slots().iter().flatten() {
                self.traverse_element(*cell, depth + 1, callback);
            }
        }
        for child in element.children() {
            self.traverse_element(*child, depth + 1, callback);
        }
    }

    pub(crate) fn push_element(&mut self, element: Element) -> ElementId {
        let id = ElementId::new(self.elements.len());
        self.elements.push(element);
        id
    }

    pub(crate) fn push_root(&mut self, id: ElementId) {
        self.roots.push(id);
    }

    /// Append `child` to container `parent`.
    pub(crate) fn append_child(&mut self, parent: ElementId, child: ElementId) {
        if let Some(children) = self.elements[parent.raw()].children_mut() {
            children.push(child);
        }
    }

    /// Index `element` under the id of its style key, if any.
    pub(crate) fn register(&mut self, element: ElementId) -> DomResult<()> {
        let style = self.element(element).style;
        let Some(id) = self.styles.key(style).and_then(|k| k.id.clone()) else {
            return Ok(());
        };
        if self.elements_by_id.contains_key(&id) {
            return Err(DomError::DuplicateId(id));
        }
        self.elements_by_id.insert(id, element);
        Ok(())
    }

    pub(crate) fn add_stylesheet_link(&mut self, href: String) {
        self.stylesheet_links.push(href);
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = Some(title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylekit_css::{attrs, Style, StyleSheetKey};

    #[test]
    fn test_register_rejects_duplicates() {
        let mut doc = Document::new(AttributeRegistry::standard());
        let key = StyleSheetKey::new("p", None, Some("x"));
        let a = doc.styles_mut().push(None, Some(key.clone()), Style::new());
        let b = doc.styles_mut().push(None, Some(key), Style::new());
        let first = doc.push_element(Element::new(a, ElementKind::Paragraph(Vec::new())));
        let second = doc.push_element(Element::new(b, ElementKind::Paragraph(Vec::new())));
        doc.register(first).unwrap();
        assert!(matches!(doc.register(second), Err(DomError::DuplicateId(ref id)) if id == "x"));
        assert_eq!(doc.get_element_by_id("x"), Some(first));
    }

    #[test]
    fn test_text_content_and_traverse() {
        let mut doc = Document::new(AttributeRegistry::standard());
        let style = doc.styles_mut().push(None, None, Style::new());
        let block = doc.push_element(Element::new(style, ElementKind::Block(Vec::new())));
        let a = doc.push_element(Element::new(style, ElementKind::Text("a".into())));
        let br = doc.push_element(Element::new(style, ElementKind::LineBreak));
        let b = doc.push_element(Element::new(style, ElementKind::Text("b".into())));
        for child in [a, br, b] {
            doc.append_child(block, child);
        }
        doc.push_root(block);

        assert_eq!(doc.text_content(block), "a\nb");
        let mut visited = Vec::new();
        doc.traverse(|id, depth| visited.push((id, depth)));
        assert_eq!(visited, vec![(block, 0), (a, 1), (br, 1), (b, 1)]);
        assert_eq!(doc.get(a, attrs::FONT_SIZE, None), stylekit_css::Value::px(14.0));
    }
}
