//! Style nodes and inheritance-aware attribute resolution.
//!
//! Nodes live in a [`StyleTree`] arena. The tree owns every node; a node
//! refers to its parent by [`StyleId`] and that link is only used for upward
//! walks. Cascade results are cached per node identity, i.e. per
//! `(TreeId, StyleId)`, never per node content.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::attribute::{AttrType, AttrValue, Attribute, AttributeRegistry};
use crate::stylesheet::StyleSheetResolver;
use crate::style::Style;
use crate::CssResult;

/// The `(tag, class, id)` triple a node is matched against selectors with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StyleSheetKey {
    pub element: String,
    pub class_name: Option<String>,
    pub id: Option<String>,
}

impl StyleSheetKey {
    /// Empty class and id strings count as absent.
    pub fn new(element: impl Into<String>, class_name: Option<&str>, id: Option<&str>) -> Self {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            element: element.into(),
            class_name: non_empty(class_name),
            id: non_empty(id),
        }
    }

    pub fn element(element: impl Into<String>) -> Self {
        Self::new(element, None, None)
    }
}

impl fmt::Display for StyleSheetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.element)?;
        if let Some(class_name) = &self.class_name {
            write!(f, ".{}", class_name)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        Ok(())
    }
}

/// Identity of a [`StyleTree`], unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

impl TreeId {
    fn next() -> Self {
        TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a node in its [`StyleTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(pub usize);

#[derive(Debug)]
struct StyleNode {
    parent: Option<StyleId>,
    key: Option<StyleSheetKey>,
    raw: Style,
}

/// Arena of style nodes.
#[derive(Debug)]
pub struct StyleTree {
    id: TreeId,
    registry: Arc<AttributeRegistry>,
    nodes: Vec<StyleNode>,
}

impl StyleTree {
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        Self {
            id: TreeId::next(),
            registry,
            nodes: Vec::new(),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node. `raw` holds the values set on the node itself.
    pub fn push(
        &mut self,
        parent: Option<StyleId>,
        key: Option<StyleSheetKey>,
        raw: Style,
    ) -> StyleId {
        let id = StyleId(self.nodes.len());
        self.nodes.push(StyleNode { parent, key, raw });
        id
    }

    pub fn parent(&self, id: StyleId) -> Option<StyleId> {
        self.nodes[id.0].parent
    }

    pub fn key(&self, id: StyleId) -> Option<&StyleSheetKey> {
        self.nodes[id.0].key.as_ref()
    }

    pub fn raw(&self, id: StyleId) -> &Style {
        &self.nodes[id.0].raw
    }

    /// `id` followed by its ancestors up to the root.
    pub fn ancestors(&self, id: StyleId) -> impl Iterator<Item = StyleId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n))
    }

    fn cascade_value(
        &self,
        id: StyleId,
        ordinal: usize,
        resolver: Option<&dyn StyleSheetResolver>,
    ) -> Option<AttrValue> {
        let resolver = resolver?;
        self.key(id)?;
        let matched = resolver.resolve(self, id)?;
        matched.get_raw(ordinal).cloned()
    }

    /// Node that supplies the value of attribute `ordinal` for `id`.
    ///
    /// Non-inherited attributes are always read from `id` itself. Inherited
    /// ones come from the nearest node, starting at `id`, with a raw or
    /// cascaded value; the root when none has one.
    pub fn resolve_owner(
        &self,
        id: StyleId,
        ordinal: usize,
        resolver: Option<&dyn StyleSheetResolver>,
    ) -> StyleId {
        let inherited = self
            .registry
            .descriptor(ordinal)
            .map(|d| d.inherited)
            .unwrap_or(false);
        if !inherited {
            return id;
        }
        let mut current = id;
        loop {
            let Some(parent) = self.parent(current) else {
                return current;
            };
            if self.raw(current).get_raw(ordinal).is_some()
                || self.cascade_value(current, ordinal, resolver).is_some()
            {
                return current;
            }
            current = parent;
        }
    }

    /// Value of attribute `ordinal` on `id` without walking ancestors.
    fn value_here(
        &self,
        id: StyleId,
        ordinal: usize,
        resolver: Option<&dyn StyleSheetResolver>,
    ) -> Option<AttrValue> {
        if let Some(value) = self.raw(id).get_raw(ordinal) {
            return Some(value.clone());
        }
        if let Some(value) = self.cascade_value(id, ordinal, resolver) {
            return Some(value);
        }
        self.registry
            .descriptor(ordinal)
            .ok()
            .and_then(|d| d.default.clone())
    }

    /// Untyped attribute lookup. `None` only for attributes without default.
    pub fn get_value(
        &self,
        id: StyleId,
        ordinal: usize,
        resolver: Option<&dyn StyleSheetResolver>,
    ) -> Option<AttrValue> {
        let owner = self.resolve_owner(id, ordinal, resolver);
        trace!(node = id.0, owner = owner.0, ordinal, "attribute owner");
        self.value_here(owner, ordinal, resolver)
    }

    /// Resolved value of `attribute` for node `id`.
    pub fn get<T: AttrType>(
        &self,
        id: StyleId,
        attribute: Attribute<T>,
        resolver: Option<&dyn StyleSheetResolver>,
    ) -> T {
        let value = self.get_value(id, attribute.ordinal(), resolver);
        T::from_attr_value(value.as_ref()).unwrap_or_default()
    }

    /// New sibling node with the same parent, key and raw values as `id`,
    /// plus `attribute` set to `value`.
    pub fn derive_with<T: AttrType>(
        &mut self,
        id: StyleId,
        attribute: Attribute<T>,
        value: T,
    ) -> CssResult<StyleId> {
        let node = &self.nodes[id.0];
        let mut raw = node.raw.clone();
        raw.set(&self.registry, attribute, value)?;
        let (parent, key) = (node.parent, node.key.clone());
        Ok(self.push(parent, key, raw))
    }

    /// `id` itself when it holds no non-inherited raw values, otherwise a new
    /// sibling node holding only the inherited ones.
    pub fn without_non_inheritable(&mut self, id: StyleId) -> StyleId {
        let registry = Arc::clone(&self.registry);
        let node = &self.nodes[id.0];
        let is_inherited = |ordinal: usize| {
            registry
                .descriptor(ordinal)
                .map(|d| d.inherited)
                .unwrap_or(false)
        };
        if node.raw.iter().all(|(ordinal, _)| is_inherited(ordinal)) {
            return id;
        }
        let mut raw = Style::new();
        for (ordinal, value) in node.raw.iter() {
            if is_inherited(ordinal) {
                // type was checked when the value was first stored
                let _ = raw.put(&registry, ordinal, value.clone());
            }
        }
        let (parent, key) = (node.parent, node.key.clone());
        self.push(parent, key, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::attrs;
    use crate::value::{Color, Value};

    fn styled(tree: &StyleTree, f: impl FnOnce(&mut Style, &AttributeRegistry)) -> Style {
        let mut style = Style::new();
        f(&mut style, tree.registry());
        style
    }

    #[test]
    fn test_inherited_walks_ancestors() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let root_style = styled(&tree, |s, r| {
            s.set(r, attrs::COLOR, Color::from_rgb(1, 2, 3)).unwrap();
        });
        let root = tree.push(None, Some(StyleSheetKey::element("body")), root_style);
        let mid = tree.push(Some(root), None, Style::new());
        let leaf = tree.push(Some(mid), Some(StyleSheetKey::element("p")), Style::new());
        assert_eq!(tree.get(leaf, attrs::COLOR, None), Color::from_rgb(1, 2, 3));
        assert_eq!(tree.resolve_owner(leaf, attrs::COLOR.ordinal(), None), root);
        assert_eq!(tree.ancestors(leaf).collect::<Vec<_>>(), vec![leaf, mid, root]);
    }

    #[test]
    fn test_non_inherited_isolated() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let root_style = styled(&tree, |s, r| {
            s.set(r, attrs::WIDTH, Value::px(100.0)).unwrap();
        });
        let root = tree.push(None, None, root_style);
        let child = tree.push(Some(root), None, Style::new());
        assert_eq!(tree.get(root, attrs::WIDTH, None), Value::px(100.0));
        assert_eq!(tree.get(child, attrs::WIDTH, None), Value::AUTO);
        assert_eq!(tree.resolve_owner(child, attrs::WIDTH.ordinal(), None), child);
    }

    #[test]
    fn test_default_without_values() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let root = tree.push(None, None, Style::new());
        assert_eq!(tree.get(root, attrs::FONT_SIZE, None), Value::px(14.0));
        assert_eq!(tree.get(root, attrs::COLOR_HOVER, None), None);
        assert_eq!(tree.get_value(root, attrs::COLOR_HOVER.ordinal(), None), None);
    }

    #[test]
    fn test_derive_with() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let root = tree.push(None, None, Style::new());
        let node = tree.push(Some(root), Some(StyleSheetKey::element("p")), Style::new());
        let derived = tree.derive_with(node, attrs::PREFORMATTED, true).unwrap();
        assert_ne!(derived, node);
        assert_eq!(tree.parent(derived), Some(root));
        assert_eq!(tree.key(derived), tree.key(node));
        assert!(tree.get(derived, attrs::PREFORMATTED, None));
        assert!(!tree.get(node, attrs::PREFORMATTED, None));
    }

    #[test]
    fn test_without_non_inheritable() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let plain = styled(&tree, |s, r| {
            s.set(r, attrs::COLOR, Color::BLACK).unwrap();
        });
        let a = tree.push(None, None, plain);
        assert_eq!(tree.without_non_inheritable(a), a);

        let mixed = styled(&tree, |s, r| {
            s.set(r, attrs::COLOR, Color::BLACK).unwrap();
            s.set(r, attrs::MARGIN_TOP, Value::px(4.0)).unwrap();
        });
        let b = tree.push(None, None, mixed);
        let c = tree.without_non_inheritable(b);
        assert_ne!(c, b);
        assert_eq!(tree.raw(c).get(attrs::COLOR), Some(Color::BLACK));
        assert_eq!(tree.raw(c).get(attrs::MARGIN_TOP), None);
    }

    #[test]
    fn test_tree_ids_unique() {
        let registry = AttributeRegistry::standard();
        let a = StyleTree::new(registry.clone());
        let b = StyleTree::new(registry);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_key_display() {
        let key = StyleSheetKey::new("div", Some("note"), Some(""));
        assert_eq!(key.id, None);
        assert_eq!(key.to_string(), "div.note");
    }
}
