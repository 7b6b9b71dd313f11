//! Stylesheets: rule sets, cascade resolution and at-rules.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;
use std::sync::Arc;

use stylekit_cssparser::{parse_stylesheet, AtRuleAst, StylesheetAst};
use tracing::{debug, trace, warn};

use crate::attribute::{attrs, AttributeRegistry};
use crate::declaration::{self, Diagnostic};
use crate::node::{StyleId, StyleSheetKey, StyleTree, TreeId};
use crate::selector::{Selector, SelectorLink};
use crate::style::Style;
use crate::CssResult;

/// An at-rule such as `@font-face`, kept as ordered key/value pairs.
pub type AtRule = AtRuleAst;

/// Source of cascade matches for style nodes.
///
/// Resolution results may be cached per node identity between
/// [`start_layout`](Self::start_layout) and
/// [`layout_finished`](Self::layout_finished).
pub trait StyleSheetResolver {
    fn start_layout(&self);

    /// Merged declarations of every rule matching `node`, or `None`.
    fn resolve(&self, tree: &StyleTree, node: StyleId) -> Option<Rc<Style>>;

    fn layout_finished(&self);

    /// Bracket a layout pass; the returned guard ends it when dropped.
    fn layout(&self) -> LayoutPass<'_>
    where
        Self: Sized,
    {
        LayoutPass::new(self)
    }
}

/// A layout pass in progress. Created with [`StyleSheetResolver::layout`];
/// finishes the pass on drop, including on early return or panic.
pub struct LayoutPass<'a> {
    resolver: &'a dyn StyleSheetResolver,
}

impl<'a> LayoutPass<'a> {
    pub fn new(resolver: &'a dyn StyleSheetResolver) -> Self {
        resolver.start_layout();
        Self { resolver }
    }

    pub fn resolver(&self) -> &'a dyn StyleSheetResolver {
        self.resolver
    }
}

impl Drop for LayoutPass<'_> {
    fn drop(&mut self) {
        self.resolver.layout_finished();
    }
}

/// A `(family, file)` pair from a `@font-face` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub family: String,
    pub src: String,
}

/// Collaborator that binds font families to font files.
pub trait FontRegistrar {
    fn register_font(
        &mut self,
        family: &str,
        src: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

type CacheKey = (TreeId, StyleId);

/// A parsed stylesheet.
pub struct StyleSheet {
    registry: Arc<AttributeRegistry>,
    rules: Vec<Selector>,
    at_rules: Vec<AtRule>,
    cache: RefCell<HashMap<CacheKey, Option<Rc<Style>>>>,
}

impl StyleSheet {
    /// A stylesheet holding only the built-in `pre` rule.
    pub fn new(registry: Arc<AttributeRegistry>) -> Self {
        let mut pre = Style::new();
        // the registry always holds the standard attributes
        let _ = pre.set(&registry, attrs::PREFORMATTED, true);
        let rules = vec![Selector::new(
            [SelectorLink {
                element: Some("pre".to_string()),
                ..Default::default()
            }],
            None,
            Rc::new(pre),
        )];
        Self {
            registry,
            rules,
            at_rules: Vec::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        &self.registry
    }

    /// Parse CSS from `reader` and append its rules.
    ///
    /// On error nothing is added. Declarations that cannot be applied are
    /// skipped and returned.
    pub fn parse<R: Read>(&mut self, reader: R) -> CssResult<Vec<Diagnostic>> {
        let ast = parse_stylesheet(reader)?;
        Ok(self.add_ast(ast))
    }

    pub fn parse_str(&mut self, css: &str) -> CssResult<Vec<Diagnostic>> {
        self.parse(css.as_bytes())
    }

    fn add_ast(&mut self, ast: StylesheetAst) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut added = 0;
        for rule in &ast.rules {
            let mut style = Style::new();
            for decl in &rule.declarations {
                if let Err(error) =
                    declaration::apply(&self.registry, &mut style, &decl.property, &decl.value)
                {
                    warn!(
                        property = %decl.property,
                        value = %decl.value,
                        line = decl.line,
                        %error,
                        "skipping declaration"
                    );
                    diagnostics.push(Diagnostic {
                        property: decl.property.clone(),
                        value: decl.value.clone(),
                        error,
                    });
                }
            }
            let style = Rc::new(style);
            for selector in &rule.selectors {
                let pseudo = selector.links.first().and_then(|l| l.pseudo_class.as_deref());
                let selector_style = match pseudo {
                    None => Rc::clone(&style),
                    Some(pseudo) => Rc::new(self.transform_style(&style, pseudo)),
                };
                self.rules.push(Selector::from_ast(selector, selector_style));
                added += 1;
            }
        }
        // stable: equal scores keep declaration order
        self.rules.sort_by_key(Selector::score);
        self.at_rules.extend(ast.at_rules);
        self.cache.borrow_mut().clear();
        debug!(
            added,
            rules = self.rules.len(),
            at_rules = self.at_rules.len(),
            "stylesheet rules committed"
        );
        diagnostics
    }

    /// Declaration block of a pseudo-class rule. `:hover` moves the values
    /// that have a hover twin into it; other pseudo-classes get no values.
    fn transform_style(&self, style: &Style, pseudo_class: &str) -> Style {
        let mut result = Style::new();
        if pseudo_class == "hover" {
            for (ordinal, value) in style.iter() {
                if let Some(hover) = self.registry.hover_variant(ordinal) {
                    let _ = result.put(&self.registry, hover, value.clone());
                }
            }
        }
        result
    }

    /// Rules in ascending score order, including the built-in `pre` rule.
    pub fn rules(&self) -> &[Selector] {
        &self.rules
    }

    pub fn at_rules(&self) -> &[AtRule] {
        &self.at_rules
    }

    /// `(family, src)` for every source of every `@font-face` rule.
    pub fn font_faces(&self) -> Vec<FontFace> {
        let mut out = Vec::new();
        for rule in self.at_rules.iter().filter(|r| r.name == "font-face") {
            let (Some(family), Some(src)) = (rule.get("font-family"), rule.get("src")) else {
                continue;
            };
            let family = family.trim_matches(|c| c == '"' || c == '\'');
            match declaration::parse_list(src) {
                Ok(sources) => out.extend(sources.iter().map(|s| FontFace {
                    family: family.to_string(),
                    src: declaration::strip_url(s).to_string(),
                })),
                Err(error) => warn!(family, src, %error, "bad font-face src"),
            }
        }
        out
    }

    /// Hand every font face to `registrar`. Failures are logged and skipped.
    /// Returns the number registered.
    pub fn register_fonts(&self, registrar: &mut dyn FontRegistrar) -> usize {
        let mut registered = 0;
        for face in self.font_faces() {
            match registrar.register_font(&face.family, &face.src) {
                Ok(()) => registered += 1,
                Err(error) => {
                    warn!(family = %face.family, src = %face.src, %error, "font registration failed")
                }
            }
        }
        registered
    }

    /// Number of cached resolution results.
    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().len()
    }

    fn compute(&self, tree: &StyleTree, node: StyleId) -> Option<Rc<Style>> {
        let mut matching = self.rules.iter().filter(|r| r.matches(tree, node));
        let first = matching.next()?;
        let Some(second) = matching.next() else {
            return Some(Rc::clone(first.style()));
        };
        let mut merged = Style::new();
        merged.put_all(first.style());
        merged.put_all(second.style());
        for rule in matching {
            merged.put_all(rule.style());
        }
        Some(Rc::new(merged))
    }

    /// Resolve a node given only its key, with no ancestors.
    pub fn resolve_key(&self, key: &StyleSheetKey) -> Option<Rc<Style>> {
        let mut tree = StyleTree::new(Arc::clone(&self.registry));
        let id = tree.push(None, Some(key.clone()), Style::new());
        self.compute(&tree, id)
    }
}

impl StyleSheetResolver for StyleSheet {
    fn start_layout(&self) {
        self.cache.borrow_mut().clear();
    }

    fn resolve(&self, tree: &StyleTree, node: StyleId) -> Option<Rc<Style>> {
        let key = (tree.id(), node);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        let result = self.compute(tree, node);
        trace!(node = node.0, matched = result.is_some(), "cascade resolved");
        self.cache.borrow_mut().insert(key, result.clone());
        result
    }

    fn layout_finished(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl std::fmt::Debug for StyleSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleSheet")
            .field("rules", &self.rules.len())
            .field("at_rules", &self.at_rules.len())
            .finish()
    }
}

/// Several stylesheets resolved together; later sheets override earlier
/// ones.
pub struct StyleSheetSet {
    sheets: Vec<StyleSheet>,
    cache: RefCell<HashMap<CacheKey, Option<Rc<Style>>>>,
}

impl StyleSheetSet {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn push(&mut self, sheet: StyleSheet) {
        self.sheets.push(sheet);
        self.cache.borrow_mut().clear();
    }

    pub fn sheets(&self) -> &[StyleSheet] {
        &self.sheets
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl Default for StyleSheetSet {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleSheetResolver for StyleSheetSet {
    fn start_layout(&self) {
        self.cache.borrow_mut().clear();
        for sheet in &self.sheets {
            sheet.start_layout();
        }
    }

    fn resolve(&self, tree: &StyleTree, node: StyleId) -> Option<Rc<Style>> {
        let key = (tree.id(), node);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        let mut matched: Vec<Rc<Style>> = self
            .sheets
            .iter()
            .filter_map(|s| s.resolve(tree, node))
            .collect();
        let result = match matched.len() {
            0 => None,
            1 => matched.pop(),
            _ => {
                let mut merged = Style::new();
                for style in &matched {
                    merged.put_all(style);
                }
                Some(Rc::new(merged))
            }
        };
        self.cache.borrow_mut().insert(key, result.clone());
        result
    }

    fn layout_finished(&self) {
        self.cache.borrow_mut().clear();
        for sheet in &self.sheets {
            sheet.layout_finished();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Color, TextDecoration};
    use crate::CssError;

    fn sheet(css: &str) -> StyleSheet {
        let mut sheet = StyleSheet::new(AttributeRegistry::standard());
        sheet.parse_str(css).unwrap();
        sheet
    }

    #[test]
    fn test_builtin_pre_rule() {
        let sheet = StyleSheet::new(AttributeRegistry::standard());
        assert_eq!(sheet.rules().len(), 1);
        assert_eq!(sheet.rules()[0].score(), 0x100);
        let style = sheet.resolve_key(&StyleSheetKey::element("pre")).unwrap();
        assert_eq!(style.get(attrs::PREFORMATTED), Some(true));
        assert!(sheet.resolve_key(&StyleSheetKey::element("p")).is_none());
    }

    #[test]
    fn test_rules_sorted_stably() {
        let sheet = sheet(".b{color:red} p{color:blue} .a{color:green} div{color:lime}");
        let scores: Vec<u32> = sheet.rules().iter().map(|r| r.score()).collect();
        assert_eq!(scores, vec![0x100, 0x100, 0x100, 0x10000, 0x10000]);
        let classes: Vec<_> = sheet.rules()[3..]
            .iter()
            .map(|r| r.links()[0].class_name.clone().unwrap())
            .collect();
        assert_eq!(classes, vec!["b", "a"]);
    }

    #[test]
    fn test_hover_transform() {
        let sheet = sheet("a:hover { color: red; text-decoration: underline; width: 10px }");
        let style = sheet.resolve_key(&StyleSheetKey::element("a")).unwrap();
        assert_eq!(style.get(attrs::COLOR), None);
        assert_eq!(style.get(attrs::COLOR_HOVER), Some(Some(Color::from_rgb(255, 0, 0))));
        assert_eq!(
            style.get(attrs::TEXT_DECORATION_HOVER),
            Some(TextDecoration::Underline)
        );
        assert_eq!(style.get(attrs::WIDTH), None);
    }

    #[test]
    fn test_other_pseudo_class_is_empty() {
        let sheet = sheet("a:visited { color: red }");
        let style = sheet.resolve_key(&StyleSheetKey::element("a")).unwrap();
        assert!(style.is_empty());
    }

    #[test]
    fn test_failed_parse_keeps_rules() {
        let mut sheet = sheet("p { color: red }");
        let before = sheet.rules().len();
        let err = sheet.parse_str("div { color: blue } span { color red }").unwrap_err();
        assert!(matches!(err, CssError::Parse(_)));
        assert_eq!(sheet.rules().len(), before);
    }

    #[test]
    fn test_parse_appends() {
        let mut sheet = sheet("p { color: red }");
        sheet.parse_str("p { color: blue }").unwrap();
        let style = sheet.resolve_key(&StyleSheetKey::element("p")).unwrap();
        assert_eq!(style.get(attrs::COLOR), Some(Color::from_rgb(0, 0, 255)));
    }

    #[test]
    fn test_declaration_errors_are_reported() {
        let mut sheet = StyleSheet::new(AttributeRegistry::standard());
        let diagnostics = sheet
            .parse_str("p { margin: 1px 2px 3px 4px 5px; color: red; zoom: 2 }")
            .unwrap();
        assert_eq!(diagnostics.len(), 2);
        let style = sheet.resolve_key(&StyleSheetKey::element("p")).unwrap();
        assert_eq!(style.get(attrs::COLOR), Some(Color::from_rgb(255, 0, 0)));
    }

    #[test]
    fn test_font_faces() {
        let sheet = sheet(
            "@font-face { font-family: \"Deja\"; src: url(deja.ttf), url('deja-bold.ttf') } \
             @font-face { font-family: Missing } \
             @page { size: a4 }",
        );
        assert_eq!(sheet.at_rules().len(), 3);
        assert_eq!(
            sheet.font_faces(),
            vec![
                FontFace {
                    family: "Deja".into(),
                    src: "deja.ttf".into()
                },
                FontFace {
                    family: "Deja".into(),
                    src: "deja-bold.ttf".into()
                },
            ]
        );
    }

    struct Registrar {
        seen: Vec<(String, String)>,
    }

    impl FontRegistrar for Registrar {
        fn register_font(
            &mut self,
            family: &str,
            src: &str,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if src.ends_with(".bad") {
                return Err("unreadable font".into());
            }
            self.seen.push((family.to_string(), src.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_register_fonts() {
        let sheet = sheet("@font-face { font-family: a; src: url(a.ttf), url(b.bad) }");
        let mut registrar = Registrar { seen: Vec::new() };
        assert_eq!(sheet.register_fonts(&mut registrar), 1);
        assert_eq!(registrar.seen, vec![("a".to_string(), "a.ttf".to_string())]);
    }

    #[test]
    fn test_cache_and_layout_pass() {
        let sheet = sheet("p { color: red }");
        let mut tree = StyleTree::new(sheet.registry().clone());
        let p = tree.push(None, Some(StyleSheetKey::element("p")), Style::new());
        {
            let pass = sheet.layout();
            let first = pass.resolver().resolve(&tree, p).unwrap();
            let second = pass.resolver().resolve(&tree, p).unwrap();
            assert!(Rc::ptr_eq(&first, &second));
            assert_eq!(sheet.cached_entries(), 1);
        }
        assert_eq!(sheet.cached_entries(), 0);
    }

    #[test]
    fn test_sheet_set_later_wins() {
        let mut set = StyleSheetSet::new();
        set.push(sheet("p { color: red; width: 5px }"));
        set.push(sheet("p { color: blue }"));
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let p = tree.push(None, Some(StyleSheetKey::element("p")), Style::new());
        let _pass = set.layout();
        let style = set.resolve(&tree, p).unwrap();
        assert_eq!(style.get(attrs::COLOR), Some(Color::from_rgb(0, 0, 255)));
        assert_eq!(style.get(attrs::WIDTH), Some(crate::value::Value::px(5.0)));
    }
}
