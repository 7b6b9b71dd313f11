//! Compound selector chains, specificity and matching.

use std::rc::Rc;

use smallvec::SmallVec;
use stylekit_cssparser::{CompoundAst, SelectorAst};

use crate::node::{StyleId, StyleSheetKey, StyleTree};
use crate::style::Style;

/// Score added per direct-child link.
pub const SCORE_DIRECT_CHILD: u32 = 0x1;
/// Score added per link naming a tag.
pub const SCORE_ELEMENT: u32 = 0x100;
/// Score added per link naming a class.
pub const SCORE_CLASS: u32 = 0x10000;
/// Score added per link naming an id.
pub const SCORE_ID: u32 = 0x1000000;

/// One compound matcher of a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorLink {
    pub element: Option<String>,
    pub class_name: Option<String>,
    pub id: Option<String>,
    /// Must match the keyed ancestor directly above the previous link's match.
    pub direct_child: bool,
}

impl SelectorLink {
    /// Every field the link names must equal the key's; absent fields match.
    pub fn matches(&self, key: &StyleSheetKey) -> bool {
        fn field(want: &Option<String>, have: Option<&str>) -> bool {
            match want {
                Some(w) => have == Some(w.as_str()),
                None => true,
            }
        }
        field(&self.element, Some(&key.element))
            && field(&self.class_name, key.class_name.as_deref())
            && field(&self.id, key.id.as_deref())
    }

    fn score(&self) -> u32 {
        let mut score = 0u32;
        if self.direct_child {
            score = score.wrapping_add(SCORE_DIRECT_CHILD);
        }
        if self.element.is_some() {
            score = score.wrapping_add(SCORE_ELEMENT);
        }
        if self.class_name.is_some() {
            score = score.wrapping_add(SCORE_CLASS);
        }
        if self.id.is_some() {
            score = score.wrapping_add(SCORE_ID);
        }
        score
    }
}

impl From<&CompoundAst> for SelectorLink {
    fn from(ast: &CompoundAst) -> Self {
        Self {
            element: ast.element.clone(),
            class_name: ast.class_name.clone(),
            id: ast.id.clone(),
            direct_child: ast.direct_child,
        }
    }
}

/// A selector chain with its score and declaration block.
#[derive(Debug, Clone)]
pub struct Selector {
    /// Subject first, outermost ancestor last.
    links: SmallVec<[SelectorLink; 4]>,
    pseudo_class: Option<String>,
    score: u32,
    style: Rc<Style>,
}

impl Selector {
    pub fn new(links: impl IntoIterator<Item = SelectorLink>, pseudo_class: Option<String>, style: Rc<Style>) -> Self {
        let links: SmallVec<[SelectorLink; 4]> = links.into_iter().collect();
        let score = specificity(&links);
        Self {
            links,
            pseudo_class,
            score,
            style,
        }
    }

    /// Build from a parsed chain. The pseudo-class of the subject is kept.
    pub fn from_ast(ast: &SelectorAst, style: Rc<Style>) -> Self {
        let pseudo_class = ast.links.first().and_then(|l| l.pseudo_class.clone());
        Self::new(ast.links.iter().map(SelectorLink::from), pseudo_class, style)
    }

    pub fn links(&self) -> &[SelectorLink] {
        &self.links
    }

    pub fn pseudo_class(&self) -> Option<&str> {
        self.pseudo_class.as_deref()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn style(&self) -> &Rc<Style> {
        &self.style
    }

    /// Whether the chain matches node `id`.
    ///
    /// Walks from `id` upwards, testing only nodes that carry a key. The
    /// subject must match the first keyed node. A failing direct-child link
    /// ends the match; a descendant link moves on to the next ancestor.
    pub fn matches(&self, tree: &StyleTree, id: StyleId) -> bool {
        if self.links.is_empty() {
            return false;
        }
        let mut next = 0;
        for node in tree.ancestors(id) {
            let Some(key) = tree.key(node) else {
                continue;
            };
            let link = &self.links[next];
            if link.matches(key) {
                next += 1;
                if next == self.links.len() {
                    return true;
                }
            } else if next == 0 || link.direct_child {
                return false;
            }
        }
        false
    }
}

/// Sum of the link scores, wrapping on overflow.
pub fn specificity(links: &[SelectorLink]) -> u32 {
    links
        .iter()
        .fold(0u32, |acc, link| acc.wrapping_add(link.score()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;

    fn link(element: Option<&str>, class_name: Option<&str>, id: Option<&str>) -> SelectorLink {
        SelectorLink {
            element: element.map(str::to_string),
            class_name: class_name.map(str::to_string),
            id: id.map(str::to_string),
            direct_child: false,
        }
    }

    #[test]
    fn test_scores() {
        assert_eq!(specificity(&[link(Some("div"), Some("a"), None)]), 0x10100);
        assert_eq!(specificity(&[link(None, Some("a"), None)]), 0x10000);
        let mut parent = link(Some("div"), None, None);
        parent.direct_child = true;
        assert_eq!(
            specificity(&[link(Some("p"), None, None), parent]),
            0x100 + 0x100 + 1
        );
        assert_eq!(specificity(&[link(None, None, Some("x"))]), 0x1000000);
    }

    #[test]
    fn test_score_wraps() {
        let ids: Vec<_> = (0..300).map(|_| link(None, None, Some("x"))).collect();
        assert_eq!(specificity(&ids), 300u32.wrapping_mul(0x1000000));
    }

    #[test]
    fn test_empty_chain_matches_nothing() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let div = tree.push(None, Some(StyleSheetKey::element("div")), Style::new());
        let selector = Selector::new(Vec::<SelectorLink>::new(), None, Rc::new(Style::new()));
        assert_eq!(selector.score(), 0);
        assert!(!selector.matches(&tree, div));
    }

    #[test]
    fn test_link_matches() {
        let key = StyleSheetKey::new("div", Some("note"), Some("intro"));
        assert!(link(None, None, None).matches(&key));
        assert!(link(Some("div"), Some("note"), None).matches(&key));
        assert!(link(None, None, Some("intro")).matches(&key));
        assert!(!link(Some("p"), None, None).matches(&key));
        assert!(!link(None, Some("other"), None).matches(&key));
        assert!(!link(None, Some("note"), None).matches(&StyleSheetKey::element("div")));
    }

    #[test]
    fn test_chain_matching() {
        let mut tree = StyleTree::new(AttributeRegistry::standard());
        let div = tree.push(None, Some(StyleSheetKey::element("div")), Style::new());
        let anon = tree.push(Some(div), None, Style::new());
        let span = tree.push(Some(anon), Some(StyleSheetKey::element("span")), Style::new());
        let p = tree.push(Some(span), Some(StyleSheetKey::element("p")), Style::new());
        let text = tree.push(Some(p), None, Style::new());

        let style = Rc::new(Style::new());
        let descendant = Selector::new(
            [link(Some("p"), None, None), link(Some("div"), None, None)],
            None,
            style.clone(),
        );
        assert!(descendant.matches(&tree, p));
        // keyless nodes are skipped, so the subject matches the nearest keyed node
        assert!(descendant.matches(&tree, text));
        assert!(!descendant.matches(&tree, span));

        let mut direct_div = link(Some("div"), None, None);
        direct_div.direct_child = true;
        let direct = Selector::new([link(Some("p"), None, None), direct_div.clone()], None, style.clone());
        assert!(!direct.matches(&tree, p));
        let direct_span = Selector::new([link(Some("span"), None, None), direct_div], None, style);
        assert!(direct_span.matches(&tree, span));
    }
}
