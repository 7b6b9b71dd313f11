//! Element tree node types.

use stylekit_css::StyleId;

/// Index of an element in its [`Document`](crate::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// A table with a row-major cell grid.
///
/// Slots covered by a column-spanning cell, and slots a short row did not
/// supply, are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub(crate) columns: usize,
    pub(crate) cell_spacing: i32,
    pub(crate) cell_padding: i32,
    pub(crate) cells: Vec<Option<ElementId>>,
    pub(crate) row_styles: Vec<StyleId>,
}

impl Table {
    pub fn num_columns(&self) -> usize {
        self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.row_styles.len()
    }

    pub fn cell_spacing(&self) -> i32 {
        self.cell_spacing
    }

    pub fn cell_padding(&self) -> i32 {
        self.cell_padding
    }

    /// Cell at `(row, column)`; `None` for placeholders and out of range.
    pub fn cell(&self, row: usize, column: usize) -> Option<ElementId> {
        if column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column).copied().flatten()
    }

    pub fn row_style(&self, row: usize) -> Option<StyleId> {
        self.row_styles.get(row).copied()
    }

    /// Every slot, row-major.
    pub fn slots(&self) -> &[Option<ElementId>] {
        &self.cells
    }
}

/// What an element is, with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Text(String),
    LineBreak,
    Image { src: String, alt: Option<String> },
    /// Placeholder resolved by the embedding widget layer.
    Widget { name: String, param: String },
    Paragraph(Vec<ElementId>),
    /// `div`, headings and the document body.
    Block(Vec<ElementId>),
    /// `ul` and ordered list items.
    Container(Vec<ElementId>),
    ListItem(Vec<ElementId>),
    Link { href: String, children: Vec<ElementId> },
    OrderedList { start: i32, items: Vec<ElementId> },
    TableCell { colspan: usize, children: Vec<ElementId> },
    Table(Table),
}

impl ElementKind {
    /// Short name used in dumps and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Text(_) => "text",
            ElementKind::LineBreak => "line-break",
            ElementKind::Image { .. } => "image",
            ElementKind::Widget { .. } => "widget",
            ElementKind::Paragraph(_) => "paragraph",
            ElementKind::Block(_) => "block",
            ElementKind::Container(_) => "container",
            ElementKind::ListItem(_) => "list-item",
            ElementKind::Link { .. } => "link",
            ElementKind::OrderedList { .. } => "ordered-list",
            ElementKind::TableCell { .. } => "table-cell",
            ElementKind::Table(_) => "table",
        }
    }
}

/// One node of the element tree together with its style node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub style: StyleId,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(style: StyleId, kind: ElementKind) -> Self {
        Self { style, kind }
    }

    /// Child elements in document order. Tables report their cells through
    /// [`Table`] instead.
    pub fn children(&self) -> &[ElementId] {
        match &self.kind {
            ElementKind::Paragraph(children)
            | ElementKind::Block(children)
            | ElementKind::Container(children)
            | ElementKind::ListItem(children)
            | ElementKind::Link { children, .. }
            | ElementKind::TableCell { children, .. } => children,
            ElementKind::OrderedList { items, .. } => items,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<ElementId>> {
        match &mut self.kind {
            ElementKind::Paragraph(children)
            | ElementKind::Block(children)
            | ElementKind::Container(children)
            | ElementKind::ListItem(children)
            | ElementKind::Link { children, .. }
            | ElementKind::TableCell { children, .. } => Some(children),
            ElementKind::OrderedList { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Paragraph(_)
                | ElementKind::Block(_)
                | ElementKind::Container(_)
                | ElementKind::ListItem(_)
                | ElementKind::Link { .. }
                | ElementKind::OrderedList { .. }
                | ElementKind::TableCell { .. }
        )
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match &self.kind {
            ElementKind::Table(table) => Some(table),
            _ => None,
        }
    }
}
