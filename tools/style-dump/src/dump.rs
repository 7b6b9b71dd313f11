//! Resolve a document against its stylesheets and write the result.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;
use stylekit_common::{OptionExt, Result, ResultExt};
use stylekit_css::{AttributeRegistry, StyleSheet, StyleSheetResolver, StyleSheetSet, Variant};
use stylekit_dom::{Document, ElementId, HtmlTextModel, TextModel};
use tracing::{debug, info, warn};

/// Output format of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// What to dump and how.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub document: PathBuf,
    /// Extra stylesheets, applied after the document's linked ones.
    pub stylesheets: Vec<PathBuf>,
    pub format: OutputFormat,
    /// Dump only the subtree of the element with this id.
    pub id: Option<String>,
    /// Include attributes that resolve to their default.
    pub all: bool,
    /// Include hover variants.
    pub hover: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentDump {
    pub title: Option<String>,
    pub stylesheets: Vec<String>,
    pub elements: Vec<ElementDump>,
}

#[derive(Debug, Serialize)]
pub struct ElementDump {
    pub depth: usize,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

/// Parse the document and stylesheets named by `options` and write the
/// resolved attributes to `out`.
pub fn run(options: &DumpOptions, out: &mut dyn Write) -> Result<()> {
    let registry = AttributeRegistry::standard();
    let source = fs::read_to_string(&options.document)?;

    let mut model = HtmlTextModel::new(registry.clone());
    model
        .set_html(&source)
        .document_context(format!("parsing {}", options.document.display()))?;

    let base = options.document.parent().unwrap_or_else(|| Path::new("."));
    let sheets = load_stylesheets(&registry, base, model.stylesheet_links(), &options.stylesheets)?;
    info!(
        document = %options.document.display(),
        sheets = sheets.len(),
        elements = model.document().len(),
        "document loaded"
    );

    let pass = sheets.layout();
    let dump = dump_document(model.document(), Some(pass.resolver()), options)?;
    drop(pass);

    match options.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &dump).map_err(std::io::Error::from)?;
            writeln!(out)?;
        }
        OutputFormat::Text => write_text(&dump, out)?,
    }
    Ok(())
}

/// Load the linked stylesheets that exist next to the document, then the
/// extra ones. A missing linked sheet is skipped; a missing extra sheet is
/// an error.
pub fn load_stylesheets(
    registry: &Arc<AttributeRegistry>,
    base: &Path,
    links: &[String],
    extra: &[PathBuf],
) -> Result<StyleSheetSet> {
    let mut set = StyleSheetSet::new();
    for link in links {
        let path = base.join(link);
        if !path.is_file() {
            warn!(href = %link, "linked stylesheet not found, skipping");
            continue;
        }
        set.push(load_stylesheet(registry, &path)?);
    }
    for path in extra {
        set.push(load_stylesheet(registry, path)?);
    }
    Ok(set)
}

fn load_stylesheet(registry: &Arc<AttributeRegistry>, path: &Path) -> Result<StyleSheet> {
    let css = fs::read_to_string(path)?;
    let mut sheet = StyleSheet::new(registry.clone());
    let diagnostics = sheet
        .parse_str(&css)
        .css_context(format!("parsing {}", path.display()))?;
    for diagnostic in &diagnostics {
        warn!(
            file = %path.display(),
            property = %diagnostic.property,
            error = %diagnostic.error,
            "declaration skipped"
        );
    }
    debug!(file = %path.display(), rules = sheet.rules().len(), "stylesheet loaded");
    Ok(sheet)
}

/// Collect the resolved attributes of every element, or of one subtree.
pub fn dump_document(
    document: &Document,
    resolver: Option<&dyn StyleSheetResolver>,
    options: &DumpOptions,
) -> Result<DocumentDump> {
    let start = match &options.id {
        Some(id) => Some(
            document
                .get_element_by_id(id)
                .ok_or_not_found(format!("element #{}", id))?,
        ),
        None => None,
    };

    let mut visited = Vec::new();
    // depth of the selected subtree root while inside it
    let mut inside: Option<usize> = None;
    document.traverse(|id, depth| {
        if let Some(root_depth) = inside {
            if depth <= root_depth {
                inside = None;
            }
        }
        if inside.is_none() && start == Some(id) {
            inside = Some(depth);
        }
        match (start, inside) {
            (None, _) => visited.push((id, depth)),
            (Some(_), Some(root_depth)) => visited.push((id, depth - root_depth)),
            _ => {}
        }
    });

    let elements = visited
        .into_iter()
        .map(|(id, depth)| dump_element(document, id, depth, resolver, options))
        .collect();

    Ok(DocumentDump {
        title: document.title().map(str::to_string),
        stylesheets: document.stylesheet_links().to_vec(),
        elements,
    })
}

fn dump_element(
    document: &Document,
    id: ElementId,
    depth: usize,
    resolver: Option<&dyn StyleSheetResolver>,
    options: &DumpOptions,
) -> ElementDump {
    let element = document.element(id);
    let styles = document.styles();
    let mut attributes = BTreeMap::new();
    for descriptor in document.registry().iter() {
        if descriptor.variant == Variant::Hover && !options.hover {
            continue;
        }
        let Some(value) = styles.get_value(element.style, descriptor.ordinal, resolver) else {
            continue;
        };
        if !options.all && descriptor.default.as_ref() == Some(&value) {
            continue;
        }
        attributes.insert(descriptor.name.clone(), value.to_string());
    }
    ElementDump {
        depth,
        kind: element.kind.name(),
        key: styles.key(element.style).map(|k| k.to_string()),
        text: element.text().map(str::to_string),
        attributes,
    }
}

fn write_text(dump: &DocumentDump, out: &mut dyn Write) -> std::io::Result<()> {
    if let Some(title) = &dump.title {
        writeln!(out, "title: {}", title)?;
    }
    for href in &dump.stylesheets {
        writeln!(out, "stylesheet: {}", href)?;
    }
    for element in &dump.elements {
        let indent = "  ".repeat(element.depth);
        write!(out, "{}{}", indent, element.kind)?;
        if let Some(key) = &element.key {
            write!(out, " <{}>", key)?;
        }
        if let Some(text) = &element.text {
            write!(out, " {:?}", text)?;
        }
        writeln!(out)?;
        for (name, value) in &element.attributes {
            writeln!(out, "{}    {}: {}", indent, name, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylekit_common::StyleKitError;

    fn options(document: PathBuf, format: OutputFormat) -> DumpOptions {
        DumpOptions {
            document,
            stylesheets: Vec::new(),
            format,
            id: None,
            all: false,
            hover: false,
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn run_to_string(options: &DumpOptions) -> String {
        let mut out = Vec::new();
        run(options, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_linked_and_extra_stylesheets() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.css", "p { color: #102030; margin: 4px }");
        let extra = write(dir.path(), "extra.css", "p { color: #405060 }");
        let doc = write(
            dir.path(),
            "doc.html",
            r#"<html><head><title>Doc</title>
<link rel="stylesheet" type="text/css" href="base.css"/>
<link rel="stylesheet" type="text/css" href="missing.css"/>
</head><body><p id="p">hi</p></body></html>"#,
        );

        let mut opts = options(doc, OutputFormat::Json);
        opts.stylesheets.push(extra);
        let json: serde_json::Value = serde_json::from_str(&run_to_string(&opts)).unwrap();

        assert_eq!(json["title"], "Doc");
        assert_eq!(json["stylesheets"].as_array().unwrap().len(), 2);
        let paragraph = json["elements"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["key"] == "p#p")
            .unwrap();
        // extra sheet comes last and wins
        assert_eq!(paragraph["attributes"]["color"], "#405060");
        assert_eq!(paragraph["attributes"]["margin-top"], "4px");
    }

    #[test]
    fn test_text_output_for_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(
            dir.path(),
            "doc.html",
            r#"<html><body><p>skip</p><div id="d"><b>bold</b></div></body></html>"#,
        );
        let mut opts = options(doc, OutputFormat::Text);
        opts.id = Some("d".to_string());
        let text = run_to_string(&opts);

        assert!(text.starts_with("block <div#d>"));
        assert!(text.contains("\"bold\""));
        assert!(!text.contains("skip"));
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(dir.path(), "doc.html", "<p>x</p>");
        let mut opts = options(doc, OutputFormat::Text);
        opts.id = Some("nope".to_string());
        let err = run(&opts, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, StyleKitError::NotFound(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_broken_document_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(dir.path(), "doc.html", "<html><body><p></div></body></html>");
        let err = run(&options(doc, OutputFormat::Text), &mut Vec::new()).unwrap_err();
        assert_eq!(err.category(), "document");
    }

    #[test]
    fn test_missing_extra_stylesheet_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(dir.path(), "doc.html", "<p>x</p>");
        let mut opts = options(doc, OutputFormat::Text);
        opts.stylesheets.push(dir.path().join("absent.css"));
        let err = run(&opts, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, StyleKitError::Io(_)));
    }
}
