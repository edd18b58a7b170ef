//! Structured entry extraction from API reference pages.
//!
//! Turns one documentation page (Sphinx-style HTML) into zero or more
//! [`DocEntry`] values. Extraction is pure: no I/O, no panics on malformed
//! markup — the html5ever parser recovers from anything, and a page with no
//! recognizable API elements simply yields an empty set. Re-extracting an
//! unchanged page yields identical entries, which is what makes re-indexing
//! idempotent.
//!
//! Recognized markup:
//! - `<section id="module-NAME">` — the page's owning module.
//! - `<dt class="sig sig-object py" id="dotted.path">` — one signature
//!   definition; the enclosing `<dl class="py KIND">` carries the kind.
//! - The `<dd>` following a signature `<dt>` — description text.

use scraper::{ElementRef, Html, Selector};

use crate::models::{DocEntry, EntryKind};

/// Longest summary we keep per entry; remote metadata has a payload cap.
const MAX_SUMMARY_CHARS: usize = 1000;
/// Signatures longer than this are dropped rather than truncated mid-token.
const MAX_SIGNATURE_CHARS: usize = 500;

/// Extract all documentation entries from one HTML page, in document order.
pub fn extract_entries(html: &str) -> Vec<DocEntry> {
    let doc = Html::parse_document(html);
    let mut entries = Vec::new();

    let page_module = extract_module_name(&doc);

    // Emit an entry for the module itself when the page declares one.
    if let Some(ref module) = page_module {
        let summary = module_summary(&doc, module).unwrap_or_default();
        entries.push(make_entry(
            module.clone(),
            EntryKind::Module,
            None,
            summary,
        ));
    }

    let sig_sel = selector("dt.sig.sig-object.py");
    for dt in doc.select(&sig_sel) {
        let Some(id) = dt.value().attr("id") else {
            continue;
        };
        let id = id.trim();
        if id.is_empty() || !id.contains('.') {
            continue;
        }

        let kind = classify(dt, id);
        let signature = build_signature(dt);
        let summary = description_for(dt);

        entries.push(make_entry(id.to_string(), kind, signature, summary));
    }

    entries
}

fn make_entry(
    path: String,
    kind: EntryKind,
    signature: Option<String>,
    summary: String,
) -> DocEntry {
    let summary = truncate_chars(&summary, MAX_SUMMARY_CHARS);
    let signature = signature.filter(|s| !s.is_empty() && s.len() <= MAX_SIGNATURE_CHARS);
    let module_path = parent_path(&path);
    let full_text = build_full_text(&path, &module_path, kind, &summary, signature.as_deref());

    DocEntry {
        path,
        kind,
        signature,
        summary,
        full_text,
        module_path,
    }
}

/// Dotted prefix of a path: `a.b.c` → `a.b`; a single segment has no parent.
fn parent_path(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((prefix, _)) => prefix.to_string(),
        None => String::new(),
    }
}

/// Concatenated text used as the embedding input. Labeled lines keep the
/// identifier, kind, and prose all visible to the embedding model.
fn build_full_text(
    path: &str,
    module_path: &str,
    kind: EntryKind,
    summary: &str,
    signature: Option<&str>,
) -> String {
    let mut parts = vec![format!("Path: {}", path)];
    if !module_path.is_empty() {
        parts.push(format!("Module: {}", module_path));
    }
    parts.push(format!("Kind: {}", kind.as_str()));
    if !summary.is_empty() {
        parts.push(format!("Description: {}", summary));
    }
    if let Some(sig) = signature {
        parts.push(format!("Signature: {}", sig));
    }
    parts.join("\n\n")
}

/// The page's module, from `<section id="module-NAME">` or, failing that,
/// the first dotted identifier in the `<title>`.
fn extract_module_name(doc: &Html) -> Option<String> {
    let section_sel = selector("section[id]");
    for section in doc.select(&section_sel) {
        if let Some(id) = doc_attr(section, "id") {
            if let Some(name) = id.strip_prefix("module-") {
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    let title_sel = selector("title");
    let title = doc.select(&title_sel).next()?;
    let title_text: String = title.text().collect();
    title_text
        .split_whitespace()
        .map(|tok| tok.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.')))
        .find(|tok| {
            tok.contains('.')
                && !tok.starts_with('.')
                && !tok.ends_with('.')
                && tok
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        })
        .map(|tok| tok.to_string())
}

/// First paragraph inside the module's own section, if any.
fn module_summary(doc: &Html, module: &str) -> Option<String> {
    let section_sel = selector("section[id]");
    let p_sel = selector("p");
    let wanted = format!("module-{}", module);
    for section in doc.select(&section_sel) {
        if doc_attr(section, "id").as_deref() == Some(wanted.as_str()) {
            let p = section.select(&p_sel).next()?;
            return Some(collapse_whitespace(&p.text().collect::<String>()));
        }
    }
    None
}

/// Kind from the enclosing `<dl class="py KIND">` element.
fn classify(dt: ElementRef, id: &str) -> EntryKind {
    let mut node = dt.parent();
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            if el.value().name() == "dl" {
                let classes: Vec<&str> = el.value().classes().collect();
                if classes.contains(&"class") || classes.contains(&"exception") {
                    return EntryKind::Class;
                }
                if classes.contains(&"method") {
                    return EntryKind::Method;
                }
                if classes.contains(&"function") {
                    return EntryKind::Function;
                }
                if classes.contains(&"attribute") || classes.contains(&"property") {
                    return EntryKind::Property;
                }
                if classes.contains(&"data") {
                    return EntryKind::Constant;
                }
                break;
            }
        }
        node = n.parent();
    }

    // No usable dl marker: a callable path nested three deep or more is a
    // method on a class, anything else defaults to a function.
    if id.matches('.').count() >= 3 {
        EntryKind::Method
    } else {
        EntryKind::Function
    }
}

/// Assemble a call signature from the Sphinx sig spans. Entries without
/// parameter parens (properties, constants, bare names) get no signature.
fn build_signature(dt: ElementRef) -> Option<String> {
    let name_sel = selector("span.sig-prename, span.sig-name");
    let paren_sel = selector("span.sig-paren");
    let param_sel = selector("em.sig-param");

    let name: String = dt
        .select(&name_sel)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("");
    let name = name.trim().to_string();
    if name.is_empty() {
        return None;
    }

    if dt.select(&paren_sel).next().is_none() {
        return None;
    }

    let params: Vec<String> = dt
        .select(&param_sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .collect();

    Some(format!("{}({})", name, params.join(", ")))
}

/// Description text: the first `<p>` in the `<dd>` following this `<dt>`.
fn description_for(dt: ElementRef) -> String {
    let p_sel = selector("p");
    let mut node = dt.next_sibling();
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            if el.value().name() == "dd" {
                if let Some(p) = el.select(&p_sel).next() {
                    return collapse_whitespace(&p.text().collect::<String>());
                }
                return String::new();
            }
            // Any other element between dt and dd means no description.
            break;
        }
        node = n.next_sibling();
    }
    String::new()
}

fn doc_attr(el: ElementRef, name: &str) -> Option<String> {
    el.value().attr(name).map(|v| v.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Parse a selector literal. Invariant: every selector in this module is a
/// valid static literal.
fn selector(src: &'static str) -> Selector {
    Selector::parse(src).expect("static selector literal")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION_PAGE: &str = r#"<html>
<head><title>Mesh Operators &mdash; pkg.ops.mesh</title></head>
<body>
<section id="module-pkg.ops.mesh">
<p>Operators that act on mesh data.</p>
<dl class="py function">
<dt class="sig sig-object py" id="pkg.ops.mesh.subdivide">
<span class="sig-prename">pkg.ops.mesh.</span><span class="sig-name">subdivide</span>
<span class="sig-paren">(</span><em class="sig-param">number_cuts=1</em>, <em class="sig-param">smoothness=0.0</em><span class="sig-paren">)</span>
</dt>
<dd><p>Subdivide selected edges.</p></dd>
</dl>
</section>
</body></html>"#;

    const CLASS_PAGE: &str = r#"<html><body>
<dl class="py class">
<dt class="sig sig-object py" id="pkg.types.Mesh">
<span class="sig-prename">pkg.types.</span><span class="sig-name">Mesh</span>
<span class="sig-paren">(</span><span class="sig-paren">)</span>
</dt>
<dd>
<p>Mesh data-block defining geometric surfaces.</p>
<dl class="py attribute">
<dt class="sig sig-object py" id="pkg.types.Mesh.vertices">
<span class="sig-name">vertices</span>
</dt>
<dd><p>Vertices of the mesh.</p></dd>
</dl>
</dd>
</dl>
</body></html>"#;

    #[test]
    fn extracts_module_and_function() {
        let entries = extract_entries(FUNCTION_PAGE);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].path, "pkg.ops.mesh");
        assert_eq!(entries[0].kind, EntryKind::Module);
        assert_eq!(entries[0].summary, "Operators that act on mesh data.");
        assert!(entries[0].signature.is_none());
        assert_eq!(entries[0].module_path, "pkg.ops");

        let func = &entries[1];
        assert_eq!(func.path, "pkg.ops.mesh.subdivide");
        assert_eq!(func.kind, EntryKind::Function);
        assert_eq!(func.summary, "Subdivide selected edges.");
        assert_eq!(
            func.signature.as_deref(),
            Some("pkg.ops.mesh.subdivide(number_cuts=1, smoothness=0.0)")
        );
        assert_eq!(func.module_path, "pkg.ops.mesh");
    }

    #[test]
    fn extracts_class_and_property() {
        let entries = extract_entries(CLASS_PAGE);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].path, "pkg.types.Mesh");
        assert_eq!(entries[0].kind, EntryKind::Class);

        assert_eq!(entries[1].path, "pkg.types.Mesh.vertices");
        assert_eq!(entries[1].kind, EntryKind::Property);
        assert!(entries[1].signature.is_none());
        assert_eq!(entries[1].module_path, "pkg.types.Mesh");
    }

    #[test]
    fn full_text_carries_identifier_and_description() {
        let entries = extract_entries(FUNCTION_PAGE);
        let func = &entries[1];
        assert!(func.full_text.contains("Path: pkg.ops.mesh.subdivide"));
        assert!(func.full_text.contains("Kind: function"));
        assert!(func.full_text.contains("Subdivide selected edges."));
        assert!(!func.full_text.is_empty());
    }

    #[test]
    fn page_without_api_elements_yields_nothing() {
        let entries = extract_entries("<html><body><p>Release notes.</p></body></html>");
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        let entries = extract_entries("<dl class=\"py function\"><dt class=\"sig sig-object py\" id=\"a.b\"><span class=\"sig-name\">b</span><span class=\"sig-paren\">(");
        // The recovered tree still exposes the id.
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "a.b");
    }

    #[test]
    fn extraction_is_deterministic() {
        let first = extract_entries(CLASS_PAGE);
        let second = extract_entries(CLASS_PAGE);
        assert_eq!(first, second);
    }

    #[test]
    fn module_name_falls_back_to_title() {
        let html = r#"<html><head><title>Utilities (pkg.utils) &mdash; API</title></head>
            <body><p>No sections here.</p></body></html>"#;
        let entries = extract_entries(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "pkg.utils");
        assert_eq!(entries[0].kind, EntryKind::Module);
    }
}
