//! Module listing.
//!
//! A derived view over the index summary: given an optional parent module
//! path, the distinct immediate children present in the indexed corpus.
//! Served from the locally held summary, so it is cheap and never cached.

use std::collections::BTreeSet;

use crate::models::IndexSummary;

/// Immediate child module paths under `parent`, sorted, no duplicates.
///
/// Intermediate modules are implied: if the corpus covers `pkg.ops.mesh`,
/// then `pkg` has the child `pkg.ops` even when `pkg.ops` itself carries no
/// entries. Grandchildren are never included.
pub fn list_modules(summary: &IndexSummary, parent: Option<&str>) -> Vec<String> {
    let parent = parent.map(str::trim).filter(|p| !p.is_empty());

    let mut children = BTreeSet::new();
    for module in &summary.modules {
        for prefix in dotted_prefixes(module) {
            match parent {
                None => {
                    if !prefix.contains('.') {
                        children.insert(prefix.to_string());
                    }
                }
                Some(parent) => {
                    if let Some(rest) = prefix.strip_prefix(parent) {
                        if let Some(segment) = rest.strip_prefix('.') {
                            if !segment.is_empty() && !segment.contains('.') {
                                children.insert(prefix.to_string());
                            }
                        }
                    }
                }
            }
        }
    }

    children.into_iter().collect()
}

/// All dotted prefixes of a path: `a.b.c` → `a`, `a.b`, `a.b.c`.
fn dotted_prefixes(path: &str) -> Vec<&str> {
    let mut prefixes = Vec::new();
    let mut end = 0;
    for (i, c) in path.char_indices() {
        if c == '.' {
            if i > end {
                prefixes.push(&path[..i]);
            }
            end = i + 1;
        }
    }
    if !path.is_empty() {
        prefixes.push(path);
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with(modules: &[&str]) -> IndexSummary {
        IndexSummary {
            total_entries: 0,
            index_name: "test".to_string(),
            embedding_model: "test".to_string(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
            indexed_at: 0,
        }
    }

    #[test]
    fn top_level_modules_without_parent() {
        let summary = summary_with(&["pkg.ops.mesh", "pkg.types", "bmesh.ops"]);
        assert_eq!(list_modules(&summary, None), vec!["bmesh", "pkg"]);
    }

    #[test]
    fn immediate_children_only() {
        let summary = summary_with(&["pkg.ops.mesh", "pkg.ops.object", "pkg.ops.mesh.extra"]);
        assert_eq!(
            list_modules(&summary, Some("pkg.ops")),
            vec!["pkg.ops.mesh", "pkg.ops.object"]
        );
    }

    #[test]
    fn intermediate_modules_are_implied() {
        let summary = summary_with(&["pkg.ops.mesh"]);
        assert_eq!(list_modules(&summary, Some("pkg")), vec!["pkg.ops"]);
    }

    #[test]
    fn no_duplicates() {
        let summary = summary_with(&["pkg.ops.mesh", "pkg.ops.object", "pkg.ops"]);
        let children = list_modules(&summary, Some("pkg"));
        assert_eq!(children, vec!["pkg.ops"]);
    }

    #[test]
    fn unknown_parent_is_empty() {
        let summary = summary_with(&["pkg.ops"]);
        assert!(list_modules(&summary, Some("other")).is_empty());
    }

    #[test]
    fn sibling_prefix_is_not_a_parent_match() {
        // "pkg.op" must not claim children of "pkg.ops".
        let summary = summary_with(&["pkg.ops.mesh"]);
        assert!(list_modules(&summary, Some("pkg.op")).is_empty());
    }
}
