//! Parent-pointer tree reconstruction and filesystem path derivation.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, instrument};

use super::{CatalogError, CatalogNode};

/// Maximum number of characters kept in one path segment.
pub const MAX_SEGMENT_CHARS: usize = 100;

/// Placeholder for titles that sanitize down to nothing.
pub const UNTITLED: &str = "Untitled";

/// Sanitizes one title into a path segment that is safe on common filesystems.
///
/// - `< > : " / \ | ? *` become `_`
/// - control characters are dropped
/// - the result is cut to [`MAX_SEGMENT_CHARS`] characters
/// - leading/trailing whitespace and dots are trimmed
/// - an empty result becomes [`UNTITLED`]
///
/// Truncation happens before trimming so the function is idempotent.
#[must_use]
pub fn sanitize_segment(name: &str) -> String {
    let replaced: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .take(MAX_SEGMENT_CHARS)
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized path segments from a catalog root down to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    segments: Vec<String>,
}

impl ResolvedPath {
    /// All segments, root first; the last one is the node's own title.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments of the containing directory (everything but the node itself).
    #[must_use]
    pub fn parent_segments(&self) -> &[String] {
        self.segments
            .split_last()
            .map_or(&[][..], |(_, parents)| parents)
    }

    /// The node's own sanitized title, used as the file stem.
    #[must_use]
    pub fn file_stem(&self) -> &str {
        self.segments.last().map_or(UNTITLED, String::as_str)
    }

    /// Segments joined as a relative directory path.
    #[must_use]
    pub fn to_relative_dir(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    /// Returns true if `other` lies strictly below this path.
    #[must_use]
    pub fn is_proper_prefix_of(&self, other: &ResolvedPath) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }
}

/// Resolved paths for every node of one catalog, keyed by node identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    by_uuid: HashMap<String, ResolvedPath>,
}

impl ResolvedPaths {
    /// Path for the node with identity `uuid`.
    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<&ResolvedPath> {
        self.by_uuid.get(uuid)
    }

    /// Number of resolved nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    /// Returns true when no node was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

/// One row of a depth-first catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    /// The listed node.
    pub node: &'a CatalogNode,
    /// Distance from the root (roots are depth 0).
    pub depth: usize,
}

/// Identity and parent→children indexes over a borrowed node list.
///
/// Built once per run and never mutated. Child lists keep input order. A
/// node whose parent is empty, unknown, or itself is treated as a root for
/// listing purposes.
#[derive(Debug)]
pub struct CatalogIndex<'a> {
    nodes: &'a [CatalogNode],
    by_uuid: HashMap<&'a str, usize>,
    children: HashMap<&'a str, Vec<usize>>,
    roots: Vec<usize>,
}

impl<'a> CatalogIndex<'a> {
    /// Indexes `nodes`. Duplicate identities keep their first occurrence.
    #[must_use]
    pub fn build(nodes: &'a [CatalogNode]) -> Self {
        let mut by_uuid: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            by_uuid.entry(node.uuid.as_str()).or_insert(idx);
        }

        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        for (idx, node) in nodes.iter().enumerate() {
            let parent_known = node.has_parent()
                && node.parent_uuid != node.uuid
                && by_uuid.contains_key(node.parent_uuid.as_str());
            if parent_known {
                children
                    .entry(node.parent_uuid.as_str())
                    .or_default()
                    .push(idx);
            } else {
                if node.has_parent() && node.parent_uuid != node.uuid {
                    debug!(
                        uuid = %node.uuid,
                        parent = %node.parent_uuid,
                        "unknown parent reference; treating node as root"
                    );
                }
                roots.push(idx);
            }
        }

        Self {
            nodes,
            by_uuid,
            children,
            roots,
        }
    }

    /// The indexed node list, in input order.
    #[must_use]
    pub fn nodes(&self) -> &'a [CatalogNode] {
        self.nodes
    }

    /// Looks up a node by identity.
    #[must_use]
    pub fn node(&self, uuid: &str) -> Option<&'a CatalogNode> {
        let nodes = self.nodes;
        self.by_uuid.get(uuid).and_then(|&idx| nodes.get(idx))
    }

    /// Direct children of `uuid`, in input order.
    pub fn children_of(&self, uuid: &str) -> impl Iterator<Item = &'a CatalogNode> + '_ {
        let nodes = self.nodes;
        self.children
            .get(uuid)
            .into_iter()
            .flatten()
            .filter_map(move |&idx| nodes.get(idx))
    }

    /// Nodes with no resolvable parent, in input order.
    pub fn roots(&self) -> impl Iterator<Item = &'a CatalogNode> + '_ {
        let nodes = self.nodes;
        self.roots.iter().filter_map(move |&idx| nodes.get(idx))
    }

    /// Depth-first listing: each root followed by its subtree, children in input order.
    ///
    /// Nodes caught in a parent cycle are unreachable from any root and are
    /// left out.
    #[must_use]
    pub fn tree_view(&self) -> Vec<TreeEntry<'a>> {
        let mut entries = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(&'a CatalogNode, usize)> =
            self.roots().map(|node| (node, 0)).collect();
        stack.reverse();

        while let Some((node, depth)) = stack.pop() {
            if entries.len() >= self.nodes.len() {
                break;
            }
            entries.push(TreeEntry { node, depth });
            let children: Vec<&'a CatalogNode> = self.children_of(&node.uuid).collect();
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        entries
    }

    /// Resolves the root-to-node path of `node`.
    ///
    /// The upward walk is bounded by the catalog size.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Corruption`] when the walk exceeds the bound,
    /// which only happens when parent references form a cycle.
    pub fn resolve_path(&self, node: &CatalogNode) -> Result<ResolvedPath, CatalogError> {
        let limit = self.nodes.len().max(1);
        let mut segments = Vec::new();
        let mut current = Some(node);

        while let Some(step) = current {
            if segments.len() >= limit {
                return Err(CatalogError::corruption(&node.uuid, limit));
            }
            segments.push(sanitize_segment(&step.title));
            current = self.parent_of(step);
        }

        segments.reverse();
        Ok(ResolvedPath { segments })
    }

    fn parent_of(&self, node: &CatalogNode) -> Option<&'a CatalogNode> {
        if node.has_parent() {
            self.node(&node.parent_uuid)
        } else {
            None
        }
    }
}

/// Maps every node of `nodes` to its sanitized root-to-node path.
///
/// # Errors
///
/// Returns [`CatalogError::Corruption`] if any node's ancestry loops.
#[instrument(level = "debug", skip(nodes), fields(nodes = nodes.len()))]
pub fn resolve_paths(nodes: &[CatalogNode]) -> Result<ResolvedPaths, CatalogError> {
    let index = CatalogIndex::build(nodes);
    let mut by_uuid = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if by_uuid.contains_key(&node.uuid) {
            continue;
        }
        let path = index.resolve_path(node)?;
        by_uuid.insert(node.uuid.clone(), path);
    }
    Ok(ResolvedPaths { by_uuid })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::NodeKind;

    fn group(uuid: &str, parent: &str, title: &str) -> CatalogNode {
        CatalogNode::new(uuid, parent, NodeKind::Group, title)
    }

    fn doc(uuid: &str, parent: &str, title: &str) -> CatalogNode {
        CatalogNode::new(uuid, parent, NodeKind::Document, title)
    }

    fn sample_catalog() -> Vec<CatalogNode> {
        vec![
            group("A", "", "Guides"),
            doc("B", "A", "Intro"),
            group("C", "A", "Advanced"),
            doc("D", "C", "Tuning"),
            doc("E", "", "Changelog"),
        ]
    }

    // ==================== Sanitization ====================

    #[test]
    fn test_sanitize_segment_replaces_illegal_chars() {
        assert_eq!(sanitize_segment("a<b>c:d\"e"), "a_b_c_d_e");
        assert_eq!(sanitize_segment("x/y\\z|w?v*u"), "x_y_z_w_v_u");
    }

    #[test]
    fn test_sanitize_segment_drops_control_chars() {
        assert_eq!(sanitize_segment("tab\there\u{7f}"), "tabhere");
        assert_eq!(sanitize_segment("line\nbreak"), "linebreak");
    }

    #[test]
    fn test_sanitize_segment_trims_whitespace_and_dots() {
        assert_eq!(sanitize_segment("  .hidden. "), "hidden");
        assert_eq!(sanitize_segment(". . name . ."), "name");
    }

    #[test]
    fn test_sanitize_segment_empty_becomes_placeholder() {
        assert_eq!(sanitize_segment(""), UNTITLED);
        assert_eq!(sanitize_segment(" ... "), UNTITLED);
        assert_eq!(sanitize_segment("\u{1}\u{2}"), UNTITLED);
    }

    #[test]
    fn test_sanitize_segment_truncates_to_bound() {
        let long = "字".repeat(250);
        let sanitized = sanitize_segment(&long);
        assert_eq!(sanitized.chars().count(), MAX_SEGMENT_CHARS);
    }

    #[test]
    fn test_sanitize_segment_is_idempotent() {
        let inputs = [
            "Guides",
            "  a/b  ",
            "日本語 タイトル",
            "ends with dot at the cut",
            &format!("{}. tail", "x".repeat(99)),
            &format!("{} .", "y".repeat(120)),
            "",
            "...",
            "mixed\u{0}<ctrl>",
        ];
        for input in inputs {
            let once = sanitize_segment(input);
            let twice = sanitize_segment(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
            assert!(!once.is_empty());
            assert!(once.chars().count() <= MAX_SEGMENT_CHARS);
        }
    }

    #[test]
    fn test_sanitize_segment_truncation_then_trim_keeps_idempotence() {
        // Character 100 is a space; it must not survive as a trailing char.
        let input = format!("{} rest", "z".repeat(99));
        let sanitized = sanitize_segment(&input);
        assert_eq!(sanitized, "z".repeat(99));
    }

    // ==================== Path resolution ====================

    #[test]
    fn test_resolve_paths_group_and_child() {
        let nodes = vec![group("A", "", "Guides"), doc("B", "A", "Intro")];
        let paths = resolve_paths(&nodes).unwrap();
        assert_eq!(paths.get("B").unwrap().segments(), ["Guides", "Intro"]);
        assert_eq!(paths.get("A").unwrap().segments(), ["Guides"]);
    }

    #[test]
    fn test_resolve_paths_nested_levels() {
        let paths = resolve_paths(&sample_catalog()).unwrap();
        let tuning = paths.get("D").unwrap();
        assert_eq!(tuning.segments(), ["Guides", "Advanced", "Tuning"]);
        assert_eq!(tuning.parent_segments(), ["Guides", "Advanced"]);
        assert_eq!(tuning.file_stem(), "Tuning");
        assert_eq!(
            tuning.to_relative_dir(),
            PathBuf::from("Guides").join("Advanced").join("Tuning")
        );
    }

    #[test]
    fn test_resolve_paths_sanitizes_every_segment() {
        let nodes = vec![group("A", "", "Q&A: part 1/2"), doc("B", "A", " notes. ")];
        let paths = resolve_paths(&nodes).unwrap();
        assert_eq!(paths.get("B").unwrap().segments(), ["Q&A_ part 1_2", "notes"]);
    }

    #[test]
    fn test_resolve_paths_unknown_parent_is_root() {
        let nodes = vec![doc("X", "missing", "Orphan")];
        let paths = resolve_paths(&nodes).unwrap();
        assert_eq!(paths.get("X").unwrap().segments(), ["Orphan"]);
    }

    #[test]
    fn test_resolve_paths_is_deterministic() {
        let nodes = sample_catalog();
        assert_eq!(resolve_paths(&nodes).unwrap(), resolve_paths(&nodes).unwrap());
    }

    #[test]
    fn test_descendant_path_extends_parent_path() {
        let nodes = sample_catalog();
        let paths = resolve_paths(&nodes).unwrap();
        for node in &nodes {
            if node.has_parent() {
                let parent = paths.get(&node.parent_uuid).unwrap();
                let child = paths.get(&node.uuid).unwrap();
                assert!(
                    parent.is_proper_prefix_of(child),
                    "{} should extend {}",
                    node.uuid,
                    node.parent_uuid
                );
            }
        }
    }

    #[test]
    fn test_resolve_paths_detects_cycle() {
        let nodes = vec![doc("A", "B", "one"), doc("B", "A", "two")];
        let result = resolve_paths(&nodes);
        assert!(matches!(result, Err(CatalogError::Corruption { .. })));
    }

    #[test]
    fn test_resolve_paths_self_parent_is_corruption() {
        let nodes = vec![doc("A", "A", "loop")];
        let result = resolve_paths(&nodes);
        assert!(matches!(result, Err(CatalogError::Corruption { limit: 1, .. })));
    }

    #[test]
    fn test_resolve_paths_empty_catalog() {
        let paths = resolve_paths(&[]).unwrap();
        assert!(paths.is_empty());
    }

    // ==================== Index ====================

    #[test]
    fn test_index_children_keep_input_order() {
        let nodes = vec![
            group("A", "", "root"),
            doc("C", "A", "second-listed-first"),
            doc("B", "A", "listed-second"),
        ];
        let index = CatalogIndex::build(&nodes);
        let children: Vec<&str> = index.children_of("A").map(|n| n.uuid.as_str()).collect();
        assert_eq!(children, ["C", "B"]);
    }

    #[test]
    fn test_tree_view_is_depth_first_with_depths() {
        let nodes = sample_catalog();
        let index = CatalogIndex::build(&nodes);
        let view: Vec<(&str, usize)> = index
            .tree_view()
            .iter()
            .map(|entry| (entry.node.uuid.as_str(), entry.depth))
            .collect();
        assert_eq!(view, [("A", 0), ("B", 1), ("C", 1), ("D", 2), ("E", 0)]);
    }

    #[test]
    fn test_tree_view_child_listed_before_parent_in_input() {
        let nodes = vec![doc("B", "A", "child"), group("A", "", "parent")];
        let index = CatalogIndex::build(&nodes);
        let view: Vec<&str> = index.tree_view().iter().map(|e| e.node.uuid.as_str()).collect();
        assert_eq!(view, ["A", "B"]);
    }

    #[test]
    fn test_tree_view_skips_cycle_members() {
        let nodes = vec![
            doc("A", "B", "one"),
            doc("B", "A", "two"),
            doc("C", "", "fine"),
        ];
        let index = CatalogIndex::build(&nodes);
        let view: Vec<&str> = index.tree_view().iter().map(|e| e.node.uuid.as_str()).collect();
        assert_eq!(view, ["C"]);
    }
}
