//! Expansion of a partial catalog selection into the nodes to export.

use std::collections::HashSet;

use tracing::{debug, instrument};

use super::{CatalogIndex, CatalogNode};

/// What the operator asked to export from one knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every node, in listing order, without resolution.
    All,
    /// The chosen node identities; groups pull in their whole subtree.
    Nodes(Vec<String>),
}

impl Selection {
    /// Builds a selection from chosen identities; an empty list means everything.
    #[must_use]
    pub fn from_chosen(chosen: Vec<String>) -> Self {
        if chosen.is_empty() {
            Self::All
        } else {
            Self::Nodes(chosen)
        }
    }
}

/// Resolves `selection` against the full ordered node list.
///
/// Every chosen node is kept together with all of its descendants
/// (transitively), whether or not those were chosen separately. The result
/// follows the original listing order regardless of the order the caller
/// chose nodes in, and each identity appears once. Unknown identities are
/// ignored.
#[instrument(level = "debug", skip(nodes, selection), fields(nodes = nodes.len()))]
pub fn resolve_selection<'a>(
    nodes: &'a [CatalogNode],
    selection: &Selection,
) -> Vec<&'a CatalogNode> {
    let chosen = match selection {
        Selection::All => return nodes.iter().collect(),
        Selection::Nodes(chosen) => chosen,
    };

    let index = CatalogIndex::build(nodes);
    let mut included: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&CatalogNode> = Vec::new();

    for uuid in chosen {
        match index.node(uuid) {
            Some(node) => stack.push(node),
            None => debug!(uuid = %uuid, "selected node not in catalog; ignoring"),
        }
        while let Some(node) = stack.pop() {
            if included.insert(node.uuid.as_str()) {
                stack.extend(index.children_of(&node.uuid));
            }
        }
    }

    let mut emitted: HashSet<&str> = HashSet::with_capacity(included.len());
    nodes
        .iter()
        .filter(|node| included.contains(node.uuid.as_str()))
        .filter(|node| emitted.insert(node.uuid.as_str()))
        .collect()
}

/// Number of exportable documents (non-group nodes) in a resolved selection.
#[must_use]
pub fn document_count(resolved: &[&CatalogNode]) -> usize {
    resolved.iter().filter(|node| !node.is_group()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeKind;

    fn group(uuid: &str, parent: &str) -> CatalogNode {
        CatalogNode::new(uuid, parent, NodeKind::Group, uuid)
    }

    fn doc(uuid: &str, parent: &str) -> CatalogNode {
        CatalogNode::new(uuid, parent, NodeKind::Document, uuid)
    }

    fn ids(resolved: &[&CatalogNode]) -> Vec<String> {
        resolved.iter().map(|n| n.uuid.clone()).collect()
    }

    fn chosen(ids: &[&str]) -> Selection {
        Selection::Nodes(ids.iter().map(|s| (*s).to_string()).collect())
    }

    fn sample() -> Vec<CatalogNode> {
        vec![
            group("G1", ""),
            doc("D1", "G1"),
            group("G2", "G1"),
            doc("D2", "G2"),
            doc("D3", ""),
            group("G3", ""),
            doc("D4", "G3"),
        ]
    }

    #[test]
    fn test_selecting_group_includes_child_document() {
        let nodes = vec![group("A", ""), doc("B", "A")];
        let resolved = resolve_selection(&nodes, &chosen(&["A"]));
        assert_eq!(ids(&resolved), ["A", "B"]);
    }

    #[test]
    fn test_selecting_group_includes_transitive_descendants() {
        let nodes = sample();
        let resolved = resolve_selection(&nodes, &chosen(&["G1"]));
        assert_eq!(ids(&resolved), ["G1", "D1", "G2", "D2"]);
    }

    #[test]
    fn test_select_all_returns_full_list_unchanged() {
        let nodes = sample();
        let resolved = resolve_selection(&nodes, &Selection::All);
        assert_eq!(resolved.len(), nodes.len());
        assert!(resolved.iter().zip(&nodes).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_output_follows_listing_order_not_selection_order() {
        let nodes = sample();
        let resolved = resolve_selection(&nodes, &chosen(&["D4", "D3", "D1"]));
        assert_eq!(ids(&resolved), ["D1", "D3", "D4"]);
    }

    #[test]
    fn test_duplicates_are_removed() {
        let nodes = sample();
        let resolved = resolve_selection(&nodes, &chosen(&["G2", "D2", "G2", "G1"]));
        assert_eq!(ids(&resolved), ["G1", "D1", "G2", "D2"]);
    }

    #[test]
    fn test_group_selection_is_superset_of_child_selection() {
        let nodes = sample();
        let from_group = ids(&resolve_selection(&nodes, &chosen(&["G1"])));
        for child in ["D1", "G2", "D2"] {
            let from_child = ids(&resolve_selection(&nodes, &chosen(&[child])));
            assert!(
                from_child.iter().all(|id| from_group.contains(id)),
                "selection of {child} not covered by its group"
            );
        }
    }

    #[test]
    fn test_output_is_subsequence_of_input() {
        let nodes = sample();
        let resolved = resolve_selection(&nodes, &chosen(&["G3", "G2", "D3"]));
        let positions: Vec<usize> = resolved
            .iter()
            .map(|r| nodes.iter().position(|n| n.uuid == r.uuid).unwrap_or(usize::MAX))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_group_resolves_to_zero_documents() {
        let nodes = vec![group("E", ""), doc("D", "")];
        let resolved = resolve_selection(&nodes, &chosen(&["E"]));
        assert_eq!(ids(&resolved), ["E"]);
        assert_eq!(document_count(&resolved), 0);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let nodes = sample();
        let resolved = resolve_selection(&nodes, &chosen(&["nope"]));
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_cyclic_parents_do_not_loop() {
        let nodes = vec![group("A", "B"), group("B", "A")];
        let resolved = resolve_selection(&nodes, &chosen(&["A"]));
        assert_eq!(ids(&resolved), ["A", "B"]);
    }

    #[test]
    fn test_from_chosen_empty_means_all() {
        assert_eq!(Selection::from_chosen(Vec::new()), Selection::All);
        assert_eq!(
            Selection::from_chosen(vec!["x".to_string()]),
            chosen(&["x"])
        );
    }
}
