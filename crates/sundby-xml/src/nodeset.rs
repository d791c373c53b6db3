#![forbid(unsafe_code)]

//! NodeSet type for canonicalization and transforms.
//!
//! A `NodeSet` is a set of nodes from a parsed `roxmltree` document,
//! identified by their `NodeId`. It supports what the enveloped-signature
//! transform and document-subset canonicalization need: selecting a subtree
//! with or without comments and cutting a subtree back out.

use roxmltree::{Document, Node, NodeId};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes of the document except comments.
    /// `URI=""` selects the document this way.
    pub fn all_without_comments(doc: &Document<'_>) -> Self {
        Self::tree_without_comments(doc.root())
    }

    /// The subtree rooted at `root`, comments excluded.
    pub fn tree_without_comments(root: Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes, false);
        Self { nodes }
    }

    /// The subtree rooted at `root`, comments included.
    pub fn tree_with_comments(root: Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes, true);
        Self { nodes }
    }

    /// Check if a node is in this set.
    pub fn contains(&self, node: Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn insert(&mut self, node: Node<'_, '_>) {
        self.nodes.insert(node.id());
    }

    /// Remove `node` and all of its descendants.
    pub fn remove_subtree(&mut self, node: Node<'_, '_>) {
        for n in node.descendants() {
            self.nodes.remove(&n.id());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn collect_subtree(node: Node<'_, '_>, set: &mut HashSet<NodeId>, include_comments: bool) {
    if !include_comments && node.is_comment() {
        return;
    }
    set.insert(node.id());
    for child in node.children() {
        collect_subtree(child, set, include_comments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_without_comments() {
        let doc = Document::parse("<a><!--c--><b>t</b></a>").unwrap();
        let root = doc.root_element();
        let set = NodeSet::tree_without_comments(root);
        let comment = root.first_child().unwrap();
        assert!(comment.is_comment());
        assert!(!set.contains(comment));
        assert!(set.contains(root));

        let with = NodeSet::tree_with_comments(root);
        assert!(with.contains(comment));
        assert_eq!(with.len(), set.len() + 1);
    }

    #[test]
    fn test_remove_subtree() {
        let doc = Document::parse("<a><b><c/></b><d/></a>").unwrap();
        let root = doc.root_element();
        let mut set = NodeSet::tree_without_comments(root);
        let b = root.first_element_child().unwrap();
        set.remove_subtree(b);
        assert!(!set.contains(b));
        assert!(!set.contains(b.first_element_child().unwrap()));
        assert!(set.contains(root.last_element_child().unwrap()));
    }
}
