//! Node tree of one resource revision.

use crate::error::{CoreError, CoreResult};
use crate::serialize::check_reserved_names;
use crate::types::NodeKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use sylva_xml::{XmlElement, XmlNode};

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The document root. Exactly one per tree, key 0.
    Document,
    /// An element with its attributes in document order.
    Element {
        /// Qualified name.
        name: String,
        /// Attribute name/value pairs.
        attributes: Vec<(String, String)>,
    },
    /// Character data.
    Text {
        /// Unescaped text.
        value: String,
    },
}

/// A node and its structural links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable key.
    pub key: NodeKey,
    /// Parent key, `None` only for the document root.
    pub parent: Option<NodeKey>,
    /// Kind and payload.
    pub kind: NodeKind,
    /// Children in document order.
    pub children: Vec<NodeKey>,
}

impl Node {
    /// Returns the element name, if this is an element.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns true for the document root.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self.kind, NodeKind::Document)
    }
}

/// All nodes of a revision, keyed by node key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTree {
    nodes: BTreeMap<NodeKey, Node>,
    next_key: NodeKey,
}

impl NodeTree {
    /// Creates a tree holding only the document root.
    #[must_use]
    pub fn new_document() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            NodeKey::DOCUMENT_ROOT,
            Node {
                key: NodeKey::DOCUMENT_ROOT,
                parent: None,
                kind: NodeKind::Document,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            next_key: NodeKey::DOCUMENT_ROOT.next(),
        }
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Number of nodes including the document root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the document root is never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The key the next inserted node will receive.
    #[must_use]
    pub fn next_key(&self) -> NodeKey {
        self.next_key
    }

    /// Returns the children of a node, or an empty slice if it is unknown.
    #[must_use]
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Inserts `element` and its descendants as the first child of `parent`.
    ///
    /// Keys are assigned in document order, starting with the subtree root.
    /// Returns the key of the subtree root.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if `parent` does not exist
    /// - `ReservedName` if the subtree uses the `rest` prefix; nothing is
    ///   inserted
    pub fn insert_first_child(&mut self, parent: NodeKey, element: &XmlElement) -> CoreResult<NodeKey> {
        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or(CoreError::NodeNotFound { key: parent })?;
        if matches!(parent_node.kind, NodeKind::Text { .. }) {
            return Err(CoreError::invalid_operation("text nodes cannot have children"));
        }
        check_reserved_names(element)?;

        let root = self.insert_element(parent, element);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.insert(0, root);
        }
        Ok(root)
    }

    /// Inserts an element subtree without linking it into `parent`'s children.
    fn insert_element(&mut self, parent: NodeKey, element: &XmlElement) -> NodeKey {
        let key = self.allocate_key();
        self.nodes.insert(
            key,
            Node {
                key,
                parent: Some(parent),
                kind: NodeKind::Element {
                    name: element.name.clone(),
                    attributes: element
                        .attributes
                        .iter()
                        .map(|a| (a.name.clone(), a.value.clone()))
                        .collect(),
                },
                children: Vec::with_capacity(element.children.len()),
            },
        );

        let mut children = Vec::with_capacity(element.children.len());
        for child in &element.children {
            let child_key = match child {
                XmlNode::Element(e) => self.insert_element(key, e),
                XmlNode::Text(value) => {
                    let text_key = self.allocate_key();
                    self.nodes.insert(
                        text_key,
                        Node {
                            key: text_key,
                            parent: Some(key),
                            kind: NodeKind::Text {
                                value: value.clone(),
                            },
                            children: Vec::new(),
                        },
                    );
                    text_key
                }
            };
            children.push(child_key);
        }
        if let Some(node) = self.nodes.get_mut(&key) {
            node.children = children;
        }
        key
    }

    /// Removes `key` and all its descendants.
    ///
    /// Returns the parent of the removed node and the number of removed
    /// nodes.
    pub fn remove_subtree(&mut self, key: NodeKey) -> CoreResult<(NodeKey, usize)> {
        let node = self.nodes.get(&key).ok_or(CoreError::NodeNotFound { key })?;
        let parent = node.parent.ok_or(CoreError::CannotRemoveDocumentRoot)?;

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|&c| c != key);
        }

        let mut removed = 0;
        let mut pending = vec![key];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                removed += 1;
                pending.extend(node.children);
            }
        }
        Ok((parent, removed))
    }

    fn allocate_key(&mut self) -> NodeKey {
        let key = self.next_key;
        self.next_key = key.next();
        key
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlElement {
        sylva_xml::parse("<a x='1'><b/>text<c><d/></c></a>")
            .unwrap()
            .into_root()
    }

    #[test]
    fn new_document_has_only_root() {
        let tree = NodeTree::new_document();
        assert_eq!(tree.len(), 1);
        assert!(tree.get(NodeKey::DOCUMENT_ROOT).unwrap().is_document());
        assert_eq!(tree.next_key(), NodeKey::new(1));
    }

    #[test]
    fn insert_assigns_keys_in_document_order() {
        let mut tree = NodeTree::new_document();
        let root = tree.insert_first_child(NodeKey::DOCUMENT_ROOT, &sample()).unwrap();

        assert_eq!(root, NodeKey::new(1));
        assert_eq!(tree.children(NodeKey::DOCUMENT_ROOT), &[NodeKey::new(1)]);
        // a=1, b=2, "text"=3, c=4, d=5
        assert_eq!(
            tree.children(root),
            &[NodeKey::new(2), NodeKey::new(3), NodeKey::new(4)]
        );
        assert_eq!(tree.get(NodeKey::new(5)).unwrap().name(), Some("d"));
        assert_eq!(tree.get(NodeKey::new(5)).unwrap().parent, Some(NodeKey::new(4)));
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn insert_goes_first() {
        let mut tree = NodeTree::new_document();
        let first = tree
            .insert_first_child(NodeKey::DOCUMENT_ROOT, &XmlElement::new("one"))
            .unwrap();
        let second = tree
            .insert_first_child(NodeKey::DOCUMENT_ROOT, &XmlElement::new("two"))
            .unwrap();
        assert_eq!(tree.children(NodeKey::DOCUMENT_ROOT), &[second, first]);
    }

    #[test]
    fn cannot_insert_under_text() {
        let mut tree = NodeTree::new_document();
        tree.insert_first_child(NodeKey::DOCUMENT_ROOT, &sample()).unwrap();
        let result = tree.insert_first_child(NodeKey::new(3), &XmlElement::new("x"));
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn reserved_names_are_rejected_before_insert() {
        for xml in [
            r#"<a rest:id="2"><b/></a>"#,
            r#"<a><b xmlns:rest="urn:x"/></a>"#,
            "<a><rest:item/></a>",
        ] {
            let mut tree = NodeTree::new_document();
            let element = sylva_xml::parse(xml).unwrap().into_root();
            assert!(
                matches!(
                    tree.insert_first_child(NodeKey::DOCUMENT_ROOT, &element),
                    Err(CoreError::ReservedName { .. })
                ),
                "{xml}"
            );
            assert_eq!(tree.len(), 1);
            assert_eq!(tree.next_key(), NodeKey::new(1));
        }

        let mut tree = NodeTree::new_document();
        let element = sylva_xml::parse(r#"<a restful="yes" xmlns:r="urn:x"/>"#)
            .unwrap()
            .into_root();
        assert!(tree.insert_first_child(NodeKey::DOCUMENT_ROOT, &element).is_ok());
    }

    #[test]
    fn remove_subtree_drops_descendants_and_keeps_keys() {
        let mut tree = NodeTree::new_document();
        tree.insert_first_child(NodeKey::DOCUMENT_ROOT, &sample()).unwrap();

        let (parent, removed) = tree.remove_subtree(NodeKey::new(4)).unwrap();
        assert_eq!(parent, NodeKey::new(1));
        assert_eq!(removed, 2);
        assert!(!tree.contains(NodeKey::new(5)));
        assert_eq!(tree.children(NodeKey::new(1)), &[NodeKey::new(2), NodeKey::new(3)]);

        // Keys are never reused.
        let key = tree
            .insert_first_child(NodeKey::new(1), &XmlElement::new("e"))
            .unwrap();
        assert_eq!(key, NodeKey::new(6));
    }

    #[test]
    fn remove_errors() {
        let mut tree = NodeTree::new_document();
        assert!(matches!(
            tree.remove_subtree(NodeKey::new(99)),
            Err(CoreError::NodeNotFound { .. })
        ));
        assert!(matches!(
            tree.remove_subtree(NodeKey::DOCUMENT_ROOT),
            Err(CoreError::CannotRemoveDocumentRoot)
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Insert { parent: u64, depth: u8 },
            Remove { key: u64 },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u64..32, 0u8..4).prop_map(|(parent, depth)| Op::Insert { parent, depth }),
                (0u64..32).prop_map(|key| Op::Remove { key }),
            ]
        }

        fn chain(depth: u8) -> XmlElement {
            (0..depth).fold(XmlElement::new("leaf"), |child, i| {
                XmlElement::new(format!("n{i}")).with_child(child)
            })
        }

        fn assert_links(tree: &NodeTree) {
            for key in 0..tree.next_key().as_u64() {
                let Some(node) = tree.get(NodeKey::new(key)) else {
                    continue;
                };
                for child in &node.children {
                    assert_eq!(tree.get(*child).unwrap().parent, Some(node.key));
                }
                if let Some(parent) = node.parent {
                    assert!(tree.children(parent).contains(&node.key));
                }
            }
        }

        proptest! {
            #[test]
            fn links_stay_consistent(ops in proptest::collection::vec(op(), 0..40)) {
                let mut tree = NodeTree::new_document();
                let mut issued = Vec::new();

                for op in ops {
                    match op {
                        Op::Insert { parent, depth } => {
                            let before = tree.next_key();
                            if let Ok(key) = tree.insert_first_child(NodeKey::new(parent), &chain(depth)) {
                                prop_assert_eq!(key, before);
                                prop_assert!(!issued.contains(&key));
                                issued.push(key);
                            }
                        }
                        Op::Remove { key } => {
                            let _ = tree.remove_subtree(NodeKey::new(key));
                        }
                    }
                    prop_assert!(tree.get(NodeKey::DOCUMENT_ROOT).unwrap().is_document());
                    assert_links(&tree);
                }
            }
        }
    }
}
