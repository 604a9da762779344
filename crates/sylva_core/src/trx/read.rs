//! Read-only transactions.

use crate::node::{Node, NodeTree};
use crate::resource::Revision;
use crate::types::{NodeKey, RevisionNumber};
use std::sync::Arc;

/// A read-only view of one committed revision.
///
/// The revision is pinned for the lifetime of the transaction; later
/// commits are not visible.
#[derive(Debug, Clone)]
pub struct NodeReadTrx {
    revision: Arc<Revision>,
}

impl NodeReadTrx {
    pub(crate) fn new(revision: Arc<Revision>) -> Self {
        Self { revision }
    }

    /// Returns the revision this transaction reads.
    #[must_use]
    pub fn revision_number(&self) -> RevisionNumber {
        self.revision.number()
    }

    /// Returns the commit time of the revision in Unix milliseconds.
    #[must_use]
    pub fn committed_at(&self) -> u64 {
        self.revision.committed_at()
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.revision.tree().get(key)
    }

    /// Children of `key` in document order.
    #[must_use]
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.revision.tree().children(key)
    }

    /// The whole node tree.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        self.revision.tree()
    }
}
