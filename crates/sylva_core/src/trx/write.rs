//! The single write transaction of a resource.

use crate::error::{CoreError, CoreResult};
use crate::node::{Node, NodeTree};
use crate::resource::ResourceShared;
use crate::trx::NodeReadTrx;
use crate::types::{NodeKey, RevisionNumber};
use parking_lot::MutexGuard;
use sylva_xml::XmlDocument;

/// State of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrxState {
    /// Open for modifications.
    Active,
    /// Changes were committed as a new revision.
    Committed,
    /// Changes were discarded.
    RolledBack,
}

/// A write transaction with a cursor.
///
/// Modifications apply to a private copy of the latest revision's tree and
/// become visible only through [`commit`](Self::commit). The transaction
/// holds the resource's write lock until it ends.
pub struct NodeWriteTrx<'a> {
    shared: &'a ResourceShared,
    _guard: MutexGuard<'a, ()>,
    base: RevisionNumber,
    tree: NodeTree,
    cursor: NodeKey,
    state: TrxState,
}

impl<'a> NodeWriteTrx<'a> {
    pub(crate) fn new(shared: &'a ResourceShared, guard: MutexGuard<'a, ()>) -> Self {
        let latest = shared.latest();
        Self {
            shared,
            _guard: guard,
            base: latest.number(),
            tree: latest.tree().clone(),
            cursor: NodeKey::DOCUMENT_ROOT,
            state: TrxState::Active,
        }
    }

    /// Revision this transaction started from.
    #[must_use]
    pub fn base_revision(&self) -> RevisionNumber {
        self.base
    }

    /// Current transaction state.
    #[must_use]
    pub fn state(&self) -> TrxState {
        self.state
    }

    /// Key of the node under the cursor.
    #[must_use]
    pub fn cursor(&self) -> NodeKey {
        self.cursor
    }

    /// Looks up a node in the uncommitted tree.
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.tree.get(key)
    }

    /// Moves the cursor to `key`.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if no such node exists; the cursor does not move.
    pub fn move_to(&mut self, key: NodeKey) -> CoreResult<()> {
        self.ensure_active()?;
        if !self.tree.contains(key) {
            return Err(CoreError::NodeNotFound { key });
        }
        self.cursor = key;
        Ok(())
    }

    /// Moves the cursor to the document root.
    pub fn move_to_document_root(&mut self) {
        self.cursor = NodeKey::DOCUMENT_ROOT;
    }

    /// Shreds `document` into nodes inserted as the first child of the
    /// cursor node, then moves the cursor to the inserted root element.
    pub fn insert_subtree_as_first_child(&mut self, document: &XmlDocument) -> CoreResult<NodeKey> {
        self.ensure_active()?;
        let key = self.tree.insert_first_child(self.cursor, document.root())?;
        self.cursor = key;
        Ok(key)
    }

    /// Removes the node under the cursor with all its descendants and moves
    /// the cursor to the former parent.
    ///
    /// Returns the number of removed nodes.
    pub fn remove(&mut self) -> CoreResult<usize> {
        self.ensure_active()?;
        let (parent, removed) = self.tree.remove_subtree(self.cursor)?;
        self.cursor = parent;
        Ok(removed)
    }

    /// Commits all changes as a new revision.
    pub fn commit(self) -> CoreResult<RevisionNumber> {
        self.commit_and_read().map(|rtx| rtx.revision_number())
    }

    /// Commits all changes and returns a read transaction pinned to the
    /// revision this commit created, regardless of later commits.
    pub fn commit_and_read(mut self) -> CoreResult<NodeReadTrx> {
        self.ensure_active()?;
        let tree = std::mem::take(&mut self.tree);
        let nodes = tree.len();
        match self.shared.publish(tree) {
            Ok(revision) => {
                self.state = TrxState::Committed;
                tracing::debug!(
                    resource = %self.shared.dir().path().display(),
                    revision = %revision.number(),
                    nodes,
                    "committed revision"
                );
                Ok(NodeReadTrx::new(revision))
            }
            Err(err) => {
                self.state = TrxState::RolledBack;
                Err(err)
            }
        }
    }

    /// Discards all changes.
    pub fn rollback(mut self) {
        self.state = TrxState::RolledBack;
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.state == TrxState::Active {
            Ok(())
        } else {
            Err(CoreError::invalid_operation("transaction is no longer active"))
        }
    }
}

impl std::fmt::Debug for NodeWriteTrx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeWriteTrx")
            .field("base", &self.base)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for NodeWriteTrx<'_> {
    fn drop(&mut self) {
        if self.state == TrxState::Active {
            tracing::debug!(base = %self.base, "write transaction dropped without commit");
        }
    }
}
