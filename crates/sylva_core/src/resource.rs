//! Resource sessions and committed revisions.

use crate::config::ResourceConfig;
use crate::dir::{read_cbor, write_cbor_atomic, ResourceDir};
use crate::error::{CoreError, CoreResult};
use crate::node::NodeTree;
use crate::trx::{NodeReadTrx, NodeWriteTrx};
use crate::types::RevisionNumber;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// One committed, immutable version of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    number: RevisionNumber,
    committed_at: u64,
    tree: NodeTree,
}

impl Revision {
    pub(crate) fn new(number: RevisionNumber, tree: NodeTree) -> Self {
        let committed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            number,
            committed_at,
            tree,
        }
    }

    /// Revision number.
    #[must_use]
    pub fn number(&self) -> RevisionNumber {
        self.number
    }

    /// Commit time in Unix milliseconds.
    #[must_use]
    pub fn committed_at(&self) -> u64 {
        self.committed_at
    }

    /// The node tree of this revision.
    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }
}

/// State shared by all sessions of one resource.
#[derive(Debug)]
pub(crate) struct ResourceShared {
    database: String,
    dir: ResourceDir,
    config: ResourceConfig,
    sync_on_write: bool,
    /// Write lock - only one write transaction at a time.
    write_lock: Mutex<()>,
    latest: RwLock<Arc<Revision>>,
    sessions: AtomicUsize,
}

impl ResourceShared {
    /// Creates the on-disk resource with an empty revision 0.
    pub(crate) fn create(
        database: &str,
        dir: ResourceDir,
        config: ResourceConfig,
        sync_on_write: bool,
    ) -> CoreResult<Self> {
        dir.create(&config, sync_on_write)?;
        let initial = Revision::new(RevisionNumber::INITIAL, NodeTree::new_document());
        write_cbor_atomic(&dir.revision_path(initial.number), &initial, sync_on_write)?;
        Ok(Self::with_revision(database, dir, config, sync_on_write, initial))
    }

    /// Loads an existing resource and its latest revision.
    pub(crate) fn load(database: &str, dir: ResourceDir, sync_on_write: bool) -> CoreResult<Self> {
        let config = dir.load_config()?;
        let latest = dir
            .latest_revision()?
            .ok_or_else(|| CoreError::invalid_format(format!("resource {} has no revisions", config.name)))?;
        let revision: Revision = read_cbor(&dir.revision_path(latest))?;
        Ok(Self::with_revision(database, dir, config, sync_on_write, revision))
    }

    fn with_revision(
        database: &str,
        dir: ResourceDir,
        config: ResourceConfig,
        sync_on_write: bool,
        revision: Revision,
    ) -> Self {
        Self {
            database: database.to_string(),
            dir,
            config,
            sync_on_write,
            write_lock: Mutex::new(()),
            latest: RwLock::new(Arc::new(revision)),
            sessions: AtomicUsize::new(0),
        }
    }

    pub(crate) fn dir(&self) -> &ResourceDir {
        &self.dir
    }

    pub(crate) fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub(crate) fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }

    pub(crate) fn latest(&self) -> Arc<Revision> {
        Arc::clone(&self.latest.read())
    }

    /// Persists and publishes a new revision.
    ///
    /// Must be called with the write lock held.
    pub(crate) fn publish(&self, tree: NodeTree) -> CoreResult<Arc<Revision>> {
        let number = self.latest.read().number.next();
        let revision = Revision::new(number, tree);
        write_cbor_atomic(&self.dir.revision_path(number), &revision, self.sync_on_write)?;
        let revision = Arc::new(revision);
        *self.latest.write() = Arc::clone(&revision);
        Ok(revision)
    }
}

/// An open session on a resource.
///
/// While any session is open the resource cannot be removed. Sessions are
/// cheap; the session count drops when the value is dropped.
#[derive(Debug)]
pub struct ResourceSession {
    shared: Arc<ResourceShared>,
}

impl ResourceSession {
    pub(crate) fn open(shared: Arc<ResourceShared>) -> Self {
        shared.sessions.fetch_add(1, Ordering::SeqCst);
        Self { shared }
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Name of the owning database.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.shared.database
    }

    /// Resource configuration.
    #[must_use]
    pub fn config(&self) -> &ResourceConfig {
        &self.shared.config
    }

    /// Number of the latest committed revision.
    #[must_use]
    pub fn most_recent_revision(&self) -> RevisionNumber {
        self.shared.latest.read().number
    }

    /// Begins a read-only transaction on the latest revision.
    #[must_use]
    pub fn begin_read(&self) -> NodeReadTrx {
        NodeReadTrx::new(self.shared.latest())
    }

    /// Begins a read-only transaction on a specific revision.
    pub fn begin_read_at(&self, revision: RevisionNumber) -> CoreResult<NodeReadTrx> {
        let latest = self.shared.latest();
        if latest.number == revision {
            return Ok(NodeReadTrx::new(latest));
        }
        if revision > latest.number {
            return Err(CoreError::RevisionNotFound { revision });
        }

        let path = self.shared.dir.revision_path(revision);
        if !path.is_file() {
            return Err(CoreError::RevisionNotFound { revision });
        }
        let loaded: Revision = read_cbor(&path)?;
        Ok(NodeReadTrx::new(Arc::new(loaded)))
    }

    /// Begins the single write transaction of this resource.
    ///
    /// Blocks while another write transaction is open. The returned
    /// transaction holds the write lock until it is committed, rolled back
    /// or dropped.
    pub fn begin_write(&self) -> CoreResult<NodeWriteTrx<'_>> {
        let guard = self.shared.write_lock().lock();
        Ok(NodeWriteTrx::new(&self.shared, guard))
    }

    /// Like [`begin_write`](Self::begin_write) but fails instead of blocking.
    pub fn try_begin_write(&self) -> CoreResult<NodeWriteTrx<'_>> {
        let guard = self
            .shared
            .write_lock()
            .try_lock()
            .ok_or_else(|| CoreError::invalid_operation("a write transaction is already open"))?;
        Ok(NodeWriteTrx::new(&self.shared, guard))
    }
}

impl Drop for ResourceSession {
    fn drop(&mut self) {
        self.shared.sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
