//! Database handle and resource management.

use crate::config::ResourceConfig;
use crate::dir::{remove_dir_atomic, DatabaseDir, DatabaseMetadata};
use crate::error::{validate_name, CoreError, CoreResult};
use crate::resource::{ResourceSession, ResourceShared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An open database.
///
/// A `Database` owns the directory lock and caches the shared state of the
/// resources that have been opened. It is obtained from
/// [`Databases::open_database`](crate::Databases::open_database):
///
/// ```rust,ignore
/// let databases = Databases::new();
/// databases.create_database(&DatabaseConfig::in_root(root, "books"))?;
/// let db = databases.open_database(&root.join("books"))?;
///
/// db.create_resource(&ResourceConfig::new("catalog"))?;
/// let session = db.open_resource("catalog")?;
/// let mut wtx = session.begin_write()?;
/// wtx.insert_subtree_as_first_child(&sylva_xml::parse("<book/>")?)?;
/// wtx.commit()?;
/// ```
pub struct Database {
    /// Database directory (holds the lock).
    dir: DatabaseDir,
    name: String,
    metadata: DatabaseMetadata,
    sync_on_write: bool,
    /// Shared state of opened resources, by name.
    resources: Mutex<HashMap<String, Arc<ResourceShared>>>,
    closed: AtomicBool,
}

impl Database {
    /// Opens the database at `path`.
    pub(crate) fn open(path: &Path, sync_on_write: bool) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path)?;
        let metadata = dir.load_metadata()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!(database = %name, id = %metadata.id, "opened database");
        Ok(Self {
            dir,
            name,
            metadata,
            sync_on_write,
            resources: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persistent metadata.
    #[must_use]
    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    /// Returns false once the database has been removed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Creates a resource holding an empty document at revision 0.
    ///
    /// Returns `false` without changes if the resource already exists. A
    /// partially created resource directory is removed on failure.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the name is not usable
    /// - `DatabaseClosed` if the database has been removed
    pub fn create_resource(&self, config: &ResourceConfig) -> CoreResult<bool> {
        validate_name(&config.name)?;

        let mut resources = self.resources.lock();
        self.ensure_open()?;
        let dir = self.dir.resource(&config.name);
        if dir.exists() {
            return Ok(false);
        }

        match ResourceShared::create(&self.name, dir.clone(), config.clone(), self.sync_on_write) {
            Ok(shared) => {
                resources.insert(config.name.clone(), Arc::new(shared));
                tracing::info!(database = %self.name, resource = %config.name, "created resource");
                Ok(true)
            }
            Err(err) => {
                if dir.path().exists() {
                    if let Err(cleanup) = fs::remove_dir_all(dir.path()) {
                        tracing::warn!(
                            resource = %config.name,
                            error = %cleanup,
                            "failed to clean up partially created resource"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Returns true if the resource exists.
    #[must_use]
    pub fn exists_resource(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.dir.resource(name).exists()
    }

    /// Lists resource names in sorted order.
    pub fn list_resources(&self) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        self.dir.list_resources()
    }

    /// Opens a session on an existing resource.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` if the resource does not exist.
    pub fn open_resource(&self, name: &str) -> CoreResult<ResourceSession> {
        validate_name(name)?;

        let mut resources = self.resources.lock();
        self.ensure_open()?;
        if let Some(shared) = resources.get(name) {
            return Ok(ResourceSession::open(Arc::clone(shared)));
        }

        let dir = self.dir.resource(name);
        if !dir.exists() {
            return Err(CoreError::ResourceNotFound {
                name: name.to_string(),
            });
        }
        let shared = Arc::new(ResourceShared::load(&self.name, dir, self.sync_on_write)?);
        resources.insert(name.to_string(), Arc::clone(&shared));
        Ok(ResourceSession::open(shared))
    }

    /// Removes a resource and all its revisions.
    ///
    /// # Errors
    ///
    /// - `ResourceInUse` if sessions on the resource are still open
    /// - `ResourceNotFound` if the resource does not exist
    pub fn remove_resource(&self, name: &str) -> CoreResult<()> {
        validate_name(name)?;

        let mut resources = self.resources.lock();
        self.ensure_open()?;
        if let Some(shared) = resources.get(name) {
            let sessions = shared.session_count();
            if sessions > 0 {
                return Err(CoreError::ResourceInUse {
                    name: name.to_string(),
                    sessions,
                });
            }
        }

        let dir = self.dir.resource(name);
        if !dir.exists() {
            resources.remove(name);
            return Err(CoreError::ResourceNotFound {
                name: name.to_string(),
            });
        }

        resources.remove(name);
        remove_dir_atomic(dir.path())?;
        tracing::info!(database = %self.name, resource = %name, "removed resource");
        Ok(())
    }

    /// Total number of open resource sessions.
    #[must_use]
    pub fn open_session_count(&self) -> usize {
        self.resources
            .lock()
            .values()
            .map(|shared| shared.session_count())
            .sum()
    }

    /// Closes the handle unless resource sessions are open.
    ///
    /// Sessions are only opened under the same guard, so none can appear
    /// between the check and the close. All further operations on the
    /// handle fail with `DatabaseClosed`.
    ///
    /// # Errors
    ///
    /// `ResourceInUse` with the number of open sessions; the handle stays
    /// open.
    pub(crate) fn close_if_idle(&self) -> CoreResult<()> {
        let mut resources = self.resources.lock();
        let sessions: usize = resources.values().map(|shared| shared.session_count()).sum();
        if sessions > 0 {
            return Err(CoreError::ResourceInUse {
                name: self.name.clone(),
                sessions,
            });
        }
        self.closed.store(true, Ordering::SeqCst);
        resources.clear();
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.dir.path())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::types::{NodeKey, RevisionNumber};
    use crate::Databases;
    use tempfile::{tempdir, TempDir};

    fn open_db() -> (TempDir, Arc<Database>) {
        let temp = tempdir().unwrap();
        let databases = Databases::new().sync_on_write(false);
        let config = DatabaseConfig::in_root(temp.path(), "db");
        databases.create_database(&config).unwrap();
        let db = databases.open_database(&config.path).unwrap();
        (temp, db)
    }

    #[test]
    fn create_resource_is_idempotent() {
        let (_temp, db) = open_db();
        assert!(db.create_resource(&ResourceConfig::new("r")).unwrap());
        assert!(!db.create_resource(&ResourceConfig::new("r")).unwrap());
        assert!(db.exists_resource("r"));
        assert_eq!(db.list_resources().unwrap(), vec!["r".to_string()]);
    }

    #[test]
    fn new_resource_is_empty_at_revision_zero() {
        let (_temp, db) = open_db();
        db.create_resource(&ResourceConfig::new("r")).unwrap();
        let session = db.open_resource("r").unwrap();
        assert_eq!(session.most_recent_revision(), RevisionNumber::INITIAL);
        let rtx = session.begin_read();
        assert!(rtx.children(NodeKey::DOCUMENT_ROOT).is_empty());
    }

    #[test]
    fn invalid_resource_names_are_rejected() {
        let (_temp, db) = open_db();
        assert!(matches!(
            db.create_resource(&ResourceConfig::new("../escape")),
            Err(CoreError::InvalidName { .. })
        ));
        assert!(!db.exists_resource(".hidden"));
    }

    #[test]
    fn open_missing_resource_fails() {
        let (_temp, db) = open_db();
        assert!(matches!(
            db.open_resource("missing"),
            Err(CoreError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn remove_requires_no_open_sessions() {
        let (_temp, db) = open_db();
        db.create_resource(&ResourceConfig::new("r")).unwrap();

        let session = db.open_resource("r").unwrap();
        assert_eq!(db.open_session_count(), 1);
        assert!(matches!(
            db.remove_resource("r"),
            Err(CoreError::ResourceInUse { sessions: 1, .. })
        ));

        drop(session);
        assert_eq!(db.open_session_count(), 0);
        db.remove_resource("r").unwrap();
        assert!(!db.exists_resource("r"));
        assert!(matches!(
            db.remove_resource("r"),
            Err(CoreError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn close_if_idle_refuses_open_sessions() {
        let (_temp, db) = open_db();
        db.create_resource(&ResourceConfig::new("r")).unwrap();

        let session = db.open_resource("r").unwrap();
        assert!(matches!(
            db.close_if_idle(),
            Err(CoreError::ResourceInUse { sessions: 1, .. })
        ));
        assert!(db.is_open());

        drop(session);
        db.close_if_idle().unwrap();
        assert!(!db.is_open());
        assert!(matches!(db.open_resource("r"), Err(CoreError::DatabaseClosed)));
        assert!(matches!(
            db.create_resource(&ResourceConfig::new("s")),
            Err(CoreError::DatabaseClosed)
        ));
    }

    #[test]
    fn sessions_never_outlive_close() {
        let (_temp, db) = open_db();
        db.create_resource(&ResourceConfig::new("r")).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..2_000 {
                    match db.open_resource("r") {
                        Ok(session) => {
                            assert!(db.is_open(), "session opened on a closed database");
                            drop(session);
                        }
                        Err(CoreError::DatabaseClosed) => break,
                        Err(err) => panic!("unexpected error {err}"),
                    }
                }
            });
            scope.spawn(|| {
                while db.close_if_idle().is_err() {
                    std::thread::yield_now();
                }
            });
        });
        assert!(!db.is_open());
    }

    #[test]
    fn commits_survive_reopen() {
        let temp = tempdir().unwrap();
        let config = DatabaseConfig::in_root(temp.path(), "db");
        {
            let databases = Databases::new().sync_on_write(false);
            databases.create_database(&config).unwrap();
            let db = databases.open_database(&config.path).unwrap();
            db.create_resource(&ResourceConfig::new("r")).unwrap();
            let session = db.open_resource("r").unwrap();
            let mut wtx = session.begin_write().unwrap();
            wtx.insert_subtree_as_first_child(&sylva_xml::parse("<a><b/></a>").unwrap())
                .unwrap();
            assert_eq!(wtx.commit().unwrap(), RevisionNumber::new(1));
        }

        let databases = Databases::new();
        let db = databases.open_database(&config.path).unwrap();
        let session = db.open_resource("r").unwrap();
        assert_eq!(session.most_recent_revision(), RevisionNumber::new(1));
        let rtx = session.begin_read();
        assert_eq!(rtx.get(NodeKey::new(2)).unwrap().name(), Some("b"));

        let old = session.begin_read_at(RevisionNumber::INITIAL).unwrap();
        assert!(old.children(NodeKey::DOCUMENT_ROOT).is_empty());
        assert!(matches!(
            session.begin_read_at(RevisionNumber::new(7)),
            Err(CoreError::RevisionNotFound { .. })
        ));
    }
}
