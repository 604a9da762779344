//! Process-wide registry of databases.

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::dir::{remove_dir_atomic, DatabaseDir, DatabaseMetadata};
use crate::error::{validate_name, CoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Creates, opens and removes databases.
///
/// Opened databases are cached by path so that every caller shares one
/// handle, and with it one directory lock and one set of resource sessions.
#[derive(Debug)]
pub struct Databases {
    open: Mutex<HashMap<PathBuf, Arc<Database>>>,
    sync_on_write: bool,
}

impl Databases {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
            sync_on_write: true,
        }
    }

    /// Sets whether databases opened through this registry fsync writes.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Creates a database.
    ///
    /// Returns `false` without changes if a database already exists at the
    /// configured path. On failure nothing created by this call is left
    /// behind.
    pub fn create_database(&self, config: &DatabaseConfig) -> CoreResult<bool> {
        validate_name(&config.name())?;

        let _open = self.open.lock();
        if DatabaseDir::exists(&config.path) {
            return Ok(false);
        }

        let created = DatabaseDir::missing_entries(&config.path);
        let metadata = DatabaseMetadata {
            id: uuid::Uuid::new_v4(),
            format_version: config.format_version,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        };

        if let Err(err) = DatabaseDir::initialize(&config.path, &metadata, config.sync_on_write) {
            // The outermost entry this call created takes the rest with it.
            let cleanup = match created.first() {
                Some(entry) if entry.exists() => fs::remove_dir_all(entry),
                _ => Ok(()),
            };
            if let Err(cleanup) = cleanup {
                tracing::warn!(
                    path = %config.path.display(),
                    error = %cleanup,
                    "failed to clean up partially created database"
                );
            }
            return Err(err);
        }

        tracing::info!(database = %config.name(), id = %metadata.id, "created database");
        Ok(true)
    }

    /// Returns true if a database exists at `path`.
    #[must_use]
    pub fn exists_database(&self, path: &Path) -> bool {
        DatabaseDir::exists(path)
    }

    /// Opens the database at `path`, reusing a cached handle.
    ///
    /// # Errors
    ///
    /// - `DatabaseNotFound` if there is no database at `path`
    /// - `DatabaseLocked` if another process holds it
    pub fn open_database(&self, path: &Path) -> CoreResult<Arc<Database>> {
        let mut open = self.open.lock();
        if let Some(db) = open.get(path) {
            if db.is_open() && DatabaseDir::exists(path) {
                return Ok(Arc::clone(db));
            }
            open.remove(path);
        }

        let db = Arc::new(Database::open(path, self.sync_on_write)?);
        open.insert(path.to_path_buf(), Arc::clone(&db));
        Ok(db)
    }

    /// Removes the database at `path` with all its resources.
    ///
    /// Returns `false` if there was no database.
    ///
    /// # Errors
    ///
    /// `ResourceInUse` if resource sessions on the database are open.
    pub fn remove_database(&self, path: &Path) -> CoreResult<bool> {
        let mut open = self.open.lock();
        if !DatabaseDir::exists(path) {
            open.remove(path);
            return Ok(false);
        }

        if let Some(db) = open.get(path) {
            db.close_if_idle()?;
        }
        open.remove(path);

        remove_dir_atomic(path)?;
        tracing::info!(path = %path.display(), "removed database");
        Ok(true)
    }

    /// Lists the databases below `root` in sorted order.
    pub fn list_databases(&self, root: &Path) -> CoreResult<Vec<String>> {
        DatabaseDir::list(root)
    }
}

impl Default for Databases {
    fn default() -> Self {
        Self::new()
    }
}
