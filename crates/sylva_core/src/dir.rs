//! On-disk layout of databases and resources.
//!
//! ```text
//! <root>/
//! └─ <database>/
//!    ├─ DATABASE                 # Metadata (id, format version)
//!    ├─ LOCK                     # Advisory lock, one process per database
//!    └─ resources/
//!       └─ <resource>/
//!          ├─ RESOURCE           # Resource configuration
//!          └─ revisions/
//!             ├─ rev-000000.cbor # Empty document
//!             └─ rev-000001.cbor
//! ```
//!
//! Directories whose name starts with `.` are removals in progress and are
//! never reported as databases or resources.

use crate::config::ResourceConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::RevisionNumber;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const DATABASE_FILE: &str = "DATABASE";
const LOCK_FILE: &str = "LOCK";
const RESOURCES_DIR: &str = "resources";
const RESOURCE_FILE: &str = "RESOURCE";
const REVISIONS_DIR: &str = "revisions";
const REVISION_PREFIX: &str = "rev-";
const REVISION_SUFFIX: &str = ".cbor";
const TEMP_SUFFIX: &str = ".tmp";

/// Persistent database metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Random identifier assigned at creation.
    pub id: uuid::Uuid,
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Creation time in Unix milliseconds.
    pub created_at: u64,
}

/// Writes `value` as CBOR using write-then-rename.
///
/// 1. Write to a temporary sibling file
/// 2. Sync it (if `sync`)
/// 3. Rename over the target
/// 4. Sync the parent directory (if `sync`)
pub(crate) fn write_cbor_atomic<T: Serialize>(path: &Path, value: &T, sync: bool) -> CoreResult<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    let file = File::create(&temp)?;
    let mut writer = BufWriter::new(file);
    ciborium::into_writer(value, &mut writer).map_err(|e| CoreError::encoding(e.to_string()))?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    if sync {
        file.sync_all()?;
    }
    drop(file);

    fs::rename(&temp, path)?;

    if sync {
        if let Some(parent) = path.parent() {
            sync_directory(parent)?;
        }
    }
    Ok(())
}

/// Reads a CBOR value written by [`write_cbor_atomic`].
pub(crate) fn read_cbor<T: DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let file = File::open(path)?;
    ciborium::from_reader(BufReader::new(file)).map_err(|e| {
        CoreError::invalid_format(format!("cannot decode {}: {e}", path.display()))
    })
}

/// Syncs a directory so that entry creation, rename and removal are durable.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> CoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> CoreResult<()> {
    // NTFS journals metadata updates; directories cannot be fsynced.
    Ok(())
}

/// Renames `path` to a hidden sibling and deletes it.
///
/// The rename is atomic, so the directory disappears from listings in one
/// step even if the recursive delete later fails part way.
pub(crate) fn remove_dir_atomic(path: &Path) -> CoreResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CoreError::invalid_operation("cannot remove a filesystem root"))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tombstone = parent.join(format!(".{name}.removing-{}", uuid::Uuid::new_v4().simple()));

    fs::rename(path, &tombstone)?;
    if let Err(err) = fs::remove_dir_all(&tombstone) {
        tracing::warn!(path = %tombstone.display(), error = %err, "leaving partially removed directory behind");
    }
    Ok(())
}

/// Lists visible subdirectory names that contain `marker`.
pub(crate) fn list_marked_dirs(parent: &Path, marker: &str) -> CoreResult<Vec<String>> {
    if !parent.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() && path.join(marker).is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Manages a database directory and holds its process lock.
///
/// Only one `DatabaseDir` per directory may be open across processes; the
/// lock is released when the value is dropped.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Returns true if `path` holds an initialized database.
    #[must_use]
    pub fn exists(path: &Path) -> bool {
        path.join(DATABASE_FILE).is_file()
    }

    /// Lists the names of all databases directly below `root`.
    pub fn list(root: &Path) -> CoreResult<Vec<String>> {
        list_marked_dirs(root, DATABASE_FILE)
    }

    /// Initializes database metadata in `path`, creating directories.
    pub(crate) fn initialize(path: &Path, metadata: &DatabaseMetadata, sync: bool) -> CoreResult<()> {
        fs::create_dir_all(path.join(RESOURCES_DIR))?;
        write_cbor_atomic(&path.join(DATABASE_FILE), metadata, sync)
    }

    /// Directories [`initialize`](Self::initialize) would create below and
    /// including `path` that do not exist yet, outermost first.
    pub(crate) fn missing_entries(path: &Path) -> Vec<PathBuf> {
        [path.to_path_buf(), path.join(RESOURCES_DIR)]
            .into_iter()
            .filter(|entry| !entry.exists())
            .collect()
    }

    /// Opens an existing database directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - `DatabaseNotFound` if no database metadata exists at `path`
    /// - `DatabaseLocked` if another process holds the lock
    pub fn open(path: &Path) -> CoreResult<Self> {
        if !Self::exists(path) {
            return Err(CoreError::DatabaseNotFound {
                path: path.to_path_buf(),
            });
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the database metadata.
    pub fn load_metadata(&self) -> CoreResult<DatabaseMetadata> {
        read_cbor(&self.path.join(DATABASE_FILE))
    }

    /// Returns the directory holding all resources.
    #[must_use]
    pub fn resources_dir(&self) -> PathBuf {
        self.path.join(RESOURCES_DIR)
    }

    /// Returns the layout of resource `name`.
    #[must_use]
    pub fn resource(&self, name: &str) -> ResourceDir {
        ResourceDir {
            path: self.resources_dir().join(name),
        }
    }

    /// Lists the names of all resources.
    pub fn list_resources(&self) -> CoreResult<Vec<String>> {
        list_marked_dirs(&self.resources_dir(), RESOURCE_FILE)
    }
}

/// Layout of one resource directory.
#[derive(Debug, Clone)]
pub struct ResourceDir {
    path: PathBuf,
}

impl ResourceDir {
    /// Returns the resource directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the resource has been created.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.join(RESOURCE_FILE).is_file()
    }

    /// Returns the path of a revision file.
    #[must_use]
    pub fn revision_path(&self, revision: RevisionNumber) -> PathBuf {
        self.path
            .join(REVISIONS_DIR)
            .join(format!("{REVISION_PREFIX}{:06}{REVISION_SUFFIX}", revision.as_u64()))
    }

    /// Creates the directory structure and writes the configuration.
    pub(crate) fn create(&self, config: &ResourceConfig, sync: bool) -> CoreResult<()> {
        fs::create_dir_all(self.path.join(REVISIONS_DIR))?;
        write_cbor_atomic(&self.path.join(RESOURCE_FILE), config, sync)
    }

    /// Loads the resource configuration.
    pub fn load_config(&self) -> CoreResult<ResourceConfig> {
        read_cbor(&self.path.join(RESOURCE_FILE))
    }

    /// Returns the highest committed revision on disk.
    pub fn latest_revision(&self) -> CoreResult<Option<RevisionNumber>> {
        let dir = self.path.join(REVISIONS_DIR);
        let mut latest = None;
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            let number = name
                .strip_prefix(REVISION_PREFIX)
                .and_then(|n| n.strip_suffix(REVISION_SUFFIX))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(number) = number {
                latest = latest.max(Some(RevisionNumber::new(number)));
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metadata() -> DatabaseMetadata {
        DatabaseMetadata {
            id: uuid::Uuid::new_v4(),
            format_version: (1, 0),
            created_at: 0,
        }
    }

    #[test]
    fn initialize_then_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        assert!(!DatabaseDir::exists(&path));
        assert!(matches!(
            DatabaseDir::open(&path),
            Err(CoreError::DatabaseNotFound { .. })
        ));

        let meta = metadata();
        DatabaseDir::initialize(&path, &meta, false).unwrap();
        assert!(DatabaseDir::exists(&path));

        let dir = DatabaseDir::open(&path).unwrap();
        assert_eq!(dir.load_metadata().unwrap(), meta);
        assert!(dir.list_resources().unwrap().is_empty());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("locked");
        DatabaseDir::initialize(&path, &metadata(), false).unwrap();

        let _first = DatabaseDir::open(&path).unwrap();
        assert!(matches!(
            DatabaseDir::open(&path),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("reopen");
        DatabaseDir::initialize(&path, &metadata(), false).unwrap();

        {
            let _dir = DatabaseDir::open(&path).unwrap();
        }
        let _again = DatabaseDir::open(&path).unwrap();
    }

    #[test]
    fn revision_paths_and_latest() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        DatabaseDir::initialize(&path, &metadata(), false).unwrap();
        let dir = DatabaseDir::open(&path).unwrap();

        let res = dir.resource("r");
        assert!(!res.exists());
        res.create(&ResourceConfig::new("r"), false).unwrap();
        assert!(res.exists());
        assert_eq!(res.latest_revision().unwrap(), None);

        let rev = RevisionNumber::new(3);
        assert!(res.revision_path(rev).ends_with("revisions/rev-000003.cbor"));
        write_cbor_atomic(&res.revision_path(rev), &"x", false).unwrap();
        write_cbor_atomic(&res.revision_path(RevisionNumber::new(1)), &"y", false).unwrap();
        assert_eq!(res.latest_revision().unwrap(), Some(rev));

        assert_eq!(dir.list_resources().unwrap(), vec!["r".to_string()]);
        assert_eq!(res.load_config().unwrap(), ResourceConfig::new("r"));
    }

    #[test]
    fn atomic_removal_hides_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("gone");
        DatabaseDir::initialize(&path, &metadata(), false).unwrap();
        assert_eq!(list_marked_dirs(temp.path(), DATABASE_FILE).unwrap(), vec!["gone"]);

        remove_dir_atomic(&path).unwrap();
        assert!(!path.exists());
        assert!(list_marked_dirs(temp.path(), DATABASE_FILE).unwrap().is_empty());
    }
}
