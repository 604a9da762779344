//! Database and resource configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Format version written into new databases.
pub const FORMAT_VERSION: (u16, u16) = (1, 0);

/// Configuration for creating a database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Format version to use for new databases.
    pub format_version: (u16, u16),
    /// Whether to fsync metadata and revision files on write.
    pub sync_on_write: bool,
}

impl DatabaseConfig {
    /// Creates a configuration for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format_version: FORMAT_VERSION,
            sync_on_write: true,
        }
    }

    /// Creates a configuration for database `name` below `root`.
    pub fn in_root(root: &Path, name: &str) -> Self {
        Self::new(root.join(name))
    }

    /// Sets whether writes are fsynced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Returns the database name (last path component).
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Configuration of a single resource, persisted next to its revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource name, unique within its database.
    pub name: String,
    /// Whether whitespace-only text is kept when documents are shredded.
    pub keep_whitespace: bool,
}

impl ResourceConfig {
    /// Creates a configuration with default options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keep_whitespace: false,
        }
    }

    /// Sets whether whitespace-only text is kept.
    #[must_use]
    pub fn keep_whitespace(mut self, value: bool) -> Self {
        self.keep_whitespace = value;
        self
    }
}
