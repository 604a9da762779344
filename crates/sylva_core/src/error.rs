//! Error types for the Sylva engine.

use crate::types::{NodeKey, RevisionNumber};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metadata or revision could not be encoded or decoded.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the failure.
        message: String,
    },

    /// A database or resource name is not usable as a directory name.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No database exists at the path.
    #[error("database not found: {}", path.display())]
    DatabaseNotFound {
        /// Database directory.
        path: PathBuf,
    },

    /// Another process holds the database lock.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database handle was closed because the database was removed.
    #[error("database is closed")]
    DatabaseClosed,

    /// No resource with the name exists.
    #[error("resource not found: {name}")]
    ResourceNotFound {
        /// Resource name.
        name: String,
    },

    /// The resource has open sessions and cannot be removed.
    #[error("resource {name} is in use by {sessions} open session(s)")]
    ResourceInUse {
        /// Resource name.
        name: String,
        /// Number of open sessions.
        sessions: usize,
    },

    /// The requested revision does not exist.
    #[error("revision not found: {revision}")]
    RevisionNotFound {
        /// The requested revision.
        revision: RevisionNumber,
    },

    /// No node with the key exists in the revision.
    #[error("node not found: {key}")]
    NodeNotFound {
        /// The requested node key.
        key: NodeKey,
    },

    /// An inserted element or attribute uses a name reserved for node ids
    /// and the response envelope.
    #[error("{name:?} uses the reserved rest prefix")]
    ReservedName {
        /// The offending element or attribute name.
        name: String,
    },

    /// The document root node cannot be removed.
    #[error("the document root node cannot be removed")]
    CannotRemoveDocumentRoot,

    /// Invalid on-disk format.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error means the addressed object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::DatabaseNotFound { .. }
                | CoreError::ResourceNotFound { .. }
                | CoreError::RevisionNotFound { .. }
                | CoreError::NodeNotFound { .. }
        )
    }
}

/// Validates a database or resource name.
///
/// Names become directory names, so they must be non-empty, must not start
/// with a dot (reserved for in-progress removals) and must not contain path
/// separators.
pub fn validate_name(name: &str) -> CoreResult<()> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name.starts_with('.') {
        Some("name must not start with '.'")
    } else if name.contains(['/', '\\']) {
        Some("name must not contain path separators")
    } else if name.chars().any(char::is_control) {
        Some("name must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CoreError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
