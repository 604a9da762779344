//! Core type definitions for Sylva.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a node within a resource.
///
/// Node keys are assigned by the engine at insert time, are never reused
/// within a resource and stay the same across revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// Key of the document root node every resource starts with.
    pub const DOCUMENT_ROOT: NodeKey = NodeKey(0);

    /// Creates a node key.
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next key.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of a committed revision.
///
/// Revision 0 is the empty document created with the resource; every
/// committed write transaction produces the next number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionNumber(pub u64);

impl RevisionNumber {
    /// The bootstrap revision.
    pub const INITIAL: RevisionNumber = RevisionNumber(0);

    /// Creates a revision number.
    #[must_use]
    pub const fn new(revision: u64) -> Self {
        Self(revision)
    }

    /// Returns the raw revision value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following revision number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}
