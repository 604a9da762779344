//! Name-scoped locks for structural operations.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One mutex per database or `database/resource` name.
///
/// Check-then-create and drop-then-recreate sequences run while holding the
/// lock for the name they touch. Locks are taken inside dispatched blocking
/// work, never on the request task. Entries are kept for the lifetime of the
/// server.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `name`, creating it on first use.
    pub fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Runs `f` while holding the lock for `name`.
    pub fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(name);
        let _guard = lock.lock();
        f()
    }
}

/// Lock key of a resource.
#[must_use]
pub fn resource_key(database: &str, resource: &str) -> String {
    format!("{database}/{resource}")
}
