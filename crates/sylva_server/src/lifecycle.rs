//! Database and resource lifecycle.
//!
//! Both operations are check-then-act sequences and run under the
//! [`NameLocks`](crate::locks::NameLocks) entry of the name they touch, so
//! concurrent requests for the same name observe each other's results.

use crate::error::{ServerError, ServerResult};
use crate::handler::HandlerContext;
use std::sync::Arc;
use sylva_core::{validate_name, Database, DatabaseConfig, ResourceConfig};

/// Ensures database `name` exists below the storage root and opens it.
///
/// Idempotent: an existing database is opened unchanged. If creation fails
/// part way the partially created directory is removed before the error is
/// returned.
pub fn ensure_database(ctx: &HandlerContext, name: &str) -> ServerResult<Arc<Database>> {
    validate_name(name)?;
    ctx.locks.with_lock(name, || open_or_create(ctx, name))
}

/// Creates database `name` if it is missing and opens it.
///
/// The caller must hold the database's name lock.
pub(crate) fn open_or_create(ctx: &HandlerContext, name: &str) -> ServerResult<Arc<Database>> {
    let path = ctx.database_path(name);
    let config = DatabaseConfig::new(&path).sync_on_write(ctx.config.sync_on_write);
    if ctx.databases.create_database(&config)? {
        tracing::debug!(database = %name, "database created");
    }
    Ok(ctx.databases.open_database(&path)?)
}

/// Creates resource `config.name`, replacing an existing one.
///
/// The caller must hold the resource's name lock. Creation is tried first;
/// if the resource already exists it is removed and creation is retried
/// exactly once. A second failure is fatal.
///
/// # Errors
///
/// `ResourceInUse` if the existing resource has open sessions; it is left
/// untouched in that case.
pub fn ensure_resource_replaced(db: &Database, config: &ResourceConfig) -> ServerResult<()> {
    if db.create_resource(config)? {
        tracing::debug!(database = %db.name(), resource = %config.name, "resource created");
        return Ok(());
    }

    tracing::debug!(database = %db.name(), resource = %config.name, "replacing existing resource");
    db.remove_resource(&config.name)?;

    if db.create_resource(config)? {
        Ok(())
    } else {
        Err(ServerError::Storage(format!(
            "resource {} reappeared while being replaced",
            config.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, TokenValidator};
    use crate::config::ServerConfig;
    use sylva_core::{NodeKey, RevisionNumber};
    use tempfile::{tempdir, TempDir};

    fn context() -> (TempDir, HandlerContext) {
        let temp = tempdir().unwrap();
        let config = ServerConfig::new(temp.path()).with_sync_on_write(false);
        let provider = Arc::new(TokenValidator::new(AuthConfig::new(b"k".to_vec())));
        (temp, HandlerContext::new(config, provider))
    }

    #[test]
    fn ensure_database_is_idempotent() {
        let (temp, ctx) = context();
        let first = ensure_database(&ctx, "db").unwrap();
        let second = ensure_database(&ctx, "db").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.databases.list_databases(temp.path()).unwrap(), vec!["db"]);
    }

    #[test]
    fn ensure_database_rejects_bad_names() {
        let (_temp, ctx) = context();
        assert!(matches!(
            ensure_database(&ctx, "../up"),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(matches!(
            ensure_database(&ctx, "   "),
            Err(ServerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn replace_discards_previous_content() {
        let (_temp, ctx) = context();
        let db = ensure_database(&ctx, "db").unwrap();
        let config = ResourceConfig::new("r");

        ensure_resource_replaced(&db, &config).unwrap();
        {
            let session = db.open_resource("r").unwrap();
            let mut wtx = session.begin_write().unwrap();
            wtx.insert_subtree_as_first_child(&sylva_xml::parse("<old/>").unwrap())
                .unwrap();
            wtx.commit().unwrap();
        }

        ensure_resource_replaced(&db, &config).unwrap();
        let session = db.open_resource("r").unwrap();
        assert_eq!(session.most_recent_revision(), RevisionNumber::INITIAL);
        assert!(session
            .begin_read()
            .children(NodeKey::DOCUMENT_ROOT)
            .is_empty());
    }

    #[test]
    fn replace_fails_while_in_use() {
        let (_temp, ctx) = context();
        let db = ensure_database(&ctx, "db").unwrap();
        let config = ResourceConfig::new("r");
        ensure_resource_replaced(&db, &config).unwrap();

        let _session = db.open_resource("r").unwrap();
        assert!(matches!(
            ensure_resource_replaced(&db, &config),
            Err(ServerError::ResourceInUse(_))
        ));
        assert!(db.exists_resource("r"));
    }
}
