//! Deletion at four granularities.

use crate::error::{ServerError, ServerResult};
use crate::handler::HandlerContext;
use crate::locks::resource_key;
use sylva_core::{validate_name, NodeKey, RevisionNumber};

/// What a delete request removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Every database below the storage root.
    All,
    /// One database with all its resources.
    Database(String),
    /// One resource.
    Resource {
        /// Database name.
        database: String,
        /// Resource name.
        resource: String,
    },
    /// A node and its descendants.
    Subtree {
        /// Database name.
        database: String,
        /// Resource name.
        resource: String,
        /// Root of the removed subtree.
        node: NodeKey,
    },
}

impl DeleteTarget {
    /// Builds a target from optional request parameters.
    ///
    /// Without a database every database is dropped; without a resource the
    /// whole database is dropped. A node id only selects a subtree of a
    /// named resource and is ignored otherwise.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a resource is named without a database, if the
    /// node id of a named resource is not a non-negative integer or a name
    /// is unusable.
    pub fn from_params(
        database: Option<&str>,
        resource: Option<&str>,
        node_id: Option<&str>,
    ) -> ServerResult<Self> {
        match (database, resource) {
            (None, None) => Ok(DeleteTarget::All),
            (None, Some(_)) => Err(ServerError::InvalidRequest(
                "a resource requires a database".into(),
            )),
            (Some(database), None) => {
                validate_name(database)?;
                Ok(DeleteTarget::Database(database.to_string()))
            }
            (Some(database), Some(resource)) => {
                validate_name(database)?;
                validate_name(resource)?;
                let (database, resource) = (database.to_string(), resource.to_string());
                Ok(match node_id.map(parse_node_id).transpose()? {
                    None => DeleteTarget::Resource { database, resource },
                    Some(node) => DeleteTarget::Subtree {
                        database,
                        resource,
                        node,
                    },
                })
            }
        }
    }
}

fn parse_node_id(id: &str) -> ServerResult<NodeKey> {
    id.trim()
        .parse::<u64>()
        .map(NodeKey::new)
        .map_err(|_| ServerError::InvalidRequest(format!("node id {id:?} is not a non-negative integer")))
}

/// Outcome of a completed deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Number of databases removed by a bulk drop.
    Databases(usize),
    /// Whether the database existed.
    Database(bool),
    /// The resource was removed.
    Resource,
    /// The subtree was removed in this revision.
    Subtree(RevisionNumber),
}

/// Executes `target`.
pub fn execute(ctx: &HandlerContext, target: &DeleteTarget) -> ServerResult<DeleteOutcome> {
    match target {
        DeleteTarget::All => bulk_drop(ctx).map(DeleteOutcome::Databases),
        DeleteTarget::Database(name) => drop_database(ctx, name).map(DeleteOutcome::Database),
        DeleteTarget::Resource { database, resource } => {
            drop_resource(ctx, database, resource).map(|()| DeleteOutcome::Resource)
        }
        DeleteTarget::Subtree {
            database,
            resource,
            node,
        } => remove_subtree(ctx, database, resource, *node).map(DeleteOutcome::Subtree),
    }
}

/// Drops every database below the storage root.
///
/// Best effort: every database is attempted. Succeeds when there are none.
///
/// # Errors
///
/// `PartialBulkFailure` listing each database that could not be dropped.
pub fn bulk_drop(ctx: &HandlerContext) -> ServerResult<usize> {
    let names = ctx.databases.list_databases(&ctx.config.storage_root)?;

    let mut dropped = 0;
    let mut failed = Vec::new();
    for name in names {
        match drop_database(ctx, &name) {
            Ok(true) => dropped += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(database = %name, error = %err, "bulk drop skipped database");
                failed.push((name, err.to_string()));
            }
        }
    }

    if failed.is_empty() {
        Ok(dropped)
    } else {
        Err(ServerError::PartialBulkFailure { failed })
    }
}

/// Drops database `name` and all its resources.
///
/// Returns `false` if the database did not exist.
pub fn drop_database(ctx: &HandlerContext, name: &str) -> ServerResult<bool> {
    let path = ctx.database_path(name);
    ctx.locks
        .with_lock(name, || Ok(ctx.databases.remove_database(&path)?))
}

/// Drops a single resource.
///
/// # Errors
///
/// - `NotFound` if the database or resource does not exist
/// - `ResourceInUse` if the resource has open sessions
pub fn drop_resource(ctx: &HandlerContext, database: &str, resource: &str) -> ServerResult<()> {
    let db = ctx.databases.open_database(&ctx.database_path(database))?;
    ctx.locks.with_lock(&resource_key(database, resource), || {
        Ok(db.remove_resource(resource)?)
    })
}

/// Removes `node` and its descendants from the latest revision and commits.
///
/// # Errors
///
/// - `NotFound` if the database, resource or node does not exist
/// - `InvalidRequest` if `node` is the document root
///
/// The prior revision is unchanged on error.
pub fn remove_subtree(
    ctx: &HandlerContext,
    database: &str,
    resource: &str,
    node: NodeKey,
) -> ServerResult<RevisionNumber> {
    let db = ctx.databases.open_database(&ctx.database_path(database))?;
    let session = db.open_resource(resource)?;
    let mut wtx = session.begin_write()?;
    wtx.move_to(node)?;
    let removed = wtx.remove()?;
    let revision = wtx.commit()?;
    tracing::debug!(%database, %resource, %node, removed, %revision, "removed subtree");
    Ok(revision)
}
