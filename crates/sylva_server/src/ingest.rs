//! Transactional ingest of documents.

use crate::error::{ServerError, ServerResult};
use crate::handler::HandlerContext;
use crate::lifecycle::{ensure_resource_replaced, open_or_create};
use crate::locks::resource_key;
use std::sync::Arc;
use sylva_core::{check_reserved_names, Database, NodeReadTrx, ResourceConfig};
use sylva_xml::{Parser, XmlDocument};

/// Parses an inbound payload.
///
/// # Errors
///
/// `InvalidRequest` for empty, whitespace-only or malformed payloads, and
/// for payloads using the `rest` prefix reserved for node ids.
pub fn parse_payload(payload: &str, keep_whitespace: bool) -> ServerResult<XmlDocument> {
    if payload.trim().is_empty() {
        return Err(ServerError::InvalidRequest("payload is empty".into()));
    }
    let document = Parser::new(payload).keep_whitespace(keep_whitespace).parse()?;
    check_reserved_names(document.root())?;
    Ok(document)
}

/// Inserts `document` as the first child of the document root of
/// `resource` and commits.
///
/// Returns a read transaction on the committed revision. The write
/// transaction is rolled back on every error path.
pub fn ingest(db: &Database, resource: &str, document: &XmlDocument) -> ServerResult<NodeReadTrx> {
    let session = db.open_resource(resource)?;
    let mut wtx = session.begin_write()?;
    wtx.move_to_document_root();
    wtx.insert_subtree_as_first_child(document)?;
    Ok(wtx.commit_and_read()?)
}

/// Creates or replaces `config.name` and ingests `document` into it.
///
/// Runs under the database's name lock and then the resource's, so the
/// database cannot be dropped part way. If `db` was dropped since it was
/// opened, the database is created again. If ingest fails after the
/// resource was (re)created, the resource is removed again so no empty
/// replacement stays visible.
pub fn replace_and_ingest(
    ctx: &HandlerContext,
    db: &Arc<Database>,
    config: &ResourceConfig,
    document: &XmlDocument,
) -> ServerResult<NodeReadTrx> {
    let database = db.name().to_string();
    ctx.locks.with_lock(&database, || {
        let db = if db.is_open() {
            Arc::clone(db)
        } else {
            tracing::debug!(%database, "database was dropped, creating it again");
            open_or_create(ctx, &database)?
        };

        ctx.locks.with_lock(&resource_key(&database, &config.name), || {
            ensure_resource_replaced(&db, config)?;

            match ingest(&db, &config.name, document) {
                Ok(rtx) => Ok(rtx),
                Err(err) => {
                    tracing::warn!(
                        %database,
                        resource = %config.name,
                        error = %err,
                        "ingest failed, removing resource"
                    );
                    if let Err(cleanup) = db.remove_resource(&config.name) {
                        tracing::warn!(resource = %config.name, error = %cleanup, "cleanup failed");
                    }
                    Err(err)
                }
            }
        })
    })
}
