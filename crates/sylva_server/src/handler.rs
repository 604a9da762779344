//! Request handlers for create, delete and get.

use crate::auth::{AuthorizationGate, Credentials, IdentityProvider, Scope};
use crate::config::ServerConfig;
use crate::delete::{self, DeleteOutcome, DeleteTarget};
use crate::dispatch::Dispatcher;
use crate::emit;
use crate::error::{ServerError, ServerResult};
use crate::ingest;
use crate::lifecycle;
use crate::locks::NameLocks;
use std::path::PathBuf;
use std::sync::Arc;
use sylva_core::{validate_name, Databases, ResourceConfig, RevisionNumber};
use tracing::instrument;

/// Content type of serialized resources.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Content type of plain responses.
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Shared state of all handlers.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Databases below the storage root.
    pub databases: Databases,
    /// Name-scoped locks for structural operations.
    pub locks: NameLocks,
    /// Authorization gate.
    pub gate: AuthorizationGate,
}

impl HandlerContext {
    /// Creates a context authenticating callers with `provider`.
    pub fn new(config: ServerConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        let databases = Databases::new().sync_on_write(config.sync_on_write);
        Self {
            config,
            databases,
            locks: NameLocks::new(),
            gate: AuthorizationGate::new(provider),
        }
    }

    /// Directory of database `name`.
    #[must_use]
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.config.storage_root.join(name)
    }
}

/// Create (or replace) a resource from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Database name.
    pub database: String,
    /// Resource name; defaults to the database name.
    pub resource: Option<String>,
    /// Serialized document.
    pub payload: String,
    /// Whether whitespace-only text is kept.
    pub keep_whitespace: bool,
}

impl CreateRequest {
    /// Creates a request.
    pub fn new(database: impl Into<String>, resource: Option<String>, payload: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            resource,
            payload: payload.into(),
            keep_whitespace: false,
        }
    }

    /// Keeps whitespace-only text nodes.
    #[must_use]
    pub fn keep_whitespace(mut self, keep: bool) -> Self {
        self.keep_whitespace = keep;
        self
    }
}

/// Delete everything, a database, a resource or a subtree.
///
/// Parameters are kept as received; they are validated after authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Database name.
    pub database: Option<String>,
    /// Resource name.
    pub resource: Option<String>,
    /// Node id of the subtree root.
    pub node_id: Option<String>,
}

impl DeleteRequest {
    /// Creates a request from optional parameters.
    pub fn new(database: Option<&str>, resource: Option<&str>, node_id: Option<&str>) -> Self {
        Self {
            database: database.map(str::to_string),
            resource: resource.map(str::to_string),
            node_id: node_id.map(str::to_string),
        }
    }
}

/// Read a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    /// Database name.
    pub database: String,
    /// Resource name.
    pub resource: String,
    /// Revision to read; latest if `None`.
    pub revision: Option<u64>,
}

/// A transport-agnostic response with an HTTP-style status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Body, if any.
    pub body: Option<String>,
    /// Content type of the body.
    pub content_type: Option<&'static str>,
}

impl Response {
    /// 200 without body.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: None,
            content_type: None,
        }
    }

    /// 200 with an XML body.
    #[must_use]
    pub fn xml(body: String) -> Self {
        Self {
            status: 200,
            body: Some(body),
            content_type: Some(XML_CONTENT_TYPE),
        }
    }

    /// Error response carrying the error message.
    #[must_use]
    pub fn error(err: &ServerError) -> Self {
        Self {
            status: err.status_code(),
            body: Some(err.to_string()),
            content_type: Some(TEXT_CONTENT_TYPE),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Handler for resource requests.
///
/// Every handler authorizes first, validates parameters, and then runs its
/// blocking steps in order through the [`Dispatcher`].
pub struct RequestHandler {
    context: Arc<HandlerContext>,
    dispatcher: Dispatcher,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        let dispatcher = Dispatcher::new(context.config.max_blocking_tasks);
        Self {
            context,
            dispatcher,
        }
    }

    /// Shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Creates the database if needed, creates or replaces the resource,
    /// ingests the payload and returns the serialized resource.
    #[instrument(skip_all, fields(database = %request.database, resource = tracing::field::Empty))]
    pub async fn handle_create(&self, credentials: &Credentials, request: CreateRequest) -> ServerResult<Response> {
        self.context.gate.authorize(credentials, Scope::Create)?;

        let database = request.database;
        let resource = request.resource.unwrap_or_else(|| database.clone());
        tracing::Span::current().record("resource", resource.as_str());
        validate_name(&database)?;
        validate_name(&resource)?;
        if request.payload.trim().is_empty() {
            return Err(ServerError::InvalidRequest("payload is empty".into()));
        }

        let config = ResourceConfig::new(resource.as_str()).keep_whitespace(request.keep_whitespace);
        let payload = request.payload;
        let keep_whitespace = request.keep_whitespace;
        let document = self
            .dispatcher
            .run("parse", move || ingest::parse_payload(&payload, keep_whitespace))
            .await?;

        let ctx = Arc::clone(&self.context);
        let name = database.clone();
        let db = self
            .dispatcher
            .run("ensure_database", move || lifecycle::ensure_database(&ctx, &name))
            .await?;

        let ctx = Arc::clone(&self.context);
        let committed = self
            .dispatcher
            .run("ingest", move || {
                ingest::replace_and_ingest(&ctx, &db, &config, &document)
            })
            .await?;

        let revision = committed.revision_number();
        let ctx = Arc::clone(&self.context);
        let body = self
            .dispatcher
            .run("serialize", move || emit::serialize_snapshot(&ctx, &committed))
            .await?;

        tracing::info!(%revision, "resource created");
        Ok(Response::xml(body))
    }

    /// Deletes everything, a database, a resource or a subtree.
    #[instrument(skip_all, fields(database = ?request.database, resource = ?request.resource, node = ?request.node_id))]
    pub async fn handle_delete(&self, credentials: &Credentials, request: DeleteRequest) -> ServerResult<Response> {
        self.context.gate.authorize(credentials, Scope::Delete)?;

        let target = DeleteTarget::from_params(
            request.database.as_deref(),
            request.resource.as_deref(),
            request.node_id.as_deref(),
        )?;

        let ctx = Arc::clone(&self.context);
        let outcome = self
            .dispatcher
            .run("delete", move || delete::execute(&ctx, &target))
            .await?;

        match outcome {
            DeleteOutcome::Databases(count) => tracing::info!(count, "dropped all databases"),
            DeleteOutcome::Database(existed) => tracing::info!(existed, "dropped database"),
            DeleteOutcome::Resource => tracing::info!("dropped resource"),
            DeleteOutcome::Subtree(revision) => tracing::info!(%revision, "removed subtree"),
        }
        Ok(Response::ok())
    }

    /// Returns the serialized resource.
    #[instrument(skip_all, fields(database = %request.database, resource = %request.resource))]
    pub async fn handle_get(&self, credentials: &Credentials, request: GetRequest) -> ServerResult<Response> {
        self.context.gate.authorize(credentials, Scope::View)?;
        validate_name(&request.database)?;
        validate_name(&request.resource)?;

        let ctx = Arc::clone(&self.context);
        let body = self
            .dispatcher
            .run("serialize", move || {
                let db = ctx
                    .databases
                    .open_database(&ctx.database_path(&request.database))?;
                emit::serialize_resource(
                    &ctx,
                    &db,
                    &request.resource,
                    request.revision.map(RevisionNumber::new),
                )
            })
            .await?;

        Ok(Response::xml(body))
    }
}
