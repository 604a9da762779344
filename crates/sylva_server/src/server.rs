//! Resource server facade.

use crate::auth::{Credentials, IdentityProvider, TokenValidator};
use crate::config::ServerConfig;
use crate::emit::{deliver, ResponseSink};
use crate::error::ServerResult;
use crate::handler::{CreateRequest, DeleteRequest, GetRequest, HandlerContext, RequestHandler, Response};
use std::sync::Arc;

/// The resource server.
///
/// Exposes create, delete and get as transport-agnostic calls returning
/// [`Response`] values with HTTP-style status codes. Errors never escape as
/// Rust errors; they become error responses.
///
/// # Example
///
/// ```
/// use sylva_server::{CreateRequest, Credentials, ResourceServer, Scope, ServerConfig};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let root = tempfile::tempdir().unwrap();
/// let config = ServerConfig::new(root.path()).with_auth_secret(b"secret".to_vec());
/// let server = ResourceServer::new(config);
///
/// let token = server.token_validator().create_token(uuid::Uuid::new_v4(), &Scope::ALL).unwrap();
/// let response = server
///     .create(&Credentials::bearer(token), CreateRequest::new("db", None, "<a/>"))
///     .await;
/// assert_eq!(response.status, 200);
/// # });
/// ```
pub struct ResourceServer {
    handler: RequestHandler,
    tokens: TokenValidator,
}

impl ResourceServer {
    /// Creates a server validating HMAC tokens signed with the configured
    /// secret.
    pub fn new(config: ServerConfig) -> Self {
        let tokens = TokenValidator::new(config.auth_config());
        let provider: Arc<dyn IdentityProvider> = Arc::new(tokens.clone());
        Self::build(config, provider, tokens)
    }

    /// Creates a server backed by a custom identity provider.
    pub fn with_identity_provider(config: ServerConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        let tokens = TokenValidator::new(config.auth_config());
        Self::build(config, provider, tokens)
    }

    fn build(config: ServerConfig, provider: Arc<dyn IdentityProvider>, tokens: TokenValidator) -> Self {
        tracing::debug!(root = %config.storage_root.display(), "starting resource server");
        let context = Arc::new(HandlerContext::new(config, provider));
        Self {
            handler: RequestHandler::new(context),
            tokens,
        }
    }

    /// Validator for tokens signed with the configured secret.
    #[must_use]
    pub fn token_validator(&self) -> &TokenValidator {
        &self.tokens
    }

    /// Shared handler context.
    #[must_use]
    pub fn context(&self) -> &Arc<HandlerContext> {
        self.handler.context()
    }

    /// Handles a create request.
    pub async fn create(&self, credentials: &Credentials, request: CreateRequest) -> Response {
        respond("create", self.handler.handle_create(credentials, request).await)
    }

    /// Handles a delete request.
    pub async fn delete(&self, credentials: &Credentials, request: DeleteRequest) -> Response {
        respond("delete", self.handler.handle_delete(credentials, request).await)
    }

    /// Handles a get request.
    pub async fn get(&self, credentials: &Credentials, request: GetRequest) -> Response {
        respond("get", self.handler.handle_get(credentials, request).await)
    }

    /// Handles a create request and delivers the response to `sink`.
    pub async fn create_into<S: ResponseSink>(&self, credentials: &Credentials, request: CreateRequest, sink: S) {
        deliver(sink, self.create(credentials, request).await);
    }

    /// Handles a delete request and delivers the response to `sink`.
    pub async fn delete_into<S: ResponseSink>(&self, credentials: &Credentials, request: DeleteRequest, sink: S) {
        deliver(sink, self.delete(credentials, request).await);
    }

    /// Handles a get request and delivers the response to `sink`.
    pub async fn get_into<S: ResponseSink>(&self, credentials: &Credentials, request: GetRequest, sink: S) {
        deliver(sink, self.get(credentials, request).await);
    }
}

fn respond(op: &'static str, result: ServerResult<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => {
            if err.is_server_error() {
                tracing::error!(op, status = err.status_code(), error = %err, "request failed");
            } else {
                tracing::warn!(op, status = err.status_code(), error = %err, "request rejected");
            }
            Response::error(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Scope;
    use tempfile::tempdir;

    #[tokio::test]
    async fn server_lifecycle() {
        let root = tempdir().unwrap();
        let server = ResourceServer::new(
            ServerConfig::new(root.path())
                .with_auth_secret(b"secret".to_vec())
                .with_sync_on_write(false),
        );
        let token = server
            .token_validator()
            .create_token(uuid::Uuid::new_v4(), &Scope::ALL)
            .unwrap();
        let credentials = Credentials::bearer(token);

        let created = server
            .create(&credentials, CreateRequest::new("db", Some("r".into()), "<a/>"))
            .await;
        assert_eq!(created.status, 200);
        assert_eq!(created.content_type, Some(crate::handler::XML_CONTENT_TYPE));

        let fetched = server
            .get(
                &credentials,
                GetRequest {
                    database: "db".into(),
                    resource: "r".into(),
                    revision: None,
                },
            )
            .await;
        assert_eq!(fetched.body, created.body);
    }

    #[tokio::test]
    async fn errors_become_responses() {
        let root = tempdir().unwrap();
        let server = ResourceServer::new(ServerConfig::new(root.path()));

        let response = server
            .delete(&Credentials::bearer("nope"), DeleteRequest::default())
            .await;
        assert_eq!(response.status, 401);
        assert!(!response.is_success());
        assert!(response.body.unwrap().contains("not authorized"));
    }

    #[tokio::test]
    async fn delivers_into_sink() {
        let root = tempdir().unwrap();
        let server = ResourceServer::new(ServerConfig::new(root.path()));
        let (tx, rx) = tokio::sync::oneshot::channel();

        server
            .get_into(
                &Credentials::default(),
                GetRequest {
                    database: "db".into(),
                    resource: "r".into(),
                    revision: None,
                },
                tx,
            )
            .await;
        assert_eq!(rx.await.unwrap().status, 401);
    }
}
