//! CLI command implementations.

pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod token;

use std::path::PathBuf;
use sylva_server::{Credentials, ResourceServer, Response, Scope, ServerConfig, ServerError};
use thiserror::Error;
use tokio::runtime::Runtime;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The handler answered with an error status.
    #[error("request failed with status {status}: {message}")]
    Request {
        /// Status code.
        status: u16,
        /// Error message from the handler.
        message: String,
    },

    /// Invalid command-line arguments.
    #[error("{0}")]
    Usage(String),

    /// Handler or token error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// An in-process handler plus the runtime that drives it.
pub struct Session {
    runtime: Runtime,
    server: ResourceServer,
    root: PathBuf,
    /// The signing secret was generated for this invocation only.
    ephemeral_secret: bool,
}

impl Session {
    /// Creates a session on `root`, signing tokens with `secret`.
    pub fn new(root: PathBuf, secret: Option<String>, pretty: bool) -> CliResult<Self> {
        let ephemeral_secret = secret.is_none();
        let secret = secret
            .map(String::into_bytes)
            .unwrap_or_else(|| uuid::Uuid::new_v4().as_bytes().to_vec());
        let config = ServerConfig::new(root.clone())
            .with_auth_secret(secret)
            .with_pretty_print(pretty);

        Ok(Self {
            runtime: tokio::runtime::Builder::new_multi_thread().enable_all().build()?,
            server: ResourceServer::new(config),
            root,
            ephemeral_secret,
        })
    }

    /// The in-process server.
    pub fn server(&self) -> &ResourceServer {
        &self.server
    }

    /// The storage root.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Returns true if no `--secret` was given, so tokens are only valid
    /// within this invocation.
    pub fn has_ephemeral_secret(&self) -> bool {
        self.ephemeral_secret
    }

    /// Issues a token carrying `scopes`.
    pub fn token(&self, scopes: &[Scope]) -> CliResult<String> {
        Ok(self
            .server
            .token_validator()
            .create_token(uuid::Uuid::new_v4(), scopes)?)
    }

    /// Credentials holding exactly `scope`.
    pub fn credentials(&self, scope: Scope) -> CliResult<Credentials> {
        Ok(Credentials::bearer(self.token(&[scope])?))
    }

    /// Runs a request future to completion.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Prints a successful response body, or turns an error response into a
/// [`CliError`].
pub fn finish(response: Response) -> CliResult<()> {
    if !response.is_success() {
        return Err(CliError::Request {
            status: response.status,
            message: response.body.unwrap_or_default(),
        });
    }
    if let Some(body) = response.body {
        println!("{body}");
    }
    Ok(())
}
