//! Server configuration.

use crate::auth::AuthConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the resource server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding all databases.
    pub storage_root: PathBuf,
    /// Maximum number of concurrently dispatched blocking tasks.
    pub max_blocking_tasks: usize,
    /// Secret key for token validation.
    pub auth_secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
    /// Whether serialized resources are indented.
    pub pretty_print: bool,
    /// Whether engine writes are fsynced.
    pub sync_on_write: bool,
}

impl ServerConfig {
    /// Creates a configuration storing databases below `storage_root`.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            max_blocking_tasks: 16,
            auth_secret: Vec::new(),
            token_expiry: Duration::from_secs(24 * 60 * 60),
            pretty_print: false,
            sync_on_write: true,
        }
    }

    /// Sets the maximum number of concurrent blocking tasks.
    pub fn with_max_blocking_tasks(mut self, max: usize) -> Self {
        self.max_blocking_tasks = max.max(1);
        self
    }

    /// Sets the secret used to validate tokens.
    pub fn with_auth_secret(mut self, secret: Vec<u8>) -> Self {
        self.auth_secret = secret;
        self
    }

    /// Sets the token expiration duration.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Enables or disables pretty printed output.
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Enables or disables fsync on engine writes.
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Authentication settings derived from this configuration.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.auth_secret.clone()).with_expiry(self.token_expiry)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("sylva-data")
    }
}
