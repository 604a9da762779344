//! Authentication and authorization.
//!
//! Requests carry a bearer token issued by [`TokenValidator::create_token`].
//! The [`AuthorizationGate`] authenticates the token through an
//! [`IdentityProvider`] and checks the scope an operation requires before
//! any storage side effect happens.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 16 bytes: subject id
//! - 1 byte: scope bitmask
//! - 8 bytes: issue timestamp (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 signature
//!
//! Total: 57 bytes, base64 (URL-safe, unpadded) for transport.

use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_LEN: usize = 57;
const SIGNED_LEN: usize = 25;

/// Permission required by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Create databases and resources, ingest documents.
    Create,
    /// Drop databases and resources, remove subtrees.
    Delete,
    /// Read resources.
    View,
}

impl Scope {
    /// All scopes.
    pub const ALL: [Scope; 3] = [Scope::Create, Scope::Delete, Scope::View];

    /// Role name as carried by identity providers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Scope::Create => "realm:create",
            Scope::Delete => "realm:delete",
            Scope::View => "realm:view",
        }
    }

    /// Parses a role name or its short form (`create`, `delete`, `view`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let short = value.strip_prefix("realm:").unwrap_or(value);
        match short {
            "create" => Some(Scope::Create),
            "delete" => Some(Scope::Delete),
            "view" => Some(Scope::View),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Scope::Create => 0b001,
            Scope::Delete => 0b010,
            Scope::View => 0b100,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Subject id.
    pub subject: Uuid,
    /// Granted scopes.
    pub scopes: Vec<Scope>,
}

impl Principal {
    /// Creates a principal.
    pub fn new(subject: Uuid, scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            subject,
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Returns true if the principal holds `scope`.
    #[must_use]
    pub fn is_authorized(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// Credentials presented with a request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token.
    pub token: String,
}

impl Credentials {
    /// Wraps a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("token", &"<redacted>").finish()
    }
}

/// Resolves credentials to a principal.
pub trait IdentityProvider: Send + Sync {
    /// Authenticates the credentials.
    ///
    /// # Errors
    ///
    /// Any error means the caller is not authenticated.
    fn authenticate(&self, credentials: &Credentials) -> ServerResult<Principal>;
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and validates signed tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for a subject.
    ///
    /// # Arguments
    ///
    /// * `subject` - The subject identifier
    /// * `scopes` - Scopes granted to the bearer
    ///
    /// # Returns
    ///
    /// The base64-encoded token.
    pub fn create_token(&self, subject: Uuid, scopes: &[Scope]) -> ServerResult<String> {
        let mask = scopes.iter().fold(0u8, |mask, scope| mask | scope.bit());

        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(subject.as_bytes());
        token.push(mask);
        token.extend_from_slice(&now_millis().to_be_bytes());

        let signature = self.mac(&token)?.finalize().into_bytes();
        token.extend_from_slice(&signature);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Validates a token and returns the principal it names.
    pub fn validate_token(&self, token: &str) -> ServerResult<Principal> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| ServerError::Unauthorized("malformed token".into()))?;
        if bytes.len() != TOKEN_LEN {
            return Err(ServerError::Unauthorized("invalid token length".into()));
        }

        let (signed, signature) = bytes.split_at(SIGNED_LEN);
        self.mac(signed)?
            .verify_slice(signature)
            .map_err(|_| ServerError::Unauthorized("invalid signature".into()))?;

        let mut subject = [0u8; 16];
        subject.copy_from_slice(&signed[0..16]);
        let mask = signed[16];
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&signed[17..25]);

        // Check expiration
        let issued = u64::from_be_bytes(timestamp);
        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now_millis() > issued.saturating_add(expiry_millis) {
            return Err(ServerError::Unauthorized("token expired".into()));
        }

        let scopes = Scope::ALL.into_iter().filter(|s| mask & s.bit() != 0);
        Ok(Principal::new(Uuid::from_bytes(subject), scopes))
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("invalid HMAC key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

impl IdentityProvider for TokenValidator {
    fn authenticate(&self, credentials: &Credentials) -> ServerResult<Principal> {
        self.validate_token(&credentials.token)
    }
}

/// Checks credentials against a required scope before any side effect.
#[derive(Clone)]
pub struct AuthorizationGate {
    provider: Arc<dyn IdentityProvider>,
}

impl AuthorizationGate {
    /// Creates a gate backed by `provider`.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Authenticates `credentials` and requires `scope`.
    ///
    /// Fails closed: any provider error is reported as `Unauthorized`.
    pub fn authorize(&self, credentials: &Credentials, scope: Scope) -> ServerResult<Principal> {
        let principal = match self.provider.authenticate(credentials) {
            Ok(principal) => principal,
            Err(err) => {
                tracing::warn!(%scope, error = %err, "authentication failed");
                return Err(ServerError::Unauthorized(match err {
                    ServerError::Unauthorized(reason) => reason,
                    other => other.to_string(),
                }));
            }
        };

        if !principal.is_authorized(scope) {
            tracing::warn!(subject = %principal.subject, %scope, "missing scope");
            return Err(ServerError::Unauthorized(format!("missing scope {scope}")));
        }
        Ok(principal)
    }
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate").finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
