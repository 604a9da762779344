//! Error types for the request handler.

use sylva_core::CoreError;
use sylva_xml::XmlError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The caller is not authenticated or lacks the required scope.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Malformed request parameters or payload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The resource has open sessions and cannot be removed.
    #[error("resource in use: {0}")]
    ResourceInUse(String),

    /// The addressed database, resource, revision or node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage engine failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A bulk drop failed for some databases.
    #[error("{} database(s) could not be dropped: {}", failed.len(), describe_failures(failed))]
    PartialBulkFailure {
        /// Database names with the reason each one failed.
        failed: Vec<(String, String)>,
    },

    /// Worker failure or other unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_failures(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(name, reason)| format!("{name} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ServerError {
    /// HTTP-style status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::Unauthorized(_) => 401,
            ServerError::InvalidRequest(_) => 400,
            ServerError::ResourceInUse(_) => 409,
            ServerError::NotFound(_) => 404,
            ServerError::Storage(_)
            | ServerError::PartialBulkFailure { .. }
            | ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::Unauthorized(_)
                | ServerError::InvalidRequest(_)
                | ServerError::ResourceInUse(_)
                | ServerError::NotFound(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::DatabaseNotFound { .. }
            | CoreError::ResourceNotFound { .. }
            | CoreError::RevisionNotFound { .. }
            | CoreError::NodeNotFound { .. }
            | CoreError::DatabaseClosed => ServerError::NotFound(message),
            CoreError::ResourceInUse { .. } => ServerError::ResourceInUse(message),
            CoreError::InvalidName { .. }
            | CoreError::ReservedName { .. }
            | CoreError::CannotRemoveDocumentRoot => ServerError::InvalidRequest(message),
            CoreError::Io(_)
            | CoreError::Encoding { .. }
            | CoreError::DatabaseLocked
            | CoreError::InvalidFormat { .. }
            | CoreError::InvalidOperation { .. } => ServerError::Storage(message),
        }
    }
}

impl From<XmlError> for ServerError {
    fn from(err: XmlError) -> Self {
        ServerError::InvalidRequest(format!("malformed payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva_core::NodeKey;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert!(ServerError::PartialBulkFailure { failed: vec![] }.is_server_error());
    }

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(ServerError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(ServerError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServerError::ResourceInUse("x".into()).status_code(), 409);
        assert_eq!(ServerError::Storage("x".into()).status_code(), 500);
    }

    #[test]
    fn core_errors_are_mapped() {
        assert!(matches!(
            ServerError::from(CoreError::NodeNotFound { key: NodeKey::new(9) }),
            ServerError::NotFound(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::ResourceInUse {
                name: "r".into(),
                sessions: 1
            }),
            ServerError::ResourceInUse(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::CannotRemoveDocumentRoot),
            ServerError::InvalidRequest(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::ReservedName { name: "rest:id".into() }),
            ServerError::InvalidRequest(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::DatabaseLocked),
            ServerError::Storage(_)
        ));
    }

    #[test]
    fn bulk_failure_lists_names() {
        let err = ServerError::PartialBulkFailure {
            failed: vec![("db1".into(), "in use".into()), ("db2".into(), "io".into())],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 database(s)"));
        assert!(msg.contains("db1 (in use)"));
        assert!(msg.contains("db2 (io)"));
    }
}
