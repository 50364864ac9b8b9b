//! # Framework Errors
//!
//! Two layers of errors flow through the framework:
//!
//! - [`ModelError`] is what a backend model signals. It speaks the language of
//!   the domain (a parameter is missing, an entity does not exist).
//! - [`DispatchError`] is what the dispatcher puts on the wire. Every variant
//!   has a fixed HTTP status and a stable machine-readable code.
//!
//! Backend errors are never swallowed: the `From<ModelError>` conversion maps
//! each of them to exactly one wire error, keeping the offending parameter name
//! in the message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Stable error codes. Clients match on these, never on the message text.
pub mod error_code {
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "UNSUPPORTED_MEDIA_TYPE";
    pub const NOT_ACCEPTABLE: &str = "NOT_ACCEPTABLE";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const OPERATION_FAILED: &str = "OPERATION_FAILED";
}

/// Errors signalled by backend models.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    /// The addressed entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A required request parameter was absent. Holds the parameter name.
    #[error("missing parameter: '{0}'")]
    MissingParameter(String),

    /// A request parameter had an unusable value. Holds the parameter name
    /// and the reason.
    #[error("invalid parameter: '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The operation is not valid in the entity's current state.
    #[error("{0}")]
    InvalidOperation(String),

    /// The backend tried and failed.
    #[error("{0}")]
    OperationFailed(String),
}

impl ModelError {
    /// Shorthand for [`ModelError::InvalidParameter`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Wire-level errors produced by the dispatcher.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The verb is not accepted by the target, or the backend lacks the
    /// operation. HTTP 405.
    #[error("{0}")]
    MethodNotAllowed(String),

    /// The request body is not `application/json`. HTTP 415.
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// The client does not accept `application/json`. HTTP 406.
    #[error("{0}")]
    NotAcceptable(String),

    /// Malformed body or a parameter problem reported by the backend. HTTP 400.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed entity or path does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// The backend failed while executing a synchronous operation. HTTP 500.
    #[error("{0}")]
    OperationFailed(String),
}

impl DispatchError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed(_) => error_code::METHOD_NOT_ALLOWED,
            Self::UnsupportedMediaType(_) => error_code::UNSUPPORTED_MEDIA_TYPE,
            Self::NotAcceptable(_) => error_code::NOT_ACCEPTABLE,
            Self::BadRequest(_) => error_code::BAD_REQUEST,
            Self::NotFound(_) => error_code::NOT_FOUND,
            Self::OperationFailed(_) => error_code::OPERATION_FAILED,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for DispatchError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::NotFound(_) => Self::NotFound(e.to_string()),
            ModelError::MissingParameter(_)
            | ModelError::InvalidParameter { .. }
            | ModelError::InvalidOperation(_) => Self::BadRequest(e.to_string()),
            ModelError::OperationFailed(_) => Self::OperationFailed(e.to_string()),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            DispatchError::MethodNotAllowed("x".into()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            DispatchError::UnsupportedMediaType("x".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            DispatchError::NotAcceptable("x".into()).status_code(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(DispatchError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(DispatchError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            DispatchError::OperationFailed("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn parameter_errors_become_bad_request_with_the_name() {
        let err: DispatchError = ModelError::MissingParameter("name".into()).into();
        assert_eq!(err, DispatchError::BadRequest("missing parameter: 'name'".into()));

        let err: DispatchError = ModelError::invalid("memory", "must be positive").into();
        assert_eq!(
            err,
            DispatchError::BadRequest("invalid parameter: 'memory': must be positive".into())
        );
    }

    #[test]
    fn not_found_stays_not_found() {
        let err: DispatchError = ModelError::NotFound("vm 'x' not found".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "vm 'x' not found");
    }

    #[test]
    fn json_response_carries_status() {
        let resp = DispatchError::NotFound("gone".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
