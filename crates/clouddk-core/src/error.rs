//! Error types for cloud.dk operations.
//!
//! This module provides the error taxonomy shared by every cloud.dk client crate,
//! including HTTP status classification and the wrapper used to name the failing
//! operation and resource in user-facing messages.

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for cloud.dk operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Network-level failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API answered with a non-2xx status other than 404
    #[error("The API responded with HTTP {status_text}")]
    Api {
        /// Numeric HTTP status
        status: u16,
        /// Status line as reported by the server (e.g. `500 Internal Server Error`)
        status_text: String,
        /// Raw response body, if any
        body: String,
    },

    /// The API answered with 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// A wait loop hit its deadline
    #[error("{0}")]
    TimedOut(String),

    /// A wait loop was aborted by the caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Failed to decode an API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A lower-level failure annotated with the operation and resource it affected
    #[error("Failed to {operation} {resource}: {source}")]
    Operation {
        /// Operation verb, e.g. `create the server`
        operation: String,
        /// Human identifier of the resource, e.g. `'web01' (id: 42)`
        resource: String,
        /// Underlying error
        source: Box<Error>,
    },
}

/// Specialized result type for cloud.dk operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::Api`] from a response status and body.
    #[must_use]
    pub fn from_status(status: StatusCode, body: String) -> Self {
        Self::Api {
            status: status.as_u16(),
            status_text: status.to_string(),
            body,
        }
    }

    /// Wrap an error with the operation and resource it belongs to.
    #[must_use]
    pub fn during(self, operation: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            resource: resource.into(),
            source: Box::new(self),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::TimedOut(_) => "TIMED_OUT",
            Self::Cancelled(_) => "CANCELLED",
            Self::Parse(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Operation { source, .. } => source.error_code(),
        }
    }

    /// HTTP status carried by this error, looking through operation wrappers.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND.as_u16()),
            Self::Operation { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true if a bounded retry loop may try again after this error.
    ///
    /// Only non-2xx API answers qualify; transport failures are always fatal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Returns true if this error signals absence rather than failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Operation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::Transport("test".to_string()).error_code(),
            "TRANSPORT_ERROR"
        );
        assert_eq!(
            Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()).error_code(),
            "API_ERROR"
        );
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(Error::TimedOut("test".to_string()).error_code(), "TIMED_OUT");
        assert_eq!(Error::Cancelled("test".to_string()).error_code(), "CANCELLED");
        assert_eq!(Error::Parse("test".to_string()).error_code(), "PARSE_ERROR");
        assert_eq!(
            Error::ConfigError("test".to_string()).error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            Error::InvalidEndpoint("test".to_string()).error_code(),
            "INVALID_ENDPOINT"
        );
        assert_eq!(
            Error::InvalidRequest("test".to_string()).error_code(),
            "INVALID_REQUEST"
        );
    }

    #[test]
    fn test_api_error_display_uses_status_line() {
        let err = Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, "locked".to_string());
        assert_eq!(
            err.to_string(),
            "The API responded with HTTP 500 Internal Server Error"
        );
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_operation_wrapper_display() {
        let err = Error::from_status(StatusCode::BAD_REQUEST, String::new())
            .during("create the server", "'web01' (id: -)");
        assert_eq!(
            err.to_string(),
            "Failed to create the server 'web01' (id: -): The API responded with HTTP 400 Bad Request"
        );
        assert_eq!(err.error_code(), "API_ERROR");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()).is_transient());
        assert!(Error::from_status(StatusCode::CONFLICT, String::new()).is_transient());
        assert!(!Error::Transport("reset".to_string()).is_transient());
        assert!(!Error::NotFound("gone".to_string()).is_transient());
    }

    #[test]
    fn test_not_found_through_wrapper() {
        let err = Error::NotFound("gone".to_string()).during("read the server", "'a' (id: 1)");
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let clouddk_err: Error = err.into();
        assert!(matches!(clouddk_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let clouddk_err: Error = err.into();
        assert!(matches!(clouddk_err, Error::Parse(_)));
    }

    #[test]
    fn test_error_partial_eq() {
        let err1 = Error::NotFound("test".to_string());
        let err2 = Error::NotFound("test".to_string());
        let err3 = Error::NotFound("other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
