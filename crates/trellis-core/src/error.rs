//! Error types for Trellis.
//!
//! This module provides the [`TrellisError`] type, the error type returned by
//! filters, stages and endpoints while a request is being processed.
//!
//! # Mappable vs. unexpected errors
//!
//! Most categories describe a condition the client caused or can react to
//! (`NotFound`, `Validation`, `MethodNotAllowed`, ...). Those are *mappable*:
//! the dispatcher converts them into an error response through
//! [`TrellisError::to_response`] and commits it normally.
//!
//! [`ErrorCategory::Internal`] errors are not mappable. They surface as a
//! dispatch failure on the response writer instead of a response.

use crate::message::ContainerResponse;
use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`TrellisError`].
pub type TrellisResult<T> = Result<T, TrellisError>;

/// What went wrong, independent of the message. Decides the status code
/// and whether the error can be answered with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input or parameters.
    Validation,
    /// Missing or rejected credentials.
    Authentication,
    /// The caller may not do this.
    Authorization,
    /// No resource matched the request path.
    NotFound,
    /// The path matched but the HTTP method is not supported.
    MethodNotAllowed,
    /// The service cannot handle the request right now.
    Unavailable,
    /// A suspended request was not resumed in time.
    Timeout,
    /// The target changed underneath the request.
    Conflict,
    /// A bug or an unexpected failure. Never mapped to a response.
    Internal,
}

impl ErrorCategory {
    /// The status an error of this category is answered with.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The error filters, stages and endpoints return.
///
/// # Example
///
/// ```
/// use trellis_core::{ErrorCategory, TrellisError};
///
/// fn check(id: &str) -> Result<(), TrellisError> {
///     if id.is_empty() {
///         return Err(TrellisError::validation("id must not be empty"));
///     }
///     Ok(())
/// }
///
/// let err = check("").unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Validation);
/// assert!(err.is_mappable());
/// ```
#[derive(Error, Debug)]
pub enum TrellisError {
    /// Request validation failed.
    #[error("invalid request: {message}")]
    Validation {
        /// Client-facing text.
        message: String,
    },

    /// Authentication failed.
    #[error("unauthenticated: {message}")]
    Authentication {
        /// Client-facing text.
        message: String,
    },

    /// Authorization denied.
    #[error("forbidden: {message}")]
    Authorization {
        /// Client-facing text.
        message: String,
    },

    /// No resource matched.
    #[error("not found: {message}")]
    NotFound {
        /// Client-facing text.
        message: String,
    },

    /// The resource exists but does not support the method.
    #[error("{method} not allowed")]
    MethodNotAllowed {
        /// The rejected method.
        method: Method,
        /// Methods the matched resource supports.
        allowed: Vec<Method>,
    },

    /// The service is unavailable.
    #[error("unavailable: {message}")]
    Unavailable {
        /// Client-facing text.
        message: String,
    },

    /// A suspended exchange timed out.
    #[error("timed out: {message}")]
    Timeout {
        /// Client-facing text.
        message: String,
    },

    /// The target changed underneath the request.
    #[error("conflict: {message}")]
    Conflict {
        /// Client-facing text.
        message: String,
    },

    /// Anything else.
    #[error("internal: {message}")]
    Internal {
        /// Client-facing text.
        message: String,
        /// Cause, logged but never sent to the client.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl TrellisError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// A 401.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// A 403.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// A 404.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method-not-allowed error listing the supported methods.
    #[must_use]
    pub fn method_not_allowed(method: Method, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed { method, allowed }
    }

    /// Creates a service-unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// A 409.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// An internal error caused by `source`.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The category this variant belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::Unavailable { .. } => ErrorCategory::Unavailable,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Shorthand for `self.category().default_status_code()`.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns `true` if this error should be rendered as a response rather
    /// than failing the exchange.
    #[must_use]
    pub const fn is_mappable(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// The JSON body of an error response.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                details: self.error_details(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Renders this error as a JSON response carrying the error envelope.
    ///
    /// `MethodNotAllowed` errors also carry an `Allow` header.
    #[must_use]
    pub fn to_response(&self, request_id: Option<&str>) -> ContainerResponse {
        let envelope = self.to_envelope(request_id);
        let body = serde_json::to_vec(&envelope).unwrap_or_default();

        let mut response = ContainerResponse::new(self.status_code());
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Self::MethodNotAllowed { allowed, .. } = self {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(http::header::ALLOW, value);
            }
        }
        response.set_entity(Some(Bytes::from(body)));
        response
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_DENIED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::Unavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Conflict { .. } => "CONFLICT",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::MethodNotAllowed { allowed, .. } => Some(serde_json::json!({
                "allowed": allowed.iter().map(Method::as_str).collect::<Vec<_>>()
            })),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
