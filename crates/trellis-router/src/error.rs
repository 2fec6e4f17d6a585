//! Routing errors.

use http::Method;
use thiserror::Error;

/// Errors raised while building a router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The same path and method were registered twice.
    #[error("duplicate route: {method} {path}")]
    DuplicateRoute {
        /// The method registered twice.
        method: Method,
        /// The path template as given on the second registration.
        path: String,
    },

    /// A path template could not be parsed.
    #[error("invalid path template '{path}': {reason}")]
    InvalidTemplate {
        /// The offending template.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
}
