//! Radix tree router for Trellis.
//!
//! The router maps `(method, path)` pairs to endpoints of any type. It is
//! built once from the frozen resource model and then shared read-only by
//! every request.
//!
//! # Features
//!
//! - **Radix Tree Matching**: O(k) path lookup
//! - **Path Parameters**: `/users/{id}`
//! - **Wildcards**: `/files/*path`
//! - **Duplicate Detection**: a second registration of a path and method is
//!   rejected, never silently overwritten
//! - **405 Support**: [`MethodRouter::allowed_methods`] lists what a matched
//!   path answers
//!
//! # Architecture
//!
//! ```text
//!                    (root)
//!                      │
//!              ┌───────┴───────┐
//!              │               │
//!            "users"        "files"
//!              │               │
//!        ┌─────┴─────┐        "*path"
//!        │           │
//!       (leaf)    "{id}"
//!   [GET,POST]      │
//!                 (leaf)
//!              [GET,DELETE]
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method_router;
mod node;
mod params;
mod router;

pub use error::RouteError;
pub use method_router::MethodRouter;
pub use node::{normalize_template, parse_template, Segment};
pub use params::Params;
pub use router::Router;

/// A matched route with its endpoint and extracted parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// The endpoint for the matched route.
    pub endpoint: &'a T,
    /// Extracted path parameters.
    pub params: Params,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Creates a new route match.
    #[must_use]
    pub fn new(endpoint: &'a T, params: Params) -> Self {
        Self { endpoint, params }
    }
}
