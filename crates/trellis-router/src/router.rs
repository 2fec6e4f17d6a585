//! High-level router API.

use http::Method;

use crate::error::RouteError;
use crate::method_router::MethodRouter;
use crate::node::{parse_template, Node};
use crate::params::Params;
use crate::RouteMatch;

/// A radix tree router mapping `(method, path)` to endpoints of type `T`.
///
/// Routes are matched in O(k) time where k is the number of path segments.
///
/// # Example
///
/// ```rust
/// use trellis_router::{MethodRouter, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert("/users", MethodRouter::new().get("listUsers").post("createUser")).unwrap();
/// router.insert("/users/{id}", MethodRouter::new().get("getUser")).unwrap();
///
/// let found = router.match_route(&Method::GET, "/users/123").unwrap();
/// assert_eq!(*found.endpoint, "getUser");
/// assert_eq!(found.params.get("id"), Some("123"));
///
/// // Registering the same path and method twice is an error.
/// assert!(router.route(Method::GET, "/users/", "again").is_err());
/// ```
///
/// # Route Priority
///
/// 1. **Static segments** (e.g., `/users/me`)
/// 2. **Parameter segments** (e.g., `/users/{id}`)
/// 3. **Wildcard segments** (e.g., `/files/*path`)
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Adds every method of `methods` under `path`.
    ///
    /// Methods already registered for `path` by earlier calls are kept; a
    /// method present in both is rejected.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidTemplate`] if `path` does not parse and
    /// [`RouteError::DuplicateRoute`] if a method is already routed.
    pub fn insert(&mut self, path: &str, methods: MethodRouter<T>) -> Result<(), RouteError> {
        let segments = parse_template(path)?;
        let added = methods.len();
        self.root
            .insert(&segments, methods)
            .map_err(|method| RouteError::DuplicateRoute {
                method,
                path: path.to_string(),
            })?;
        self.route_count += added;
        Ok(())
    }

    /// Adds a single-method route.
    ///
    /// # Errors
    ///
    /// See [`Router::insert`].
    pub fn route(&mut self, method: Method, path: &str, endpoint: T) -> Result<(), RouteError> {
        self.insert(path, MethodRouter::new().method(method, endpoint))
    }

    /// Matches a method and path.
    ///
    /// HEAD requests fall back to the GET endpoint. Returns `None` both when
    /// no path matches and when the path matches without the method; use
    /// [`Router::match_path`] to tell the two apart.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        let (methods, params) = self.root.match_path(path)?;
        let endpoint = methods.resolve(method)?;
        Some(RouteMatch::new(endpoint, params))
    }

    /// Matches a path regardless of method.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        self.root.match_path(path)
    }

    /// Returns the number of `(method, path)` routes registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}
