//! HTTP method tables.
//!
//! A [`MethodRouter`] maps the methods declared on one path to their endpoints.

use http::Method;
use smallvec::SmallVec;

/// Maps HTTP methods to endpoints for a single path.
///
/// # Example
///
/// ```rust
/// use trellis_router::MethodRouter;
/// use http::Method;
///
/// let router = MethodRouter::new()
///     .get("listUsers")
///     .post("createUser");
///
/// assert_eq!(router.endpoint(&Method::GET), Some(&"listUsers"));
/// assert_eq!(router.endpoint(&Method::DELETE), None);
///
/// // HEAD is served by GET unless declared.
/// assert_eq!(router.resolve(&Method::HEAD), Some(&"listUsers"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRouter<T> {
    entries: SmallVec<[(Method, T); 4]>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates a new empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a GET endpoint.
    #[must_use]
    pub fn get(self, endpoint: T) -> Self {
        self.method(Method::GET, endpoint)
    }

    /// Registers a POST endpoint.
    #[must_use]
    pub fn post(self, endpoint: T) -> Self {
        self.method(Method::POST, endpoint)
    }

    /// Registers a PUT endpoint.
    #[must_use]
    pub fn put(self, endpoint: T) -> Self {
        self.method(Method::PUT, endpoint)
    }

    /// Registers a DELETE endpoint.
    #[must_use]
    pub fn delete(self, endpoint: T) -> Self {
        self.method(Method::DELETE, endpoint)
    }

    /// Registers a PATCH endpoint.
    #[must_use]
    pub fn patch(self, endpoint: T) -> Self {
        self.method(Method::PATCH, endpoint)
    }

    /// Registers a HEAD endpoint.
    #[must_use]
    pub fn head(self, endpoint: T) -> Self {
        self.method(Method::HEAD, endpoint)
    }

    /// Registers an OPTIONS endpoint.
    #[must_use]
    pub fn options(self, endpoint: T) -> Self {
        self.method(Method::OPTIONS, endpoint)
    }

    /// Registers an endpoint for `method`.
    ///
    /// In builder form a repeated method keeps the first endpoint and the
    /// discarded one is logged at `warn`; use [`MethodRouter::insert`] to
    /// handle the clash instead.
    #[must_use]
    pub fn method(mut self, method: Method, endpoint: T) -> Self {
        if self.insert(method.clone(), endpoint).is_err() {
            tracing::warn!(method = %method, "method already routed, discarding later endpoint");
        }
        self
    }

    /// Registers an endpoint, returning it back if `method` is taken.
    pub fn insert(&mut self, method: Method, endpoint: T) -> Result<(), T> {
        if self.contains(&method) {
            return Err(endpoint);
        }
        self.entries.push((method, endpoint));
        Ok(())
    }

    /// Returns `true` if `method` has an endpoint.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.entries.iter().any(|(m, _)| m == method)
    }

    /// The endpoint declared for exactly `method`.
    #[must_use]
    pub fn endpoint(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, endpoint)| endpoint)
    }

    /// The endpoint serving `method`, falling back from HEAD to GET.
    #[must_use]
    pub fn resolve(&self, method: &Method) -> Option<&T> {
        self.endpoint(method).or_else(|| {
            if *method == Method::HEAD {
                self.endpoint(&Method::GET)
            } else {
                None
            }
        })
    }

    /// Methods this path answers, in declaration order.
    ///
    /// HEAD is listed whenever GET is declared.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut allowed: Vec<Method> = self.entries.iter().map(|(m, _)| m.clone()).collect();
        if self.contains(&Method::GET) && !self.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        allowed
    }

    /// Moves every endpoint of `other` into this router.
    ///
    /// Stops at the first method present in both and returns it.
    pub fn merge(&mut self, other: MethodRouter<T>) -> Result<(), Method> {
        for (method, endpoint) in other.entries {
            if self.insert(method.clone(), endpoint).is_err() {
                return Err(method);
            }
        }
        Ok(())
    }

    /// Iterates `(method, endpoint)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Method, &T)> {
        self.entries.iter().map(|(m, e)| (m, e))
    }

    /// Number of declared methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no method is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let router = MethodRouter::new()
            .get(1)
            .post(2)
            .put(3)
            .delete(4)
            .patch(5)
            .options(6);
        assert_eq!(router.len(), 6);
        assert_eq!(router.endpoint(&Method::PATCH), Some(&5));
        assert_eq!(router.endpoint(&Method::TRACE), None);
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut router = MethodRouter::new();
        assert!(router.insert(Method::GET, "a").is_ok());
        assert_eq!(router.insert(Method::GET, "b"), Err("b"));
        assert_eq!(router.endpoint(&Method::GET), Some(&"a"));
    }

    #[test]
    fn test_builder_repeat_keeps_first() {
        let router = MethodRouter::new().get("first").get("second");
        assert_eq!(router.len(), 1);
        assert_eq!(router.endpoint(&Method::GET), Some(&"first"));
    }

    #[test]
    fn test_head_fallback() {
        let router = MethodRouter::new().get("get");
        assert_eq!(router.resolve(&Method::HEAD), Some(&"get"));
        assert_eq!(router.endpoint(&Method::HEAD), None);

        let router = MethodRouter::new().get("get").head("head");
        assert_eq!(router.resolve(&Method::HEAD), Some(&"head"));
    }

    #[test]
    fn test_allowed_methods() {
        let router = MethodRouter::new().post("create").get("list");
        assert_eq!(
            router.allowed_methods(),
            vec![Method::POST, Method::GET, Method::HEAD]
        );

        let router = MethodRouter::new().delete("remove");
        assert_eq!(router.allowed_methods(), vec![Method::DELETE]);
    }

    #[test]
    fn test_merge() {
        let mut router = MethodRouter::new().get("get");
        assert!(router.merge(MethodRouter::new().post("post")).is_ok());
        assert_eq!(router.len(), 2);

        let err = router.merge(MethodRouter::new().put("put").get("other"));
        assert_eq!(err, Err(Method::GET));
    }

    #[test]
    fn test_custom_method() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let router = MethodRouter::new().method(purge.clone(), "purge");
        assert_eq!(router.resolve(&purge), Some(&"purge"));
    }
}
