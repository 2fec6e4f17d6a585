//! Per-request processing state.
//!
//! A [`RequestProcessingContext`] is created for every inbound request and
//! owned by that request alone. Stages read and mutate it as it moves
//! through the pipeline; everything shared between requests is immutable.

use crate::runtime::RuntimeMethod;
use std::sync::Arc;
use std::time::{Duration, Instant};
use trellis_core::{ContainerRequest, RequestId, SecurityContext};
use trellis_router::Params;

/// The endpoint a request was routed to.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    /// The runtime method, with the providers bound to it.
    pub method: Arc<RuntimeMethod>,
    /// Path parameters extracted by the router.
    pub params: Params,
}

/// State carried through the stage chain for a single request.
///
/// # Example
///
/// ```
/// use http::{Method, Uri};
/// use trellis_core::ContainerRequest;
/// use trellis_middleware::RequestProcessingContext;
///
/// let request = ContainerRequest::new(Method::GET, Uri::from_static("/users"));
/// let ctx = RequestProcessingContext::new(request);
/// assert!(ctx.matched().is_none());
/// assert_eq!(ctx.request().path(), "/users");
/// ```
#[derive(Debug)]
pub struct RequestProcessingContext {
    request_id: RequestId,
    request: ContainerRequest,
    matched: Option<MatchedRoute>,
    started_at: Instant,
}

impl RequestProcessingContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new(request: ContainerRequest) -> Self {
        Self::with_request_id(request, RequestId::new())
    }

    /// Creates a context with a request id supplied by the transport.
    #[must_use]
    pub fn with_request_id(request: ContainerRequest, request_id: RequestId) -> Self {
        Self {
            request_id,
            request,
            matched: None,
            started_at: Instant::now(),
        }
    }

    /// The request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The in-flight request.
    #[must_use]
    pub const fn request(&self) -> &ContainerRequest {
        &self.request
    }

    /// Mutable access to the in-flight request.
    pub fn request_mut(&mut self) -> &mut ContainerRequest {
        &mut self.request
    }

    /// The security context, once the references stage has run.
    #[must_use]
    pub fn security_context(&self) -> Option<&Arc<dyn SecurityContext>> {
        self.request.security_context()
    }

    /// The routed endpoint, once routing has run.
    #[must_use]
    pub const fn matched(&self) -> Option<&MatchedRoute> {
        self.matched.as_ref()
    }

    /// Records the routed endpoint.
    pub fn set_matched(&mut self, matched: MatchedRoute) {
        self.matched = Some(matched);
    }

    /// When processing started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time since processing started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed per-request value.
    pub fn set_property<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.request.properties_mut().insert(value);
    }

    /// Reads a typed per-request value.
    #[must_use]
    pub fn property<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.properties().get::<T>()
    }
}
