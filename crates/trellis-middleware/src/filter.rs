//! Provider contracts.
//!
//! Five kinds of providers plug into the pipeline:
//!
//! | Contract | Runs | Can |
//! |----------|------|-----|
//! | [`RequestFilter`] | before the endpoint (pre-matching or post-matching) | inspect, modify, abort |
//! | [`ResponseFilter`] | after the endpoint or an aborting filter | modify the response |
//! | [`ReaderInterceptor`] | when the endpoint reads the entity | transform the request entity |
//! | [`WriterInterceptor`] | before the entity is written | transform the response entity |
//! | [`DynamicFeature`] | once per resource method, at build time | attach filters to that method |

use crate::context::RequestProcessingContext;
use bytes::Bytes;
use http::HeaderMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use trellis_core::{BoxFuture, ContainerResponse, Priority, TrellisResult};
use trellis_model::RuntimeEndpoint;

/// What a request filter decided.
#[derive(Debug)]
pub enum FilterAction {
    /// Continue with the next filter or stage.
    Continue,
    /// Stop processing and answer with this response.
    Abort(ContainerResponse),
}

/// Inspects or aborts a request.
///
/// Filters that fail with a mappable error abort the request with the
/// corresponding error response.
pub trait RequestFilter: Send + Sync {
    /// Filters the request.
    fn filter<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<FilterAction>>;
}

/// Inspects or modifies a response.
pub trait ResponseFilter: Send + Sync {
    /// Filters the response.
    fn filter<'a>(
        &'a self,
        ctx: &'a RequestProcessingContext,
        response: &'a mut ContainerResponse,
    ) -> BoxFuture<'a, TrellisResult<()>>;
}

/// Transforms the request entity before the endpoint reads it.
pub trait ReaderInterceptor: Send + Sync {
    /// Returns the entity the endpoint should see.
    fn around_read(&self, entity: Bytes, headers: &HeaderMap) -> TrellisResult<Bytes>;
}

/// Transforms the response entity before it is written.
pub trait WriterInterceptor: Send + Sync {
    /// Returns the entity to write; may adjust response headers.
    fn around_write(&self, entity: Bytes, headers: &mut HeaderMap) -> TrellisResult<Bytes>;
}

/// Attaches providers to individual resource methods.
pub trait DynamicFeature: Send + Sync {
    /// Called once per resource method while the runtime model is built.
    fn configure(&self, endpoint: &RuntimeEndpoint, context: &mut FeatureContext);
}

/// Providers a [`DynamicFeature`] attaches to one resource method.
#[derive(Default)]
pub struct FeatureContext {
    pub(crate) request_filters: Vec<(Priority, Arc<dyn RequestFilter>)>,
    pub(crate) response_filters: Vec<(Priority, Arc<dyn ResponseFilter>)>,
}

impl FeatureContext {
    /// Attaches a request filter.
    pub fn register_request_filter(&mut self, filter: Arc<dyn RequestFilter>, priority: Priority) {
        self.request_filters.push((priority, filter));
    }

    /// Attaches a response filter.
    pub fn register_response_filter(
        &mut self,
        filter: Arc<dyn ResponseFilter>,
        priority: Priority,
    ) {
        self.response_filters.push((priority, filter));
    }

    /// Returns `true` if nothing was attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request_filters.is_empty() && self.response_filters.is_empty()
    }
}

impl fmt::Debug for FeatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureContext")
            .field("request_filters", &self.request_filters.len())
            .field("response_filters", &self.response_filters.len())
            .finish()
    }
}

/// A request filter built from a closure.
///
/// The closure receives the context by mutable reference and must finish
/// synchronously; use a [`RequestFilter`] implementation for async work.
pub struct FnRequestFilter<F> {
    func: F,
}

impl<F> RequestFilter for FnRequestFilter<F>
where
    F: Fn(&mut RequestProcessingContext) -> TrellisResult<FilterAction> + Send + Sync,
{
    fn filter<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<FilterAction>> {
        let result = (self.func)(ctx);
        Box::pin(async move { result })
    }
}

/// Creates a request filter from a synchronous closure.
///
/// # Example
///
/// ```
/// use trellis_core::{ContainerResponse, TrellisError};
/// use trellis_middleware::{request_filter_fn, FilterAction};
///
/// let require_tenant = request_filter_fn(|ctx| {
///     if ctx.request().header("x-tenant").is_none() {
///         return Err(TrellisError::validation("missing x-tenant"));
///     }
///     Ok(FilterAction::Continue)
/// });
/// # drop(require_tenant);
/// ```
pub fn request_filter_fn<F>(func: F) -> Arc<dyn RequestFilter>
where
    F: Fn(&mut RequestProcessingContext) -> TrellisResult<FilterAction> + Send + Sync + 'static,
{
    Arc::new(FnRequestFilter { func })
}

/// A response filter built from a closure.
pub struct FnResponseFilter<F> {
    func: F,
}

impl<F> ResponseFilter for FnResponseFilter<F>
where
    F: Fn(&RequestProcessingContext, &mut ContainerResponse) -> TrellisResult<()> + Send + Sync,
{
    fn filter<'a>(
        &'a self,
        ctx: &'a RequestProcessingContext,
        response: &'a mut ContainerResponse,
    ) -> BoxFuture<'a, TrellisResult<()>> {
        let result = (self.func)(ctx, response);
        Box::pin(async move { result })
    }
}

/// Creates a response filter from a synchronous closure.
pub fn response_filter_fn<F>(func: F) -> Arc<dyn ResponseFilter>
where
    F: Fn(&RequestProcessingContext, &mut ContainerResponse) -> TrellisResult<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnResponseFilter { func })
}

/// Wraps an async closure as a request filter.
///
/// The closure gets an owned snapshot of the request and may return a
/// response to abort with.
pub struct AsyncRequestFilter<F> {
    func: F,
}

impl<F> AsyncRequestFilter<F> {
    /// Creates the filter.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> RequestFilter for AsyncRequestFilter<F>
where
    F: Fn(trellis_core::ContainerRequest) -> Fut + Send + Sync,
    Fut: Future<Output = TrellisResult<FilterAction>> + Send + 'static,
{
    fn filter<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<FilterAction>> {
        Box::pin((self.func)(ctx.request().clone()))
    }
}
