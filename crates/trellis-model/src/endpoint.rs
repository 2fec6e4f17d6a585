//! Invocable resource methods.
//!
//! An [`Endpoint`] is the code behind one resource method. It receives an
//! [`Invocation`] (the request after reader interceptors, matched path
//! parameters, resolved beans and the handler instance) and produces an
//! [`Outcome`]: either a response or a request to suspend the exchange.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use trellis_core::di::Instance;
use trellis_core::{
    AsyncResponse, BoxFuture, ContainerRequest, ContainerResponse, SecurityContext, TrellisError,
    TrellisResult,
};
use trellis_router::Params;

/// The code behind a resource method.
pub trait Endpoint: Send + Sync + 'static {
    /// Invokes the method.
    fn invoke(&self, invocation: Invocation) -> BoxFuture<'static, TrellisResult<Outcome>>;
}

/// An endpoint backed by an async closure.
pub struct FnEndpoint<F> {
    func: F,
}

impl<F, Fut> Endpoint for FnEndpoint<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TrellisResult<Outcome>> + Send + 'static,
{
    fn invoke(&self, invocation: Invocation) -> BoxFuture<'static, TrellisResult<Outcome>> {
        Box::pin((self.func)(invocation))
    }
}

/// Creates a shareable endpoint from an async closure.
///
/// # Example
///
/// ```
/// use trellis_model::{endpoint_fn, Outcome};
/// use trellis_core::ContainerResponse;
///
/// let hello = endpoint_fn(|inv| async move {
///     let name = inv.path_param("name").unwrap_or("world").to_string();
///     Ok(Outcome::from(ContainerResponse::ok(format!("hello {name}"))))
/// });
/// # drop(hello);
/// ```
pub fn endpoint_fn<F, Fut>(func: F) -> Arc<dyn Endpoint>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TrellisResult<Outcome>> + Send + 'static,
{
    Arc::new(FnEndpoint { func })
}

/// What an endpoint produced.
pub enum Outcome {
    /// A finished response.
    Response(ContainerResponse),
    /// The exchange stays open until resumed through an [`AsyncResponse`].
    Suspend(Suspend),
}

impl From<ContainerResponse> for Outcome {
    fn from(response: ContainerResponse) -> Self {
        Self::Response(response)
    }
}

impl From<Suspend> for Outcome {
    fn from(suspend: Suspend) -> Self {
        Self::Suspend(suspend)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Suspend(suspend) => f.debug_tuple("Suspend").field(suspend).finish(),
        }
    }
}

type OnSuspend = Box<dyn FnOnce(AsyncResponse) + Send>;

/// A request to suspend the current exchange.
///
/// `on_suspend` is called once the exchange is suspended; it typically hands
/// the [`AsyncResponse`] to a background task. Without an explicit timeout
/// the configured default suspend timeout applies.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use trellis_core::ContainerResponse;
/// use trellis_model::{Outcome, Suspend};
///
/// let outcome: Outcome = Suspend::new(|response| {
///     std::thread::spawn(move || {
///         response.resume(ContainerResponse::ok("later"));
///     });
/// })
/// .timeout(Duration::from_secs(5))
/// .into();
/// # drop(outcome);
/// ```
pub struct Suspend {
    timeout: Option<Duration>,
    timeout_handler: Option<trellis_core::TimeoutHandler>,
    on_suspend: OnSuspend,
}

impl Suspend {
    /// Suspends and calls `on_suspend` with the handle.
    pub fn new<F>(on_suspend: F) -> Self
    where
        F: FnOnce(AsyncResponse) + Send + 'static,
    {
        Self {
            timeout: None,
            timeout_handler: None,
            on_suspend: Box::new(on_suspend),
        }
    }

    /// Overrides the default suspend timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Registers a timeout handler before the exchange is suspended.
    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AsyncResponse) + Send + Sync + 'static,
    {
        self.timeout_handler = Some(Arc::new(handler));
        self
    }

    /// The requested timeout, if any.
    #[must_use]
    pub const fn requested_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Splits into timeout, timeout handler and callback.
    pub fn into_parts(
        self,
    ) -> (
        Option<Duration>,
        Option<trellis_core::TimeoutHandler>,
        OnSuspend,
    ) {
        (self.timeout, self.timeout_handler, self.on_suspend)
    }
}

impl fmt::Debug for Suspend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspend")
            .field("timeout", &self.timeout)
            .field("has_timeout_handler", &self.timeout_handler.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything a resource method is invoked with.
pub struct Invocation {
    request: ContainerRequest,
    params: Params,
    beans: HashMap<TypeId, Instance>,
    handler: Option<Instance>,
}

impl Invocation {
    /// Creates an invocation for a matched request.
    #[must_use]
    pub fn new(request: ContainerRequest, params: Params) -> Self {
        Self {
            request,
            params,
            beans: HashMap::new(),
            handler: None,
        }
    }

    /// Adds a resolved bean parameter.
    pub fn with_bean(mut self, type_id: TypeId, bean: Instance) -> Self {
        self.beans.insert(type_id, bean);
        self
    }

    /// Sets the handler instance.
    pub fn with_handler(mut self, handler: Instance) -> Self {
        self.handler = Some(handler);
        self
    }

    /// The request.
    #[must_use]
    pub const fn request(&self) -> &ContainerRequest {
        &self.request
    }

    /// Takes the request out of the invocation.
    #[must_use]
    pub fn into_request(self) -> ContainerRequest {
        self.request
    }

    /// Matched path parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// A matched path parameter.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// First value of query parameter `name`, percent-decoded.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.request.uri().query()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// Deserializes the whole query string.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the query does not match `T`.
    pub fn query<T: DeserializeOwned>(&self) -> TrellisResult<T> {
        let query = self.request.uri().query().unwrap_or("");
        serde_urlencoded::from_str(query)
            .map_err(|e| TrellisError::validation(format!("invalid query string: {e}")))
    }

    /// First value of header `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Value of cookie `name`.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// The request entity.
    #[must_use]
    pub const fn entity(&self) -> &Bytes {
        self.request.entity()
    }

    /// Deserializes a JSON entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed JSON.
    pub fn json<T: DeserializeOwned>(&self) -> TrellisResult<T> {
        serde_json::from_slice(self.entity())
            .map_err(|e| TrellisError::validation(format!("invalid JSON entity: {e}")))
    }

    /// Deserializes a form-encoded entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the entity does not match `T`.
    pub fn form<T: DeserializeOwned>(&self) -> TrellisResult<T> {
        serde_urlencoded::from_bytes(self.entity())
            .map_err(|e| TrellisError::validation(format!("invalid form entity: {e}")))
    }

    /// The request's security context.
    #[must_use]
    pub fn security_context(&self) -> Option<&Arc<dyn SecurityContext>> {
        self.request.security_context()
    }

    /// A resolved bean parameter.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the method did not declare the bean.
    pub fn bean<T: Send + Sync + 'static>(&self) -> TrellisResult<Arc<T>> {
        self.beans
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|bean| bean.downcast::<T>().ok())
            .ok_or_else(|| {
                TrellisError::internal(format!(
                    "bean {} was not declared by the resource method",
                    std::any::type_name::<T>()
                ))
            })
    }

    /// The handler instance the method belongs to.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the resource has no handler of type `T`.
    pub fn handler<T: Any + Send + Sync>(&self) -> TrellisResult<Arc<T>> {
        self.handler
            .clone()
            .and_then(|handler| handler.downcast::<T>().ok())
            .ok_or_else(|| {
                TrellisError::internal(format!(
                    "resource handler {} is not available",
                    std::any::type_name::<T>()
                ))
            })
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("request", &self.request)
            .field("params", &self.params)
            .field("bean_count", &self.beans.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method, Uri};
    use serde::Deserialize;

    fn invocation(uri: &'static str) -> Invocation {
        let request = ContainerRequest::new(Method::GET, Uri::from_static(uri));
        let mut params = Params::new();
        params.push("id", "42");
        Invocation::new(request, params)
    }

    #[test]
    fn test_path_and_query_params() {
        let inv = invocation("/users/42?verbose=true&name=ada%20l");
        assert_eq!(inv.path_param("id"), Some("42"));
        assert_eq!(inv.query_param("name").as_deref(), Some("ada l"));
        assert_eq!(inv.query_param("missing"), None);
    }

    #[test]
    fn test_typed_query() {
        #[derive(Deserialize)]
        struct Page {
            limit: u32,
        }
        let inv = invocation("/users?limit=25");
        assert_eq!(inv.query::<Page>().unwrap().limit, 25);

        let inv = invocation("/users?limit=lots");
        assert!(inv.query::<Page>().is_err());
    }

    #[test]
    fn test_cookie_lookup() {
        let request = ContainerRequest::new(Method::GET, Uri::from_static("/"))
            .with_header(
                http::header::COOKIE,
                HeaderValue::from_static("session=abc; theme=dark"),
            );
        let inv = Invocation::new(request, Params::new());
        assert_eq!(inv.cookie("theme"), Some("dark"));
        assert_eq!(inv.cookie("lang"), None);
    }

    #[test]
    fn test_json_and_form_entities() {
        #[derive(Deserialize)]
        struct Order {
            qty: u32,
        }
        let request = ContainerRequest::new(Method::POST, Uri::from_static("/orders"))
            .with_entity(r#"{"qty":3}"#);
        assert_eq!(Invocation::new(request, Params::new()).json::<Order>().unwrap().qty, 3);

        let request = ContainerRequest::new(Method::POST, Uri::from_static("/orders"))
            .with_entity("qty=7");
        assert_eq!(Invocation::new(request, Params::new()).form::<Order>().unwrap().qty, 7);
    }

    #[test]
    fn test_bean_and_handler_lookup() {
        struct Pagination(u32);
        struct OrdersResource;

        let inv = invocation("/orders")
            .with_bean(TypeId::of::<Pagination>(), Arc::new(Pagination(10)))
            .with_handler(Arc::new(OrdersResource));

        assert_eq!(inv.bean::<Pagination>().unwrap().0, 10);
        assert!(inv.handler::<OrdersResource>().is_ok());
        assert!(inv.bean::<String>().is_err());
        assert!(inv.handler::<Pagination>().is_err());
    }

    #[tokio::test]
    async fn test_fn_endpoint_invokes_closure() {
        let endpoint = endpoint_fn(|inv| async move {
            let id = inv.path_param("id").unwrap_or_default().to_string();
            Ok(Outcome::from(ContainerResponse::ok(id)))
        });

        match endpoint.invoke(invocation("/users/42")).await.unwrap() {
            Outcome::Response(response) => {
                assert_eq!(response.entity().unwrap().as_ref(), b"42");
            }
            Outcome::Suspend(_) => panic!("expected a response"),
        }
    }

    #[test]
    fn test_suspend_parts() {
        let suspend = Suspend::new(|_| {})
            .timeout(Duration::from_millis(50))
            .on_timeout(|_| {});
        assert_eq!(suspend.requested_timeout(), Some(Duration::from_millis(50)));
        let (timeout, handler, _callback) = suspend.into_parts();
        assert_eq!(timeout, Some(Duration::from_millis(50)));
        assert!(handler.is_some());
    }
}
