//! Transport-neutral request and response types.
//!
//! The pipeline never sees transport objects. A transport converts its
//! request into a [`ContainerRequest`] (see [`ContainerRequest::from_http`])
//! and receives a [`ContainerResponse`] back through the response writer.

use crate::error::{TrellisError, TrellisResult};
use crate::security::SecurityContext;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use std::sync::Arc;

/// An inbound request as seen by filters, stages and endpoints.
#[derive(Debug, Clone)]
pub struct ContainerRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    entity: Bytes,
    security_context: Option<Arc<dyn SecurityContext>>,
    properties: http::Extensions,
}

impl ContainerRequest {
    /// Creates a request with no headers and an empty entity.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            entity: Bytes::new(),
            security_context: None,
            properties: http::Extensions::new(),
        }
    }

    /// Collects an `http::Request` into a container request.
    ///
    /// A security context stored in the request extensions is carried over.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the body cannot be read.
    pub async fn from_http<B>(request: http::Request<B>) -> TrellisResult<Self>
    where
        B: BodyExt,
        B::Error: std::fmt::Display,
    {
        let (mut parts, body) = request.into_parts();
        let entity = body
            .collect()
            .await
            .map_err(|e| TrellisError::validation(format!("failed to read request body: {e}")))?
            .to_bytes();

        let security_context = parts.extensions.remove::<Arc<dyn SecurityContext>>();
        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            entity,
            security_context,
            properties: parts.extensions,
        })
    }

    /// Sets a header, replacing previous values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the entity.
    pub fn with_entity(mut self, entity: impl Into<Bytes>) -> Self {
        self.entity = entity.into();
        self
    }

    /// The request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The full request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// All request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of header `name` as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The request entity.
    #[must_use]
    pub const fn entity(&self) -> &Bytes {
        &self.entity
    }

    /// Replaces the request entity.
    pub fn set_entity(&mut self, entity: Bytes) {
        self.entity = entity;
    }

    /// The security context, if one has been attached.
    #[must_use]
    pub fn security_context(&self) -> Option<&Arc<dyn SecurityContext>> {
        self.security_context.as_ref()
    }

    /// Attaches a security context.
    pub fn set_security_context(&mut self, context: Arc<dyn SecurityContext>) {
        self.security_context = Some(context);
    }

    /// Typed per-request properties.
    #[must_use]
    pub const fn properties(&self) -> &http::Extensions {
        &self.properties
    }

    /// Mutable typed per-request properties.
    pub fn properties_mut(&mut self) -> &mut http::Extensions {
        &mut self.properties
    }
}

/// An outbound response accumulated by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerResponse {
    status: StatusCode,
    headers: HeaderMap,
    entity: Option<Bytes>,
}

impl ContainerResponse {
    /// Creates a response with the given status and no entity.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            entity: None,
        }
    }

    /// Creates a `200 OK` response carrying `entity`.
    #[must_use]
    pub fn ok(entity: impl Into<Bytes>) -> Self {
        let mut response = Self::new(StatusCode::OK);
        response.entity = Some(entity.into());
        response
    }

    /// Sets a header, replacing previous values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// The status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Replaces the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// All response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The entity, if any.
    #[must_use]
    pub const fn entity(&self) -> Option<&Bytes> {
        self.entity.as_ref()
    }

    /// Returns `true` if the response carries an entity.
    #[must_use]
    pub const fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    /// Replaces or clears the entity.
    pub fn set_entity(&mut self, entity: Option<Bytes>) {
        self.entity = entity;
    }

    /// Removes and returns the entity.
    pub fn take_entity(&mut self) -> Option<Bytes> {
        self.entity.take()
    }

    /// Length of the entity in bytes, if there is one.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.entity.as_ref().map(|e| e.len() as u64)
    }

    /// Converts into an `http::Response` with a buffered body.
    #[must_use]
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.entity.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for ContainerResponse {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}
