//! Resources and resource methods.
//!
//! A [`Resource`] is a path template with the methods it answers, the
//! handlers those methods run on, and nested child resources. Resources are
//! plain values: they are assembled by builders, transformed by model
//! processors and frozen inside a [`ResourceModel`](crate::ResourceModel).
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use trellis_core::ContainerResponse;
//! use trellis_model::{endpoint_fn, Outcome, Parameter, Resource, ResourceMethod};
//!
//! let users = Resource::builder("/users")
//!     .method(
//!         ResourceMethod::builder(Method::GET)
//!             .endpoint(endpoint_fn(|_| async { Ok(Outcome::from(ContainerResponse::ok("[]"))) }))
//!             .build(),
//!     )
//!     .child(
//!         Resource::builder("{id}")
//!             .method(
//!                 ResourceMethod::builder(Method::DELETE)
//!                     .endpoint(endpoint_fn(|_| async { Ok(Outcome::from(ContainerResponse::default())) }))
//!                     .parameter(Parameter::path("id"))
//!                     .name_binding("Admin")
//!                     .build(),
//!             )
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(users.path(), "/users");
//! assert_eq!(users.children().len(), 1);
//! ```

use crate::endpoint::Endpoint;
use crate::error::ModelError;
use crate::handler::Handler;
use crate::parameter::{Parameter, ParameterSource};
use http::Method;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use trellis_core::BindingTag;

/// A type that describes itself as a root resource.
///
/// Registered classes and instances are introspected through this trait.
/// The bag attaches the handler; `describe` only declares paths, methods and
/// parameters.
pub trait ResourceType: Send + Sync + 'static {
    /// Describes the resource.
    ///
    /// # Errors
    ///
    /// Returns an error when the type cannot be turned into a resource; the
    /// type is then skipped with a warning.
    fn describe() -> Result<Resource, ModelError>
    where
        Self: Sized;
}

/// One method a resource answers.
///
/// Equality is structural: two methods are equal when they declare the same
/// HTTP method, handler, parameters and bindings and both have (or lack) an
/// endpoint.
#[derive(Clone)]
pub struct ResourceMethod {
    http_method: Method,
    endpoint: Option<Arc<dyn Endpoint>>,
    handler: Option<Handler>,
    parameters: Vec<Parameter>,
    name_bindings: BTreeSet<BindingTag>,
}

impl ResourceMethod {
    /// Starts a method answering `http_method`.
    #[must_use]
    pub fn builder(http_method: Method) -> ResourceMethodBuilder {
        ResourceMethodBuilder {
            method: Self {
                http_method,
                endpoint: None,
                handler: None,
                parameters: Vec::new(),
                name_bindings: BTreeSet::new(),
            },
        }
    }

    /// The HTTP method.
    #[must_use]
    pub const fn http_method(&self) -> &Method {
        &self.http_method
    }

    /// The invocable endpoint.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Arc<dyn Endpoint>> {
        self.endpoint.as_ref()
    }

    /// The handler this method runs on, when pinned to the method rather
    /// than inherited from its resource.
    #[must_use]
    pub const fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// Declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Binding tags declared on the method.
    #[must_use]
    pub const fn name_bindings(&self) -> &BTreeSet<BindingTag> {
        &self.name_bindings
    }

    /// Bean types this method needs resolved.
    pub fn bean_types(&self) -> impl Iterator<Item = (std::any::TypeId, &'static str)> + '_ {
        self.parameters.iter().filter_map(|p| match p.source() {
            ParameterSource::Bean { type_id, type_name } => Some((type_id, type_name)),
            _ => None,
        })
    }
}

impl PartialEq for ResourceMethod {
    fn eq(&self, other: &Self) -> bool {
        self.http_method == other.http_method
            && self.endpoint.is_some() == other.endpoint.is_some()
            && self.handler == other.handler
            && self.parameters == other.parameters
            && self.name_bindings == other.name_bindings
    }
}

impl fmt::Debug for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMethod")
            .field("http_method", &self.http_method)
            .field("has_endpoint", &self.endpoint.is_some())
            .field("handler", &self.handler)
            .field("parameters", &self.parameters)
            .field("name_bindings", &self.name_bindings)
            .finish()
    }
}

/// Builder for [`ResourceMethod`].
pub struct ResourceMethodBuilder {
    method: ResourceMethod,
}

impl ResourceMethodBuilder {
    /// Sets the endpoint.
    pub fn endpoint(mut self, endpoint: Arc<dyn Endpoint>) -> Self {
        self.method.endpoint = Some(endpoint);
        self
    }

    /// Pins the handler the method runs on.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.method.handler = Some(handler);
        self
    }

    /// Declares a parameter.
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.method.parameters.push(parameter);
        self
    }

    /// Adds a binding tag.
    pub fn name_binding(mut self, tag: impl Into<BindingTag>) -> Self {
        self.method.name_bindings.insert(tag.into());
        self
    }

    /// Finishes the method.
    pub fn build(self) -> ResourceMethod {
        self.method
    }
}

/// An addressable resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    path: String,
    name: String,
    handlers: Vec<Handler>,
    methods: Vec<ResourceMethod>,
    children: Vec<Resource>,
    name_bindings: BTreeSet<BindingTag>,
}

impl Resource {
    /// Starts a resource at `path`. Child paths are relative to the parent.
    pub fn builder(path: impl Into<String>) -> ResourceBuilder {
        let path = path.into();
        ResourceBuilder {
            resource: Self {
                name: path.clone(),
                path,
                handlers: Vec::new(),
                methods: Vec::new(),
                children: Vec::new(),
                name_bindings: BTreeSet::new(),
            },
        }
    }

    /// The path template, relative to the parent for children.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handlers the methods run on.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Methods answered at this path.
    #[must_use]
    pub fn methods(&self) -> &[ResourceMethod] {
        &self.methods
    }

    /// Nested resources.
    #[must_use]
    pub fn children(&self) -> &[Resource] {
        &self.children
    }

    /// Binding tags applied to every method of this resource and its
    /// children.
    #[must_use]
    pub const fn name_bindings(&self) -> &BTreeSet<BindingTag> {
        &self.name_bindings
    }

    /// Rebuilds this resource, e.g. from a model processor.
    pub fn to_builder(&self) -> ResourceBuilder {
        ResourceBuilder {
            resource: self.clone(),
        }
    }

    /// Adds a handler unless an identical one is present.
    pub(crate) fn add_handler(&mut self, handler: Handler) {
        if !self.handlers.contains(&handler) {
            self.handlers.push(handler);
        }
    }

    /// Folds `other` into this resource. Methods and children are appended;
    /// clashes are left for validation to report.
    ///
    /// Both sides are scoped down first, so each method keeps the bindings
    /// and handler of the resource that declared it.
    pub(crate) fn merge(&mut self, mut other: Resource) {
        self.scope_down();
        other.scope_down();
        for handler in other.handlers {
            self.add_handler(handler);
        }
        self.methods.extend(other.methods);
        self.children.extend(other.children);
    }

    /// Moves resource-level bindings onto the methods and children, and pins
    /// the resource's handler on methods and children that have none.
    fn scope_down(&mut self) {
        let bindings = std::mem::take(&mut self.name_bindings);
        let handler = self.handlers.first().cloned();
        for method in &mut self.methods {
            method.name_bindings.extend(bindings.iter().cloned());
            if method.handler.is_none() {
                method.handler.clone_from(&handler);
            }
        }
        for child in &mut self.children {
            child.name_bindings.extend(bindings.iter().cloned());
            if let (true, Some(handler)) = (child.handlers.is_empty(), &handler) {
                child.handlers.push(handler.clone());
            }
        }
    }

    /// Every handler in this subtree, parents first.
    pub(crate) fn collect_handlers<'a>(&'a self, out: &mut Vec<&'a Handler>) {
        out.extend(self.handlers.iter());
        out.extend(self.methods.iter().filter_map(ResourceMethod::handler));
        for child in &self.children {
            child.collect_handlers(out);
        }
    }
}

/// Builder for [`Resource`].
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    /// Sets the diagnostic name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.resource.name = name.into();
        self
    }

    /// Replaces the path template.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.resource.path = path.into();
        self
    }

    /// Adds a handler.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.resource.add_handler(handler);
        self
    }

    /// Adds a method.
    pub fn method(mut self, method: ResourceMethod) -> Self {
        self.resource.methods.push(method);
        self
    }

    /// Adds a child resource.
    pub fn child(mut self, child: Resource) -> Self {
        self.resource.children.push(child);
        self
    }

    /// Adds a binding tag for the whole subtree.
    pub fn name_binding(mut self, tag: impl Into<BindingTag>) -> Self {
        self.resource.name_bindings.insert(tag.into());
        self
    }

    /// Finishes the resource.
    pub fn build(self) -> Resource {
        self.resource
    }
}

/// Joins a parent path and a child template.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_matches('/');
    match (parent.is_empty(), child.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{child}"),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}/{child}"),
    }
}
