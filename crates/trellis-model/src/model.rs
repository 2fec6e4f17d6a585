//! The frozen resource model.

use crate::bag::ResourceBag;
use crate::endpoint::Endpoint;
use crate::handler::Handler;
use crate::parameter::Parameter;
use crate::resource::{join_path, Resource};
use http::Method;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use trellis_core::BindingTag;

/// The validated tree of root resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceModel {
    resources: Vec<Resource>,
}

impl ResourceModel {
    /// Creates a model from root resources.
    #[must_use]
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    /// The root resources.
    #[must_use]
    pub fn root_resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Takes the root resources out of the model.
    #[must_use]
    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    /// Returns `true` if the model has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Handlers referenced by the model but not registered in `bag`.
    ///
    /// These were introduced by model processors and must be bound before
    /// the model is served. Each handler is listed once.
    #[must_use]
    pub fn enhancing_handlers(&self, bag: &ResourceBag) -> Vec<Handler> {
        let mut all = Vec::new();
        for resource in &self.resources {
            resource.collect_handlers(&mut all);
        }

        let mut missing: Vec<Handler> = Vec::new();
        for handler in all {
            if !bag.contains_handler(handler) && !missing.contains(handler) {
                missing.push(handler.clone());
            }
        }
        missing
    }

    /// Flattens the tree into one entry per resource method.
    #[must_use]
    pub fn runtime_endpoints(&self) -> Vec<RuntimeEndpoint> {
        let mut out = Vec::new();
        for resource in &self.resources {
            flatten(resource, "", &BTreeSet::new(), None, &mut out);
        }
        out
    }
}

fn flatten(
    resource: &Resource,
    parent_path: &str,
    inherited: &BTreeSet<BindingTag>,
    inherited_handler: Option<&Handler>,
    out: &mut Vec<RuntimeEndpoint>,
) {
    let path = join_path(parent_path, resource.path());
    let mut bindings = inherited.clone();
    bindings.extend(resource.name_bindings().iter().cloned());
    let handler = resource.handlers().first().or(inherited_handler);

    for method in resource.methods() {
        let mut name_bindings = bindings.clone();
        name_bindings.extend(method.name_bindings().iter().cloned());
        out.push(RuntimeEndpoint {
            path: path.clone(),
            method: method.http_method().clone(),
            endpoint: method.endpoint().cloned(),
            handler: method.handler().or(handler).cloned(),
            parameters: method.parameters().to_vec(),
            name_bindings,
            resource_name: resource.name().to_string(),
        });
    }

    for child in resource.children() {
        flatten(child, &path, &bindings, handler, out);
    }
}

/// One routable resource method with everything dispatch needs.
#[derive(Clone)]
pub struct RuntimeEndpoint {
    /// Full path template.
    pub path: String,
    /// HTTP method.
    pub method: Method,
    /// The endpoint; absent only in models built with validation ignored.
    pub endpoint: Option<Arc<dyn Endpoint>>,
    /// The handler the method runs on: its own, else the nearest resource
    /// that declares one.
    pub handler: Option<Handler>,
    /// Declared parameters.
    pub parameters: Vec<Parameter>,
    /// Effective binding tags: resource tags of every ancestor plus the
    /// method's own.
    pub name_bindings: BTreeSet<BindingTag>,
    /// Name of the declaring resource.
    pub resource_name: String,
}

impl fmt::Debug for RuntimeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeEndpoint")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("has_endpoint", &self.endpoint.is_some())
            .field("handler", &self.handler)
            .field("name_bindings", &self.name_bindings)
            .field("resource_name", &self.resource_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceMethod;

    #[derive(Default)]
    struct Users;

    #[derive(Default)]
    struct Audit;

    fn tree() -> ResourceModel {
        ResourceModel::new(vec![Resource::builder("/users")
            .handler(Handler::class::<Users>())
            .name_binding("Tenant")
            .method(ResourceMethod::builder(Method::GET).build())
            .child(
                Resource::builder("{id}")
                    .method(
                        ResourceMethod::builder(Method::DELETE)
                            .name_binding("Admin")
                            .build(),
                    )
                    .child(
                        Resource::builder("audit")
                            .handler(Handler::class::<Audit>())
                            .method(ResourceMethod::builder(Method::GET).build())
                            .build(),
                    )
                    .build(),
            )
            .build()])
    }

    #[test]
    fn test_runtime_endpoints_flatten_paths_and_bindings() {
        let endpoints = tree().runtime_endpoints();
        let summary: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("GET", "/users"),
                ("DELETE", "/users/{id}"),
                ("GET", "/users/{id}/audit"),
            ]
        );

        let delete = &endpoints[1];
        assert!(delete.name_bindings.contains(&BindingTag::new("Tenant")));
        assert!(delete.name_bindings.contains(&BindingTag::new("Admin")));
        assert_eq!(delete.handler, Some(Handler::class::<Users>()));

        let audit = &endpoints[2];
        assert!(!audit.name_bindings.contains(&BindingTag::new("Admin")));
        assert_eq!(audit.handler, Some(Handler::class::<Audit>()));
    }

    #[test]
    fn test_enhancing_handlers_are_those_missing_from_bag() {
        let bag = ResourceBag::default();
        let missing = tree().enhancing_handlers(&bag);
        assert_eq!(
            missing,
            vec![Handler::class::<Users>(), Handler::class::<Audit>()]
        );
    }
}
