//! Registered resources before model construction.

use crate::handler::Handler;
use crate::resource::{Resource, ResourceType};
use std::sync::Arc;
use trellis_router::normalize_template;

type Describe = fn() -> Result<Resource, crate::ModelError>;

struct Registration {
    handler: Handler,
    describe: Describe,
}

/// Resources registered with an application, merged and ordered.
///
/// Programmatic resources come first, then introspected classes, then
/// introspected instances, each in registration order. Root resources whose
/// templates normalize to the same path are merged into one.
#[derive(Debug, Clone, Default)]
pub struct ResourceBag {
    resources: Vec<Resource>,
    handlers: Vec<Handler>,
}

impl ResourceBag {
    /// Starts a bag.
    #[must_use]
    pub fn builder() -> ResourceBagBuilder {
        ResourceBagBuilder::default()
    }

    /// Merged root resources.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Handlers of successfully introspected classes and instances.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Returns `true` if `handler` was registered with the bag.
    #[must_use]
    pub fn contains_handler(&self, handler: &Handler) -> bool {
        self.handlers.contains(handler)
    }

    /// Returns `true` if the bag holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Builder for [`ResourceBag`].
#[derive(Default)]
pub struct ResourceBagBuilder {
    programmatic: Vec<Resource>,
    classes: Vec<Registration>,
    instances: Vec<Registration>,
}

impl ResourceBagBuilder {
    /// Registers a resource assembled in code.
    pub fn register_programmatic(&mut self, resource: Resource) -> &mut Self {
        self.programmatic.push(resource);
        self
    }

    /// Registers a resource class, instantiated per request.
    ///
    /// Registering the same class twice has no effect.
    pub fn register_class<T: ResourceType + Default>(&mut self) -> &mut Self {
        let handler = Handler::class::<T>();
        if !self.classes.iter().any(|r| r.handler == handler) {
            self.classes.push(Registration {
                handler,
                describe: T::describe,
            });
        }
        self
    }

    /// Registers a shared resource instance.
    ///
    /// Registering the same instance twice has no effect.
    pub fn register_instance<T: ResourceType>(&mut self, instance: Arc<T>) -> &mut Self {
        let handler = Handler::instance(instance);
        if !self.instances.iter().any(|r| r.handler == handler) {
            self.instances.push(Registration {
                handler,
                describe: T::describe,
            });
        }
        self
    }

    /// Introspects classes, then instances, and merges everything.
    ///
    /// A type whose introspection fails is logged and skipped.
    pub fn build(&self) -> ResourceBag {
        let mut resources = self.programmatic.clone();
        let mut handlers = Vec::new();

        for registration in self.classes.iter().chain(&self.instances) {
            match (registration.describe)() {
                Ok(resource) => {
                    let resource = resource
                        .to_builder()
                        .handler(registration.handler.clone())
                        .build();
                    resources.push(resource);
                    handlers.push(registration.handler.clone());
                }
                Err(error) => {
                    tracing::warn!(
                        resource = registration.handler.type_name(),
                        error = %error,
                        "skipping resource that failed introspection"
                    );
                }
            }
        }

        ResourceBag {
            resources: merge_roots(resources),
            handlers,
        }
    }
}

/// Merges root resources whose templates normalize to the same path.
///
/// Invalid templates are kept as-is for validation to report.
pub(crate) fn merge_roots(resources: Vec<Resource>) -> Vec<Resource> {
    let mut merged: Vec<(Option<String>, Resource)> = Vec::with_capacity(resources.len());
    for resource in resources {
        let key = normalize_template(resource.path()).ok();
        let existing = key
            .as_ref()
            .and_then(|key| merged.iter_mut().find(|(k, _)| k.as_ref() == Some(key)));
        match existing {
            Some((_, target)) => target.merge(resource),
            None => merged.push((key, resource)),
        }
    }
    merged.into_iter().map(|(_, resource)| resource).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{endpoint_fn, Outcome};
    use crate::resource::ResourceMethod;
    use crate::ModelError;
    use http::Method;
    use trellis_core::ContainerResponse;

    fn method(m: Method) -> ResourceMethod {
        ResourceMethod::builder(m)
            .endpoint(endpoint_fn(|_| async {
                Ok(Outcome::from(ContainerResponse::default()))
            }))
            .build()
    }

    #[derive(Default)]
    struct Orders;

    impl ResourceType for Orders {
        fn describe() -> Result<Resource, ModelError> {
            Ok(Resource::builder("/orders").method(method(Method::GET)).build())
        }
    }

    #[derive(Default)]
    struct Broken;

    impl ResourceType for Broken {
        fn describe() -> Result<Resource, ModelError> {
            Err(ModelError::introspection::<Self>("no path declared"))
        }
    }

    struct Health;

    impl ResourceType for Health {
        fn describe() -> Result<Resource, ModelError> {
            Ok(Resource::builder("/health").method(method(Method::GET)).build())
        }
    }

    #[test]
    fn test_order_is_programmatic_classes_instances() {
        let mut builder = ResourceBag::builder();
        builder
            .register_instance(Arc::new(Health))
            .register_class::<Orders>()
            .register_programmatic(Resource::builder("/status").method(method(Method::GET)).build());
        let bag = builder.build();

        let paths: Vec<_> = bag.resources().iter().map(Resource::path).collect();
        assert_eq!(paths, vec!["/status", "/orders", "/health"]);
        assert_eq!(bag.handlers().len(), 2);
    }

    #[test]
    fn test_failed_introspection_is_skipped() {
        let mut builder = ResourceBag::builder();
        builder.register_class::<Broken>().register_class::<Orders>();
        let bag = builder.build();

        assert_eq!(bag.resources().len(), 1);
        assert!(!bag.contains_handler(&Handler::class::<Broken>()));
    }

    #[test]
    fn test_duplicate_registrations_collapse() {
        let health = Arc::new(Health);
        let mut builder = ResourceBag::builder();
        builder
            .register_class::<Orders>()
            .register_class::<Orders>()
            .register_instance(health.clone())
            .register_instance(health);
        let bag = builder.build();

        assert_eq!(bag.resources().len(), 2);
        assert_eq!(bag.handlers().len(), 2);
    }

    #[test]
    fn test_roots_with_same_template_merge() {
        let mut builder = ResourceBag::builder();
        builder
            .register_programmatic(
                Resource::builder("/users/{id}").method(method(Method::GET)).build(),
            )
            .register_programmatic(
                Resource::builder("/users/{userId}/").method(method(Method::PUT)).build(),
            );
        let bag = builder.build();

        assert_eq!(bag.resources().len(), 1);
        assert_eq!(bag.resources()[0].path(), "/users/{id}");
        assert_eq!(bag.resources()[0].methods().len(), 2);
    }
}
