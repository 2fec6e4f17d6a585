//! Application registration.
//!
//! An [`Application`] collects everything the handler needs before it is
//! locked: resources, components, application-wide binding tags, model
//! processors, features, listeners and container bindings.
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use trellis_core::ContainerResponse;
//! use trellis_model::{endpoint_fn, Outcome, Resource, ResourceMethod};
//! use trellis_server::Application;
//!
//! let app = Application::new().resource(
//!     Resource::builder("/health")
//!         .method(
//!             ResourceMethod::builder(Method::GET)
//!                 .endpoint(endpoint_fn(|_| async {
//!                     Ok(Outcome::from(ContainerResponse::ok("up")))
//!                 }))
//!                 .build(),
//!         )
//!         .build(),
//! );
//! assert_eq!(app.feature_count(), 0);
//! ```

use crate::event::ApplicationEventListener;
use crate::lifecycle::ContainerLifecycleListener;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use trellis_config::TrellisConfig;
use trellis_core::di::Container;
use trellis_core::{BindingTag, ComponentId, ComponentModel};
use trellis_middleware::{ComponentBag, Provider};
use trellis_model::{ModelProcessor, Resource, ResourceBagBuilder, ResourceType};

/// Registration surface handed to features while the application is still
/// open.
pub struct Configurable<'a> {
    pub(crate) config: &'a TrellisConfig,
    pub(crate) resources: &'a mut ResourceBagBuilder,
    pub(crate) components: &'a mut ComponentBag,
    pub(crate) application_tags: &'a mut BTreeSet<BindingTag>,
    pub(crate) container: &'a mut Container,
}

impl Configurable<'_> {
    /// The application configuration.
    #[must_use]
    pub const fn config(&self) -> &TrellisConfig {
        self.config
    }

    /// Registers a programmatic resource.
    pub fn register_resource(&mut self, resource: Resource) -> &mut Self {
        self.resources.register_programmatic(resource);
        self
    }

    /// Registers a component.
    pub fn register_component(&mut self, model: ComponentModel, provider: Provider) -> ComponentId {
        self.components.register(model, provider)
    }

    /// Declares a binding tag application-wide.
    pub fn name_binding(&mut self, tag: impl Into<BindingTag>) -> &mut Self {
        self.application_tags.insert(tag.into());
        self
    }

    /// The container, for service and factory bindings.
    pub fn container_mut(&mut self) -> &mut Container {
        self.container
    }
}

impl fmt::Debug for Configurable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configurable")
            .field("components", &self.components.len())
            .field("application_tags", &self.application_tags)
            .finish_non_exhaustive()
    }
}

/// Configures the application as one unit.
pub trait Feature: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Registers what the feature contributes.
    ///
    /// # Errors
    ///
    /// Any error aborts application initialization.
    fn configure(&self, context: &mut Configurable<'_>) -> anyhow::Result<()>;
}

/// A feature found by discovery rather than registered explicitly.
///
/// Skipped when `feature_auto_discovery_disable` is set, unless forced.
pub trait AutoDiscoverable: Feature {
    /// Forced discoverables run even when discovery is disabled.
    fn is_forced(&self) -> bool {
        false
    }
}

/// An application under construction.
pub struct Application {
    pub(crate) config: TrellisConfig,
    pub(crate) resources: ResourceBagBuilder,
    pub(crate) components: ComponentBag,
    pub(crate) application_tags: BTreeSet<BindingTag>,
    pub(crate) processors: Vec<Arc<dyn ModelProcessor>>,
    pub(crate) features: Vec<Arc<dyn Feature>>,
    pub(crate) auto_discoverables: Vec<Arc<dyn AutoDiscoverable>>,
    pub(crate) lifecycle_listeners: Vec<Arc<dyn ContainerLifecycleListener>>,
    pub(crate) event_listeners: Vec<Arc<dyn ApplicationEventListener>>,
    pub(crate) container: Container,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// An empty application with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TrellisConfig::default(),
            resources: ResourceBagBuilder::default(),
            components: ComponentBag::new(),
            application_tags: BTreeSet::new(),
            processors: Vec::new(),
            features: Vec::new(),
            auto_discoverables: Vec::new(),
            lifecycle_listeners: Vec::new(),
            event_listeners: Vec::new(),
            container: Container::new(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: TrellisConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a programmatic resource.
    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.register_programmatic(resource);
        self
    }

    /// Registers a resource class, instantiated per request.
    #[must_use]
    pub fn resource_class<T: ResourceType + Default>(mut self) -> Self {
        self.resources.register_class::<T>();
        self
    }

    /// Registers a shared resource instance.
    #[must_use]
    pub fn resource_instance<T: ResourceType>(mut self, instance: Arc<T>) -> Self {
        self.resources.register_instance(instance);
        self
    }

    /// Registers a component.
    #[must_use]
    pub fn component(mut self, model: ComponentModel, provider: Provider) -> Self {
        self.components.register(model, provider);
        self
    }

    /// Declares a binding tag application-wide.
    ///
    /// Components bound only to application-wide tags apply globally.
    #[must_use]
    pub fn name_binding(mut self, tag: impl Into<BindingTag>) -> Self {
        self.application_tags.insert(tag.into());
        self
    }

    /// Adds a model processor.
    #[must_use]
    pub fn processor(mut self, processor: Arc<dyn ModelProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Adds a feature.
    #[must_use]
    pub fn feature(mut self, feature: Arc<dyn Feature>) -> Self {
        self.features.push(feature);
        self
    }

    /// Adds a discovered feature. Discoverables run after explicit features,
    /// in the order given.
    #[must_use]
    pub fn auto_discoverable(mut self, discoverable: Arc<dyn AutoDiscoverable>) -> Self {
        self.auto_discoverables.push(discoverable);
        self
    }

    /// Adds a container lifecycle listener.
    #[must_use]
    pub fn lifecycle_listener(mut self, listener: Arc<dyn ContainerLifecycleListener>) -> Self {
        self.lifecycle_listeners.push(listener);
        self
    }

    /// Adds an application event listener.
    #[must_use]
    pub fn event_listener(mut self, listener: Arc<dyn ApplicationEventListener>) -> Self {
        self.event_listeners.push(listener);
        self
    }

    /// Registers a singleton service.
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.container.register(service);
        self
    }

    /// Registers a per-request factory.
    #[must_use]
    pub fn factory<T, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.container.register_factory(factory);
        self
    }

    /// Adjusts the container directly, for example to add pre-destroy hooks.
    #[must_use]
    pub fn configure_container<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut Container),
    {
        configure(&mut self.container);
        self
    }

    /// Number of explicitly registered features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Runs features, then discoverables allowed by the configuration.
    pub(crate) fn configure_features(&mut self) -> Result<(), crate::InitError> {
        let features = std::mem::take(&mut self.features);
        let discoverables = std::mem::take(&mut self.auto_discoverables);
        let discovery_disabled = self.config.server.feature_auto_discovery_disable;

        let mut context = Configurable {
            config: &self.config,
            resources: &mut self.resources,
            components: &mut self.components,
            application_tags: &mut self.application_tags,
            container: &mut self.container,
        };

        for feature in &features {
            configure(feature.as_ref(), &mut context)?;
        }
        for discoverable in &discoverables {
            if discovery_disabled && !discoverable.is_forced() {
                tracing::debug!(feature = discoverable.name(), "auto-discovery disabled; skipping");
                continue;
            }
            configure(discoverable.as_ref(), &mut context)?;
        }
        Ok(())
    }
}

fn configure<F: Feature + ?Sized>(
    feature: &F,
    context: &mut Configurable<'_>,
) -> Result<(), crate::InitError> {
    tracing::debug!(feature = feature.name(), "configuring feature");
    feature
        .configure(context)
        .map_err(|error| crate::InitError::Feature {
            feature: feature.name().to_string(),
            message: format!("{error:#}"),
        })
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("components", &self.components.len())
            .field("application_tags", &self.application_tags)
            .field("processors", &self.processors.len())
            .field("features", &self.features.len())
            .field("auto_discoverables", &self.auto_discoverables.len())
            .field("lifecycle_listeners", &self.lifecycle_listeners.len())
            .field("event_listeners", &self.event_listeners.len())
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_config::ServerProperties;
    use trellis_core::Contract;
    use trellis_middleware::{request_filter_fn, FilterAction};

    struct Tagging(&'static str);

    impl Feature for Tagging {
        fn name(&self) -> &str {
            self.0
        }

        fn configure(&self, context: &mut Configurable<'_>) -> anyhow::Result<()> {
            context.name_binding(self.0);
            context.register_component(
                ComponentModel::builder(self.0)
                    .contract(Contract::RequestFilter)
                    .build(),
                Provider::new().request_filter(request_filter_fn(|_| Ok(FilterAction::Continue))),
            );
            Ok(())
        }
    }

    impl AutoDiscoverable for Tagging {
        fn is_forced(&self) -> bool {
            self.0 == "forced"
        }
    }

    struct Broken;

    impl Feature for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn configure(&self, _context: &mut Configurable<'_>) -> anyhow::Result<()> {
            anyhow::bail!("missing credentials")
        }
    }

    #[test]
    fn test_features_then_discoverables() {
        let mut app = Application::new()
            .feature(Arc::new(Tagging("explicit")))
            .auto_discoverable(Arc::new(Tagging("discovered")));
        app.configure_features().unwrap();

        assert_eq!(app.components.len(), 2);
        assert!(app.application_tags.contains(&BindingTag::new("explicit")));
        assert!(app.application_tags.contains(&BindingTag::new("discovered")));
    }

    #[test]
    fn test_disabled_discovery_runs_only_forced() {
        let config = TrellisConfig::builder()
            .server(ServerProperties {
                feature_auto_discovery_disable: true,
                ..ServerProperties::default()
            })
            .build();
        let mut app = Application::new()
            .config(config)
            .auto_discoverable(Arc::new(Tagging("discovered")))
            .auto_discoverable(Arc::new(Tagging("forced")));
        app.configure_features().unwrap();

        assert_eq!(app.components.len(), 1);
        assert!(app.application_tags.contains(&BindingTag::new("forced")));
        assert!(!app.application_tags.contains(&BindingTag::new("discovered")));
    }

    #[test]
    fn test_failing_feature_names_itself() {
        let mut app = Application::new().feature(Arc::new(Broken));
        let error = app.configure_features().unwrap_err();
        assert!(matches!(
            error,
            crate::InitError::Feature { ref feature, ref message }
                if feature == "broken" && message == "missing credentials"
        ));
    }
}
