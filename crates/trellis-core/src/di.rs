//! Dependency injection container.
//!
//! The container holds three kinds of entries, all keyed by [`TypeId`]:
//!
//! - **singletons** registered once and shared by every request,
//! - **factories** producing a fresh instance per call to [`Container::create`]
//!   (used for per-request bean parameters and resource classes),
//! - **managed resources** (executors, schedulers) released by
//!   [`Container::shutdown`].
//!
//! Pre-destroy hooks run once through [`Container::pre_destroy`], before the
//! container itself is shut down.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::di::Container;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! #[derive(Default)]
//! struct Pagination {
//!     limit: usize,
//! }
//!
//! let mut container = Container::new();
//! container.register(Arc::new(Database { url: "postgres://localhost/db".into() }));
//! container.register_factory(|| Pagination { limit: 20 });
//!
//! let db: Arc<Database> = container.resolve().unwrap();
//! assert_eq!(db.url, "postgres://localhost/db");
//!
//! let page: Arc<Pagination> = container.create().unwrap();
//! assert_eq!(page.limit, 20);
//! ```

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A type-erased instance stored in or produced by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A type-erased factory producing a fresh [`Instance`].
pub type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

type PreDestroyHook = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone)]
pub struct InjectionError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
    /// The reason for the failure.
    pub reason: String,
}

impl fmt::Display for InjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to inject {}: {}", self.type_name, self.reason)
    }
}

impl std::error::Error for InjectionError {}

impl InjectionError {
    /// Creates a new injection error for a missing service.
    pub fn not_registered<T>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: "service not registered".to_string(),
        }
    }

    /// Creates a new injection error with a custom reason.
    pub fn custom<T>(reason: impl Into<String>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// Error raised while tearing the container down.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// A pre-destroy hook failed.
    #[error("pre-destroy hook '{name}' failed: {source}")]
    PreDestroy {
        /// Hook name.
        name: String,
        /// The hook's error.
        #[source]
        source: anyhow::Error,
    },
}

/// A resource owned by the container and released on shutdown.
pub trait Managed: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Releases the resource. Must not block indefinitely.
    fn shutdown(&self);
}

struct FactoryEntry {
    type_name: &'static str,
    factory: Factory,
}

/// A dependency injection container.
///
/// The container is `Send + Sync` and is shared behind an `Arc` once the
/// application has been initialized. Registration requires `&mut self`;
/// resolution, teardown and shutdown work through `&self`.
#[derive(Default)]
pub struct Container {
    services: HashMap<TypeId, Instance>,
    factories: HashMap<TypeId, FactoryEntry>,
    pre_destroy_hooks: Vec<(String, PreDestroyHook)>,
    managed: Vec<Arc<dyn Managed>>,
    destroyed: AtomicBool,
    shut_down: AtomicBool,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a singleton service.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Registers a type-erased singleton.
    ///
    /// An existing singleton for the same type is kept.
    pub fn register_erased(&mut self, type_id: TypeId, instance: Instance) {
        self.services.entry(type_id).or_insert(instance);
    }

    /// Resolves a singleton service.
    ///
    /// Returns `None` if the service is not registered.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| s.clone().downcast::<T>().ok())
    }

    /// Resolves a singleton service or returns an error.
    ///
    /// # Errors
    ///
    /// Returns `InjectionError` if the service is not registered.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Checks if a singleton service is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Registers a factory producing a new `T` per call to [`Container::create`].
    pub fn register_factory<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let erased: Factory = Arc::new(move || Arc::new(factory()) as Instance);
        self.register_factory_erased(TypeId::of::<T>(), std::any::type_name::<T>(), erased);
    }

    /// Registers a type-erased factory.
    ///
    /// An existing factory for the same type is kept.
    pub fn register_factory_erased(
        &mut self,
        type_id: TypeId,
        type_name: &'static str,
        factory: Factory,
    ) {
        self.factories
            .entry(type_id)
            .or_insert(FactoryEntry { type_name, factory });
    }

    /// Creates a fresh instance of `T` from its factory.
    #[must_use]
    pub fn create<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.create_erased(TypeId::of::<T>())
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    /// Creates a fresh type-erased instance from a factory.
    #[must_use]
    pub fn create_erased(&self, type_id: TypeId) -> Option<Instance> {
        self.factories.get(&type_id).map(|entry| (entry.factory)())
    }

    /// Returns `true` if a factory is registered for `type_id`.
    #[must_use]
    pub fn has_factory(&self, type_id: TypeId) -> bool {
        self.factories.contains_key(&type_id)
    }

    /// Returns the name of the type a factory was registered for.
    #[must_use]
    pub fn factory_type_name(&self, type_id: TypeId) -> Option<&'static str> {
        self.factories.get(&type_id).map(|entry| entry.type_name)
    }

    /// Returns `true` if `type_id` can be obtained either as a singleton or
    /// from a factory.
    #[must_use]
    pub fn is_injectable(&self, type_id: TypeId) -> bool {
        self.services.contains_key(&type_id) || self.factories.contains_key(&type_id)
    }

    /// Every type the container can supply, singletons and factories alike.
    #[must_use]
    pub fn injectable_types(&self) -> HashSet<TypeId> {
        self.services
            .keys()
            .chain(self.factories.keys())
            .copied()
            .collect()
    }

    /// Resolves the singleton for `type_id`, or creates one from its factory.
    #[must_use]
    pub fn instance_of(&self, type_id: TypeId) -> Option<Instance> {
        self.services
            .get(&type_id)
            .cloned()
            .or_else(|| self.create_erased(type_id))
    }

    /// Registers a hook run by [`Container::pre_destroy`].
    pub fn on_pre_destroy<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_destroy_hooks.push((name.into(), Box::new(hook)));
    }

    /// Hands a resource to the container; it is released on shutdown.
    pub fn manage(&mut self, resource: Arc<dyn Managed>) {
        self.managed.push(resource);
    }

    /// Runs every pre-destroy hook in registration order.
    ///
    /// All hooks run even if one fails; the first failure is returned.
    /// Subsequent calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure.
    pub fn pre_destroy(&self) -> Result<(), TeardownError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_error = None;
        for (name, hook) in &self.pre_destroy_hooks {
            if let Err(source) = hook() {
                tracing::warn!(hook = %name, error = %source, "pre-destroy hook failed");
                if first_error.is_none() {
                    first_error = Some(TeardownError::PreDestroy {
                        name: name.clone(),
                        source,
                    });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Releases every managed resource in reverse registration order.
    ///
    /// Subsequent calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for resource in self.managed.iter().rev() {
            tracing::debug!(resource = resource.name(), "releasing managed resource");
            resource.shutdown();
        }
    }

    /// Returns `true` once [`Container::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Returns the number of registered singletons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no singletons are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.services.len())
            .field("factory_count", &self.factories.len())
            .field("managed_count", &self.managed.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    impl TestService {
        fn new(value: &str) -> Self {
            Self {
                value: value.to_string(),
            }
        }
    }

    struct Executor {
        log: Arc<Mutex<Vec<String>>>,
        label: &'static str,
    }

    impl Managed for Executor {
        fn name(&self) -> &str {
            self.label
        }

        fn shutdown(&self) {
            self.log.lock().push(format!("shutdown:{}", self.label));
        }
    }

    #[test]
    fn test_container_register_and_resolve() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("hello")));

        let service: Option<Arc<TestService>> = container.resolve();
        assert_eq!(service.unwrap().value, "hello");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_container_resolve_required_missing() {
        let container = Container::new();
        let err = container.resolve_required::<TestService>().unwrap_err();
        assert!(err.to_string().contains("TestService"));
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn test_factory_creates_fresh_instances() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut container = Container::new();
        let c = counter.clone();
        container.register_factory(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            TestService::new(&format!("instance-{n}"))
        });

        let first: Arc<TestService> = container.create().unwrap();
        let second: Arc<TestService> = container.create().unwrap();
        assert_eq!(first.value, "instance-0");
        assert_eq!(second.value, "instance-1");
        assert!(container.has_factory(TypeId::of::<TestService>()));
        assert!(container.resolve::<TestService>().is_none());
    }

    #[test]
    fn test_is_injectable() {
        struct Singleton;
        struct PerRequest;
        struct Missing;

        let mut container = Container::new();
        container.register(Arc::new(Singleton));
        container.register_factory(|| PerRequest);

        assert!(container.is_injectable(TypeId::of::<Singleton>()));
        assert!(container.is_injectable(TypeId::of::<PerRequest>()));
        assert!(!container.is_injectable(TypeId::of::<Missing>()));
        assert!(container.instance_of(TypeId::of::<PerRequest>()).is_some());
        assert!(container.instance_of(TypeId::of::<Missing>()).is_none());

        let types = container.injectable_types();
        assert_eq!(types.len(), 2);
        assert!(types.contains(&TypeId::of::<Singleton>()));
    }

    #[test]
    fn test_register_erased_keeps_existing() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("typed")));
        container.register_erased(
            TypeId::of::<TestService>(),
            Arc::new(TestService::new("erased")),
        );
        assert_eq!(container.resolve::<TestService>().unwrap().value, "typed");

        container.register_erased(TypeId::of::<u32>(), Arc::new(7_u32));
        assert_eq!(*container.resolve::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_first_factory_wins() {
        let mut container = Container::new();
        container.register_factory(|| TestService::new("first"));
        container.register_factory(|| TestService::new("second"));

        assert_eq!(container.create::<TestService>().unwrap().value, "first");
    }

    #[test]
    fn test_pre_destroy_runs_all_hooks_and_reports_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = Container::new();

        let l = log.clone();
        container.on_pre_destroy("a", move || {
            l.lock().push("a".to_string());
            Err(anyhow::anyhow!("a failed"))
        });
        let l = log.clone();
        container.on_pre_destroy("b", move || {
            l.lock().push("b".to_string());
            Err(anyhow::anyhow!("b failed"))
        });

        let err = container.pre_destroy().unwrap_err();
        assert!(err.to_string().contains("'a'"));
        assert_eq!(*log.lock(), vec!["a", "b"]);

        // idempotent
        assert!(container.pre_destroy().is_ok());
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_shutdown_releases_managed_in_reverse_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = Container::new();
        container.manage(Arc::new(Executor {
            log: log.clone(),
            label: "workers",
        }));
        container.manage(Arc::new(Executor {
            log: log.clone(),
            label: "scheduler",
        }));

        container.shutdown();
        container.shutdown();

        assert!(container.is_shut_down());
        assert_eq!(*log.lock(), vec!["shutdown:scheduler", "shutdown:workers"]);
    }

    #[test]
    fn test_container_debug() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("debug")));

        let debug = format!("{:?}", container);
        assert!(debug.contains("service_count: 1"));
    }
}
