//! Objects resource methods are invoked on.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use trellis_core::di::{Container, Factory, Instance};

/// The object behind a resource.
///
/// A class handler is instantiated per request from its factory; an instance
/// handler is shared by every request. Two handlers are the same if they
/// name the same class, or point at the same instance.
#[derive(Clone)]
pub enum Handler {
    /// A type instantiated per request.
    Class {
        /// Handler type.
        type_id: TypeId,
        /// Name of the handler type.
        type_name: &'static str,
        /// Produces a fresh instance.
        factory: Factory,
    },
    /// A shared instance.
    Instance {
        /// Type of the instance.
        type_id: TypeId,
        /// Name of the instance type.
        type_name: &'static str,
        /// The instance.
        instance: Instance,
    },
}

impl Handler {
    /// A class handler for `T`, created with `T::default()`.
    #[must_use]
    pub fn class<T: Default + Send + Sync + 'static>() -> Self {
        Self::Class {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            factory: Arc::new(|| Arc::new(T::default()) as Instance),
        }
    }

    /// An instance handler.
    #[must_use]
    pub fn instance<T: Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self::Instance {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            instance,
        }
    }

    /// Type of the handler.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        match self {
            Self::Class { type_id, .. } | Self::Instance { type_id, .. } => *type_id,
        }
    }

    /// Name of the handler type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Class { type_name, .. } | Self::Instance { type_name, .. } => *type_name,
        }
    }

    /// Returns `true` for instance handlers.
    #[must_use]
    pub const fn is_instance(&self) -> bool {
        matches!(self, Self::Instance { .. })
    }

    /// The instance to invoke a request on.
    ///
    /// Class handlers prefer a factory registered in `container`, so bindings
    /// made during enhancement take effect.
    #[must_use]
    pub fn resolve(&self, container: &Container) -> Instance {
        match self {
            Self::Class {
                type_id, factory, ..
            } => container
                .create_erased(*type_id)
                .unwrap_or_else(|| factory()),
            Self::Instance { instance, .. } => Arc::clone(instance),
        }
    }

    /// Binds the handler into `container`: classes as factories, instances
    /// as singletons. Existing bindings are kept.
    pub fn bind(&self, container: &mut Container) {
        match self {
            Self::Class {
                type_id,
                type_name,
                factory,
            } => container.register_factory_erased(*type_id, *type_name, Arc::clone(factory)),
            Self::Instance {
                type_id, instance, ..
            } => container.register_erased(*type_id, Arc::clone(instance)),
        }
    }
}

fn same_instance(a: &Instance, b: &Instance) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Class { type_id: a, .. }, Self::Class { type_id: b, .. }) => a == b,
            (Self::Instance { instance: a, .. }, Self::Instance { instance: b, .. }) => {
                same_instance(a, b)
            }
            _ => false,
        }
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_instance() { "Instance" } else { "Class" };
        f.debug_tuple(kind).field(&self.type_name()).finish()
    }
}

/// Downcasts a resolved handler.
#[must_use]
pub fn downcast<T: Any + Send + Sync>(instance: Instance) -> Option<Arc<T>> {
    instance.downcast::<T>().ok()
}
