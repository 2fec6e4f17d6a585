//! Registered providers.

use crate::filter::{
    DynamicFeature, ReaderInterceptor, RequestFilter, ResponseFilter, WriterInterceptor,
};
use std::fmt;
use std::sync::Arc;
use trellis_core::{ComponentId, ComponentModel, Contract};

/// The implementations a component supplies, one per contract.
#[derive(Clone, Default)]
pub struct Provider {
    pub(crate) request_filter: Option<Arc<dyn RequestFilter>>,
    pub(crate) response_filter: Option<Arc<dyn ResponseFilter>>,
    pub(crate) reader_interceptor: Option<Arc<dyn ReaderInterceptor>>,
    pub(crate) writer_interceptor: Option<Arc<dyn WriterInterceptor>>,
    pub(crate) dynamic_feature: Option<Arc<dyn DynamicFeature>>,
}

impl Provider {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the request filter implementation.
    pub fn request_filter(mut self, filter: Arc<dyn RequestFilter>) -> Self {
        self.request_filter = Some(filter);
        self
    }

    /// Supplies the response filter implementation.
    pub fn response_filter(mut self, filter: Arc<dyn ResponseFilter>) -> Self {
        self.response_filter = Some(filter);
        self
    }

    /// Supplies the reader interceptor implementation.
    pub fn reader_interceptor(mut self, interceptor: Arc<dyn ReaderInterceptor>) -> Self {
        self.reader_interceptor = Some(interceptor);
        self
    }

    /// Supplies the writer interceptor implementation.
    pub fn writer_interceptor(mut self, interceptor: Arc<dyn WriterInterceptor>) -> Self {
        self.writer_interceptor = Some(interceptor);
        self
    }

    /// Supplies the dynamic feature implementation.
    pub fn dynamic_feature(mut self, feature: Arc<dyn DynamicFeature>) -> Self {
        self.dynamic_feature = Some(feature);
        self
    }

    /// Returns `true` if an implementation for `contract` is present.
    #[must_use]
    pub const fn supplies(&self, contract: Contract) -> bool {
        match contract {
            Contract::RequestFilter => self.request_filter.is_some(),
            Contract::ResponseFilter => self.response_filter.is_some(),
            Contract::ReaderInterceptor => self.reader_interceptor.is_some(),
            Contract::WriterInterceptor => self.writer_interceptor.is_some(),
            Contract::DynamicFeature => self.dynamic_feature.is_some(),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let supplied: Vec<_> = Contract::ALL
            .into_iter()
            .filter(|c| self.supplies(*c))
            .collect();
        f.debug_struct("Provider").field("supplies", &supplied).finish()
    }
}

/// A component registered with the application.
#[derive(Debug, Clone)]
pub struct Component {
    id: ComponentId,
    model: ComponentModel,
    provider: Provider,
}

impl Component {
    /// Registration-order identity.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Declared metadata.
    #[must_use]
    pub const fn model(&self) -> &ComponentModel {
        &self.model
    }

    /// Supplied implementations.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Returns `true` if the component both declares and supplies
    /// `contract`.
    #[must_use]
    pub const fn serves(&self, contract: Contract) -> bool {
        self.model.implements(contract) && self.provider.supplies(contract)
    }
}

/// Components in discovery order.
///
/// # Example
///
/// ```
/// use trellis_core::{ComponentModel, Contract, Priority};
/// use trellis_middleware::{request_filter_fn, ComponentBag, FilterAction, Provider};
///
/// let mut bag = ComponentBag::new();
/// let id = bag.register(
///     ComponentModel::builder("auth")
///         .contract(Contract::RequestFilter)
///         .priority(Priority::AUTHENTICATION)
///         .pre_matching()
///         .build(),
///     Provider::new().request_filter(request_filter_fn(|_| Ok(FilterAction::Continue))),
/// );
/// assert_eq!(id.index(), 0);
/// assert_eq!(bag.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ComponentBag {
    components: Vec<Component>,
}

impl ComponentBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component and returns its id.
    ///
    /// Contracts that are declared but not supplied, or supplied but not
    /// declared, are ignored with a warning.
    pub fn register(&mut self, model: ComponentModel, provider: Provider) -> ComponentId {
        for contract in Contract::ALL {
            match (model.implements(contract), provider.supplies(contract)) {
                (true, false) => tracing::warn!(
                    component = model.name(),
                    contract = %contract,
                    "declared contract has no implementation; ignoring it"
                ),
                (false, true) => tracing::warn!(
                    component = model.name(),
                    contract = %contract,
                    "implementation supplied for an undeclared contract; ignoring it"
                ),
                _ => {}
            }
        }

        let id = ComponentId::new(self.components.len());
        self.components.push(Component {
            id,
            model,
            provider,
        });
        id
    }

    /// All components in discovery order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Components serving `contract`, in discovery order.
    pub fn serving(&self, contract: Contract) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.serves(contract))
    }

    /// Looks up a component by id.
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.index())
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no component is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{request_filter_fn, response_filter_fn, FilterAction};

    #[test]
    fn test_serving_requires_declaration_and_implementation() {
        let mut bag = ComponentBag::new();
        bag.register(
            ComponentModel::builder("both")
                .contract(Contract::RequestFilter)
                .contract(Contract::ResponseFilter)
                .build(),
            Provider::new()
                .request_filter(request_filter_fn(|_| Ok(FilterAction::Continue)))
                .response_filter(response_filter_fn(|_, _| Ok(()))),
        );
        bag.register(
            ComponentModel::builder("undeclared").build(),
            Provider::new().request_filter(request_filter_fn(|_| Ok(FilterAction::Continue))),
        );
        bag.register(
            ComponentModel::builder("unimplemented")
                .contract(Contract::RequestFilter)
                .build(),
            Provider::new(),
        );

        let names: Vec<_> = bag
            .serving(Contract::RequestFilter)
            .map(|c| c.model().name())
            .collect();
        assert_eq!(names, vec!["both"]);
        assert_eq!(bag.serving(Contract::ResponseFilter).count(), 1);
        assert_eq!(bag.get(ComponentId::new(2)).unwrap().model().name(), "unimplemented");
    }
}
