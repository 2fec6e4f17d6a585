//! Provider classification.
//!
//! Every provider contract is classified independently into:
//!
//! - **pre-matching**: request filters marked pre-matching; they run before
//!   routing and ignore name bindings,
//! - **global**: providers without binding tags, or whose tags are all
//!   declared by the application itself,
//! - **name-bound**: providers restricted to endpoints carrying their tags,
//!   keyed by tag, with an inverse map from component to its tags.
//!
//! Each component lands in exactly one of the three groups. Within a group,
//! providers run in descending priority; equal priorities keep discovery
//! order.

use crate::component::ComponentBag;
use crate::filter::{
    DynamicFeature, ReaderInterceptor, RequestFilter, ResponseFilter, WriterInterceptor,
};
use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use trellis_core::{BindingTag, ComponentId, ComponentModel, Contract, Priority};

/// One classified provider.
#[derive(Clone)]
pub struct Ranked<T> {
    /// Component the provider belongs to.
    pub id: ComponentId,
    /// Priority under the classified contract.
    pub priority: Priority,
    /// The provider.
    pub provider: T,
}

impl<T> fmt::Debug for Ranked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ranked")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Providers of one contract, classified.
#[derive(Clone)]
pub struct Classified<T> {
    /// Pre-matching providers, in run order.
    pub pre_matching: Vec<Ranked<T>>,
    /// Global post-matching providers, in run order.
    pub global: Vec<Ranked<T>>,
    /// Name-bound providers per tag, in run order.
    pub name_bound: IndexMap<BindingTag, Vec<Ranked<T>>>,
    /// Tags of every name-bound component.
    pub inverse: HashMap<ComponentId, BTreeSet<BindingTag>>,
}

impl<T> Default for Classified<T> {
    fn default() -> Self {
        Self {
            pre_matching: Vec::new(),
            global: Vec::new(),
            name_bound: IndexMap::new(),
            inverse: HashMap::new(),
        }
    }
}

impl<T: Clone> Classified<T> {
    /// Name-bound providers applying to an endpoint with `endpoint_tags`,
    /// in run order.
    ///
    /// A provider applies when each of its tags is carried by the endpoint
    /// or declared by the application.
    #[must_use]
    pub fn bound_to(
        &self,
        endpoint_tags: &BTreeSet<BindingTag>,
        application_tags: &BTreeSet<BindingTag>,
    ) -> Vec<Ranked<T>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for tag in endpoint_tags {
            let Some(entries) = self.name_bound.get(tag) else {
                continue;
            };
            for entry in entries {
                if !seen.insert(entry.id) {
                    continue;
                }
                let applies = self.inverse.get(&entry.id).is_some_and(|tags| {
                    tags.iter()
                        .all(|t| endpoint_tags.contains(t) || application_tags.contains(t))
                });
                if applies {
                    selected.push(entry.clone());
                }
            }
        }
        sort_for_run(&mut selected);
        selected
    }

    /// Ids of every classified component.
    #[must_use]
    pub fn component_ids(&self) -> BTreeSet<ComponentId> {
        self.pre_matching
            .iter()
            .chain(&self.global)
            .chain(self.name_bound.values().flatten())
            .map(|entry| entry.id)
            .collect()
    }
}

impl<T> fmt::Debug for Classified<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classified")
            .field("pre_matching", &self.pre_matching)
            .field("global", &self.global)
            .field("name_bound", &self.name_bound)
            .field("inverse", &self.inverse)
            .finish()
    }
}

fn sort_for_run<T>(entries: &mut [Ranked<T>]) {
    entries.sort_by_key(|entry| (Reverse(entry.priority), entry.id));
}

/// Classifies providers of `contract`.
///
/// `entries` must be in discovery order. The pre-matching flag is honoured
/// for request filters only. A pre-matching component that also carries
/// binding tags is logged and kept as pre-matching; its tags are dropped.
pub fn classify<'a, T, I>(
    contract: Contract,
    entries: I,
    application_tags: &BTreeSet<BindingTag>,
) -> Classified<T>
where
    T: Clone,
    I: IntoIterator<Item = (ComponentId, &'a ComponentModel, T)>,
{
    let mut classified = Classified::default();

    for (id, model, provider) in entries {
        let entry = Ranked {
            id,
            priority: model.priority_for(contract),
            provider,
        };

        if contract == Contract::RequestFilter && model.is_pre_matching() {
            if model.is_name_bound() {
                tracing::warn!(
                    component = model.name(),
                    "pre-matching filter carries name bindings; the bindings are ignored"
                );
            }
            classified.pre_matching.push(entry);
            continue;
        }

        let tags = model.name_bindings();
        if tags.is_empty() || tags.is_subset(application_tags) {
            classified.global.push(entry);
            continue;
        }

        for tag in tags {
            classified
                .name_bound
                .entry(tag.clone())
                .or_default()
                .push(entry.clone());
        }
        classified.inverse.insert(id, tags.clone());
    }

    sort_for_run(&mut classified.pre_matching);
    sort_for_run(&mut classified.global);
    for entries in classified.name_bound.values_mut() {
        sort_for_run(entries);
    }
    classified
}

/// Every provider of an application, classified per contract.
#[derive(Clone, Default)]
pub struct ProcessingProviders {
    /// Tags declared by the application itself.
    pub application_tags: BTreeSet<BindingTag>,
    /// Request filters.
    pub request_filters: Classified<Arc<dyn RequestFilter>>,
    /// Response filters.
    pub response_filters: Classified<Arc<dyn ResponseFilter>>,
    /// Reader interceptors.
    pub reader_interceptors: Classified<Arc<dyn ReaderInterceptor>>,
    /// Writer interceptors.
    pub writer_interceptors: Classified<Arc<dyn WriterInterceptor>>,
    /// Dynamic features, in descending priority.
    pub dynamic_features: Vec<Arc<dyn DynamicFeature>>,
}

impl ProcessingProviders {
    /// Classifies every component of `bag`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use trellis_core::{ComponentModel, Contract, Priority};
    /// use trellis_middleware::{request_filter_fn, ComponentBag, FilterAction, ProcessingProviders, Provider};
    ///
    /// let mut bag = ComponentBag::new();
    /// bag.register(
    ///     ComponentModel::builder("admin-only")
    ///         .contract(Contract::RequestFilter)
    ///         .name_binding("Admin")
    ///         .build(),
    ///     Provider::new().request_filter(request_filter_fn(|_| Ok(FilterAction::Continue))),
    /// );
    ///
    /// let providers = ProcessingProviders::from_components(&bag, BTreeSet::new());
    /// assert!(providers.request_filters.global.is_empty());
    /// assert_eq!(providers.request_filters.name_bound.len(), 1);
    /// ```
    #[must_use]
    pub fn from_components(bag: &ComponentBag, application_tags: BTreeSet<BindingTag>) -> Self {
        let request_filters = classify(
            Contract::RequestFilter,
            bag.serving(Contract::RequestFilter).filter_map(|c| {
                c.provider()
                    .request_filter
                    .clone()
                    .map(|p| (c.id(), c.model(), p))
            }),
            &application_tags,
        );
        let response_filters = classify(
            Contract::ResponseFilter,
            bag.serving(Contract::ResponseFilter).filter_map(|c| {
                c.provider()
                    .response_filter
                    .clone()
                    .map(|p| (c.id(), c.model(), p))
            }),
            &application_tags,
        );
        let reader_interceptors = classify(
            Contract::ReaderInterceptor,
            bag.serving(Contract::ReaderInterceptor).filter_map(|c| {
                c.provider()
                    .reader_interceptor
                    .clone()
                    .map(|p| (c.id(), c.model(), p))
            }),
            &application_tags,
        );
        let writer_interceptors = classify(
            Contract::WriterInterceptor,
            bag.serving(Contract::WriterInterceptor).filter_map(|c| {
                c.provider()
                    .writer_interceptor
                    .clone()
                    .map(|p| (c.id(), c.model(), p))
            }),
            &application_tags,
        );

        let mut features: Vec<Ranked<Arc<dyn DynamicFeature>>> = bag
            .serving(Contract::DynamicFeature)
            .filter_map(|c| {
                c.provider().dynamic_feature.clone().map(|provider| Ranked {
                    id: c.id(),
                    priority: c.model().priority_for(Contract::DynamicFeature),
                    provider,
                })
            })
            .collect();
        sort_for_run(&mut features);

        tracing::debug!(
            pre_matching = request_filters.pre_matching.len(),
            global_request_filters = request_filters.global.len(),
            name_bound_tags = request_filters.name_bound.len(),
            dynamic_features = features.len(),
            "providers classified"
        );

        Self {
            application_tags,
            request_filters,
            response_filters,
            reader_interceptors,
            writer_interceptors,
            dynamic_features: features.into_iter().map(|f| f.provider).collect(),
        }
    }
}

impl fmt::Debug for ProcessingProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingProviders")
            .field("application_tags", &self.application_tags)
            .field("request_filters", &self.request_filters)
            .field("response_filters", &self.response_filters)
            .field("reader_interceptors", &self.reader_interceptors)
            .field("writer_interceptors", &self.writer_interceptors)
            .field("dynamic_features", &self.dynamic_features.len())
            .finish()
    }
}
