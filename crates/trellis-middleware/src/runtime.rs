//! Routable runtime model.
//!
//! The frozen [`ResourceModel`] is flattened once into [`RuntimeMethod`]s:
//! each resource method with the name-bound providers that apply to it and
//! whatever dynamic features attached. The methods are then loaded into a
//! [`Router`].

use crate::classify::{ProcessingProviders, Ranked};
use crate::filter::{
    FeatureContext, ReaderInterceptor, RequestFilter, ResponseFilter, WriterInterceptor,
};
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use trellis_core::ComponentId;
use trellis_model::{ResourceModel, RuntimeEndpoint};
use trellis_router::{MethodRouter, Router};

/// A resource method ready for dispatch.
pub struct RuntimeMethod {
    endpoint: RuntimeEndpoint,
    request_filters: Vec<Arc<dyn RequestFilter>>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    reader_interceptors: Vec<Arc<dyn ReaderInterceptor>>,
    writer_interceptors: Vec<Arc<dyn WriterInterceptor>>,
}

impl RuntimeMethod {
    /// The flattened resource method.
    #[must_use]
    pub const fn endpoint(&self) -> &RuntimeEndpoint {
        &self.endpoint
    }

    /// Post-matching request filters bound to this method, in run order:
    /// name-bound, then those attached by dynamic features.
    #[must_use]
    pub fn request_filters(&self) -> &[Arc<dyn RequestFilter>] {
        &self.request_filters
    }

    /// Response filters bound to this method, in run order.
    #[must_use]
    pub fn response_filters(&self) -> &[Arc<dyn ResponseFilter>] {
        &self.response_filters
    }

    /// Reader interceptors bound to this method.
    #[must_use]
    pub fn reader_interceptors(&self) -> &[Arc<dyn ReaderInterceptor>] {
        &self.reader_interceptors
    }

    /// Writer interceptors bound to this method.
    #[must_use]
    pub fn writer_interceptors(&self) -> &[Arc<dyn WriterInterceptor>] {
        &self.writer_interceptors
    }
}

impl fmt::Debug for RuntimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeMethod")
            .field("endpoint", &self.endpoint)
            .field("request_filters", &self.request_filters.len())
            .field("response_filters", &self.response_filters.len())
            .field("reader_interceptors", &self.reader_interceptors.len())
            .field("writer_interceptors", &self.writer_interceptors.len())
            .finish()
    }
}

fn providers<T>(ranked: Vec<Ranked<T>>) -> Vec<T> {
    ranked.into_iter().map(|r| r.provider).collect()
}

fn feature_attached<T>(mut attached: Vec<(trellis_core::Priority, T)>) -> Vec<T> {
    let mut indexed: Vec<_> = attached
        .drain(..)
        .enumerate()
        .map(|(i, (priority, provider))| Ranked {
            id: ComponentId::new(i),
            priority,
            provider,
        })
        .collect();
    indexed.sort_by_key(|r| (Reverse(r.priority), r.id));
    providers(indexed)
}

/// The router over every dispatchable resource method.
#[derive(Default)]
pub struct RuntimeModel {
    router: Router<Arc<RuntimeMethod>>,
}

impl RuntimeModel {
    /// Builds the runtime model.
    ///
    /// Methods without an endpoint and routes that clash with an earlier
    /// one are logged and left out; this only happens when validation
    /// errors were ignored.
    #[must_use]
    pub fn build(model: &ResourceModel, providers: &ProcessingProviders) -> Self {
        let app_tags = &providers.application_tags;
        let mut router = Router::new();

        for endpoint in model.runtime_endpoints() {
            if endpoint.endpoint.is_none() {
                tracing::warn!(
                    method = %endpoint.method,
                    path = %endpoint.path,
                    "skipping resource method without an endpoint"
                );
                continue;
            }

            let tags = &endpoint.name_bindings;
            let mut request_filters =
                self::providers(providers.request_filters.bound_to(tags, app_tags));
            let mut response_filters =
                self::providers(providers.response_filters.bound_to(tags, app_tags));
            let reader_interceptors =
                self::providers(providers.reader_interceptors.bound_to(tags, app_tags));
            let writer_interceptors =
                self::providers(providers.writer_interceptors.bound_to(tags, app_tags));

            let mut features = FeatureContext::default();
            for feature in &providers.dynamic_features {
                feature.configure(&endpoint, &mut features);
            }
            request_filters.extend(feature_attached(features.request_filters));
            response_filters.extend(feature_attached(features.response_filters));

            let method = endpoint.method.clone();
            let path = endpoint.path.clone();
            let runtime = Arc::new(RuntimeMethod {
                endpoint,
                request_filters,
                response_filters,
                reader_interceptors,
                writer_interceptors,
            });

            if let Err(error) = router.insert(&path, MethodRouter::new().method(method, runtime)) {
                tracing::warn!(error = %error, "route not added to the runtime model");
            }
        }

        tracing::debug!(routes = router.len(), "runtime model built");
        Self { router }
    }

    /// The router.
    #[must_use]
    pub const fn router(&self) -> &Router<Arc<RuntimeMethod>> {
        &self.router
    }

    /// Number of routable methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.router.len()
    }

    /// Returns `true` if nothing is routable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.router.is_empty()
    }
}

impl fmt::Debug for RuntimeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeModel")
            .field("routes", &self.router.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentBag, Provider};
    use crate::filter::{request_filter_fn, DynamicFeature, FilterAction};
    use http::Method;
    use std::collections::BTreeSet;
    use trellis_core::{ComponentModel, ContainerResponse, Contract, Priority};
    use trellis_model::{endpoint_fn, Outcome, Resource, ResourceMethod};

    fn method(m: Method) -> ResourceMethod {
        ResourceMethod::builder(m)
            .endpoint(endpoint_fn(|_| async {
                Ok(Outcome::from(ContainerResponse::default()))
            }))
            .build()
    }

    struct AttachOnDelete;

    impl DynamicFeature for AttachOnDelete {
        fn configure(&self, endpoint: &RuntimeEndpoint, context: &mut FeatureContext) {
            if endpoint.method == Method::DELETE {
                context.register_request_filter(
                    request_filter_fn(|_| Ok(FilterAction::Continue)),
                    Priority::USER,
                );
            }
        }
    }

    #[test]
    fn test_binds_name_bound_and_feature_filters() {
        let mut bag = ComponentBag::new();
        bag.register(
            ComponentModel::builder("admin")
                .contract(Contract::RequestFilter)
                .name_binding("Admin")
                .build(),
            Provider::new().request_filter(request_filter_fn(|_| Ok(FilterAction::Continue))),
        );
        bag.register(
            ComponentModel::builder("feature")
                .contract(Contract::DynamicFeature)
                .build(),
            Provider::new().dynamic_feature(Arc::new(AttachOnDelete)),
        );
        let providers = ProcessingProviders::from_components(&bag, BTreeSet::new());

        let model = ResourceModel::new(vec![Resource::builder("/users/{id}")
            .method(method(Method::GET))
            .method(
                ResourceMethod::builder(Method::DELETE)
                    .endpoint(endpoint_fn(|_| async {
                        Ok(Outcome::from(ContainerResponse::default()))
                    }))
                    .name_binding("Admin")
                    .build(),
            )
            .build()]);

        let runtime = RuntimeModel::build(&model, &providers);
        assert_eq!(runtime.len(), 2);

        let get = runtime.router().match_route(&Method::GET, "/users/7").unwrap();
        assert!(get.endpoint.request_filters().is_empty());
        assert_eq!(get.params.get("id"), Some("7"));

        let delete = runtime
            .router()
            .match_route(&Method::DELETE, "/users/7")
            .unwrap();
        assert_eq!(delete.endpoint.request_filters().len(), 2);
    }

    #[test]
    fn test_duplicate_routes_keep_first() {
        let model = ResourceModel::new(vec![
            Resource::builder("/a").method(method(Method::GET)).build(),
            Resource::builder("/a/").method(method(Method::GET)).build(),
            Resource::builder("/b")
                .method(ResourceMethod::builder(Method::GET).build())
                .build(),
        ]);
        let runtime = RuntimeModel::build(&model, &ProcessingProviders::default());
        assert_eq!(runtime.len(), 1);
        assert!(runtime.router().match_route(&Method::GET, "/b").is_none());
    }
}
