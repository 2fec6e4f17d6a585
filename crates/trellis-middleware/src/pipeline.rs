//! Pipeline assembly and request application.
//!
//! [`assemble`] freezes a resource model and its classified providers into a
//! [`Pipeline`]: the four-link stage chain
//!
//! ```text
//! references ─► pre_matching_filters ─► routing ─► post_matching_filters
//! ```
//!
//! followed by endpoint invocation and the response side (response filters,
//! then writer interceptors). The pipeline is immutable and shared by every
//! request; per-request state lives in the [`RequestProcessingContext`].

use crate::classify::{ProcessingProviders, Ranked};
use crate::context::RequestProcessingContext;
use crate::filter::{ReaderInterceptor, ResponseFilter, WriterInterceptor};
use crate::runtime::RuntimeModel;
use crate::stage::{ComposedStage, Continuation, Stage, Stages};
use crate::stages::{error_response, FilteringStage, ReferencesInitializer, RoutingStage};
use std::fmt;
use std::sync::Arc;
use trellis_core::di::Container;
use trellis_core::{ContainerResponse, TrellisError, TrellisResult};
use trellis_model::{Invocation, Outcome, ParameterSource, ResourceModel, Suspend};

/// How a request left the pipeline.
#[derive(Debug)]
pub enum Dispatch {
    /// A final response, already filtered and intercepted.
    Response(ContainerResponse),
    /// The endpoint suspended the exchange. Its eventual response must be
    /// passed through [`Pipeline::respond`].
    Suspended(Suspend),
}

/// The assembled, immutable request pipeline.
#[derive(Clone)]
pub struct Pipeline {
    chain: ComposedStage,
    runtime: Arc<RuntimeModel>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    reader_interceptors: Vec<Arc<dyn ReaderInterceptor>>,
    writer_interceptors: Vec<Arc<dyn WriterInterceptor>>,
    container: Arc<Container>,
}

fn unranked<T>(ranked: &[Ranked<T>]) -> Vec<T>
where
    T: Clone,
{
    ranked.iter().map(|r| r.provider.clone()).collect()
}

/// Assembles the pipeline for `model`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_core::di::Container;
/// use trellis_middleware::{assemble, ProcessingProviders};
/// use trellis_model::ResourceModel;
///
/// let pipeline = assemble(
///     &ResourceModel::default(),
///     &ProcessingProviders::default(),
///     Arc::new(Container::new()),
/// );
/// assert_eq!(
///     pipeline.stage_names(),
///     vec!["references", "pre_matching_filters", "routing", "post_matching_filters"]
/// );
/// ```
#[must_use]
pub fn assemble(
    model: &ResourceModel,
    providers: &ProcessingProviders,
    container: Arc<Container>,
) -> Pipeline {
    let runtime = Arc::new(RuntimeModel::build(model, providers));
    let request_filters = &providers.request_filters;

    let chain = Stages::chain(ReferencesInitializer)
        .to(FilteringStage::pre_matching(unranked(
            &request_filters.pre_matching,
        )))
        .to(RoutingStage::new(Arc::clone(&runtime)))
        .to(FilteringStage::post_matching(unranked(&request_filters.global)))
        .build();

    tracing::debug!(
        stages = ?chain.stage_names(),
        routes = runtime.len(),
        "pipeline assembled"
    );

    Pipeline {
        chain,
        runtime,
        response_filters: unranked(&providers.response_filters.global),
        reader_interceptors: unranked(&providers.reader_interceptors.global),
        writer_interceptors: unranked(&providers.writer_interceptors.global),
        container,
    }
}

impl Pipeline {
    /// Names of the chained stages, in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.chain.stage_names()
    }

    /// The routable runtime model.
    #[must_use]
    pub fn runtime_model(&self) -> &RuntimeModel {
        &self.runtime
    }

    /// Drives a request through the chain and the matched endpoint.
    ///
    /// # Errors
    ///
    /// Returns the error when a stage, filter or endpoint fails with an
    /// error that has no response representation. Mappable errors are
    /// answered with their error response instead.
    pub async fn apply(&self, ctx: &mut RequestProcessingContext) -> TrellisResult<Dispatch> {
        if let Continuation::Terminal(response) = self.chain.apply(ctx).await? {
            return self.respond(ctx, Ok(response)).await.map(Dispatch::Response);
        }

        let Some(matched) = ctx.matched().cloned() else {
            return Err(TrellisError::internal("request left routing without a match"));
        };
        let endpoint = matched.method.endpoint();
        let Some(target) = endpoint.endpoint.clone() else {
            return Err(TrellisError::internal(format!(
                "resource method {} {} has no endpoint",
                endpoint.method, endpoint.path
            )));
        };

        if let Err(error) = self.read_entity(ctx, matched.method.reader_interceptors()) {
            return self.respond(ctx, Err(error)).await.map(Dispatch::Response);
        }

        let mut invocation = Invocation::new(ctx.request().clone(), matched.params.clone());
        if let Some(handler) = &endpoint.handler {
            invocation = invocation.with_handler(handler.resolve(&self.container));
        }
        for parameter in &endpoint.parameters {
            if let ParameterSource::Bean { type_id, type_name } = parameter.source() {
                let Some(bean) = self.container.instance_of(type_id) else {
                    return Err(TrellisError::internal(format!(
                        "no bean of type {type_name} is registered"
                    )));
                };
                invocation = invocation.with_bean(type_id, bean);
            }
        }

        tracing::trace!(
            request_id = %ctx.request_id(),
            resource = %endpoint.resource_name,
            "invoking endpoint"
        );
        match target.invoke(invocation).await {
            Ok(Outcome::Response(response)) => {
                self.respond(ctx, Ok(response)).await.map(Dispatch::Response)
            }
            Ok(Outcome::Suspend(suspend)) => Ok(Dispatch::Suspended(suspend)),
            Err(error) => self.respond(ctx, Err(error)).await.map(Dispatch::Response),
        }
    }

    /// Runs the response side for `result`.
    ///
    /// Errors are mapped to error responses first. Response filters run
    /// name-bound first, then global; a filter failing with a mappable
    /// error replaces the response and skips the remaining filters. Writer
    /// interceptors then transform the entity.
    ///
    /// # Errors
    ///
    /// Returns errors that have no response representation.
    pub async fn respond(
        &self,
        ctx: &RequestProcessingContext,
        result: TrellisResult<ContainerResponse>,
    ) -> TrellisResult<ContainerResponse> {
        let mut response = match result {
            Ok(response) => response,
            Err(error) => error_response(ctx, error)?,
        };

        let matched = ctx.matched().map(|m| Arc::clone(&m.method));
        let bound_filters = matched.as_deref().map_or(&[][..], |m| m.response_filters());
        for filter in bound_filters.iter().chain(&self.response_filters) {
            if let Err(error) = filter.filter(ctx, &mut response).await {
                response = error_response(ctx, error)?;
                break;
            }
        }

        let bound_writers = matched.as_deref().map_or(&[][..], |m| m.writer_interceptors());
        if let Some(mut entity) = response.take_entity() {
            for interceptor in self.writer_interceptors.iter().chain(bound_writers) {
                match interceptor.around_write(entity, response.headers_mut()) {
                    Ok(written) => entity = written,
                    Err(error) => return error_response(ctx, error),
                }
            }
            response.set_entity(Some(entity));
        }

        Ok(response)
    }

    fn read_entity(
        &self,
        ctx: &mut RequestProcessingContext,
        bound: &[Arc<dyn ReaderInterceptor>],
    ) -> TrellisResult<()> {
        if self.reader_interceptors.is_empty() && bound.is_empty() {
            return Ok(());
        }
        let mut entity = ctx.request().entity().clone();
        for interceptor in self.reader_interceptors.iter().chain(bound) {
            entity = interceptor.around_read(entity, ctx.request().headers())?;
        }
        ctx.request_mut().set_entity(entity);
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.chain.stage_names())
            .field("routes", &self.runtime.len())
            .field("response_filters", &self.response_filters.len())
            .field("reader_interceptors", &self.reader_interceptors.len())
            .field("writer_interceptors", &self.writer_interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentBag, Provider};
    use crate::filter::response_filter_fn;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
    use std::collections::BTreeSet;
    use trellis_core::{ComponentModel, ContainerRequest, Contract};
    use trellis_model::{endpoint_fn, Resource, ResourceMethod};

    struct Upper;

    impl ReaderInterceptor for Upper {
        fn around_read(&self, entity: Bytes, _headers: &HeaderMap) -> TrellisResult<Bytes> {
            Ok(Bytes::from(entity.to_ascii_uppercase()))
        }
    }

    struct Tagged;

    impl WriterInterceptor for Tagged {
        fn around_write(&self, entity: Bytes, headers: &mut HeaderMap) -> TrellisResult<Bytes> {
            headers.insert("x-written", HeaderValue::from_static("yes"));
            Ok(entity)
        }
    }

    fn echo_model() -> ResourceModel {
        let post = ResourceMethod::builder(Method::POST)
            .endpoint(endpoint_fn(|inv| async move {
                Ok(Outcome::from(ContainerResponse::ok(inv.entity().clone())))
            }))
            .build();
        ResourceModel::new(vec![Resource::builder("/echo").method(post).build()])
    }

    fn providers() -> ProcessingProviders {
        let mut bag = ComponentBag::new();
        bag.register(
            ComponentModel::builder("upper")
                .contract(Contract::ReaderInterceptor)
                .build(),
            Provider::new().reader_interceptor(Arc::new(Upper)),
        );
        bag.register(
            ComponentModel::builder("tagged")
                .contract(Contract::WriterInterceptor)
                .build(),
            Provider::new().writer_interceptor(Arc::new(Tagged)),
        );
        bag.register(
            ComponentModel::builder("stamp")
                .contract(Contract::ResponseFilter)
                .build(),
            Provider::new().response_filter(response_filter_fn(|_, response| {
                response
                    .headers_mut()
                    .insert("x-filtered", HeaderValue::from_static("yes"));
                Ok(())
            })),
        );
        ProcessingProviders::from_components(&bag, BTreeSet::new())
    }

    #[tokio::test]
    async fn test_interceptors_and_response_filters_run() {
        let pipeline = assemble(&echo_model(), &providers(), Arc::new(Container::new()));
        let request = ContainerRequest::new(Method::POST, Uri::from_static("/echo"))
            .with_entity("hello");
        let mut ctx = RequestProcessingContext::new(request);

        let Dispatch::Response(response) = pipeline.apply(&mut ctx).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.entity().unwrap(), &Bytes::from_static(b"HELLO"));
        assert_eq!(response.headers()["x-written"], "yes");
        assert_eq!(response.headers()["x-filtered"], "yes");
    }

    #[tokio::test]
    async fn test_not_found_still_runs_global_response_filters() {
        let pipeline = assemble(&echo_model(), &providers(), Arc::new(Container::new()));
        let mut ctx = RequestProcessingContext::new(ContainerRequest::new(
            Method::GET,
            Uri::from_static("/missing"),
        ));
        let Dispatch::Response(response) = pipeline.apply(&mut ctx).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-filtered"], "yes");
    }

    #[tokio::test]
    async fn test_internal_endpoint_error_propagates() {
        let get = ResourceMethod::builder(Method::GET)
            .endpoint(endpoint_fn(|_| async {
                Err::<Outcome, _>(TrellisError::internal("database gone"))
            }))
            .build();
        let model = ResourceModel::new(vec![Resource::builder("/fail").method(get).build()]);
        let pipeline = assemble(&model, &ProcessingProviders::default(), Arc::new(Container::new()));
        let mut ctx = RequestProcessingContext::new(ContainerRequest::new(
            Method::GET,
            Uri::from_static("/fail"),
        ));
        assert!(pipeline.apply(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_bean_is_internal_error() {
        struct Clock;
        let get = ResourceMethod::builder(Method::GET)
            .endpoint(endpoint_fn(|_| async {
                Ok(Outcome::from(ContainerResponse::default()))
            }))
            .parameter(trellis_model::Parameter::bean::<Clock>())
            .build();
        let model = ResourceModel::new(vec![Resource::builder("/time").method(get).build()]);
        let pipeline = assemble(&model, &ProcessingProviders::default(), Arc::new(Container::new()));
        let mut ctx = RequestProcessingContext::new(ContainerRequest::new(
            Method::GET,
            Uri::from_static("/time"),
        ));
        let error = pipeline.apply(&mut ctx).await.unwrap_err();
        assert!(!error.is_mappable());
    }
}
