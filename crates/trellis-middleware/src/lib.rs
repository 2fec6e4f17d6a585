//! # Trellis Middleware
//!
//! Provider classification and the staged request pipeline.
//!
//! Providers (request and response filters, reader and writer interceptors,
//! dynamic features) are registered as components in a [`ComponentBag`].
//! [`ProcessingProviders::from_components`] classifies them per contract into
//! pre-matching, global and name-bound groups. [`assemble`] freezes them
//! together with a resource model into a [`Pipeline`].
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → References → PreMatchingFilters → Routing → PostMatchingFilters → Endpoint
//!                                                                                ↓
//! Response ← WriterInterceptors ← ResponseFilters (name-bound, then global) ←───┘
//! ```
//!
//! | Stage | Name                    | Purpose                                      |
//! |-------|-------------------------|----------------------------------------------|
//! | 1     | `references`            | Install the default security context         |
//! | 2     | `pre_matching_filters`  | Filters that run before routing              |
//! | 3     | `routing`               | Select the resource method (404 / 405)       |
//! | 4     | `post_matching_filters` | Global, then name-bound filters              |
//!
//! Any stage may end processing with a terminal response. Response filters
//! and writer interceptors still run on it.
//!
//! ## Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use http::{Method, Uri};
//! use trellis_core::di::Container;
//! use trellis_core::{ContainerRequest, ContainerResponse};
//! use trellis_middleware::{assemble, ComponentBag, Dispatch, ProcessingProviders, RequestProcessingContext};
//! use trellis_model::{endpoint_fn, Outcome, Resource, ResourceMethod, ResourceModel};
//!
//! # tokio_test::block_on(async {
//! let hello = ResourceMethod::builder(Method::GET)
//!     .endpoint(endpoint_fn(|_| async { Ok(Outcome::from(ContainerResponse::ok("hi"))) }))
//!     .build();
//! let model = ResourceModel::new(vec![Resource::builder("/hello").method(hello).build()]);
//! let providers = ProcessingProviders::from_components(&ComponentBag::new(), BTreeSet::new());
//! let pipeline = assemble(&model, &providers, Arc::new(Container::new()));
//!
//! let mut ctx = RequestProcessingContext::new(
//!     ContainerRequest::new(Method::GET, Uri::from_static("/hello")),
//! );
//! let Dispatch::Response(response) = pipeline.apply(&mut ctx).await.unwrap() else {
//!     unreachable!()
//! };
//! assert_eq!(response.status(), 200);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod classify;
mod component;
mod context;
mod filter;
mod pipeline;
mod runtime;
mod stage;
pub mod stages;

pub use classify::{classify, Classified, ProcessingProviders, Ranked};
pub use component::{Component, ComponentBag, Provider};
pub use context::{MatchedRoute, RequestProcessingContext};
pub use filter::{
    request_filter_fn, response_filter_fn, AsyncRequestFilter, DynamicFeature, FeatureContext,
    FilterAction, FnRequestFilter, FnResponseFilter, ReaderInterceptor, RequestFilter,
    ResponseFilter, WriterInterceptor,
};
pub use pipeline::{assemble, Dispatch, Pipeline};
pub use runtime::{RuntimeMethod, RuntimeModel};
pub use stage::{ChainBuilder, ComposedStage, Continuation, Stage, Stages};
