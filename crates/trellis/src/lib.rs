//! # Trellis
//!
//! **A staged request-processing core for HTTP services.**
//!
//! Trellis takes registered resources and middleware components, freezes
//! them into an immutable pipeline, and drives every request through it to
//! exactly one committed or failed response.
//!
//! - **Provider classification** - filters and interceptors sorted into pre-matching, global and name-bound groups
//! - **Resource models** - programmatic and introspected resources, model processors, batched validation
//! - **Staged pipeline** - references, pre-matching filters, routing, post-matching filters
//! - **Suspendable dispatch** - async responses resumed from any thread, with timeouts on a background scheduler
//! - **Lifecycle** - startup, reload and shutdown listeners with guaranteed container teardown
//!
//! ## Quick Start
//!
//! ```
//! use trellis::prelude::*;
//! use http::{Method, Uri};
//!
//! # tokio_test::block_on(async {
//! let handler = ApplicationHandler::new(
//!     Application::new().resource(
//!         Resource::builder("/hello")
//!             .method(
//!                 ResourceMethod::builder(Method::GET)
//!                     .endpoint(endpoint_fn(|_| async {
//!                         Ok(Outcome::from(ContainerResponse::ok("hello")))
//!                     }))
//!                     .build(),
//!             )
//!             .build(),
//!     ),
//! )?;
//!
//! let response = handler
//!     .apply(ContainerRequest::new(Method::GET, Uri::from_static("/hello")))
//!     .await?;
//! assert_eq!(response.status(), 200);
//! handler.shutdown()?;
//! # Ok::<(), anyhow::Error>(())
//! # }).unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → References → PreMatchingFilters → Routing → PostMatchingFilters → Endpoint
//!                                                                                ↓
//! Response ← WriterInterceptors ← ResponseFilters ←──────────────── (or Suspend → resume / timeout)
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trellis_core as core;

// Re-export routing
pub use trellis_router as router;

// Re-export the resource model
pub use trellis_model as model;

// Re-export providers and the pipeline
pub use trellis_middleware as middleware;

// Re-export dispatch and lifecycle
pub use trellis_server as server;

// Re-export configuration
pub use trellis_config as config;

// Re-export logging and metrics
pub use trellis_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use trellis_core::{
        AsyncResponse, AsyncState, BindingTag, ComponentModel, ContainerRequest,
        ContainerResponse, Contract, Priority, RequestId, SecurityContext, TrellisError,
        TrellisResult,
    };

    // Re-export DI types
    pub use trellis_core::di::{Container, Managed};

    // Re-export the resource model
    pub use trellis_model::{
        endpoint_fn, Endpoint, Handler, Invocation, ModelProcessor, Outcome, Parameter, Resource,
        ResourceMethod, ResourceModel, ResourceType, Suspend,
    };

    // Re-export providers
    pub use trellis_middleware::{
        request_filter_fn, response_filter_fn, DynamicFeature, FeatureContext, FilterAction,
        Provider, ReaderInterceptor, RequestFilter, ResponseFilter, WriterInterceptor,
    };

    // Re-export the application surface
    pub use trellis_server::{
        Application, ApplicationEvent, ApplicationEventListener, ApplicationHandler,
        AutoDiscoverable, Configurable, ContainerLifecycleListener, Feature, ResponseWriter,
    };

    // Re-export configuration
    pub use trellis_config::{ConfigLoader, TrellisConfig};
}
