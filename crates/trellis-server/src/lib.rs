//! # Trellis Server
//!
//! Request dispatch, suspension and application lifecycle.
//!
//! - [`ApplicationHandler`] - Locks an [`Application`], builds its model and pipeline, serves requests
//! - [`ServerRuntime`] - Drives one request to exactly one `commit` or `failure`
//! - [`ResponseWriter`] - The six operations the runtime needs from a transport
//! - [`FutureResponseWriter`] - A writer completing a [`ResponseFuture`]
//! - [`RequestTimeoutHandler`] / [`BackgroundScheduler`] - Suspend timers on a dedicated thread
//! - [`LifecycleAggregator`] - Startup, reload and shutdown fan-out with container teardown
//!
//! ## Suspension
//!
//! An endpoint may return a [`Suspend`](trellis_model::Suspend) instead of a
//! response. The runtime hands out an [`AsyncResponse`](trellis_core::AsyncResponse)
//! that can be resumed from any thread. If nothing resumes it before the
//! timeout, the timeout handler runs; if that neither resumes nor re-arms,
//! the request fails with a timeout error.
//!
//! ## Example
//!
//! ```
//! use http::{Method, Uri};
//! use trellis_core::{ContainerRequest, ContainerResponse};
//! use trellis_model::{endpoint_fn, Outcome, Resource, ResourceMethod};
//! use trellis_server::{Application, ApplicationHandler};
//!
//! # tokio_test::block_on(async {
//! let handler = ApplicationHandler::new(
//!     Application::new().resource(
//!         Resource::builder("/hello")
//!             .method(
//!                 ResourceMethod::builder(Method::GET)
//!                     .endpoint(endpoint_fn(|_| async {
//!                         Ok(Outcome::from(ContainerResponse::ok("hi")))
//!                     }))
//!                     .build(),
//!             )
//!             .build(),
//!     ),
//! )
//! .unwrap();
//!
//! let response = handler
//!     .apply(ContainerRequest::new(Method::GET, Uri::from_static("/hello")))
//!     .await
//!     .unwrap();
//! assert_eq!(response.status(), 200);
//! handler.shutdown().unwrap();
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod application;
mod error;
mod event;
mod handler;
mod lifecycle;
mod runtime;
pub mod testing;
mod timeout;
mod writer;

pub use application::{Application, AutoDiscoverable, Configurable, Feature};
pub use error::{DispatchError, InitError, LifecycleError, LifecycleResult};
pub use event::{ApplicationEvent, ApplicationEventListener};
pub use handler::ApplicationHandler;
pub use lifecycle::{ContainerLifecycleListener, LifecycleAggregator};
pub use runtime::ServerRuntime;
pub use timeout::{BackgroundScheduler, RequestTimeoutHandler, ScheduledTask, TimeoutCallback};
pub use writer::{FutureResponseWriter, NullOutput, ResponseFuture, ResponseWriter};
