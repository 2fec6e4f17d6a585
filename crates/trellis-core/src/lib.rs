//! # Trellis Core
//!
//! Core types shared by every Trellis crate.
//!
//! - [`TrellisError`] - Error taxonomy with HTTP status mapping and JSON envelopes
//! - [`ComponentModel`] - Declared contracts, priorities and binding tags of a provider
//! - [`ContainerRequest`] / [`ContainerResponse`] - Transport-neutral request and response
//! - [`SecurityContext`] - Security information attached to a request
//! - [`di::Container`] - Type-keyed service container with factories and teardown hooks
//! - [`AsyncResponse`] - Handle for resuming a suspended exchange from any thread
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod component;
mod context;
pub mod di;
mod error;
mod message;
mod security;
mod suspend;
mod types;

pub use component::{BindingTag, ComponentId, ComponentModel, Contract, ContractSet, Priority};
pub use context::RequestId;
pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, TrellisError, TrellisResult};
pub use message::{ContainerRequest, ContainerResponse};
pub use security::{DefaultSecurityContext, SecurityContext};
pub use suspend::{AsyncExchange, AsyncResponse, AsyncState, TimeoutHandler};
pub use types::{BoxFuture, OutputStream};
