//! # Trellis Model
//!
//! The resource model: what an application serves, at which paths, and with
//! which handlers.
//!
//! ```text
//! register_programmatic ─┐
//! register_class ────────┼─► ResourceBag ─► ModelProcessors ─► ModelValidator ─► ResourceModel
//! register_instance ─────┘     (merged)       (rank order)       (all issues)       (frozen)
//! ```
//!
//! - [`ResourceBag`] collects programmatic resources, introspected classes and
//!   instances, collapsing duplicate registrations and merging roots that
//!   share a path template.
//! - [`ModelProcessor`]s transform the model in rank order.
//! - [`ModelValidator`] reports every structural problem at once.
//! - [`ResourceModelBuilder`] ties these together and honours the
//!   validation overrides of [`trellis_config::ServerProperties`].
//! - [`ResourceModel::runtime_endpoints`] flattens the model for routing.

#![doc(html_root_url = "https://docs.rs/trellis-model/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bag;
mod builder;
mod endpoint;
mod error;
pub mod handler;
mod model;
mod parameter;
mod processor;
mod resource;
pub mod validation;

pub use bag::{ResourceBag, ResourceBagBuilder};
pub use builder::ResourceModelBuilder;
pub use endpoint::{endpoint_fn, Endpoint, FnEndpoint, Invocation, Outcome, Suspend};
pub use error::{ModelError, ModelValidationError};
pub use handler::Handler;
pub use model::{ResourceModel, RuntimeEndpoint};
pub use parameter::{Parameter, ParameterSource};
pub use processor::ModelProcessor;
pub use resource::{Resource, ResourceBuilder, ResourceMethod, ResourceMethodBuilder, ResourceType};
pub use validation::{ModelValidator, Severity, ValidationIssue};
