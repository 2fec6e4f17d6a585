//! Typed configuration for Trellis.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! resource_validation_ignore_errors = false
//! resource_validation_disable = false
//! feature_auto_discovery_disable = false
//! default_suspend_timeout_ms = 30000
//! application_name = "orders"
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every value can be overridden as `PREFIX__SECTION__KEY`:
//!
//! - `TRELLIS__SERVER__RESOURCE_VALIDATION_DISABLE=true`
//! - `TRELLIS__SERVER__DEFAULT_SUSPEND_TIMEOUT_MS=5000`
//! - `TRELLIS__LOGGING__FORMAT=pretty`

#![doc(html_root_url = "https://docs.rs/trellis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{TrellisConfig, TrellisConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingSection, ServerProperties};
