//! Observability for Trellis.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: dispatch counters and latency histogram via the `metrics`
//!   facade, with an optional Prometheus exporter
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_telemetry::{init_logging, install_prometheus_recorder, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! install_prometheus_recorder("0.0.0.0:9090")?;
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::install_prometheus_recorder;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
