//! Configuration schema types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server properties steering application initialization and dispatch.
///
/// # Example
///
/// ```
/// use trellis_config::ServerProperties;
///
/// let props = ServerProperties::default();
/// assert!(!props.resource_validation_ignore_errors);
/// assert_eq!(props.default_suspend_timeout().as_millis(), 30_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerProperties {
    /// Continue initialization when resource validation reports fatal issues.
    #[serde(default)]
    pub resource_validation_ignore_errors: bool,

    /// Skip resource model validation entirely.
    #[serde(default)]
    pub resource_validation_disable: bool,

    /// Skip auto-discoverable features that are not marked as forced.
    #[serde(default)]
    pub feature_auto_discovery_disable: bool,

    /// Timeout applied when a request is suspended without an explicit one.
    #[serde(default = "default_suspend_timeout_ms")]
    pub default_suspend_timeout_ms: u64,

    /// Application name used in logs.
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl ServerProperties {
    /// [`ServerProperties::default_suspend_timeout_ms`] as a duration.
    #[must_use]
    pub const fn default_suspend_timeout(&self) -> Duration {
        Duration::from_millis(self.default_suspend_timeout_ms)
    }
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self {
            resource_validation_ignore_errors: false,
            resource_validation_disable: false,
            feature_auto_discovery_disable: false,
            default_suspend_timeout_ms: default_suspend_timeout_ms(),
            application_name: default_application_name(),
        }
    }
}

fn default_suspend_timeout_ms() -> u64 {
    30_000
}

fn default_application_name() -> String {
    "trellis-application".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Install a subscriber at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `EnvFilter` directive, e.g. `"info"` or `"trellis_server=debug,info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Emit span open/close events.
    #[serde(default)]
    pub span_events: bool,

    /// Include source file and line.
    #[serde(default)]
    pub include_location: bool,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            span_events: false,
            include_location: false,
            thread_ids: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_properties_defaults_from_empty_toml() {
        let props: ServerProperties = toml::from_str("").unwrap();
        assert_eq!(props, ServerProperties::default());
        assert_eq!(props.application_name, "trellis-application");
    }

    #[test]
    fn test_log_format_serde() {
        let section: LoggingSection = toml::from_str("format = \"pretty\"").unwrap();
        assert_eq!(section.format, LogFormat::Pretty);
        assert!(section.enabled);
    }

    #[test]
    fn test_unknown_server_field_rejected() {
        let result: Result<ServerProperties, _> = toml::from_str("http_addr = \"0.0.0.0:80\"");
        assert!(result.is_err());
    }
}
