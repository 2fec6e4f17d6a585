//! Main configuration types.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LogFormat, LoggingSection, ServerProperties};

/// Complete Trellis configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use trellis_config::TrellisConfig;
///
/// let config = TrellisConfig::default();
/// assert_eq!(config.server.default_suspend_timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    /// Initialization and dispatch properties.
    #[serde(default)]
    pub server: ServerProperties,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl TrellisConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_config::{ServerProperties, TrellisConfig};
    ///
    /// let config = TrellisConfig::builder()
    ///     .server(ServerProperties {
    ///         resource_validation_ignore_errors: true,
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert!(config.server.resource_validation_ignore_errors);
    /// ```
    #[must_use]
    pub fn builder() -> TrellisConfigBuilder {
        TrellisConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - the default suspend timeout is zero
    /// - the application name is blank
    /// - the log level is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.default_suspend_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.default_suspend_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.application_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "server.application_name",
                "must not be blank",
            ));
        }

        if self.logging.enabled && self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logging.level",
                "must not be empty when logging is enabled",
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs with source locations.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config.logging.span_events = true;
        config
    }

    /// Production preset: JSON info logs.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}

/// Builder for [`TrellisConfig`].
#[derive(Debug, Default)]
pub struct TrellisConfigBuilder {
    server: Option<ServerProperties>,
    logging: Option<LoggingSection>,
}

impl TrellisConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server properties.
    #[must_use]
    pub fn server(mut self, server: ServerProperties) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> TrellisConfig {
        TrellisConfig {
            server: self.server.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<TrellisConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrellisConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.server.resource_validation_disable);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_zero_suspend_timeout() {
        let result = TrellisConfig::builder()
            .server(ServerProperties {
                default_suspend_timeout_ms: 0,
                ..Default::default()
            })
            .build_validated();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("default_suspend_timeout_ms"));
    }

    #[test]
    fn test_validate_blank_application_name() {
        let config = TrellisConfig::builder()
            .server(ServerProperties {
                application_name: "  ".to_string(),
                ..Default::default()
            })
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets() {
        let dev = TrellisConfig::development();
        assert_eq!(dev.logging.level, "debug");
        assert_eq!(dev.logging.format, LogFormat::Pretty);

        let prod = TrellisConfig::production();
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(!prod.logging.include_location);
    }

    #[test]
    fn test_toml_round_trip_sections() {
        let toml_str = r#"
            [server]
            resource_validation_ignore_errors = true
            default_suspend_timeout_ms = 500

            [logging]
            level = "warn"
        "#;

        let config: TrellisConfig = toml::from_str(toml_str).unwrap();
        assert!(config.server.resource_validation_ignore_errors);
        assert_eq!(config.server.default_suspend_timeout_ms, 500);
        assert_eq!(config.logging.level, "warn");

        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("[logging]"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<TrellisConfig, _> = toml::from_str("[metrics]\nenabled = true");
        assert!(result.is_err());
    }
}
