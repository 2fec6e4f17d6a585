//! Layered configuration loader.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, TrellisConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file or string (TOML or JSON)
/// 3. Environment variables `PREFIX__SECTION__KEY`
///
/// # Example
///
/// ```no_run
/// use trellis_config::ConfigLoader;
///
/// # fn main() -> Result<(), trellis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()?
///     .with_optional_file("trellis.toml")?
///     .with_env_prefix("TRELLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TrellisConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TrellisConfig::default(),
            env_prefix: None,
        }
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TrellisConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TrellisConfig::production();
        self
    }

    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has an
    /// unsupported extension, or fails to parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::missing(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = Self::parse(&content, &format)?;
        Ok(self)
    }

    /// Like [`ConfigLoader::with_file`] but a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `"toml"` or `"json"` format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_str("[server]\nresource_validation_disable = true", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.server.resource_validation_disable);
    /// ```
    pub fn with_str(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = Self::parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Read overrides from variables named `PREFIX__SECTION__KEY`, e.g.
    /// `TRELLIS__SERVER__DEFAULT_SUSPEND_TIMEOUT_MS=5000`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load variables from a `.env` file in the working directory, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation
    /// fails.
    pub fn load(mut self) -> Result<TrellisConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    fn parse(content: &str, format: &str) -> Result<TrellisConfig, ConfigError> {
        match format {
            "toml" => Ok(toml::from_str(content)?),
            "json" => Ok(serde_json::from_str(content)?),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let flag = || parse_bool(value).ok_or_else(|| ConfigError::env(key, "expected boolean"));

        match parts.as_slice() {
            ["SERVER", "RESOURCE_VALIDATION_IGNORE_ERRORS"] => {
                self.config.server.resource_validation_ignore_errors = flag()?;
            }
            ["SERVER", "RESOURCE_VALIDATION_DISABLE"] => {
                self.config.server.resource_validation_disable = flag()?;
            }
            ["SERVER", "FEATURE_AUTO_DISCOVERY_DISABLE"] => {
                self.config.server.feature_auto_discovery_disable = flag()?;
            }
            ["SERVER", "DEFAULT_SUSPEND_TIMEOUT_MS"] => {
                self.config.server.default_suspend_timeout_ms = value
                    .parse()
                    .map_err(|_| ConfigError::env(key, "expected integer"))?;
            }
            ["SERVER", "APPLICATION_NAME"] => {
                self.config.server.application_name = value.to_string();
            }
            ["LOGGING", "ENABLED"] => self.config.logging.enabled = flag()?,
            ["LOGGING", "LEVEL"] => self.config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "SPAN_EVENTS"] => self.config.logging.span_events = flag()?,
            ["LOGGING", "INCLUDE_LOCATION"] => self.config.logging.include_location = flag()?,
            ["LOGGING", "THREAD_IDS"] => self.config.logging.thread_ids = flag()?,
            _ => {}
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
