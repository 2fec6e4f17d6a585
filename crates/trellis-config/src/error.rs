//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Loading or validating a [`TrellisConfig`](crate::TrellisConfig) failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required file does not exist.
    #[error("no configuration at {}", path.display())]
    Missing {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {}", path.display())]
    Read {
        /// The unreadable file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema mismatch.
    #[error("malformed TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema mismatch.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Only `toml` and `json` are understood.
    #[error("unknown configuration format '{0}'")]
    UnsupportedFormat(String),

    /// A value parsed but is out of range.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable could not be converted.
    #[error("environment override {var}: {reason}")]
    Env {
        /// Full variable name, prefix included.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `.env` file exists but is malformed.
    #[error(".env: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

impl ConfigError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::Missing { path: path.into() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_locate_the_problem() {
        let err = ConfigError::missing("/etc/trellis.toml");
        assert_eq!(err.to_string(), "no configuration at /etc/trellis.toml");

        let err = ConfigError::invalid("server.default_suspend_timeout_ms", "must be > 0");
        assert_eq!(
            err.to_string(),
            "server.default_suspend_timeout_ms: must be > 0"
        );

        let err = ConfigError::env("TRELLIS__SERVER__X", "expected boolean");
        assert!(err.to_string().ends_with("expected boolean"));
    }
}
