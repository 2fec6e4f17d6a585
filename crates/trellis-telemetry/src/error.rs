//! Telemetry error types.

use thiserror::Error;

/// A logging or metrics backend could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder was rejected, usually because another
    /// recorder is already installed.
    #[error("metrics recorder: {0}")]
    MetricsInit(String),

    /// The subscriber or its filter could not be installed.
    #[error("logging subscriber: {0}")]
    LoggingInit(String),

    /// The exporter listen address is not a socket address.
    #[error("'{0}' is not a socket address")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_backend() {
        let err = TelemetryError::MetricsInit("already installed".to_string());
        assert_eq!(err.to_string(), "metrics recorder: already installed");

        let err = TelemetryError::InvalidAddress("nowhere".to_string());
        assert_eq!(err.to_string(), "'nowhere' is not a socket address");
    }
}
