//! Server error types.

use thiserror::Error;
use trellis_config::ConfigError;
use trellis_model::ModelError;

/// Application initialization failed; the application never becomes ready.
#[derive(Error, Debug)]
pub enum InitError {
    /// The resource model could not be built.
    #[error("resource model: {0}")]
    Model(#[from] ModelError),

    /// The configuration is invalid.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// A feature failed to configure the application.
    #[error("feature '{feature}' failed: {message}")]
    Feature {
        /// Feature name.
        feature: String,
        /// What went wrong.
        message: String,
    },

    /// The background scheduler could not start.
    #[error("background scheduler: {0}")]
    Scheduler(#[source] std::io::Error),

    /// A startup listener failed.
    #[error("startup: {0}")]
    Startup(#[from] LifecycleError),
}

/// Misuse of the response writer boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The exchange is not suspended.
    #[error("response is not suspended")]
    NotSuspended,

    /// The background scheduler no longer accepts work.
    #[error("background scheduler is shut down")]
    SchedulerShutDown,

    /// The response was already committed or failed.
    #[error("response already completed")]
    AlreadyCompleted,
}

/// A lifecycle listener or teardown step failed.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A listener returned an error.
    #[error("listener '{listener}' failed during {phase}: {source}")]
    Listener {
        /// Listener name.
        listener: String,
        /// `startup`, `reload` or `shutdown`.
        phase: &'static str,
        /// Underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// A listener panicked.
    #[error("listener '{listener}' panicked during {phase}")]
    Panicked {
        /// Listener name.
        listener: String,
        /// `startup`, `reload` or `shutdown`.
        phase: &'static str,
    },

    /// A container pre-destroy hook failed.
    #[error("container teardown: {0}")]
    Teardown(#[from] trellis_core::di::TeardownError),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;
