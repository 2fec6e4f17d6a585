//! Application events.

use std::fmt;
use trellis_model::ResourceModel;

/// A milestone in the application's life.
#[derive(Clone, Copy)]
pub enum ApplicationEvent<'a> {
    /// Initialization began; nothing is configured yet.
    InitializationStart,
    /// The model and pipeline are frozen and the application is ready.
    InitializationAppFinished(&'a ResourceModel),
    /// The application was shut down and its container torn down.
    DestroyFinished,
}

impl ApplicationEvent<'_> {
    /// Short event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitializationStart => "initialization_start",
            Self::InitializationAppFinished(_) => "initialization_app_finished",
            Self::DestroyFinished => "destroy_finished",
        }
    }
}

impl fmt::Debug for ApplicationEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationAppFinished(model) => f
                .debug_tuple("InitializationAppFinished")
                .field(&model.root_resources().len())
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Observes [`ApplicationEvent`]s.
///
/// ```
/// use trellis_server::{ApplicationEvent, ApplicationEventListener};
///
/// struct Ready;
///
/// impl ApplicationEventListener for Ready {
///     fn on_event(&self, event: &ApplicationEvent<'_>) {
///         if let ApplicationEvent::InitializationAppFinished(model) = event {
///             println!("{} root resources", model.root_resources().len());
///         }
///     }
/// }
/// ```
pub trait ApplicationEventListener: Send + Sync {
    /// Called once per event, in registration order.
    fn on_event(&self, event: &ApplicationEvent<'_>);
}

impl<F> ApplicationEventListener for F
where
    F: Fn(&ApplicationEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ApplicationEvent<'_>) {
        self(event);
    }
}
