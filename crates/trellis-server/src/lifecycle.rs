//! Container lifecycle notifications.
//!
//! # Execution Order
//!
//! - **Startup / reload**: listeners run in registration order; the first
//!   failure stops the fan-out.
//! - **Shutdown**: every listener runs in registration order, then the
//!   container's pre-destroy hooks, then the container itself is shut down.
//!   All three steps run even if an earlier one fails; the first failure is
//!   reported.

use crate::error::{LifecycleError, LifecycleResult};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use trellis_core::di::Container;

/// Receives container lifecycle notifications.
///
/// # Example
///
/// ```
/// use trellis_core::di::Container;
/// use trellis_server::ContainerLifecycleListener;
///
/// struct Warmup;
///
/// impl ContainerLifecycleListener for Warmup {
///     fn name(&self) -> &str {
///         "warmup"
///     }
///
///     fn on_startup(&self, _container: &Container) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait ContainerLifecycleListener: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The application started.
    fn on_startup(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(())
    }

    /// The application was reloaded.
    fn on_reload(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(())
    }

    /// The application is shutting down. Shared resources are still alive.
    fn on_shutdown(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Startup,
    Reload,
    Shutdown,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Reload => "reload",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Fans lifecycle notifications out to a flat, ordered list of listeners.
#[derive(Default, Clone)]
pub struct LifecycleAggregator {
    listeners: Vec<Arc<dyn ContainerLifecycleListener>>,
}

impl LifecycleAggregator {
    /// Creates an aggregator with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener.
    pub fn add(&mut self, listener: Arc<dyn ContainerLifecycleListener>) {
        self.listeners.push(listener);
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notifies every listener that the application started.
    ///
    /// # Errors
    ///
    /// The first listener failure; later listeners are not notified.
    pub fn on_startup(&self, container: &Container) -> LifecycleResult {
        self.listeners
            .iter()
            .try_for_each(|listener| notify(listener.as_ref(), Phase::Startup, container))
    }

    /// Notifies every listener that the application was reloaded.
    ///
    /// # Errors
    ///
    /// The first listener failure; later listeners are not notified.
    pub fn on_reload(&self, container: &Container) -> LifecycleResult {
        self.listeners
            .iter()
            .try_for_each(|listener| notify(listener.as_ref(), Phase::Reload, container))
    }

    /// Notifies every listener, then tears the container down.
    ///
    /// # Errors
    ///
    /// The first failure among the listeners and the pre-destroy hooks.
    pub fn on_shutdown(&self, container: &Container) -> LifecycleResult {
        let mut first: Option<LifecycleError> = None;
        for listener in &self.listeners {
            if let Err(error) = notify(listener.as_ref(), Phase::Shutdown, container) {
                first.get_or_insert(error);
            }
        }

        if let Err(error) = container.pre_destroy() {
            tracing::error!(error = %error, "pre-destroy hook failed");
            first.get_or_insert(error.into());
        }

        container.shutdown();
        tracing::debug!(listeners = self.listeners.len(), "container shut down");
        first.map_or(Ok(()), Err)
    }
}

fn notify(
    listener: &dyn ContainerLifecycleListener,
    phase: Phase,
    container: &Container,
) -> LifecycleResult {
    tracing::debug!(listener = listener.name(), phase = phase.as_str(), "notifying lifecycle listener");
    let outcome = catch_unwind(AssertUnwindSafe(|| match phase {
        Phase::Startup => listener.on_startup(container),
        Phase::Reload => listener.on_reload(container),
        Phase::Shutdown => listener.on_shutdown(container),
    }));
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => {
            tracing::error!(
                listener = listener.name(),
                phase = phase.as_str(),
                error = %source,
                "lifecycle listener failed"
            );
            Err(LifecycleError::Listener {
                listener: listener.name().to_string(),
                phase: phase.as_str(),
                source,
            })
        }
        Err(_) => {
            tracing::error!(
                listener = listener.name(),
                phase = phase.as_str(),
                "lifecycle listener panicked"
            );
            Err(LifecycleError::Panicked {
                listener: listener.name().to_string(),
                phase: phase.as_str(),
            })
        }
    }
}

impl fmt::Debug for LifecycleAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleAggregator")
            .field(
                "listeners",
                &self.listeners.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use trellis_core::di::Managed;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        journal: Journal,
        fail_on: Option<&'static str>,
        panic_on_shutdown: bool,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                name,
                journal: Arc::clone(journal),
                fail_on: None,
                panic_on_shutdown: false,
            })
        }

        fn failing(name: &'static str, journal: &Journal, phase: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                journal: Arc::clone(journal),
                fail_on: Some(phase),
                panic_on_shutdown: false,
            })
        }

        fn record(&self, phase: &'static str) -> anyhow::Result<()> {
            self.journal.lock().push(format!("{}:{phase}", self.name));
            if self.fail_on == Some(phase) {
                anyhow::bail!("{} refused {phase}", self.name);
            }
            Ok(())
        }
    }

    impl ContainerLifecycleListener for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn on_startup(&self, _container: &Container) -> anyhow::Result<()> {
            self.record("startup")
        }

        fn on_reload(&self, _container: &Container) -> anyhow::Result<()> {
            self.record("reload")
        }

        fn on_shutdown(&self, _container: &Container) -> anyhow::Result<()> {
            assert!(!self.panic_on_shutdown, "listener exploded");
            self.record("shutdown")
        }
    }

    struct Pool(Journal);

    impl Managed for Pool {
        fn name(&self) -> &str {
            "pool"
        }

        fn shutdown(&self) {
            self.0.lock().push("pool:released".to_string());
        }
    }

    fn container(journal: &Journal, failing_hook: bool) -> Container {
        let mut container = Container::new();
        let hooks = Arc::clone(journal);
        container.on_pre_destroy("flush", move || {
            hooks.lock().push("pre_destroy".to_string());
            if failing_hook {
                anyhow::bail!("flush failed");
            }
            Ok(())
        });
        container.manage(Arc::new(Pool(Arc::clone(journal))));
        container
    }

    #[test]
    fn test_startup_runs_in_registration_order() {
        let journal = Journal::default();
        let mut lifecycle = LifecycleAggregator::new();
        lifecycle.add(Recorder::new("a", &journal));
        lifecycle.add(Recorder::new("b", &journal));

        lifecycle.on_startup(&Container::new()).unwrap();
        lifecycle.on_reload(&Container::new()).unwrap();
        assert_eq!(
            *journal.lock(),
            vec!["a:startup", "b:startup", "a:reload", "b:reload"]
        );
    }

    #[test]
    fn test_startup_stops_on_first_failure() {
        let journal = Journal::default();
        let mut lifecycle = LifecycleAggregator::new();
        lifecycle.add(Recorder::failing("a", &journal, "startup"));
        lifecycle.add(Recorder::new("b", &journal));

        let error = lifecycle.on_startup(&Container::new()).unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::Listener { ref listener, phase: "startup", .. } if listener == "a"
        ));
        assert_eq!(*journal.lock(), vec!["a:startup"]);
    }

    #[test]
    fn test_shutdown_runs_every_step_and_reports_first_failure() {
        let journal = Journal::default();
        let container = container(&journal, true);
        let mut lifecycle = LifecycleAggregator::new();
        lifecycle.add(Recorder::failing("a", &journal, "shutdown"));
        lifecycle.add(Recorder::new("b", &journal));

        let error = lifecycle.on_shutdown(&container).unwrap_err();
        assert!(matches!(error, LifecycleError::Listener { phase: "shutdown", .. }));
        assert_eq!(
            *journal.lock(),
            vec!["a:shutdown", "b:shutdown", "pre_destroy", "pool:released"]
        );
        assert!(container.is_shut_down());
    }

    #[test]
    fn test_shutdown_reports_pre_destroy_failure() {
        let journal = Journal::default();
        let container = container(&journal, true);
        let mut lifecycle = LifecycleAggregator::new();
        lifecycle.add(Recorder::new("a", &journal));

        let error = lifecycle.on_shutdown(&container).unwrap_err();
        assert!(matches!(error, LifecycleError::Teardown(_)));
        assert_eq!(journal.lock().last().map(String::as_str), Some("pool:released"));
    }

    #[test]
    fn test_panicking_listener_does_not_stop_shutdown() {
        let journal = Journal::default();
        let container = container(&journal, false);
        let mut lifecycle = LifecycleAggregator::new();
        lifecycle.add(Arc::new(Recorder {
            name: "boom",
            journal: Arc::clone(&journal),
            fail_on: None,
            panic_on_shutdown: true,
        }));
        lifecycle.add(Recorder::new("b", &journal));

        let error = lifecycle.on_shutdown(&container).unwrap_err();
        assert!(matches!(error, LifecycleError::Panicked { .. }));
        assert_eq!(
            *journal.lock(),
            vec!["b:shutdown", "pre_destroy", "pool:released"]
        );
    }
}
