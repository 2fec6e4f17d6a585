//! Suspend timeouts.
//!
//! Timers run on a [`BackgroundScheduler`]: a dedicated thread with its own
//! single-threaded tokio runtime, separate from the runtime serving
//! requests. A [`RequestTimeoutHandler`] arms one timer per suspended
//! exchange and re-arms it on demand.

use crate::error::DispatchError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use trellis_core::di::Managed;

/// Called by a response writer when a suspended exchange times out.
pub type TimeoutCallback = Arc<dyn Fn() + Send + Sync>;

/// A task waiting on the [`BackgroundScheduler`].
#[derive(Debug)]
pub struct ScheduledTask {
    abort: AbortHandle,
}

impl ScheduledTask {
    /// Cancels the task if it has not started yet.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Returns `true` once the task ran or was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Runs delayed tasks on a dedicated thread.
///
/// Shutting the scheduler down drops every pending task. It is registered
/// with the container as a managed resource, so container teardown releases
/// it.
pub struct BackgroundScheduler {
    handle: Handle,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl BackgroundScheduler {
    /// Starts the scheduler thread.
    ///
    /// # Errors
    ///
    /// Fails if the runtime or the thread cannot be created.
    pub fn start() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .thread_name("trellis-scheduler")
            .build()?;
        let handle = runtime.handle().clone();
        let (stop, stopped) = oneshot::channel::<()>();

        let worker = std::thread::Builder::new()
            .name("trellis-scheduler".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stopped.await;
                });
                tracing::debug!("background scheduler stopped");
            })?;

        Ok(Self {
            handle,
            stop: Mutex::new(Some(stop)),
            worker: Mutex::new(Some(worker)),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Runs `task` after `delay`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::SchedulerShutDown`] once the scheduler is shut down.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> Result<ScheduledTask, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(DispatchError::SchedulerShutDown);
        }
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Ok(ScheduledTask {
            abort: join.abort_handle(),
        })
    }

    /// Stops the scheduler; pending tasks never run. Idempotent.
    ///
    /// Waits for the scheduler thread unless called from it.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.thread().id() != std::thread::current().id() && worker.join().is_err() {
                tracing::warn!("background scheduler thread panicked");
            }
        }
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Managed for BackgroundScheduler {
    fn name(&self) -> &str {
        "background-scheduler"
    }

    fn shutdown(&self) {
        BackgroundScheduler::shutdown(self);
    }
}

impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.get_mut().take() {
            let _ = stop.send(());
        }
    }
}

impl fmt::Debug for BackgroundScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundScheduler")
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct TimerState {
    suspended: bool,
    callback: Option<TimeoutCallback>,
    task: Option<ScheduledTask>,
}

/// The suspend timer of one exchange.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use trellis_server::{BackgroundScheduler, RequestTimeoutHandler};
///
/// let scheduler = Arc::new(BackgroundScheduler::start().unwrap());
/// let timer = RequestTimeoutHandler::new(Arc::clone(&scheduler));
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
///
/// assert!(timer.suspend(Duration::from_millis(10), Arc::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// })));
/// std::thread::sleep(Duration::from_millis(200));
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// scheduler.shutdown();
/// ```
pub struct RequestTimeoutHandler {
    scheduler: Arc<BackgroundScheduler>,
    state: Mutex<TimerState>,
}

impl RequestTimeoutHandler {
    /// Creates an idle timer on `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<BackgroundScheduler>) -> Self {
        Self {
            scheduler,
            state: Mutex::new(TimerState::default()),
        }
    }

    /// Suspends with `timeout`; `callback` runs when it elapses.
    ///
    /// Returns `false` if already suspended or if the scheduler is shut
    /// down.
    pub fn suspend(&self, timeout: Duration, callback: TimeoutCallback) -> bool {
        let mut state = self.state.lock();
        if state.suspended {
            return false;
        }
        match self.arm(timeout, Arc::clone(&callback)) {
            Ok(task) => {
                state.suspended = true;
                state.callback = Some(callback);
                state.task = Some(task);
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "cannot arm suspend timeout");
                false
            }
        }
    }

    /// Replaces the pending timer with one firing `timeout` from now.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotSuspended`] unless suspended, or the scheduling
    /// error.
    pub fn set_suspend_timeout(&self, timeout: Duration) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        let Some(callback) = state.callback.clone().filter(|_| state.suspended) else {
            return Err(DispatchError::NotSuspended);
        };
        if let Some(task) = state.task.take() {
            task.cancel();
        }
        state.task = Some(self.arm(timeout, callback)?);
        Ok(())
    }

    /// Cancels the timer. Later calls to
    /// [`set_suspend_timeout`](Self::set_suspend_timeout) fail.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let Some(task) = state.task.take() {
            task.cancel();
        }
        state.suspended = false;
        state.callback = None;
    }

    /// Returns `true` while suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    fn arm(
        &self,
        timeout: Duration,
        callback: TimeoutCallback,
    ) -> Result<ScheduledTask, DispatchError> {
        self.scheduler.schedule(timeout, move || callback())
    }
}

impl fmt::Debug for RequestTimeoutHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTimeoutHandler")
            .field("suspended", &self.is_suspended())
            .finish_non_exhaustive()
    }
}
