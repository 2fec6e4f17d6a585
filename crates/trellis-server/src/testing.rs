//! Test support.
//!
//! [`RecordingWriter`] is a [`ResponseWriter`] that records every call the
//! runtime makes, so tests can assert on the completion protocol.

use crate::error::DispatchError;
use crate::timeout::{BackgroundScheduler, RequestTimeoutHandler, TimeoutCallback};
use crate::writer::ResponseWriter;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use trellis_core::{ContainerResponse, ErrorCategory, OutputStream, TrellisError};

struct BodySink(Arc<Mutex<Vec<u8>>>);

impl io::Write for BodySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A [`ResponseWriter`] recording what the runtime does with it.
pub struct RecordingWriter {
    scheduler: Option<Arc<BackgroundScheduler>>,
    timeout: Option<RequestTimeoutHandler>,
    buffering: bool,
    commits: AtomicUsize,
    failures: AtomicUsize,
    content_length: Mutex<Option<u64>>,
    response: Mutex<Option<ContainerResponse>>,
    body: Arc<Mutex<Vec<u8>>>,
    error: Mutex<Option<(ErrorCategory, String)>>,
}

impl RecordingWriter {
    /// Creates a writer with its own background scheduler.
    ///
    /// If the scheduler cannot start, the writer refuses to suspend.
    #[must_use]
    pub fn new() -> Self {
        match BackgroundScheduler::start() {
            Ok(scheduler) => Self::with_scheduler(Arc::new(scheduler)),
            Err(error) => {
                tracing::warn!(error = %error, "recording writer runs without a scheduler");
                Self::refusing_suspend()
            }
        }
    }

    /// Creates a writer timing suspensions on `scheduler`.
    #[must_use]
    pub fn with_scheduler(scheduler: Arc<BackgroundScheduler>) -> Self {
        let mut writer = Self::refusing_suspend();
        writer.timeout = Some(RequestTimeoutHandler::new(Arc::clone(&scheduler)));
        writer.scheduler = Some(scheduler);
        writer
    }

    /// Creates a writer whose `suspend` always returns `false`.
    #[must_use]
    pub fn refusing_suspend() -> Self {
        Self {
            scheduler: None,
            timeout: None,
            buffering: false,
            commits: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            content_length: Mutex::new(None),
            response: Mutex::new(None),
            body: Arc::new(Mutex::new(Vec::new())),
            error: Mutex::new(None),
        }
    }

    /// Makes `enable_response_buffering` return `true`.
    #[must_use]
    pub fn buffering(mut self) -> Self {
        self.buffering = true;
        self
    }

    /// Number of `commit` calls.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of `failure` calls.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Returns `true` once the exchange was committed or failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.commits() + self.failures() > 0
    }

    /// The response passed to `write_status_and_headers`.
    #[must_use]
    pub fn response(&self) -> Option<ContainerResponse> {
        self.response.lock().clone()
    }

    /// The content length passed to `write_status_and_headers`.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        *self.content_length.lock()
    }

    /// Bytes written to the entity stream.
    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        self.body.lock().clone()
    }

    /// Category of the error passed to `failure`.
    #[must_use]
    pub fn failure_category(&self) -> Option<ErrorCategory> {
        self.error.lock().as_ref().map(|(category, _)| *category)
    }

    /// Message of the error passed to `failure`.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.error.lock().as_ref().map(|(_, message)| message.clone())
    }

    /// Waits until the exchange completes or `limit` elapses.
    pub async fn wait_for_completion(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while !self.is_complete() {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    /// Blocking variant of [`wait_for_completion`](Self::wait_for_completion).
    pub fn block_until_complete(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while !self.is_complete() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn close_timer(&self) {
        if let Some(timeout) = &self.timeout {
            timeout.close();
        }
    }
}

impl Default for RecordingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for RecordingWriter {
    fn write_status_and_headers(
        &self,
        content_length: Option<u64>,
        response: &ContainerResponse,
    ) -> io::Result<OutputStream> {
        *self.content_length.lock() = content_length;
        *self.response.lock() = Some(response.clone());
        Ok(Box::new(BodySink(Arc::clone(&self.body))))
    }

    fn suspend(&self, timeout: Duration, on_timeout: TimeoutCallback) -> bool {
        self.timeout
            .as_ref()
            .is_some_and(|handler| handler.suspend(timeout, on_timeout))
    }

    fn set_suspend_timeout(&self, timeout: Duration) -> Result<(), DispatchError> {
        self.timeout
            .as_ref()
            .map_or(Err(DispatchError::NotSuspended), |handler| {
                handler.set_suspend_timeout(timeout)
            })
    }

    fn commit(&self) {
        self.close_timer();
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    fn failure(&self, error: TrellisError) {
        self.close_timer();
        *self.error.lock() = Some((error.category(), error.to_string()));
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn enable_response_buffering(&self) -> bool {
        self.buffering
    }
}

impl fmt::Debug for RecordingWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingWriter")
            .field("commits", &self.commits())
            .field("failures", &self.failures())
            .field("has_scheduler", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}
