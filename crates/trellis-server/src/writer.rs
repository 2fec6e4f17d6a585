//! The transport boundary.
//!
//! A transport hands each request to the runtime together with a
//! [`ResponseWriter`]. The runtime calls exactly these operations on it, and
//! exactly one of [`ResponseWriter::commit`] or [`ResponseWriter::failure`]
//! per request.

use crate::error::DispatchError;
use crate::timeout::{BackgroundScheduler, RequestTimeoutHandler, TimeoutCallback};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use trellis_core::{ContainerResponse, OutputStream, TrellisError, TrellisResult};

/// Operations the runtime needs from a transport.
pub trait ResponseWriter: Send + Sync {
    /// Writes status and headers and returns the entity sink.
    ///
    /// `content_length` is the entity length when known up front.
    fn write_status_and_headers(
        &self,
        content_length: Option<u64>,
        response: &ContainerResponse,
    ) -> io::Result<OutputStream>;

    /// Suspends the exchange; `on_timeout` runs when `timeout` elapses.
    ///
    /// Returns `false` if the writer cannot suspend.
    fn suspend(&self, timeout: Duration, on_timeout: TimeoutCallback) -> bool;

    /// Re-arms the suspend timeout, measured from now.
    fn set_suspend_timeout(&self, timeout: Duration) -> Result<(), DispatchError>;

    /// Completes the exchange successfully.
    fn commit(&self);

    /// Completes the exchange with an error.
    fn failure(&self, error: TrellisError);

    /// Returns `true` if the runtime should buffer the entity to compute a
    /// content length.
    fn enable_response_buffering(&self) -> bool;
}

/// Entity sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl io::Write for NullOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The eventual result of a request applied through
/// [`FutureResponseWriter`].
///
/// Resolves to the written response, or to the failure cause. If the writer
/// is dropped without completing, resolves to an internal error.
pub struct ResponseFuture {
    rx: oneshot::Receiver<TrellisResult<ContainerResponse>>,
}

impl Future for ResponseFuture {
    type Output = TrellisResult<ContainerResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                Err(TrellisError::internal(
                    "response writer dropped before completing",
                ))
            })
        })
    }
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture").finish_non_exhaustive()
    }
}

type SinkFactory = Box<dyn Fn() -> OutputStream + Send + Sync>;

/// A [`ResponseWriter`] completing a [`ResponseFuture`].
///
/// The written response is captured for the future; the entity bytes also
/// go to a caller-supplied sink, by default [`NullOutput`]. Suspension is
/// served by a [`RequestTimeoutHandler`].
pub struct FutureResponseWriter {
    sender: Mutex<Option<oneshot::Sender<TrellisResult<ContainerResponse>>>>,
    written: Mutex<Option<ContainerResponse>>,
    sink: SinkFactory,
    timeout: RequestTimeoutHandler,
}

impl FutureResponseWriter {
    /// Creates a writer discarding the entity, and its future.
    #[must_use]
    pub fn new(scheduler: Arc<BackgroundScheduler>) -> (Self, ResponseFuture) {
        Self::with_output(scheduler, || Box::new(NullOutput))
    }

    /// Creates a writer whose entity goes to the sink produced by `sink`.
    #[must_use]
    pub fn with_output<F>(scheduler: Arc<BackgroundScheduler>, sink: F) -> (Self, ResponseFuture)
    where
        F: Fn() -> OutputStream + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
                written: Mutex::new(None),
                sink: Box::new(sink),
                timeout: RequestTimeoutHandler::new(scheduler),
            },
            ResponseFuture { rx },
        )
    }

    fn complete(&self, result: TrellisResult<ContainerResponse>) {
        self.timeout.close();
        match self.sender.lock().take() {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::warn!("response future already completed"),
        }
    }
}

impl ResponseWriter for FutureResponseWriter {
    fn write_status_and_headers(
        &self,
        _content_length: Option<u64>,
        response: &ContainerResponse,
    ) -> io::Result<OutputStream> {
        *self.written.lock() = Some(response.clone());
        Ok((self.sink)())
    }

    fn suspend(&self, timeout: Duration, on_timeout: TimeoutCallback) -> bool {
        self.timeout.suspend(timeout, on_timeout)
    }

    fn set_suspend_timeout(&self, timeout: Duration) -> Result<(), DispatchError> {
        self.timeout.set_suspend_timeout(timeout)
    }

    fn commit(&self) {
        let written = self.written.lock().take();
        self.complete(written.ok_or_else(|| {
            TrellisError::internal("response committed before status and headers were written")
        }));
    }

    fn failure(&self, error: TrellisError) {
        self.complete(Err(error));
    }

    fn enable_response_buffering(&self) -> bool {
        false
    }
}

impl fmt::Debug for FutureResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureResponseWriter")
            .field("completed", &self.sender.lock().is_none())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::io::Write;

    fn scheduler() -> Arc<BackgroundScheduler> {
        Arc::new(BackgroundScheduler::start().unwrap())
    }

    #[tokio::test]
    async fn test_commit_resolves_with_written_response() {
        let scheduler = scheduler();
        let (writer, future) = FutureResponseWriter::new(Arc::clone(&scheduler));
        let response = ContainerResponse::new(StatusCode::CREATED);
        let mut out = writer.write_status_and_headers(None, &response).unwrap();
        out.write_all(b"ignored").unwrap();
        writer.commit();

        let resolved = future.await.unwrap();
        assert_eq!(resolved.status(), StatusCode::CREATED);
        assert!(!resolved.has_entity());
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_commit_without_write_fails() {
        let scheduler = scheduler();
        let (writer, future) = FutureResponseWriter::new(Arc::clone(&scheduler));
        writer.commit();
        assert!(future.await.is_err());
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_failure_and_drop() {
        let scheduler = scheduler();
        let (writer, future) = FutureResponseWriter::new(Arc::clone(&scheduler));
        writer.failure(TrellisError::timeout("late"));
        writer.commit();
        let error = future.await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let (writer, future) = FutureResponseWriter::new(Arc::clone(&scheduler));
        drop(writer);
        assert!(future.await.is_err());
        scheduler.shutdown();
    }
}
