//! The runtime dispatcher.
//!
//! [`ServerRuntime::process`] drives one request through the assembled
//! pipeline and completes it on the [`ResponseWriter`]. Every request ends
//! in exactly one of `commit` or `failure`.
//!
//! ## Exchange states
//!
//! ```text
//!            ┌──────────── response ─────────────┐
//!            │                                   ▼
//! RUNNING ───┴─► SUSPENDED ──► TIMED_OUT ──────► DONE
//!                  │   ▲          │    (no resume, no re-arm: timeout failure)
//!                  │   └─ re-arm ─┤
//!                  ▼              ▼
//!                RESUMED ◄────────┘
//!                  │
//!                  └── response side ──► DONE
//! ```
//!
//! Every transition is a compare-and-set on one atomic, so a timeout racing
//! a resume has a single winner and the loser's action does nothing.

use crate::timeout::TimeoutCallback;
use crate::writer::ResponseWriter;
use futures_util::FutureExt;
use http::header::CONTENT_LENGTH;
use http::{HeaderValue, Method};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::Instrument;
use trellis_core::{
    AsyncExchange, AsyncResponse, AsyncState, ContainerRequest, ContainerResponse, ErrorCategory,
    RequestId, TimeoutHandler, TrellisError, TrellisResult,
};
use trellis_middleware::{Dispatch, Pipeline, RequestProcessingContext};
use trellis_model::Suspend;
use trellis_telemetry::metrics;

const RUNNING: u8 = 0;
const SUSPENDED: u8 = 1;
const TIMED_OUT: u8 = 2;
const RESUMED: u8 = 3;
const DONE: u8 = 4;

/// Dispatches requests through a frozen pipeline.
pub struct ServerRuntime {
    pipeline: Arc<Pipeline>,
    default_suspend_timeout: Duration,
}

impl ServerRuntime {
    /// Creates the dispatcher. `default_suspend_timeout` applies to
    /// suspensions that do not request their own timeout.
    #[must_use]
    pub fn new(pipeline: Pipeline, default_suspend_timeout: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            default_suspend_timeout,
        }
    }

    /// The assembled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Processes `request`, delivering the outcome through `writer`.
    ///
    /// Returns once the response is committed or failed, or once the
    /// exchange is suspended; a suspended exchange completes later from
    /// whichever thread resumes it or from the timeout scheduler.
    pub async fn process(&self, request: ContainerRequest, writer: Arc<dyn ResponseWriter>) {
        let ctx = RequestProcessingContext::new(request);
        let span = tracing::info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.request().method(),
            path = %ctx.request().path(),
        );
        self.dispatch(ctx, writer).instrument(span).await;
    }

    async fn dispatch(&self, mut ctx: RequestProcessingContext, writer: Arc<dyn ResponseWriter>) {
        let exchange = Exchange::new(Arc::clone(&self.pipeline), writer, &ctx);

        let applied = AssertUnwindSafe(self.pipeline.apply(&mut ctx))
            .catch_unwind()
            .await;
        match applied {
            Ok(Ok(Dispatch::Response(response))) => exchange.complete(Ok(response)),
            Ok(Ok(Dispatch::Suspended(suspend))) => {
                exchange.suspend(ctx, suspend, self.default_suspend_timeout);
            }
            Ok(Err(error)) => exchange.complete(Err(error)),
            Err(panic) => exchange.complete(Err(panic_error("request processing", &*panic))),
        }
    }
}

impl fmt::Debug for ServerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRuntime")
            .field("pipeline", &self.pipeline)
            .field("default_suspend_timeout", &self.default_suspend_timeout)
            .finish()
    }
}

fn panic_error(what: &str, payload: &(dyn Any + Send)) -> TrellisError {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %message, "{what} panicked");
    TrellisError::internal(format!("{what} panicked: {message}"))
}

/// One request's server-side state once it leaves the pipeline.
struct Exchange {
    this: Weak<Exchange>,
    pipeline: Arc<Pipeline>,
    writer: Arc<dyn ResponseWriter>,
    runtime: Option<Handle>,
    span: tracing::Span,
    request_id: RequestId,
    is_head: bool,
    started_at: Instant,
    state: AtomicU8,
    resumed: AtomicBool,
    ctx: Mutex<Option<RequestProcessingContext>>,
    timeout_handler: Mutex<Option<TimeoutHandler>>,
}

impl Exchange {
    fn new(
        pipeline: Arc<Pipeline>,
        writer: Arc<dyn ResponseWriter>,
        ctx: &RequestProcessingContext,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            pipeline,
            writer,
            runtime: Handle::try_current().ok(),
            span: tracing::Span::current(),
            request_id: ctx.request_id(),
            is_head: ctx.request().method() == Method::HEAD,
            started_at: ctx.started_at(),
            state: AtomicU8::new(RUNNING),
            resumed: AtomicBool::new(false),
            ctx: Mutex::new(None),
            timeout_handler: Mutex::new(None),
        })
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Completes a request that never suspended.
    fn complete(&self, result: TrellisResult<ContainerResponse>) {
        if self.transition(RUNNING, DONE) {
            self.deliver(result);
        }
    }

    fn suspend(
        self: &Arc<Self>,
        ctx: RequestProcessingContext,
        suspend: Suspend,
        default_timeout: Duration,
    ) {
        let (timeout, handler, on_suspend) = suspend.into_parts();
        if let Some(handler) = handler {
            *self.timeout_handler.lock() = Some(handler);
        }
        *self.ctx.lock() = Some(ctx);
        if !self.transition(RUNNING, SUSPENDED) {
            return;
        }

        let timeout = timeout.unwrap_or(default_timeout);
        let exchange = Arc::clone(self);
        let on_timeout: TimeoutCallback = Arc::new(move || exchange.on_timeout());
        if !self.writer.suspend(timeout, on_timeout) {
            if self.transition(SUSPENDED, DONE) {
                self.deliver(Err(TrellisError::unavailable(
                    "the response writer cannot suspend",
                )));
            }
            return;
        }
        tracing::debug!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "exchange suspended"
        );

        let response = AsyncResponse::new(Arc::clone(self) as Arc<dyn AsyncExchange>);
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(move || on_suspend(response)))
        {
            self.resume(Err(panic_error("suspend callback", &*panic)));
        }
    }

    fn on_timeout(self: &Arc<Self>) {
        let _entered = self.span.enter();
        if !self.transition(SUSPENDED, TIMED_OUT) {
            return;
        }
        metrics::record_timeout();
        tracing::warn!(request_id = %self.request_id, "suspended request timed out");

        let handler = self.timeout_handler.lock().clone();
        if let Some(handler) = handler {
            let response = AsyncResponse::new(Arc::clone(self) as Arc<dyn AsyncExchange>);
            if let Err(panic) =
                std::panic::catch_unwind(AssertUnwindSafe(|| handler(&response)))
            {
                drop(panic_error("timeout handler", &*panic));
            }
        }

        if self.transition(TIMED_OUT, DONE) {
            self.deliver(Err(TrellisError::timeout(
                "suspended request was not resumed in time",
            )));
        }
    }

    async fn finish_resumed(self: Arc<Self>, result: TrellisResult<ContainerResponse>) {
        let ctx = self.ctx.lock().take();
        let outcome = match ctx {
            Some(ctx) => AssertUnwindSafe(self.pipeline.respond(&ctx, result))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(panic_error("response processing", &*panic))),
            None => result,
        };
        if self.transition(RESUMED, DONE) {
            self.deliver(outcome);
        }
    }

    fn deliver(&self, result: TrellisResult<ContainerResponse>) {
        let elapsed = self.started_at.elapsed();
        match result.and_then(|response| self.write(response)) {
            Ok(status) => {
                self.writer.commit();
                metrics::record_dispatch(metrics::Outcome::Committed, elapsed);
                tracing::debug!(
                    status = status.as_u16(),
                    duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "response committed"
                );
            }
            Err(error) => {
                if error.category() == ErrorCategory::Timeout {
                    tracing::warn!(error = %error, "request failed");
                } else {
                    tracing::error!(error = %error, "request failed");
                }
                self.writer.failure(error);
                metrics::record_dispatch(metrics::Outcome::Failed, elapsed);
            }
        }
    }

    fn write(&self, mut response: ContainerResponse) -> TrellisResult<http::StatusCode> {
        let content_length = if self.is_head || self.writer.enable_response_buffering() {
            response.content_length()
        } else {
            None
        };
        if let Some(length) = content_length {
            response
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        if self.is_head {
            response.set_entity(None);
        }

        let status = response.status();
        let written = self
            .writer
            .write_status_and_headers(content_length, &response)
            .and_then(|mut out| {
                if let Some(entity) = response.entity() {
                    out.write_all(entity)?;
                }
                out.flush()
            });
        written
            .map(|()| status)
            .map_err(|error| TrellisError::internal_with_source("writing the response failed", error))
    }
}

impl AsyncExchange for Exchange {
    fn resume(&self, result: TrellisResult<ContainerResponse>) -> bool {
        if !(self.transition(SUSPENDED, RESUMED) || self.transition(TIMED_OUT, RESUMED)) {
            return false;
        }
        self.resumed.store(true, Ordering::Release);
        let Some(this) = self.this.upgrade() else {
            return true;
        };
        tracing::debug!(parent: &self.span, request_id = %self.request_id, "exchange resumed");

        match &self.runtime {
            Some(handle) => {
                let span = self.span.clone();
                handle.spawn(this.finish_resumed(result).instrument(span));
            }
            None => {
                let outcome = result.or_else(|error| {
                    if error.is_mappable() {
                        Ok(error.to_response(Some(&self.request_id.to_string())))
                    } else {
                        Err(error)
                    }
                });
                if self.transition(RESUMED, DONE) {
                    self.deliver(outcome);
                }
            }
        }
        true
    }

    fn set_timeout(&self, timeout: Duration) -> bool {
        loop {
            match self.state.load(Ordering::Acquire) {
                SUSPENDED => break,
                TIMED_OUT if self.transition(TIMED_OUT, SUSPENDED) => break,
                TIMED_OUT => {}
                _ => return false,
            }
        }
        match self.writer.set_suspend_timeout(timeout) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(error = %error, "cannot re-arm suspend timeout");
                if self.transition(SUSPENDED, DONE) {
                    self.deliver(Err(TrellisError::unavailable(
                        "suspend timeout could not be re-armed",
                    )));
                }
                false
            }
        }
    }

    fn set_timeout_handler(&self, handler: TimeoutHandler) {
        *self.timeout_handler.lock() = Some(handler);
    }

    fn state(&self) -> AsyncState {
        match self.state.load(Ordering::Acquire) {
            TIMED_OUT => AsyncState::TimedOut,
            RESUMED => AsyncState::Resumed,
            DONE if self.resumed.load(Ordering::Acquire) => AsyncState::Resumed,
            DONE => AsyncState::Done,
            _ => AsyncState::Suspended,
        }
    }
}
