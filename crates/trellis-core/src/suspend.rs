//! Handles for suspended exchanges.
//!
//! An endpoint that cannot answer immediately suspends its exchange and
//! receives an [`AsyncResponse`]. The handle may be moved to any thread and
//! resumed later with a response or an error. The server owns the exchange
//! behind the handle and guarantees that only the first terminal action
//! takes effect.
//!
//! # Example
//!
//! ```
//! use trellis_core::{AsyncResponse, AsyncState, ContainerResponse};
//!
//! fn finish(response: &AsyncResponse) {
//!     if response.state() == AsyncState::Suspended {
//!         response.resume(ContainerResponse::ok("done"));
//!     }
//! }
//! ```

use crate::error::{TrellisError, TrellisResult};
use crate::message::ContainerResponse;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Observable state of a suspended exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncState {
    /// Waiting to be resumed.
    Suspended,
    /// The timeout fired and the timeout handler is running.
    TimedOut,
    /// Resumed; the response is being or has been written.
    Resumed,
    /// The exchange reached a terminal state without being resumed.
    Done,
}

/// Called when a suspended exchange times out.
///
/// The handler may resume the response, re-arm the timeout with
/// [`AsyncResponse::set_timeout`], or do neither, in which case the exchange
/// fails with a timeout error.
pub type TimeoutHandler = Arc<dyn Fn(&AsyncResponse) + Send + Sync>;

/// Server side of an [`AsyncResponse`].
pub trait AsyncExchange: Send + Sync {
    /// Completes the exchange. Returns `false` if it is already complete.
    fn resume(&self, result: TrellisResult<ContainerResponse>) -> bool;

    /// Re-arms the suspend timeout. Returns `false` if the exchange is no
    /// longer suspended or timing out.
    fn set_timeout(&self, timeout: Duration) -> bool;

    /// Replaces the timeout handler.
    fn set_timeout_handler(&self, handler: TimeoutHandler);

    /// Current state.
    fn state(&self) -> AsyncState;
}

/// A cloneable handle to a suspended exchange.
#[derive(Clone)]
pub struct AsyncResponse {
    exchange: Arc<dyn AsyncExchange>,
}

impl AsyncResponse {
    /// Wraps a server-side exchange.
    #[must_use]
    pub fn new(exchange: Arc<dyn AsyncExchange>) -> Self {
        Self { exchange }
    }

    /// Resumes with a response. Returns `false` if the exchange already
    /// completed.
    pub fn resume(&self, response: ContainerResponse) -> bool {
        self.exchange.resume(Ok(response))
    }

    /// Resumes with an error. Mappable errors become error responses,
    /// others fail the exchange.
    pub fn resume_with_error(&self, error: TrellisError) -> bool {
        self.exchange.resume(Err(error))
    }

    /// Sets a new timeout measured from now.
    pub fn set_timeout(&self, timeout: Duration) -> bool {
        self.exchange.set_timeout(timeout)
    }

    /// Registers the timeout handler.
    pub fn set_timeout_handler<F>(&self, handler: F)
    where
        F: Fn(&AsyncResponse) + Send + Sync + 'static,
    {
        self.exchange.set_timeout_handler(Arc::new(handler));
    }

    /// Current state of the exchange.
    #[must_use]
    pub fn state(&self) -> AsyncState {
        self.exchange.state()
    }

    /// Returns `true` while the exchange waits to be resumed.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self.state(), AsyncState::Suspended | AsyncState::TimedOut)
    }
}

impl fmt::Debug for AsyncResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResponse")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct StubExchange {
        result: Mutex<Option<TrellisResult<ContainerResponse>>>,
        timeout: Mutex<Option<Duration>>,
    }

    impl AsyncExchange for StubExchange {
        fn resume(&self, result: TrellisResult<ContainerResponse>) -> bool {
            let mut slot = self.result.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        }

        fn set_timeout(&self, timeout: Duration) -> bool {
            *self.timeout.lock() = Some(timeout);
            true
        }

        fn set_timeout_handler(&self, _handler: TimeoutHandler) {}

        fn state(&self) -> AsyncState {
            if self.result.lock().is_some() {
                AsyncState::Resumed
            } else {
                AsyncState::Suspended
            }
        }
    }

    #[test]
    fn test_resume_once() {
        let exchange = Arc::new(StubExchange::default());
        let response = AsyncResponse::new(exchange.clone());

        assert!(response.is_suspended());
        assert!(response.resume(ContainerResponse::ok("first")));
        assert!(!response.resume_with_error(TrellisError::conflict("late")));
        assert_eq!(response.state(), AsyncState::Resumed);

        let stored = exchange.result.lock().take().unwrap().unwrap();
        assert_eq!(stored.entity().unwrap().as_ref(), b"first");
    }

    #[test]
    fn test_set_timeout_delegates() {
        let exchange = Arc::new(StubExchange::default());
        let response = AsyncResponse::new(exchange.clone());
        assert!(response.set_timeout(Duration::from_millis(40)));
        assert_eq!(*exchange.timeout.lock(), Some(Duration::from_millis(40)));
    }
}
