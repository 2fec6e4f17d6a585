//! Common type aliases.

use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sink the response entity is written to once status and headers are out.
pub type OutputStream = Box<dyn std::io::Write + Send>;
