//! Logging conventions shared by the `unsafe` crates.
//!
//! - [`fields`] holds the conventional field names (and value representations)
//!   used when logging sessions, users and errors.
//! - [`get_subscriber`] and [`init_subscriber`] set up a `tracing` subscriber
//!   for binaries and test harnesses.
//! - [`spawn_blocking_with_tracing`] runs CPU-heavy work (e.g. password hashing)
//!   on the blocking thread pool without losing the current span.
pub mod fields;
mod subscriber;

pub use subscriber::{get_subscriber, init_subscriber};

/// Run `f` on `tokio`'s blocking thread pool, inside the span that was current
/// when this function was invoked.
pub fn spawn_blocking_with_tracing<F, R>(f: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = tracing::Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}
