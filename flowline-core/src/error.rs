//! Crate-wide error taxonomy.
//!
//! One enum, one variant per failure mode, matching the single-error-enum
//! pattern used throughout this codebase (see also `SourceError`).

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// Raised from a user-supplied callback (`map`, `filter`, `scan`, `sink`, ...).
    #[error("user callback failed: {0}")]
    UserCallback(String),

    /// An emission was awaited with a deadline that elapsed.
    #[error("emit timed out after {0:?}")]
    Timeout(Duration),

    /// A graph was constructed in a way the invariants forbid: subscribing
    /// the same child twice, or building a zero-parent multi-input op.
    #[error("invalid graph construction: {0}")]
    Structural(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Runs a user-supplied synchronous callback, converting a panic into
/// `StreamError::UserCallback` instead of unwinding through the engine.
/// This is the only place a panic from `map`/`filter`/`scan`/`sink`'s
/// closures is allowed to surface as anything other than a `Result`.
pub(crate) fn guard_user_callback<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        let msg = panic_message(&payload);
        tracing::error!(panic = %msg, "user callback panicked");
        StreamError::UserCallback(msg)
    })
}

/// Same conversion for a panic caught from an async callback (`sink_async`),
/// where the unwind is observed via `futures::FutureExt::catch_unwind`
/// rather than `std::panic::catch_unwind` directly.
pub(crate) fn user_callback_panic(payload: Box<dyn Any + Send>) -> StreamError {
    let msg = panic_message(&payload);
    tracing::error!(panic = %msg, "user callback panicked");
    StreamError::UserCallback(msg)
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "user callback panicked with a non-string payload".to_string()
    }
}
