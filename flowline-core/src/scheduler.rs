//! Scheduler shim: the only runtime surface the engine depends on.
//!
//! Every time-driven operator (§4.E in the design notes) takes a `Scheduler`
//! rather than reaching for `tokio::time`/`tokio::task` directly, so tests
//! could in principle swap in a deterministic fake without touching operator
//! logic. The bundled implementation is a thin wrapper over Tokio, the same
//! runtime every async piece of this codebase leans on.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::time::Instant;

use crate::error::{Result, StreamError};

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Abstraction over "sleep for duration D" and "schedule a background task".
/// `now`/`sleep` are split out (rather than folded into a single `sleep_until`)
/// because `rate_limit` needs to read the clock independently of sleeping on it.
///
/// `now` returns `tokio::time::Instant` rather than `std::time::Instant` so
/// that it tracks the same (possibly paused, for tests) clock `sleep` sleeps
/// against; mixing the two clocks would desynchronize under `#[tokio::test(
/// start_paused = true)]`.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
    fn spawn(&self, task: BoxFuture);
}

/// Default scheduler, backed directly by `tokio::time` and `tokio::task::spawn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn(&self, task: BoxFuture) {
        tokio::task::spawn(task);
    }
}

static DEFAULT_SCHEDULER: Lazy<Arc<TokioScheduler>> = Lazy::new(|| Arc::new(TokioScheduler));

/// The scheduler used by the ergonomic, `*_on`-less constructors. Every
/// operator also has an explicit `*_on(scheduler, ...)` entry point that
/// takes no global state at all.
pub fn default_scheduler() -> Arc<TokioScheduler> {
    DEFAULT_SCHEDULER.clone()
}

/// Await `fut` with a deadline; on expiry, converts to `StreamError::Timeout`.
/// Thin wrapper over `tokio::time::timeout`, the Rust analogue of awaiting a
/// token with a deadline in the original description.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(inner) => inner,
        Err(_) => Err(StreamError::Timeout(duration)),
    }
}
