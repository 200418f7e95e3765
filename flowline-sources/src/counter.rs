//! `Counter`: a periodic emitter source (§4.F).

use std::sync::Arc;
use std::time::Duration;

use flowline_core::{default_scheduler, NodeHandle, Scheduler};
use tracing::{info, warn};

/// Emits a monotonically increasing `u64` starting at 0, sleeping `interval`
/// between emissions. Each iteration awaits its own emission's token before
/// sleeping, so a slow downstream naturally paces the counter.
pub struct Counter {
    handle: NodeHandle<u64>,
}

impl Counter {
    pub fn new(interval: Duration) -> Self {
        Self::new_on(default_scheduler(), interval)
    }

    pub fn new_on<S: Scheduler>(scheduler: Arc<S>, interval: Duration) -> Self {
        let handle = NodeHandle::<u64>::new();
        info!(?interval, "starting counter source");

        let task_handle = handle.clone();
        let task_scheduler = scheduler.clone();
        scheduler.spawn(Box::pin(async move {
            let mut n: u64 = 0;
            loop {
                if let Err(err) = task_handle.emit(n).await {
                    warn!(%err, "counter: downstream emission failed, stopping");
                    return;
                }
                n += 1;
                task_scheduler.sleep(interval).await;
            }
        }));

        Self { handle }
    }

    pub fn handle(&self) -> &NodeHandle<u64> {
        &self.handle
    }
}

impl std::ops::Deref for Counter {
    type Target = NodeHandle<u64>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counter_emits_increasing_integers_paced_by_interval() {
        let counter = Counter::new(Duration::from_millis(10));
        let list = counter.sink_to_list();

        tokio::time::sleep(Duration::from_millis(35)).await;

        let seen = list.lock().clone();
        assert!(seen.len() >= 3, "seen={seen:?}");
        assert_eq!(seen, (0..seen.len() as u64).collect::<Vec<_>>());
    }
}
