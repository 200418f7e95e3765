//! Backpressure demo (scenario 2): a pipeline whose sink is a bounded
//! `buffer` consumed with a gap takes at least `(len - capacity) * gap` of
//! wall time to drain, because `buffer`'s push blocks once the queue and
//! the consumer's in-flight slot are both full.

use std::time::{Duration, Instant};

use flowline_core::NodeHandle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let source = NodeHandle::<i32>::new();
    let buffered = source.buffer(2);
    buffered.sink_async(|x| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("sink received {x}");
    });

    let start = Instant::now();
    for x in 0..5 {
        source.emit(x).await?;
    }
    println!("5 pushes through buffer(2) took {:?}", start.elapsed());

    // Let the consumer drain the rest before the process exits.
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
