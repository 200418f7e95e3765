//! Timed window demo (scenario 3): batches a fast stream of pushes into
//! fixed-interval windows.

use std::time::Duration;

use flowline_core::NodeHandle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let source = NodeHandle::<i32>::new();
    let windows = source.timed_window(Duration::from_millis(100));
    windows.sink(|w| println!("window: {w:?}"));

    for x in 0..10 {
        source.emit(x).await?;
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    // One quiet interval to observe the trailing empty window.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
