//! Basic fan-out demo: one source feeding two independent pipelines
//! (scenario 1 in the design notes' testable properties).

use flowline_core::NodeHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let source = NodeHandle::<i32>::new();

    let doubled = source.map(|x| 2 * x).sink_to_list();
    let scanned = source.map(|x| x + 1).scan(|a, b| a + b, None).sink_to_list();

    for x in [0, 1, 2, 3] {
        source.emit(x).await?;
    }

    info!(?doubled, "map(2x)");
    info!(?scanned, "map(x+1).scan(+)");
    println!("doubled: {:?}", doubled.lock());
    println!("scanned: {:?}", scanned.lock());

    Ok(())
}
