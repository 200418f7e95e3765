//! End-to-end scenarios from the design notes' testable-properties section:
//! construct a graph, drive it, assert on a `sink_to_list` handle.

use std::time::Duration;

use flowline_core::multi::{combine_latest2, zip2};
use flowline_core::scheduler::with_timeout;
use flowline_core::{NodeHandle, StreamError};

#[tokio::test]
async fn scenario_1_basic_fanout() {
    let source = NodeHandle::<i32>::new();
    let doubled = source.map(|x| 2 * x).sink_to_list();
    let scanned = source.map(|x| x + 1).scan(|a, b| a + b, None).sink_to_list();

    for x in [0, 1, 2, 3] {
        source.emit(x).await.unwrap();
    }

    assert_eq!(*doubled.lock(), vec![0, 2, 4, 6]);
    assert_eq!(*scanned.lock(), vec![3, 6, 10]);
}

#[tokio::test]
async fn scenario_2_buffer_backpressures_a_slow_sink() {
    let source = NodeHandle::<i32>::new();
    let buffered = source.buffer(2);
    buffered.sink_async(|x| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = x;
    });

    let start = std::time::Instant::now();
    for x in 0..5 {
        source.emit(x).await.unwrap();
    }
    // Capacity (2) + one in-flight slot let 3 pushes land immediately; the
    // remaining 2 each wait out one downstream drain.
    assert!(
        start.elapsed() >= Duration::from_millis(30),
        "elapsed={:?}",
        start.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_3_timed_window_batches_a_fast_stream() {
    let source = NodeHandle::<i32>::new();
    let windows = source.timed_window(Duration::from_millis(10));
    let list = windows.sink_to_list();

    for x in 0..10 {
        source.emit(x).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshots = list.lock().clone();
    let flattened: Vec<i32> = snapshots.iter().flatten().copied().collect();
    assert_eq!(flattened, (0..10).collect::<Vec<_>>());
    assert!(snapshots.iter().all(|w| w.len() <= 3));
    assert!(snapshots.iter().any(|w| w.len() >= 2));
    assert_eq!(snapshots.last(), Some(&Vec::new()));
}

#[tokio::test]
async fn scenario_4_zip_pends_until_the_lagging_parent_catches_up() {
    let a = NodeHandle::<i32>::new();
    let b = NodeHandle::<char>::new();
    let zipped = zip2(&a, &b, Some(2));
    let list = zipped.sink_to_list();

    a.emit(1).await.unwrap();
    a.emit(2).await.unwrap();

    let pending = a.emit(3);
    tokio::pin!(pending);
    let result = with_timeout(Duration::from_millis(10), async {
        (&mut pending).await
    })
    .await;
    assert!(matches!(result, Err(StreamError::Timeout(_))));

    b.emit('x').await.unwrap();
    assert_eq!(*list.lock(), vec![(1, 'x')]);
}

#[tokio::test]
async fn scenario_5_unique_with_bounded_history() {
    let source = NodeHandle::<i32>::new();
    let list = source.unique_identity(Some(2)).sink_to_list();

    for x in [1, 2, 1, 2, 1, 2] {
        source.emit(x).await.unwrap();
    }
    assert_eq!(*list.lock(), vec![1, 2]);

    for x in [3, 2] {
        source.emit(x).await.unwrap();
    }
    assert_eq!(*list.lock(), vec![1, 2, 3]);

    source.emit(1).await.unwrap();
    assert_eq!(*list.lock(), vec![1, 2, 3, 1]);
}

#[tokio::test]
async fn scenario_6_collect_and_flush() {
    let source = NodeHandle::<i32>::new();
    let collected = source.collect();
    let list = collected.handle().sink_to_list();

    source.emit(1).await.unwrap();
    source.emit(2).await.unwrap();
    assert!(list.lock().is_empty());

    collected.flush().await.unwrap();
    assert_eq!(*list.lock(), vec![vec![1, 2]]);

    collected.flush().await.unwrap();
    assert_eq!(*list.lock(), vec![vec![1, 2], vec![]]);
}

#[tokio::test]
async fn combine_latest_feeds_a_downstream_map_across_two_parents() {
    let prices = NodeHandle::<f64>::new();
    let volumes = NodeHandle::<f64>::new();
    let notional = combine_latest2(&prices, &volumes, (true, true))
        .map(|(p, v)| p * v)
        .sink_to_list();

    prices.emit(10.0).await.unwrap();
    volumes.emit(2.0).await.unwrap();
    prices.emit(11.0).await.unwrap();

    assert_eq!(*notional.lock(), vec![20.0, 22.0]);
}
