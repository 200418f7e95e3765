//! Buffering / ordering ops (§4.C): partition, sliding_window, collect.
//!
//! Tuples in the original description become `Vec<T>` here since Rust
//! tuples cannot be length-parametric.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::node::{NodeCore, NodeHandle, Sink};

struct PartitionOp<T> {
    downstream: Arc<NodeCore<Vec<T>>>,
    n: usize,
    buf: Mutex<Vec<T>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for PartitionOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        let full = {
            let mut buf = self.buf.lock();
            buf.push(x);
            if buf.len() == self.n {
                Some(std::mem::take(&mut *buf))
            } else {
                None
            }
        };
        match full {
            Some(tuple) => self.downstream.emit(tuple).await,
            None => Ok(()),
        }
    }
}

struct SlidingWindowOp<T> {
    downstream: Arc<NodeCore<Vec<T>>>,
    n: usize,
    window: Mutex<VecDeque<T>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for SlidingWindowOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        let full = {
            let mut window = self.window.lock();
            window.push_back(x);
            while window.len() > self.n {
                window.pop_front();
            }
            if window.len() == self.n {
                Some(window.iter().cloned().collect::<Vec<_>>())
            } else {
                None
            }
        };
        match full {
            Some(tuple) => self.downstream.emit(tuple).await,
            None => Ok(()),
        }
    }
}

struct CollectOp<T> {
    buffer: Arc<Mutex<Vec<T>>>,
}

#[async_trait]
impl<T: Send + Sync + 'static> Sink<T> for CollectOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        self.buffer.lock().push(x);
        Ok(())
    }
}

/// Handle returned by `collect()`: the accumulating buffer plus the
/// downstream node that `flush()` emits into.
pub struct CollectHandle<T> {
    output: NodeHandle<Vec<T>>,
    buffer: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + Sync + 'static> CollectHandle<T> {
    pub fn handle(&self) -> &NodeHandle<Vec<T>> {
        &self.output
    }

    /// Emits the current buffer (possibly empty) as a `Vec` and clears it.
    pub async fn flush(&self) -> Result<()> {
        let drained = std::mem::take(&mut *self.buffer.lock());
        self.output.emit(drained).await
    }
}

impl<T: Clone + Send + Sync + 'static> NodeHandle<T> {
    pub fn partition(&self, n: usize) -> NodeHandle<Vec<T>> {
        assert!(n > 0, "partition size must be > 0");
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(PartitionOp {
            downstream: downstream.clone(),
            n,
            buf: Mutex::new(Vec::with_capacity(n)),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }

    pub fn sliding_window(&self, n: usize) -> NodeHandle<Vec<T>> {
        assert!(n > 0, "sliding_window size must be > 0");
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(SlidingWindowOp {
            downstream: downstream.clone(),
            n,
            window: Mutex::new(VecDeque::with_capacity(n)),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }

    pub fn collect(&self) -> CollectHandle<T> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let op = Arc::new(CollectOp {
            buffer: buffer.clone(),
        });
        self.subscribe(op);
        CollectHandle {
            output: NodeHandle::new(),
            buffer,
        }
    }
}
