//! The node base contract (§4.A): a child registry with backpressure-aware
//! fan-out, and the handle type every combinator method hangs off of.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;

/// A downstream subscriber. `push` is the operator-specific completion
/// token; the default behavior for a plain node is `push == emit`.
#[async_trait]
pub trait Sink<T>: Send + Sync {
    async fn push(&self, x: T) -> Result<()>;
}

/// The child registry shared by every node kind. Guarded by a synchronous
/// `parking_lot::RwLock` rather than an async lock: the list is only ever
/// touched to clone it out or to insert/remove an entry, never held across
/// an `.await`, so a blocking lock is strictly cheaper here.
pub struct NodeCore<T> {
    children: RwLock<Vec<Arc<dyn Sink<T>>>>,
}

impl<T> Default for NodeCore<T> {
    fn default() -> Self {
        Self {
            children: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> NodeCore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: a child that is already registered (by pointer identity)
    /// is not inserted twice.
    pub fn subscribe(&self, child: Arc<dyn Sink<T>>) {
        let mut children = self.children.write();
        if !children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            children.push(child);
        }
    }

    pub fn unsubscribe(&self, child: &Arc<dyn Sink<T>>) {
        self.children.write().retain(|c| !Arc::ptr_eq(c, child));
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Fan out `x` to every child, resolving only once every child's push
    /// has resolved. This is the engine's backpressure channel.
    pub async fn emit(&self, x: T) -> Result<()> {
        let children: Vec<_> = self.children.read().clone();
        if children.is_empty() {
            return Ok(());
        }
        debug!(fan_out = children.len(), "emitting to children");
        try_join_all(children.iter().map(|c| c.push(x.clone()))).await?;
        Ok(())
    }
}

/// Public handle to a point in the graph producing elements of type `T`.
/// Every combinator method (`map`, `filter`, ...) hangs off this type and
/// returns a new `NodeHandle` for its own output type.
#[derive(Clone)]
pub struct NodeHandle<T> {
    pub(crate) core: Arc<NodeCore<T>>,
}

impl<T: Clone + Send + Sync + 'static> NodeHandle<T> {
    pub fn new() -> Self {
        Self {
            core: Arc::new(NodeCore::new()),
        }
    }

    pub(crate) fn from_core(core: Arc<NodeCore<T>>) -> Self {
        Self { core }
    }

    /// Fan out `x` to all children; the returned future resolves only once
    /// every downstream push has resolved.
    pub async fn emit(&self, x: T) -> Result<()> {
        self.core.emit(x).await
    }

    /// A plain node has no operator-specific push behavior: `push` is `emit`.
    pub async fn push(&self, x: T) -> Result<()> {
        self.emit(x).await
    }

    pub fn subscribe(&self, child: Arc<dyn Sink<T>>) {
        self.core.subscribe(child);
    }

    pub fn unsubscribe(&self, child: &Arc<dyn Sink<T>>) {
        self.core.unsubscribe(child);
    }

    pub fn child_count(&self) -> usize {
        self.core.child_count()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for NodeHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A plain node is itself a valid sink: pushing into it is emitting from it.
/// This lets a `Stream` be subscribed as a child of nothing in particular,
/// but fed directly by user code via `push`/`emit`, and also lets it serve
/// as a parent to `union`, which only needs `Arc<dyn Sink<T>>` adapters.
#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for NodeCore<T> {
    async fn push(&self, x: T) -> Result<()> {
        self.emit(x).await
    }
}
