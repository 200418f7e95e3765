//! Multi-input ops (§4.D): union, zip, combine_latest.
//!
//! Rust generics cannot range over an arbitrary-arity tuple, so `zip` and
//! `combine_latest` get fixed-arity renderings for 2 and 3 parents (the
//! arities the testable-properties scenarios exercise); `union` is
//! any-arity since its output type does not change with parent count.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Result, StreamError};
use crate::node::{NodeCore, NodeHandle, Sink};

// ---------------------------------------------------------------------
// union
// ---------------------------------------------------------------------

struct UnionOp<T> {
    downstream: Arc<NodeCore<T>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for UnionOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        self.downstream.emit(x).await
    }
}

/// Subscribes one shared `UnionOp` onto every parent; every parent's push
/// forwards through the same node, so output order is whatever order the
/// parents' pushes actually arrive in.
pub fn union<T: Clone + Send + Sync + 'static>(
    parents: &[NodeHandle<T>],
) -> Result<NodeHandle<T>> {
    if parents.is_empty() {
        return Err(StreamError::Structural(
            "union requires at least one parent".into(),
        ));
    }
    let downstream = Arc::new(NodeCore::new());
    let op: Arc<dyn Sink<T>> = Arc::new(UnionOp {
        downstream: downstream.clone(),
    });
    for parent in parents {
        parent.subscribe(op.clone());
    }
    Ok(NodeHandle::from_core(downstream))
}

impl<T: Clone + Send + Sync + 'static> NodeHandle<T> {
    /// Instance-method form of `union`: unions `self` with `others`.
    pub fn union_with(&self, others: &[NodeHandle<T>]) -> NodeHandle<T> {
        let mut all = Vec::with_capacity(1 + others.len());
        all.push(self.clone());
        all.extend_from_slice(others);
        union(&all).expect("self is always a non-empty parent")
    }
}

// ---------------------------------------------------------------------
// zip
// ---------------------------------------------------------------------

struct ZipState2<A, B> {
    a: std::collections::VecDeque<A>,
    b: std::collections::VecDeque<B>,
}

struct ZipShared2<A, B> {
    downstream: Arc<NodeCore<(A, B)>>,
    maxsize: Option<usize>,
    state: Mutex<ZipState2<A, B>>,
    room: Notify,
}

impl<A, B> ZipShared2<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn try_pop(state: &mut ZipState2<A, B>) -> Option<(A, B)> {
        if !state.a.is_empty() && !state.b.is_empty() {
            Some((state.a.pop_front().unwrap(), state.b.pop_front().unwrap()))
        } else {
            None
        }
    }

    async fn push_a(&self, x: A) -> Result<()> {
        loop {
            let mut state = self.state.lock();
            let has_room = self.maxsize.map_or(true, |m| state.a.len() < m);
            if has_room {
                state.a.push_back(x);
                let tuple = Self::try_pop(&mut state);
                drop(state);
                self.room.notify_waiters();
                return match tuple {
                    Some(t) => self.downstream.emit(t).await,
                    None => Ok(()),
                };
            }
            drop(state);
            self.room.notified().await;
        }
    }

    async fn push_b(&self, x: B) -> Result<()> {
        loop {
            let mut state = self.state.lock();
            let has_room = self.maxsize.map_or(true, |m| state.b.len() < m);
            if has_room {
                state.b.push_back(x);
                let tuple = Self::try_pop(&mut state);
                drop(state);
                self.room.notify_waiters();
                return match tuple {
                    Some(t) => self.downstream.emit(t).await,
                    None => Ok(()),
                };
            }
            drop(state);
            self.room.notified().await;
        }
    }
}

struct ZipInputA<A, B>(Arc<ZipShared2<A, B>>);
struct ZipInputB<A, B>(Arc<ZipShared2<A, B>>);

#[async_trait]
impl<A, B> Sink<A> for ZipInputA<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: A) -> Result<()> {
        self.0.push_a(x).await
    }
}

#[async_trait]
impl<A, B> Sink<B> for ZipInputB<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: B) -> Result<()> {
        self.0.push_b(x).await
    }
}

/// `maxsize = None` means an unbounded per-parent FIFO; a push into a full
/// FIFO simply awaits until a pairing frees a slot.
pub fn zip2<A, B>(
    pa: &NodeHandle<A>,
    pb: &NodeHandle<B>,
    maxsize: Option<usize>,
) -> NodeHandle<(A, B)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let downstream = Arc::new(NodeCore::new());
    let shared = Arc::new(ZipShared2 {
        downstream: downstream.clone(),
        maxsize,
        state: Mutex::new(ZipState2 {
            a: std::collections::VecDeque::new(),
            b: std::collections::VecDeque::new(),
        }),
        room: Notify::new(),
    });
    pa.subscribe(Arc::new(ZipInputA(shared.clone())));
    pb.subscribe(Arc::new(ZipInputB(shared)));
    NodeHandle::from_core(downstream)
}

struct ZipState3<A, B, C> {
    a: std::collections::VecDeque<A>,
    b: std::collections::VecDeque<B>,
    c: std::collections::VecDeque<C>,
}

struct ZipShared3<A, B, C> {
    downstream: Arc<NodeCore<(A, B, C)>>,
    maxsize: Option<usize>,
    state: Mutex<ZipState3<A, B, C>>,
    room: Notify,
}

impl<A, B, C> ZipShared3<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn try_pop(state: &mut ZipState3<A, B, C>) -> Option<(A, B, C)> {
        if !state.a.is_empty() && !state.b.is_empty() && !state.c.is_empty() {
            Some((
                state.a.pop_front().unwrap(),
                state.b.pop_front().unwrap(),
                state.c.pop_front().unwrap(),
            ))
        } else {
            None
        }
    }

    async fn push_slot(
        &self,
        len: impl Fn(&ZipState3<A, B, C>) -> usize,
        insert: impl Fn(&mut ZipState3<A, B, C>),
    ) -> Result<()> {
        loop {
            let mut state = self.state.lock();
            let has_room = self.maxsize.map_or(true, |m| len(&state) < m);
            if has_room {
                insert(&mut state);
                let tuple = Self::try_pop(&mut state);
                drop(state);
                self.room.notify_waiters();
                return match tuple {
                    Some(t) => self.downstream.emit(t).await,
                    None => Ok(()),
                };
            }
            drop(state);
            self.room.notified().await;
        }
    }
}

struct ZipInput3A<A, B, C>(Arc<ZipShared3<A, B, C>>);
struct ZipInput3B<A, B, C>(Arc<ZipShared3<A, B, C>>);
struct ZipInput3C<A, B, C>(Arc<ZipShared3<A, B, C>>);

#[async_trait]
impl<A, B, C> Sink<A> for ZipInput3A<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: A) -> Result<()> {
        self.0
            .push_slot(|s| s.a.len(), move |s| s.a.push_back(x.clone()))
            .await
    }
}

#[async_trait]
impl<A, B, C> Sink<B> for ZipInput3B<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: B) -> Result<()> {
        self.0
            .push_slot(|s| s.b.len(), move |s| s.b.push_back(x.clone()))
            .await
    }
}

#[async_trait]
impl<A, B, C> Sink<C> for ZipInput3C<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: C) -> Result<()> {
        self.0
            .push_slot(|s| s.c.len(), move |s| s.c.push_back(x.clone()))
            .await
    }
}

pub fn zip3<A, B, C>(
    pa: &NodeHandle<A>,
    pb: &NodeHandle<B>,
    pc: &NodeHandle<C>,
    maxsize: Option<usize>,
) -> NodeHandle<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    let downstream = Arc::new(NodeCore::new());
    let shared = Arc::new(ZipShared3 {
        downstream: downstream.clone(),
        maxsize,
        state: Mutex::new(ZipState3 {
            a: std::collections::VecDeque::new(),
            b: std::collections::VecDeque::new(),
            c: std::collections::VecDeque::new(),
        }),
        room: Notify::new(),
    });
    pa.subscribe(Arc::new(ZipInput3A(shared.clone())));
    pb.subscribe(Arc::new(ZipInput3B(shared.clone())));
    pc.subscribe(Arc::new(ZipInput3C(shared)));
    NodeHandle::from_core(downstream)
}

// ---------------------------------------------------------------------
// combine_latest
// ---------------------------------------------------------------------

struct CombineLatest2<A, B> {
    downstream: Arc<NodeCore<(A, B)>>,
    emit_on_a: bool,
    emit_on_b: bool,
    state: Mutex<(Option<A>, Option<B>)>,
}

impl<A, B> CombineLatest2<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    async fn on_a(&self, x: A) -> Result<()> {
        let tuple = {
            let mut state = self.state.lock();
            state.0 = Some(x);
            if self.emit_on_a {
                match (&state.0, &state.1) {
                    (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                    _ => None,
                }
            } else {
                None
            }
        };
        match tuple {
            Some(t) => self.downstream.emit(t).await,
            None => Ok(()),
        }
    }

    async fn on_b(&self, x: B) -> Result<()> {
        let tuple = {
            let mut state = self.state.lock();
            state.1 = Some(x);
            if self.emit_on_b {
                match (&state.0, &state.1) {
                    (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                    _ => None,
                }
            } else {
                None
            }
        };
        match tuple {
            Some(t) => self.downstream.emit(t).await,
            None => Ok(()),
        }
    }
}

struct CombineLatestInputA<A, B>(Arc<CombineLatest2<A, B>>);
struct CombineLatestInputB<A, B>(Arc<CombineLatest2<A, B>>);

#[async_trait]
impl<A, B> Sink<A> for CombineLatestInputA<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: A) -> Result<()> {
        self.0.on_a(x).await
    }
}

#[async_trait]
impl<A, B> Sink<B> for CombineLatestInputB<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: B) -> Result<()> {
        self.0.on_b(x).await
    }
}

/// `emit_on = (true, true)` is "every parent triggers an emit", matching
/// the reference default of `emit_on = all parents`.
pub fn combine_latest2<A, B>(
    pa: &NodeHandle<A>,
    pb: &NodeHandle<B>,
    emit_on: (bool, bool),
) -> NodeHandle<(A, B)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let downstream = Arc::new(NodeCore::new());
    let shared = Arc::new(CombineLatest2 {
        downstream: downstream.clone(),
        emit_on_a: emit_on.0,
        emit_on_b: emit_on.1,
        state: Mutex::new((None, None)),
    });
    pa.subscribe(Arc::new(CombineLatestInputA(shared.clone())));
    pb.subscribe(Arc::new(CombineLatestInputB(shared)));
    NodeHandle::from_core(downstream)
}

struct CombineLatest3<A, B, C> {
    downstream: Arc<NodeCore<(A, B, C)>>,
    emit_on: (bool, bool, bool),
    state: Mutex<(Option<A>, Option<B>, Option<C>)>,
}

impl<A, B, C> CombineLatest3<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn snapshot(state: &(Option<A>, Option<B>, Option<C>)) -> Option<(A, B, C)> {
        match state {
            (Some(a), Some(b), Some(c)) => Some((a.clone(), b.clone(), c.clone())),
            _ => None,
        }
    }

    async fn on_a(&self, x: A) -> Result<()> {
        let tuple = {
            let mut state = self.state.lock();
            state.0 = Some(x);
            if self.emit_on.0 {
                Self::snapshot(&state)
            } else {
                None
            }
        };
        match tuple {
            Some(t) => self.downstream.emit(t).await,
            None => Ok(()),
        }
    }

    async fn on_b(&self, x: B) -> Result<()> {
        let tuple = {
            let mut state = self.state.lock();
            state.1 = Some(x);
            if self.emit_on.1 {
                Self::snapshot(&state)
            } else {
                None
            }
        };
        match tuple {
            Some(t) => self.downstream.emit(t).await,
            None => Ok(()),
        }
    }

    async fn on_c(&self, x: C) -> Result<()> {
        let tuple = {
            let mut state = self.state.lock();
            state.2 = Some(x);
            if self.emit_on.2 {
                Self::snapshot(&state)
            } else {
                None
            }
        };
        match tuple {
            Some(t) => self.downstream.emit(t).await,
            None => Ok(()),
        }
    }
}

struct CombineLatest3InputA<A, B, C>(Arc<CombineLatest3<A, B, C>>);
struct CombineLatest3InputB<A, B, C>(Arc<CombineLatest3<A, B, C>>);
struct CombineLatest3InputC<A, B, C>(Arc<CombineLatest3<A, B, C>>);

#[async_trait]
impl<A, B, C> Sink<A> for CombineLatest3InputA<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: A) -> Result<()> {
        self.0.on_a(x).await
    }
}

#[async_trait]
impl<A, B, C> Sink<B> for CombineLatest3InputB<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: B) -> Result<()> {
        self.0.on_b(x).await
    }
}

#[async_trait]
impl<A, B, C> Sink<C> for CombineLatest3InputC<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    async fn push(&self, x: C) -> Result<()> {
        self.0.on_c(x).await
    }
}

pub fn combine_latest3<A, B, C>(
    pa: &NodeHandle<A>,
    pb: &NodeHandle<B>,
    pc: &NodeHandle<C>,
    emit_on: (bool, bool, bool),
) -> NodeHandle<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    let downstream = Arc::new(NodeCore::new());
    let shared = Arc::new(CombineLatest3 {
        downstream: downstream.clone(),
        emit_on,
        state: Mutex::new((None, None, None)),
    });
    pa.subscribe(Arc::new(CombineLatest3InputA(shared.clone())));
    pb.subscribe(Arc::new(CombineLatest3InputB(shared.clone())));
    pc.subscribe(Arc::new(CombineLatest3InputC(shared)));
    NodeHandle::from_core(downstream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::with_timeout;
    use std::time::Duration;

    #[tokio::test]
    async fn union_emits_every_element_from_every_parent() {
        let a = NodeHandle::<i32>::new();
        let b = NodeHandle::<i32>::new();
        let merged = union(&[a.clone(), b.clone()]).unwrap();
        let list = merged.sink_to_list();

        a.emit(1).await.unwrap();
        b.emit(2).await.unwrap();
        a.emit(3).await.unwrap();

        assert_eq!(*list.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn union_rejects_zero_parents() {
        let result = union::<i32>(&[]);
        assert!(matches!(result, Err(StreamError::Structural(_))));
    }

    #[tokio::test]
    async fn zip_pairs_pushes_in_parent_order() {
        let a = NodeHandle::<i32>::new();
        let b = NodeHandle::<&'static str>::new();
        let zipped = zip2(&a, &b, None);
        let list = zipped.sink_to_list();

        a.emit(1).await.unwrap();
        a.emit(2).await.unwrap();
        b.emit("x").await.unwrap();
        b.emit("y").await.unwrap();

        assert_eq!(*list.lock(), vec![(1, "x"), (2, "y")]);
    }

    #[tokio::test]
    async fn zip_backpressures_when_a_parent_fifo_is_full() {
        let a = NodeHandle::<i32>::new();
        let b = NodeHandle::<char>::new();
        let zipped = zip2(&a, &b, Some(2));
        let list = zipped.sink_to_list();

        a.emit(1).await.unwrap();
        a.emit(2).await.unwrap();

        // The FIFO for `a` is now full; a third push pends until `b` pushes.
        let pending = a.emit(3);
        let timed_out = with_timeout(Duration::from_millis(10), async move {
            pending.await?;
            Ok(())
        })
        .await;
        assert!(matches!(timed_out, Err(StreamError::Timeout(_))));

        b.emit('x').await.unwrap();
        assert_eq!(*list.lock(), vec![(1, 'x')]);
    }

    #[tokio::test]
    async fn combine_latest_emits_once_every_slot_is_set() {
        let a = NodeHandle::<i32>::new();
        let b = NodeHandle::<&'static str>::new();
        let combined = combine_latest2(&a, &b, (true, true));
        let list = combined.sink_to_list();

        a.emit(1).await.unwrap();
        assert!(list.lock().is_empty());

        b.emit("x").await.unwrap();
        assert_eq!(*list.lock(), vec![(1, "x")]);

        a.emit(2).await.unwrap();
        assert_eq!(*list.lock(), vec![(1, "x"), (2, "x")]);
    }

    #[tokio::test]
    async fn combine_latest_emit_on_restricts_which_parent_triggers() {
        let a = NodeHandle::<i32>::new();
        let b = NodeHandle::<&'static str>::new();
        let combined = combine_latest2(&a, &b, (true, false));
        let list = combined.sink_to_list();

        // b's slot is unset when a pushes, and b never triggers an emission
        // on its own, so no tuple is produced yet.
        a.emit(1).await.unwrap();
        assert!(list.lock().is_empty());

        b.emit("x").await.unwrap();
        assert!(list.lock().is_empty());

        // b no longer triggers an emission.
        b.emit("y").await.unwrap();
        assert!(list.lock().is_empty());

        a.emit(2).await.unwrap();
        assert_eq!(*list.lock(), vec![(2, "y")]);
    }
}
