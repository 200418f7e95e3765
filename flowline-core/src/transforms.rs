//! Stateless transforms (§4.B): map, filter, remove, scan, frequencies,
//! concat, unique, pluck, sink.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{guard_user_callback, Result};
use crate::node::{NodeCore, NodeHandle, Sink};

struct MapOp<T, U> {
    downstream: Arc<NodeCore<U>>,
    f: Box<dyn Fn(T) -> U + Send + Sync>,
}

#[async_trait]
impl<T: Send + Sync + 'static, U: Clone + Send + Sync + 'static> Sink<T> for MapOp<T, U> {
    async fn push(&self, x: T) -> Result<()> {
        let y = guard_user_callback(|| (self.f)(x))?;
        self.downstream.emit(y).await
    }
}

struct FilterOp<T> {
    downstream: Arc<NodeCore<T>>,
    pred: Box<dyn Fn(&T) -> bool + Send + Sync>,
    keep_when: bool,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for FilterOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        let keep = guard_user_callback(|| (self.pred)(&x))?;
        if keep == self.keep_when {
            self.downstream.emit(x).await
        } else {
            Ok(())
        }
    }
}

struct ScanOp<T> {
    downstream: Arc<NodeCore<T>>,
    binop: Box<dyn Fn(T, T) -> T + Send + Sync>,
    acc: Mutex<Option<T>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for ScanOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        let mut acc = self.acc.lock();
        let next = match acc.take() {
            None => x,
            Some(prev) => guard_user_callback(|| (self.binop)(prev, x))?,
        };
        *acc = Some(next.clone());
        drop(acc);
        self.downstream.emit(next).await
    }
}

struct FrequenciesOp<T: Eq + Hash + Clone> {
    downstream: Arc<NodeCore<HashMap<T, usize>>>,
    counts: Mutex<HashMap<T, usize>>,
}

#[async_trait]
impl<T: Eq + Hash + Clone + Send + Sync + 'static> Sink<T> for FrequenciesOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        let snapshot = {
            let mut counts = self.counts.lock();
            *counts.entry(x).or_insert(0) += 1;
            counts.clone()
        };
        self.downstream.emit(snapshot).await
    }
}

struct ConcatOp<T> {
    downstream: Arc<NodeCore<T>>,
}

#[async_trait]
impl<T, I> Sink<I> for ConcatOp<T>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = T> + Send + Sync + 'static,
    I::IntoIter: Send,
{
    async fn push(&self, x: I) -> Result<()> {
        for item in x.into_iter() {
            self.downstream.emit(item).await?;
        }
        Ok(())
    }
}

struct UniqueOp<T, K> {
    downstream: Arc<NodeCore<T>>,
    key: Box<dyn Fn(&T) -> K + Send + Sync>,
    history: Option<usize>,
    seen: Mutex<VecDeque<K>>,
}

#[async_trait]
impl<T, K> Sink<T> for UniqueOp<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Clone + Send + Sync + 'static,
{
    async fn push(&self, x: T) -> Result<()> {
        let k = guard_user_callback(|| (self.key)(&x))?;
        let is_new = {
            let mut seen = self.seen.lock();
            if seen.contains(&k) {
                false
            } else {
                seen.push_back(k);
                if let Some(limit) = self.history {
                    while seen.len() > limit {
                        seen.pop_front();
                    }
                }
                true
            }
        };
        if is_new {
            self.downstream.emit(x).await
        } else {
            debug!("unique: dropped duplicate");
            Ok(())
        }
    }
}

struct SinkOp<T> {
    f: Box<dyn Fn(T) -> Result<Option<BoxFuture<'static, Result<()>>>> + Send + Sync>,
}

#[async_trait]
impl<T: Send + Sync + 'static> Sink<T> for SinkOp<T> {
    async fn push(&self, x: T) -> Result<()> {
        match (self.f)(x)? {
            Some(fut) => fut.await,
            None => Ok(()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> NodeHandle<T> {
    pub fn map<U, F>(&self, f: F) -> NodeHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(MapOp {
            downstream: downstream.clone(),
            f: Box::new(f),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }

    pub fn filter<F>(&self, pred: F) -> NodeHandle<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(FilterOp {
            downstream: downstream.clone(),
            pred: Box::new(pred),
            keep_when: true,
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }

    pub fn remove<F>(&self, pred: F) -> NodeHandle<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(FilterOp {
            downstream: downstream.clone(),
            pred: Box::new(pred),
            keep_when: false,
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }

    /// `start = None` seeds the accumulator silently from the first element
    /// (no emission); `Some(s)` emits starting from the very first push.
    pub fn scan<F>(&self, binop: F, start: Option<T>) -> NodeHandle<T>
    where
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(ScanOp {
            downstream: downstream.clone(),
            binop: Box::new(binop),
            acc: Mutex::new(start),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }

    pub fn pluck_index<U>(&self, index: impl Fn(&T) -> U + Send + Sync + 'static) -> NodeHandle<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        self.map(move |x| index(&x))
    }

    pub fn sink<F>(&self, f: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let op = Arc::new(SinkOp {
            f: Box::new(move |x| {
                guard_user_callback(|| f(x))?;
                Ok(None)
            }),
        });
        self.subscribe(op);
    }

    /// Like `sink`, but for callbacks that themselves need to await
    /// something (e.g. a bounded queue's `put`). A panic inside the returned
    /// future is caught across the `.await` via `futures::FutureExt::
    /// catch_unwind`, since `std::panic::catch_unwind` cannot straddle a
    /// suspension point.
    pub fn sink_async<F, Fut>(&self, f: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let op = Arc::new(SinkOp {
            f: Box::new(move |x| {
                let fut = f(x);
                let guarded: BoxFuture<'static, Result<()>> = Box::pin(async move {
                    use futures::FutureExt;
                    std::panic::AssertUnwindSafe(fut)
                        .catch_unwind()
                        .await
                        .map_err(crate::error::user_callback_panic)
                });
                Ok(Some(guarded))
            }),
        });
        self.subscribe(op);
    }

    pub fn sink_to_list(&self) -> Arc<Mutex<Vec<T>>> {
        let list = Arc::new(Mutex::new(Vec::new()));
        let list2 = list.clone();
        self.sink(move |x| list2.lock().push(x));
        list
    }
}

impl<T: Eq + Hash + Clone + Send + Sync + 'static> NodeHandle<T> {
    pub fn frequencies(&self) -> NodeHandle<HashMap<T, usize>> {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(FrequenciesOp {
            downstream: downstream.clone(),
            counts: Mutex::new(HashMap::new()),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }
}

impl<T: Clone + Send + Sync + 'static> NodeHandle<T> {
    pub fn unique<K, F>(&self, key: F, history: Option<usize>) -> NodeHandle<T>
    where
        K: Eq + Clone + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(UniqueOp {
            downstream: downstream.clone(),
            key: Box::new(key),
            history,
            seen: Mutex::new(VecDeque::new()),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }
}

impl<T: Clone + Send + Sync + 'static> NodeHandle<T> {
    pub fn unique_identity(&self, history: Option<usize>) -> NodeHandle<T>
    where
        T: Eq + Hash,
    {
        self.unique(|x| x.clone(), history)
    }
}

impl<I> NodeHandle<I>
where
    I: IntoIterator + Clone + Send + Sync + 'static,
    I::Item: Clone + Send + Sync + 'static,
    I::IntoIter: Send,
{
    pub fn concat(&self) -> NodeHandle<I::Item> {
        let downstream = Arc::new(NodeCore::new());
        let op = Arc::new(ConcatOp {
            downstream: downstream.clone(),
        });
        self.subscribe(op);
        NodeHandle::from_core(downstream)
    }
}

impl<A: Clone + Send + Sync + 'static, B: Clone + Send + Sync + 'static> NodeHandle<(A, B)> {
    pub fn pluck0(&self) -> NodeHandle<A> {
        self.map(|(a, _)| a)
    }

    pub fn pluck1(&self) -> NodeHandle<B> {
        self.map(|(_, b)| b)
    }
}

impl<A, B, C> NodeHandle<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub fn pluck0(&self) -> NodeHandle<A> {
        self.map(|(a, _, _)| a)
    }

    pub fn pluck1(&self) -> NodeHandle<B> {
        self.map(|(_, b, _)| b)
    }

    pub fn pluck2(&self) -> NodeHandle<C> {
        self.map(|(_, _, c)| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;

    #[tokio::test]
    async fn a_panicking_map_callback_surfaces_as_a_user_callback_error() {
        let source = NodeHandle::<i32>::new();
        source.map(|x: i32| -> i32 {
            if x == 2 {
                panic!("boom");
            }
            x
        });

        source.emit(1).await.unwrap();
        let err = source.emit(2).await.unwrap_err();
        assert!(matches!(err, StreamError::UserCallback(_)));
    }

    #[tokio::test]
    async fn map_applies_f_to_every_element() {
        let source = NodeHandle::<i32>::new();
        let list = source.map(|x| x * 2).sink_to_list();

        for x in [0, 1, 2, 3] {
            source.emit(x).await.unwrap();
        }

        assert_eq!(*list.lock(), vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn filter_keeps_only_matching_elements_in_order() {
        let source = NodeHandle::<i32>::new();
        let list = source.filter(|x| x % 2 == 0).sink_to_list();

        for x in 0..6 {
            source.emit(x).await.unwrap();
        }

        assert_eq!(*list.lock(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn remove_is_the_complement_of_filter() {
        let source = NodeHandle::<i32>::new();
        let list = source.remove(|x| x % 2 == 0).sink_to_list();

        for x in 0..6 {
            source.emit(x).await.unwrap();
        }

        assert_eq!(*list.lock(), vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn scan_with_no_start_is_silent_on_the_first_element() {
        let source = NodeHandle::<i32>::new();
        let list = source.map(|x| x + 1).scan(|a, b| a + b, None).sink_to_list();

        for x in [0, 1, 2, 3] {
            source.emit(x).await.unwrap();
        }

        assert_eq!(*list.lock(), vec![3, 6, 10]);
    }

    #[tokio::test]
    async fn scan_with_start_emits_from_the_first_element() {
        let source = NodeHandle::<i32>::new();
        let list = source.scan(|a, b| a + b, Some(0)).sink_to_list();

        for x in [1, 2, 3] {
            source.emit(x).await.unwrap();
        }

        assert_eq!(*list.lock(), vec![1, 3, 6]);
    }

    #[tokio::test]
    async fn frequencies_emits_a_running_snapshot() {
        let source = NodeHandle::<&'static str>::new();
        let list = source.frequencies().sink_to_list();

        for x in ["a", "b", "a"] {
            source.emit(x).await.unwrap();
        }

        let last = list.lock().last().cloned().unwrap();
        assert_eq!(last.get("a"), Some(&2));
        assert_eq!(last.get("b"), Some(&1));
    }

    #[tokio::test]
    async fn concat_flattens_exactly_one_level_preserving_order() {
        let source = NodeHandle::<Vec<i32>>::new();
        let list = source.concat().sink_to_list();

        source.emit(vec![1, 2]).await.unwrap();
        source.emit(vec![3]).await.unwrap();

        assert_eq!(*list.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unique_never_repeats_a_key_within_the_history_window() {
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
    async fn pluck0_and_pluck1_project_tuple_fields() {
        let source = NodeHandle::<(i32, &'static str)>::new();
        let firsts = source.pluck0().sink_to_list();
        let seconds = source.pluck1().sink_to_list();

        source.emit((1, "a")).await.unwrap();
        source.emit((2, "b")).await.unwrap();

        assert_eq!(*firsts.lock(), vec![1, 2]);
        assert_eq!(*seconds.lock(), vec!["a", "b"]);
    }
}
