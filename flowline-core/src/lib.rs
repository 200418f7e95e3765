//! A small, in-process streaming dataflow engine.
//!
//! Users construct a directed graph of operator nodes (sources, transforms,
//! sinks), push elements into sources, and the engine propagates each
//! element through downstream operators under a cooperative asynchronous
//! discipline that respects backpressure end-to-end: every `push` returns a
//! future, and every fan-out resolves only once every child's future has
//! resolved.
//!
//! See `Node`/`NodeHandle` for the base contract; the rest of this crate is
//! combinator methods hung off `NodeHandle<T>`.

pub mod buffering;
pub mod error;
pub mod multi;
pub mod node;
pub mod scheduler;
pub mod time_ops;
pub mod transforms;

pub use buffering::CollectHandle;
pub use error::{Result, StreamError};
pub use multi::{combine_latest2, combine_latest3, union, zip2, zip3};
pub use node::{NodeCore, NodeHandle, Sink};
pub use scheduler::{default_scheduler, with_timeout, Scheduler, TokioScheduler};
pub use time_ops::DEFAULT_DELAY_CAPACITY;
