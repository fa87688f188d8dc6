//! # concur
//!
//! A concurrency substrate assembled from four layers:
//!
//! - [`concur_core`] — counting semaphore, reusable barrier, fan-in
//!   completion counter, the `Runnable` work-item contract, logging, and
//!   error types.
//! - [`concur_queues`] — a bounded SPSC ring and a Chase-Lev
//!   work-stealing deque.
//! - [`concur_pool`] — an elastic [`ThreadPool`] with submitter-assisted
//!   draining, and [`TaskGroup`] for awaiting a scoped batch of tasks.
//! - [`concur_parallel`] — a fixed-size [`ParallelExecutor`] for data-
//!   parallel fan-out across a range of arguments.
//!
//! Most applications only need this crate; the sub-crates are published
//! separately for callers who want a single layer without the rest.

pub use concur_core::{
    self as core, cdebug, cerror, cinfo, cwarn, Barrier, Completion, ConcurError, Runnable,
    Semaphore,
};
pub use concur_parallel::{self as parallel, ParallelExecutor, ParallelTask};
pub use concur_pool::{self as pool, PoolState, TaskGroup, ThreadPool, ThreadPoolConfig};
pub use concur_queues::{self as queues, SpscRing, WorkStealDeque};
