//! Elastic thread pool with submitter-assisted draining, plus task groups
//! built on top of it.

pub mod pool;
pub mod task_group;

pub use pool::{PoolState, ThreadPool, ThreadPoolConfig};
pub use task_group::TaskGroup;
