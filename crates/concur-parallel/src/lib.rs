//! Data-parallel fan-out execution: run the same task `argc` times across a
//! fixed set of worker threads, each with its own private work queue.

pub mod executor;

pub use executor::{ParallelExecutor, ParallelTask};
