//! # concur-core
//!
//! Synchronization primitives for the `concur` concurrency substrate:
//! a counting [`Semaphore`], a reusable [`Barrier`], and a fan-in
//! [`Completion`] counter, plus the ambient diagnostic-logging and error
//! modules shared by the higher layers (`concur-queues`, `concur-pool`,
//! `concur-parallel`).
//!
//! This crate is platform-agnostic in its public API; platform-specific
//! code is isolated to the `semaphore` module's backend selection.
//!
//! ## Modules
//!
//! - `semaphore` — counting semaphore (L0)
//! - `barrier` — reusable rendezvous barrier (L0)
//! - `completion` — fan-in completion counter (L0)
//! - `runnable` — the work-item callable contract
//! - `error` — error taxonomy
//! - `log` — `CONCUR_LOG_LEVEL`-gated diagnostic macros
//! - `env` — environment variable parsing helpers

pub mod barrier;
pub mod completion;
pub mod env;
pub mod error;
pub mod log;
pub mod runnable;
pub mod semaphore;

pub use barrier::Barrier;
pub use completion::Completion;
pub use error::ConcurError;
pub use runnable::Runnable;
pub use semaphore::Semaphore;
