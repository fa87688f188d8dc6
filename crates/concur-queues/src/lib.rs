//! Bounded queue primitives for moving work between threads: a simple
//! SPSC ring for fixed producer/consumer pairs and a Chase-Lev
//! work-stealing deque for owner-push/thief-steal workloads.

pub mod spsc_ring;
pub mod work_steal_deque;

pub use spsc_ring::SpscRing;
pub use work_steal_deque::WorkStealDeque;
