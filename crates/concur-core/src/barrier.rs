//! Reusable rendezvous barrier for a fixed number of participants.

use std::sync::{Condvar, Mutex};

struct State {
    generation: u64,
    counter: usize,
}

/// A barrier that blocks `threshold` participants until they have all
/// arrived, then releases all of them and becomes immediately reusable for
/// the next generation of arrivals.
pub struct Barrier {
    threshold: usize,
    state: Mutex<State>,
    condvar: Condvar,
}

impl Barrier {
    /// Create a barrier for `threshold` participants. Panics if
    /// `threshold == 0` — a zero-participant barrier is a construction
    /// error, not a runtime one.
    pub fn new(threshold: usize) -> Self {
        assert!(threshold >= 1, "Barrier::new: threshold must be at least 1");
        Self {
            threshold,
            state: Mutex::new(State { generation: 0, counter: threshold }),
            condvar: Condvar::new(),
        }
    }

    /// Block until `threshold` total arrivals have occurred at the current
    /// generation. Exactly one caller per generation — the one whose
    /// arrival completes the count — returns `true`; all others return
    /// `false`.
    pub fn wait(&self) -> bool {
        let mut guard = self.state.lock().unwrap();
        let arrived_generation = guard.generation;
        guard.counter -= 1;
        if guard.counter == 0 {
            guard.counter = self.threshold;
            guard.generation = guard.generation.wrapping_add(1);
            self.condvar.notify_all();
            return true;
        }
        while guard.generation == arrived_generation {
            guard = self.condvar.wait(guard).unwrap();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    #[should_panic]
    fn zero_threshold_panics() {
        Barrier::new(0);
    }

    #[test]
    fn exactly_one_true_per_generation() {
        let barrier = Arc::new(Barrier::new(3));
        let true_count = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let b = Arc::clone(&barrier);
            let tc = Arc::clone(&true_count);
            handles.push(thread::spawn(move || {
                if b.wait() {
                    tc.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(true_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reusable_across_generations() {
        let barrier = Arc::new(Barrier::new(3));
        for _ in 0..2 {
            let true_count = Arc::new(AtomicUsize::new(0));
            let mut handles = Vec::new();
            for _ in 0..3 {
                let b = Arc::clone(&barrier);
                let tc = Arc::clone(&true_count);
                handles.push(thread::spawn(move || {
                    if b.wait() {
                        tc.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(true_count.load(Ordering::SeqCst), 1);
        }
    }
}
