//! Counter-based fan-in synchronization.
//!
//! Several independent `expect`/`notify` cycles may be in flight on the
//! same `Completion` at once; `wait` only returns once the cumulative
//! count reaches zero, regardless of how many times it rose and fell to
//! get there.

use std::sync::{Condvar, Mutex};

pub struct Completion {
    count: Mutex<i64>,
    condvar: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self { count: Mutex::new(0), condvar: Condvar::new() }
    }

    /// Add `k` to the outstanding count. `k` may be negative, e.g. to
    /// cancel a speculative expectation that never actually started.
    pub fn expect(&self, k: i64) {
        let mut count = self.count.lock().unwrap();
        *count += k;
        if *count <= 0 {
            self.condvar.notify_all();
        }
    }

    /// Record completion of one contributing unit of work. Wakes waiters
    /// if this brings the count to zero.
    pub fn notify(&self) {
        self.expect(-1);
    }

    /// Block until the cumulative count is zero or below.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.condvar.wait(count).unwrap();
        }
    }

    /// Snapshot of whether the count is currently zero or below.
    pub fn done(&self) -> bool {
        *self.count.lock().unwrap() <= 0
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn done_reflects_zero_count() {
        let c = Completion::new();
        assert!(c.done());
        c.expect(2);
        assert!(!c.done());
        c.notify();
        assert!(!c.done());
        c.notify();
        assert!(c.done());
    }

    #[test]
    fn multiple_batches_compose() {
        let c = Completion::new();
        c.expect(3);
        c.notify();
        c.expect(2);
        assert!(!c.done());
        c.notify();
        c.notify();
        c.notify();
        c.notify();
        assert!(c.done());
    }

    #[test]
    fn wait_blocks_until_all_notified() {
        let c = Arc::new(Completion::new());
        c.expect(3);
        let c2 = Arc::clone(&c);
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(10));
                c2.notify();
            }
        });
        c.wait();
        assert!(c.done());
        handle.join().unwrap();
    }

    #[test]
    fn negative_expect_cancels_speculative_units() {
        let c = Completion::new();
        c.expect(5);
        c.expect(-5);
        assert!(c.done());
    }
}
