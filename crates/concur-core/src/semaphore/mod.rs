//! Counting semaphore.
//!
//! Non-negative counter with `wait` (blocking decrement), `try_wait`
//! (non-blocking decrement), and `post` (increment + at-most-one wake).
//! Posts and successful waits always sum to zero against the initial count;
//! FIFO ordering of waiters is not guaranteed.
//!
//! Two backends are provided, selected at compile time like the teacher's
//! worker-parking module: a Linux futex-based one for the fast path, and a
//! `Mutex`+`Condvar` fallback for other platforms.

use std::time::Duration;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        use futex_linux::FutexSemaphore as Backend;
    } else {
        mod fallback;
        use fallback::FallbackSemaphore as Backend;
    }
}

/// A counting semaphore guarding access to a resource with a bounded number
/// of concurrent holders, or coordinating producer/consumer handoff.
pub struct Semaphore {
    backend: Backend,
}

impl Semaphore {
    /// Create a semaphore with the given initial count.
    pub fn new(initial: u32) -> Self {
        Self { backend: Backend::new(initial) }
    }

    /// Block until the count is greater than zero, then decrement it.
    pub fn wait(&self) {
        self.backend.wait(None);
    }

    /// Block until the count is greater than zero or `timeout` elapses.
    /// Returns `true` if a unit was acquired, `false` on timeout (count
    /// unchanged).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.backend.wait(Some(timeout))
    }

    /// Decrement the count without blocking if it is greater than zero.
    /// Returns `true` on success.
    pub fn try_wait(&self) -> bool {
        self.backend.try_wait()
    }

    /// Increment the count, waking at most one blocked waiter.
    pub fn post(&self) {
        self.backend.post();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_wait_respects_count() {
        let sem = Semaphore::new(1);
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        sem.post();
        assert!(sem.try_wait());
    }

    #[test]
    fn wait_timeout_times_out_on_empty() {
        let sem = Semaphore::new(0);
        let start = std::time::Instant::now();
        assert!(!sem.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn post_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            sem2.wait();
        });
        thread::sleep(Duration::from_millis(20));
        sem.post();
        handle.join().unwrap();
    }

    #[test]
    fn conservation_under_concurrency() {
        // Total successful waits must equal initial count plus completed posts.
        let initial = 3u32;
        let sem = Arc::new(Semaphore::new(initial));
        let posts = 50u32;
        let mut handles = Vec::new();
        for _ in 0..posts {
            let s = Arc::clone(&sem);
            handles.push(thread::spawn(move || s.post()));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut waits_ok = 0u32;
        while sem.try_wait() {
            waits_ok += 1;
        }
        assert_eq!(waits_ok, initial + posts);
    }
}
