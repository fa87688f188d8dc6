//! Portable semaphore backend using `std::sync::{Mutex, Condvar}`.
//!
//! Used on platforms without a futex syscall. Less efficient than the
//! Linux backend but fully portable.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct FallbackSemaphore {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl FallbackSemaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.count.lock().unwrap();
        match timeout {
            None => {
                while *guard == 0 {
                    guard = self.condvar.wait(guard).unwrap();
                }
                *guard -= 1;
                true
            }
            Some(timeout) => {
                let deadline = std::time::Instant::now() + timeout;
                while *guard == 0 {
                    let remaining = match deadline.checked_duration_since(std::time::Instant::now()) {
                        Some(r) if !r.is_zero() => r,
                        _ => return false,
                    };
                    let (g, result) = self.condvar.wait_timeout(guard, remaining).unwrap();
                    guard = g;
                    if result.timed_out() && *guard == 0 {
                        return false;
                    }
                }
                *guard -= 1;
                true
            }
        }
    }

    pub fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        drop(count);
        self.condvar.notify_one();
    }
}
