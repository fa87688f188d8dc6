//! Linux futex-based semaphore backend.
//!
//! The futex word IS the semaphore count. `wait` decrements it when
//! positive, else sleeps on the futex; `post` increments it and wakes one
//! sleeper if any may be waiting.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub struct FutexSemaphore {
    count: AtomicU32,
}

impl FutexSemaphore {
    pub fn new(initial: u32) -> Self {
        Self { count: AtomicU32::new(initial) }
    }

    pub fn try_wait(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        loop {
            if self.try_wait() {
                return true;
            }
            let remaining = match deadline {
                Some(d) => match d.checked_duration_since(std::time::Instant::now()) {
                    Some(r) if !r.is_zero() => Some(r),
                    _ => return self.try_wait(),
                },
                None => None,
            };

            let timespec = remaining.map(|d| libc::timespec {
                tv_sec: d.as_secs() as i64,
                tv_nsec: d.subsec_nanos() as i64,
            });
            let timespec_ptr = match &timespec {
                Some(ts) => ts as *const libc::timespec,
                None => std::ptr::null(),
            };

            let expected = self.count.load(Ordering::Acquire);
            if expected != 0 {
                continue;
            }

            let rc = unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    self.count.as_ptr(),
                    libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                    0u32,
                    timespec_ptr,
                    std::ptr::null::<u32>(),
                    0u32,
                )
            };

            if rc != 0 {
                let errno = std::io::Error::last_os_error()
                    .raw_os_error()
                    .unwrap_or(0);
                if errno == libc::ETIMEDOUT {
                    return false;
                }
                // EAGAIN (value changed under us) and EINTR: just retry.
            }
        }
    }

    pub fn post(&self) {
        self.count.fetch_add(1, Ordering::Release);
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.count.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

unsafe impl Send for FutexSemaphore {}
unsafe impl Sync for FutexSemaphore {}
