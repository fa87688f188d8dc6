//! A thread pool that runs [`Runnable`] tasks on a bounded, elastic set of
//! worker threads.
//!
//! Workers are started lazily as load increases and, beyond a configured
//! minimum, expire after sitting idle past an expiration timeout. A
//! submitter that calls `execute_and_run`/`wait`/`wait_while` temporarily
//! joins the worker pool's processing loop rather than just blocking, so
//! throughput scales with whoever happens to be calling in, not just the
//! background workers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;

use concur_core::{Runnable, Semaphore};

/// Lifecycle state of a [`ThreadPool`]. Setters and `start`/`stop` all pass
/// through `Reconfiguring` so at most one reconfiguration is ever in
/// flight; `execute` is only accepted while `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Idle = 0,
    Reconfiguring = 1,
    Active = 2,
}

impl PoolState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PoolState::Idle,
            2 => PoolState::Active,
            _ => PoolState::Reconfiguring,
        }
    }
}

type Task = Box<dyn Runnable>;

struct Inner {
    queue: RwLock<Arc<ArrayQueue<Task>>>,
    free_slots: Semaphore,
    used_slots: Semaphore,
    completed: Semaphore,
    farewell: Semaphore,
    stack_size: AtomicUsize,
    expiration_nanos: AtomicUsize, // usize::MAX sentinel means "forever"
    processing: AtomicUsize,
    maximum: AtomicUsize,
    minimum: AtomicUsize,
    started: AtomicUsize,
    workers: AtomicUsize,
    running: AtomicU8,
}

const FOREVER: usize = usize::MAX;

thread_local! {
    static CURRENT_POOL: std::cell::RefCell<Weak<Inner>> = const { std::cell::RefCell::new(Weak::new()) };
}

/// Builder for [`ThreadPool`] construction, mirroring the defaults of the
/// system this pool is modeled on: queue size 256, one permanent worker,
/// one worker per available CPU at most, no expiration.
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    queue_size: usize,
    minimum_threads: usize,
    maximum_threads: usize,
    expiration: Option<Duration>,
    stack_size: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        let num_cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            queue_size: 256,
            minimum_threads: 1,
            maximum_threads: num_cpus,
            expiration: None,
            stack_size: 0,
        }
    }
}

impl ThreadPoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_size(mut self, n: usize) -> Self {
        self.queue_size = n;
        self
    }

    pub fn minimum_threads(mut self, n: usize) -> Self {
        self.minimum_threads = n;
        self
    }

    pub fn maximum_threads(mut self, n: usize) -> Self {
        self.maximum_threads = n;
        self
    }

    pub fn expiration(mut self, d: Option<Duration>) -> Self {
        self.expiration = d;
        self
    }

    pub fn stack_size(mut self, sz: usize) -> Self {
        self.stack_size = sz;
        self
    }

    pub fn build(self) -> ThreadPool {
        let expiration_nanos = match self.expiration {
            Some(d) => d.as_nanos().min(FOREVER as u128 - 1) as usize,
            None => FOREVER,
        };
        let inner = Arc::new(Inner {
            queue: RwLock::new(Arc::new(ArrayQueue::new(self.queue_size.max(1)))),
            free_slots: Semaphore::new(self.queue_size.max(1) as u32),
            used_slots: Semaphore::new(0),
            completed: Semaphore::new(1),
            farewell: Semaphore::new(0),
            stack_size: AtomicUsize::new(self.stack_size),
            expiration_nanos: AtomicUsize::new(expiration_nanos),
            processing: AtomicUsize::new(0),
            maximum: AtomicUsize::new(self.maximum_threads.max(1)),
            minimum: AtomicUsize::new(self.minimum_threads.min(self.maximum_threads.max(1))),
            started: AtomicUsize::new(0),
            workers: AtomicUsize::new(0),
            running: AtomicU8::new(PoolState::Idle as u8),
        });
        ThreadPool { inner }
    }
}

/// A handle to a running (or not-yet-started) thread pool. Cloning shares
/// the same underlying pool; the pool is torn down when the last handle is
/// dropped and `stop` has not already been called (via `Drop`).
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<Inner>,
}

impl ThreadPool {
    /// Construct an empty thread pool with the default configuration and
    /// given job queue size.
    pub fn new(queue_size: usize) -> Self {
        ThreadPoolConfig::new().queue_size(queue_size).build()
    }

    pub fn config() -> ThreadPoolConfig {
        ThreadPoolConfig::new()
    }

    /// Return true if the pool is actively accepting work.
    pub fn active(&self) -> bool {
        self.state() == PoolState::Active
    }

    fn state(&self) -> PoolState {
        PoolState::from_u8(self.inner.running.load(Ordering::Acquire))
    }

    /// The thread pool handle the calling thread is currently associated
    /// with, if any (set by `start()` or by running inside a worker).
    pub fn instance() -> Option<ThreadPool> {
        CURRENT_POOL.with(|cell| cell.borrow().upgrade().map(|inner| ThreadPool { inner }))
    }

    fn set_instance(pool: Option<&Arc<Inner>>) {
        CURRENT_POOL.with(|cell| {
            *cell.borrow_mut() = match pool {
                Some(p) => Arc::downgrade(p),
                None => Weak::new(),
            };
        });
    }

    fn is_current_instance(&self) -> bool {
        CURRENT_POOL.with(|cell| {
            cell.borrow()
                .upgrade()
                .map(|p| Arc::ptr_eq(&p, &self.inner))
                .unwrap_or(false)
        })
    }

    /// Attempt a reconfiguration step: only succeeds from `Idle`, always
    /// returns to `Idle` regardless of the closure's outcome.
    fn reconfigure<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self
            .inner
            .running
            .compare_exchange(
                PoolState::Idle as u8,
                PoolState::Reconfiguring as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return None;
        }
        let result = f();
        self.inner.running.store(PoolState::Idle as u8, Ordering::Release);
        Some(result)
    }

    /// Change task queue size. The pool must be idle (not started).
    pub fn set_queue_size(&self, sz: usize) -> bool {
        self.reconfigure(|| {
            let sz = sz.max(1);
            let new_queue = Arc::new(ArrayQueue::new(sz));
            *self.inner.queue.write().unwrap() = new_queue;
            while self.inner.free_slots.try_wait() {}
            for _ in 0..sz {
                self.inner.free_slots.post();
            }
        })
        .is_some()
    }

    pub fn queue_size(&self) -> usize {
        self.inner.queue.read().unwrap().capacity()
    }

    pub fn running_threads(&self) -> usize {
        self.inner.started.load(Ordering::Acquire)
    }

    pub fn set_minimum_threads(&self, n: usize) -> bool {
        self.reconfigure(|| self.inner.minimum.store(n, Ordering::Release)).is_some()
    }

    pub fn minimum_threads(&self) -> usize {
        self.inner.minimum.load(Ordering::Acquire)
    }

    pub fn set_maximum_threads(&self, n: usize) -> bool {
        self.reconfigure(|| self.inner.maximum.store(n.max(1), Ordering::Release)).is_some()
    }

    pub fn maximum_threads(&self) -> usize {
        self.inner.maximum.load(Ordering::Acquire)
    }

    pub fn set_expiration(&self, d: Option<Duration>) -> bool {
        let nanos = match d {
            Some(d) => d.as_nanos().min(FOREVER as u128 - 1) as usize,
            None => FOREVER,
        };
        self.reconfigure(|| self.inner.expiration_nanos.store(nanos, Ordering::Release)).is_some()
    }

    pub fn expiration(&self) -> Option<Duration> {
        match self.inner.expiration_nanos.load(Ordering::Acquire) {
            FOREVER => None,
            n => Some(Duration::from_nanos(n as u64)),
        }
    }

    pub fn set_stack_size(&self, sz: usize) -> bool {
        self.reconfigure(|| self.inner.stack_size.store(sz, Ordering::Release)).is_some()
    }

    pub fn stack_size(&self) -> usize {
        self.inner.stack_size.load(Ordering::Acquire)
    }

    /// Start a worker, incrementing `started` and, if it is the very first
    /// worker started since the pool became active, priming/draining the
    /// `farewell` semaphore.
    fn start_worker(&self) -> bool {
        let s = self.inner.started.fetch_add(1, Ordering::AcqRel);
        let inner = Arc::clone(&self.inner);
        let stack_size = self.stack_size();
        let minimum = self.inner.minimum.load(Ordering::Acquire);

        let mut builder = thread::Builder::new().name("concur-pool-worker".into());
        if stack_size > 0 {
            builder = builder.stack_size(stack_size);
        }

        let spawned = builder.spawn(move || {
            let pool = ThreadPool { inner: Arc::clone(&inner) };
            let w = inner.workers.fetch_add(1, Ordering::AcqRel);
            ThreadPool::set_instance(Some(&inner));

            let timeout = if w < minimum {
                None
            } else {
                match inner.expiration_nanos.load(Ordering::Acquire) {
                    FOREVER => None,
                    n => Some(Duration::from_nanos(n as u64)),
                }
            };

            pool.process_while(
                || PoolState::from_u8(inner.running.load(Ordering::Acquire)) != PoolState::Idle,
                timeout,
            );

            ThreadPool::set_instance(None);
            inner.workers.fetch_sub(1, Ordering::AcqRel);
            if inner.started.fetch_sub(1, Ordering::AcqRel) == 1 {
                inner.farewell.post();
            }
        });

        match spawned {
            Ok(_handle) => {
                if s == 0 {
                    self.inner.farewell.wait();
                }
                true
            }
            Err(_) => {
                self.inner.started.fetch_sub(1, Ordering::AcqRel);
                false
            }
        }
    }

    /// Start the thread pool with an initial number of worker threads.
    /// Returns the number of workers actually started. Associates the
    /// calling thread with this pool if it isn't already associated with
    /// one.
    pub fn start(&self, count: usize) -> usize {
        let started = self.reconfigure(|| {
            debug_assert_eq!(self.inner.started.load(Ordering::Acquire), 0);
            debug_assert_eq!(self.inner.workers.load(Ordering::Acquire), 0);
            self.inner.farewell.post();

            let mut result = 0;
            while result < count && self.start_worker() {
                result += 1;
            }
            if ThreadPool::instance().is_none() {
                ThreadPool::set_instance(Some(&self.inner));
            }
            result
        });
        match started {
            Some(n) => {
                self.inner.running.store(PoolState::Active as u8, Ordering::Release);
                concur_core::cdebug!("pool: started {} of {} requested workers", n, count);
                n
            }
            None => 0,
        }
    }

    /// Enter the task-processing loop while `keep_going` holds, waiting for
    /// new work up to `timeout` (`None` = forever) each iteration.
    fn process_while(&self, keep_going: impl Fn() -> bool, timeout: Option<Duration>) -> bool {
        if self.state() == PoolState::Idle {
            return false;
        }
        loop {
            if !keep_going() {
                break;
            }
            let got = match timeout {
                None => {
                    self.inner.used_slots.wait();
                    true
                }
                Some(d) => self.inner.used_slots.wait_timeout(d),
            };
            if !got {
                break;
            }
            let task = self.inner.queue.read().unwrap().pop();
            match task {
                Some(task) => {
                    self.inner.free_slots.post();
                    let _ = catch_unwind(AssertUnwindSafe(|| task.run()));
                    if self.inner.processing.fetch_sub(1, Ordering::AcqRel) == 1 {
                        self.inner.completed.post();
                    }
                }
                None => break,
            }
        }
        true
    }

    /// Submit a task, blocking up to `blocking` for a free queue slot
    /// (`None` blocks forever). Possibly starts an additional worker first
    /// if the pool has no slack capacity and hasn't hit `maximum`.
    pub fn execute(&self, task: impl Runnable + 'static, blocking: Option<Duration>) -> bool {
        if self.state() != PoolState::Active {
            return false;
        }
        let processing = self.inner.processing.load(Ordering::Acquire);
        let started = self.inner.started.load(Ordering::Acquire);
        let maximum = self.inner.maximum.load(Ordering::Acquire);
        let have_capacity = processing < started || maximum <= started || self.start_worker();
        if !have_capacity {
            return false;
        }
        let acquired = match blocking {
            None => {
                self.inner.free_slots.wait();
                true
            }
            Some(d) => self.inner.free_slots.wait_timeout(d),
        };
        if !acquired {
            return false;
        }
        if self.inner.processing.fetch_add(1, Ordering::AcqRel) == 0 {
            self.inner.completed.try_wait();
        }
        let boxed: Task = Box::new(task);
        if self.inner.queue.read().unwrap().push(boxed).is_err() {
            // Capacity was reserved via free_slots, so this should not
            // happen; restore accounting if it somehow does.
            if self.inner.processing.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.inner.completed.post();
            }
            self.inner.free_slots.post();
            return false;
        }
        self.inner.used_slots.post();
        true
    }

    /// Submit a task, then temporarily join the processing loop until the
    /// queue drains.
    pub fn execute_and_run(&self, task: impl Runnable + 'static, blocking: Option<Duration>) -> bool {
        if self.execute(task, blocking) {
            self.process_while(|| true, Some(Duration::ZERO));
            true
        } else {
            false
        }
    }

    /// Submit a task, then temporarily join the processing loop until
    /// either the queue drains or `counter` reaches zero.
    pub fn execute_and_run_while(
        &self,
        task: impl Runnable + 'static,
        counter: &AtomicUsize,
        blocking: Option<Duration>,
    ) -> bool {
        if self.execute(task, blocking) {
            self.process_while(|| counter.load(Ordering::Acquire) != 0, Some(Duration::ZERO));
            true
        } else {
            false
        }
    }

    /// Help process tasks until the queue drains and no task is in flight,
    /// then wait for that quiescent state to be observed (and restore it
    /// for any other concurrent waiter).
    pub fn wait(&self) -> bool {
        if self.state() == PoolState::Idle {
            return false;
        }
        self.process_while(|| self.inner.processing.load(Ordering::Acquire) != 0, Some(Duration::ZERO));
        self.inner.completed.wait();
        self.inner.completed.post();
        true
    }

    /// Help process tasks until either the queue drains or `counter`
    /// reaches zero.
    pub fn wait_while(&self, counter: &AtomicUsize) -> bool {
        if self.state() == PoolState::Idle {
            return false;
        }
        self.process_while(|| counter.load(Ordering::Acquire) != 0, Some(Duration::ZERO))
    }

    /// Wait until all tasks queued at the time of the call have finished.
    pub fn wait_done(&self) -> bool {
        if !self.wait() {
            return false;
        }
        true
    }

    /// Stop the pool: drain remaining work, signal every live worker to
    /// exit, and wait for the last one to leave.
    pub fn stop(&self) -> bool {
        let stopped = self
            .inner
            .running
            .compare_exchange(
                PoolState::Active as u8,
                PoolState::Reconfiguring as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !stopped {
            return false;
        }

        let live = self.inner.started.load(Ordering::Acquire);

        self.wait();
        debug_assert!(self.inner.queue.read().unwrap().is_empty());

        for _ in 0..live {
            self.inner.used_slots.post();
        }
        self.inner.farewell.wait();
        while self.inner.used_slots.try_wait() {}

        if self.is_current_instance() {
            ThreadPool::set_instance(None);
        }

        self.inner.running.store(PoolState::Idle as u8, Ordering::Release);
        concur_core::cdebug!("pool: stopped");
        true
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Only the last handle matters: if other clones are alive, stopping
        // here would be premature. `Arc::strong_count` includes this one.
        if Arc::strong_count(&self.inner) == 1 && self.active() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::sync::Arc as StdArc;

    fn counting_task(counter: StdArc<Counter>) -> impl Runnable {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    #[test]
    fn start_runs_and_stop_drains() {
        let pool = ThreadPool::new(16);
        assert_eq!(pool.start(2), 2);
        assert!(pool.active());

        let counter = StdArc::new(Counter::new(0));
        for _ in 0..20 {
            assert!(pool.execute(counting_task(StdArc::clone(&counter)), Some(Duration::from_secs(1))));
        }
        pool.wait_done();
        assert_eq!(counter.load(Ordering::SeqCst), 20);

        assert!(pool.stop());
        assert!(!pool.active());
    }

    #[test]
    fn execute_rejected_when_not_running() {
        let pool = ThreadPool::new(4);
        let counter = StdArc::new(Counter::new(0));
        assert!(!pool.execute(counting_task(counter), Some(Duration::from_millis(10))));
    }

    #[test]
    fn execute_and_run_helps_drain_inline() {
        let pool = ThreadPool::new(8);
        pool.start(1);
        let counter = StdArc::new(Counter::new(0));
        for _ in 0..5 {
            assert!(pool.execute_and_run(counting_task(StdArc::clone(&counter)), Some(Duration::from_secs(1))));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        pool.stop();
    }

    #[test]
    fn restart_after_stop() {
        let pool = ThreadPool::new(8);
        assert_eq!(pool.start(1), 1);
        pool.stop();
        assert_eq!(pool.start(1), 1);
        pool.stop();
    }

    #[test]
    fn reconfiguration_rejected_while_active() {
        let pool = ThreadPool::new(8);
        pool.start(1);
        assert!(!pool.set_minimum_threads(3));
        pool.stop();
        assert!(pool.set_minimum_threads(3));
        assert_eq!(pool.minimum_threads(), 3);
    }
}
