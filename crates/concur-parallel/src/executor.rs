//! Fixed-size data-parallel executor.
//!
//! Each worker owns a private bounded queue; dispatch is round-robin by
//! index so that `execute(task, argc, indx)` hands argument `i` to worker
//! `(indx + i) mod N`. One long-running task can therefore delay the other
//! arguments routed to the same worker — accepted as the cost of avoiding a
//! single contended shared queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use concur_core::Completion;
use concur_queues::SpscRing;

/// A unit of data-parallel work: `exec` is called once per argument with
/// that argument's opaque value (an index, or a caller-chosen `usize` —
/// typically a pointer cast through `as usize` for the array-of-pointers
/// form).
pub trait ParallelTask: Send + Sync {
    fn exec(&self, arg: usize);
}

impl<F> ParallelTask for F
where
    F: Fn(usize) + Send + Sync,
{
    fn exec(&self, arg: usize) {
        self(arg)
    }
}

enum WorkItem {
    Task { task: Arc<dyn ParallelTask>, arg: usize, completion: Option<Arc<Completion>> },
    Shutdown,
}

/// One worker's private queue: a bounded ring plus the free/filled-cell
/// semaphore pair that gives it blocking push/pop, mirroring a classic
/// bounded-buffer producer/consumer pair.
struct WorkerQueue {
    ring: SpscRing<WorkItem>,
    empty_cells: concur_core::Semaphore,
    filled_cells: concur_core::Semaphore,
}

impl WorkerQueue {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            ring: SpscRing::new(capacity + 1),
            empty_cells: concur_core::Semaphore::new(capacity as u32),
            filled_cells: concur_core::Semaphore::new(0),
        }
    }

    fn push(&self, item: WorkItem) {
        self.empty_cells.wait();
        self.ring.push(item).ok().expect("empty_cells accounting guarantees room");
        self.filled_cells.post();
    }

    fn pop(&self) -> WorkItem {
        self.filled_cells.wait();
        let item = self.ring.pop().expect("filled_cells accounting guarantees an item");
        self.empty_cells.post();
        item
    }
}

struct ExecutorState {
    queues: Mutex<Vec<Arc<WorkerQueue>>>,
    condition: Condvar,
    started: AtomicUsize,
    stopped: AtomicUsize,
    running: AtomicBool,
    slots: AtomicUsize,
}

/// A fixed-size pool of worker threads for running the same task across a
/// range of arguments in parallel.
#[derive(Clone)]
pub struct ParallelExecutor {
    inner: Arc<ExecutorState>,
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelExecutor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ExecutorState {
                queues: Mutex::new(Vec::new()),
                condition: Condvar::new(),
                started: AtomicUsize::new(0),
                stopped: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                slots: AtomicUsize::new(32),
            }),
        }
    }

    /// Return true if the executor is running.
    pub fn active(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Number of currently-live worker threads.
    pub fn num_threads(&self) -> usize {
        self.inner.started.load(Ordering::Acquire) - self.inner.stopped.load(Ordering::Acquire)
    }

    /// Start `count` worker threads, each with a queue of `slot_size`
    /// capacity. Blocks until every worker has registered its queue.
    /// Returns the number of workers actually started.
    pub fn start(&self, count: usize, slot_size: usize) -> usize {
        let mut guard = self.inner.queues.lock().unwrap();
        if self.inner.running.load(Ordering::Acquire) || count == 0 || slot_size < 2 {
            return 0;
        }
        let before = self.inner.started.load(Ordering::Acquire);
        self.inner.slots.store(slot_size, Ordering::Release);
        self.inner.running.store(true, Ordering::Release);

        let mut result = 0;
        for _ in 0..count {
            let state = Arc::clone(&self.inner);
            let spawned =
                thread::Builder::new().name("concur-parallel-worker".into()).spawn(move || {
                    worker_loop(state);
                });
            if spawned.is_ok() {
                result += 1;
            } else {
                break;
            }
        }

        let target = before + result;
        while self.inner.started.load(Ordering::Acquire) < target {
            guard = self.inner.condition.wait(guard).unwrap();
        }
        drop(guard);
        result
    }

    /// Run `task` with arguments `indx..indx+argc`, each dispatched to
    /// worker `(indx + i) mod N`. Returns the number of arguments
    /// successfully dispatched.
    pub fn execute(&self, task: Arc<dyn ParallelTask>, argc: usize, indx: usize) -> usize {
        let queues = self.inner.queues.lock().unwrap();
        if !self.inner.running.load(Ordering::Acquire) || queues.is_empty() || argc == 0 {
            return 0;
        }
        let n = queues.len();
        let mut result = 0;
        for i in 0..argc {
            queues[(indx + i) % n].push(WorkItem::Task {
                task: Arc::clone(&task),
                arg: i,
                completion: None,
            });
            result += 1;
        }
        result
    }

    /// Like [`Self::execute`], but argument `i` is `argv[i]` rather than
    /// `i` itself (e.g. a pointer cast to `usize`).
    pub fn execute_argv(&self, task: Arc<dyn ParallelTask>, argv: &[usize], indx: usize) -> usize {
        let queues = self.inner.queues.lock().unwrap();
        if !self.inner.running.load(Ordering::Acquire) || queues.is_empty() || argv.is_empty() {
            return 0;
        }
        let n = queues.len();
        let mut result = 0;
        for (i, &arg) in argv.iter().enumerate() {
            queues[(indx + i) % n].push(WorkItem::Task {
                task: Arc::clone(&task),
                arg,
                completion: None,
            });
            result += 1;
        }
        result
    }

    /// Like [`Self::execute`], but `completion` is incremented by `argc`
    /// up front and notified once per finished argument, so multiple
    /// `execute_with_completion` calls may share one completion.
    pub fn execute_with_completion(
        &self,
        completion: &Arc<Completion>,
        task: Arc<dyn ParallelTask>,
        argc: usize,
        indx: usize,
    ) -> usize {
        let queues = self.inner.queues.lock().unwrap();
        if !self.inner.running.load(Ordering::Acquire) || queues.is_empty() || argc == 0 {
            return 0;
        }
        completion.expect(argc as i64);
        let n = queues.len();
        let mut result = 0;
        for i in 0..argc {
            queues[(indx + i) % n].push(WorkItem::Task {
                task: Arc::clone(&task),
                arg: i,
                completion: Some(Arc::clone(completion)),
            });
            result += 1;
        }
        // Correct for dispatches that never happened (push always succeeds
        // here since it blocks rather than failing, but this mirrors the
        // bookkeeping needed if a future non-blocking variant is added).
        if result != argc {
            completion.expect(result as i64 - argc as i64);
        }
        result
    }

    /// Block until every worker thread that has ever started has also
    /// stopped.
    pub fn wait(&self) -> usize {
        let mut guard = self.inner.queues.lock().unwrap();
        loop {
            let outstanding = self.inner.started.load(Ordering::Acquire)
                - self.inner.stopped.load(Ordering::Acquire);
            if outstanding == 0 {
                return 0;
            }
            guard = self.inner.condition.wait(guard).unwrap();
        }
    }

    /// Signal every worker to exit once its queue drains to the shutdown
    /// sentinel. Does not block for workers to actually finish; call
    /// [`Self::wait`] for that.
    pub fn stop(&self) -> usize {
        let queues = self.inner.queues.lock().unwrap();
        if self.inner.running.swap(false, Ordering::AcqRel) {
            for q in queues.iter() {
                q.push(WorkItem::Shutdown);
            }
        }
        self.inner.started.load(Ordering::Acquire) - self.inner.stopped.load(Ordering::Acquire)
    }
}

fn append_thread_queue(state: &Arc<ExecutorState>, queue: Arc<WorkerQueue>) {
    let mut guard = state.queues.lock().unwrap();
    guard.push(queue);
    state.started.fetch_add(1, Ordering::AcqRel);
    state.condition.notify_all();
}

fn remove_thread_queue(state: &Arc<ExecutorState>, queue: &Arc<WorkerQueue>) {
    let mut guard = state.queues.lock().unwrap();
    if let Some(pos) = guard.iter().position(|q| Arc::ptr_eq(q, queue)) {
        guard.remove(pos);
    }
    state.stopped.fetch_add(1, Ordering::AcqRel);
    state.condition.notify_all();
}

fn worker_loop(state: Arc<ExecutorState>) {
    let slots = state.slots.load(Ordering::Acquire);
    let queue = Arc::new(WorkerQueue::new(slots));
    append_thread_queue(&state, Arc::clone(&queue));

    loop {
        match queue.pop() {
            WorkItem::Task { task, arg, completion } => {
                let _ = catch_unwind(AssertUnwindSafe(|| task.exec(arg)));
                if let Some(c) = completion {
                    c.notify();
                }
            }
            WorkItem::Shutdown => break,
        }
    }

    remove_thread_queue(&state, &queue);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration;

    #[test]
    fn round_robin_dispatch_covers_every_index() {
        let executor = ParallelExecutor::new();
        assert_eq!(executor.start(4, 8), 4);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let task: Arc<dyn ParallelTask> = Arc::new(move |arg: usize| {
            seen2.lock().unwrap().push(arg);
        });

        let completion = Arc::new(Completion::new());
        assert_eq!(executor.execute_with_completion(&completion, task, 20, 0), 20);
        completion.wait();

        let mut got = seen.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, (0..20).collect::<Vec<_>>());

        executor.stop();
        executor.wait();
    }

    #[test]
    fn execute_argv_passes_through_values() {
        let executor = ParallelExecutor::new();
        executor.start(2, 8);
        let sum = Arc::new(Counter::new(0));
        let sum2 = Arc::clone(&sum);
        let task: Arc<dyn ParallelTask> = Arc::new(move |arg: usize| {
            sum2.fetch_add(arg, Ordering::SeqCst);
        });
        let argv = vec![10usize, 20, 30, 40];
        assert_eq!(executor.execute_argv(task, &argv, 0), 4);
        // execute_argv has no completion wiring; give workers time to drain.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sum.load(Ordering::SeqCst), 100);
        executor.stop();
        executor.wait();
    }

    #[test]
    fn stop_then_wait_drains_all_workers() {
        let executor = ParallelExecutor::new();
        assert_eq!(executor.start(3, 4), 3);
        assert_eq!(executor.num_threads(), 3);
        executor.stop();
        executor.wait();
        assert_eq!(executor.num_threads(), 0);
    }

    #[test]
    fn execute_before_start_returns_zero() {
        let executor = ParallelExecutor::new();
        let task: Arc<dyn ParallelTask> = Arc::new(|_arg: usize| {});
        assert_eq!(executor.execute(task, 5, 0), 0);
    }
}
