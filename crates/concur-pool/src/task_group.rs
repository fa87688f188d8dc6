//! Groups of related tasks submitted to a [`ThreadPool`] whose completion
//! can be awaited as a unit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use concur_core::{Runnable, Semaphore};

use crate::pool::ThreadPool;

struct GroupState {
    counter: AtomicUsize,
    completion: Semaphore,
}

/// Wraps a user task so that its completion (including after a panic) is
/// reflected in the owning [`TaskGroup`]'s counter. The accounting happens
/// in `Drop`, not in a destructor the task itself has to remember to call.
struct GroupTask<T> {
    group: Arc<GroupState>,
    inner: T,
}

impl<T> GroupTask<T> {
    fn new(group: Arc<GroupState>, inner: T) -> Self {
        if group.counter.fetch_add(1, Ordering::AcqRel) == 0 {
            group.completion.try_wait();
        }
        Self { group, inner }
    }
}

impl<T: Runnable> Runnable for GroupTask<T> {
    fn run(&self) -> i32 {
        self.inner.run()
    }
}

impl<T> Drop for GroupTask<T> {
    fn drop(&mut self) {
        if self.group.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.group.completion.post();
        }
    }
}

/// A scoped handle for submitting tasks that belong together and waiting
/// for the whole batch to finish, without the caller having to track a
/// counter by hand.
///
/// Typically stack-allocated: its `Drop` impl waits for all outstanding
/// tasks before the group goes away.
pub struct TaskGroup {
    pool: ThreadPool,
    state: Arc<GroupState>,
}

impl TaskGroup {
    /// Create a group using the calling thread's associated pool (see
    /// [`ThreadPool::instance`]). Panics if the calling thread has none.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let pool = ThreadPool::instance()
            .expect("TaskGroup::new: no thread pool associated with the calling thread");
        Self::with_pool(pool)
    }

    /// Create a group bound to an explicit pool.
    pub fn with_pool(pool: ThreadPool) -> Self {
        Self {
            pool,
            state: Arc::new(GroupState { counter: AtomicUsize::new(0), completion: Semaphore::new(1) }),
        }
    }

    pub fn thread_pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Start a task in this group.
    pub fn execute(&self, task: impl Runnable + 'static) -> bool {
        let wrapped = GroupTask::new(Arc::clone(&self.state), task);
        self.pool.execute(wrapped, None)
    }

    /// Start a task in this group, then temporarily help the pool process
    /// until the group's completion count reaches zero or the queue
    /// drains.
    pub fn execute_and_run(&self, task: impl Runnable + 'static) -> bool {
        let wrapped = GroupTask::new(Arc::clone(&self.state), task);
        self.pool.execute_and_run_while(wrapped, &self.state.counter, None)
    }

    /// Help process tasks until this group's counter reaches zero or the
    /// queue drains.
    pub fn wait(&self) -> bool {
        self.pool.wait_while(&self.state.counter)
    }

    /// Wait until every task in this group has fully finished, including
    /// the bookkeeping `Drop` of its wrapper.
    pub fn wait_done(&self) -> bool {
        if self.wait() {
            self.state.completion.wait();
            self.state.completion.post();
            true
        } else {
            false
        }
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        if self.wait() {
            self.state.completion.wait();
            self.state.completion.post();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration;

    #[test]
    fn group_waits_for_all_tasks() {
        let pool = ThreadPool::new(32);
        pool.start(4);
        let counter = Arc::new(Counter::new(0));
        {
            let group = TaskGroup::with_pool(pool.clone());
            for _ in 0..50 {
                let c = Arc::clone(&counter);
                assert!(group.execute(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    0
                }));
            }
            group.wait_done();
            assert_eq!(counter.load(Ordering::SeqCst), 50);
        }
        pool.stop();
    }

    #[test]
    fn group_drop_waits_even_without_explicit_wait() {
        let pool = ThreadPool::new(32);
        pool.start(2);
        let counter = Arc::new(Counter::new(0));
        {
            let group = TaskGroup::with_pool(pool.clone());
            for _ in 0..10 {
                let c = Arc::clone(&counter);
                group.execute(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    c.fetch_add(1, Ordering::SeqCst);
                    0
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        pool.stop();
    }

    #[test]
    #[should_panic]
    fn new_without_instance_panics() {
        let _ = TaskGroup::new();
    }
}
