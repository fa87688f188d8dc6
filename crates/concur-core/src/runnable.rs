//! The work-item callable contract shared by `concur-pool` and
//! `concur-parallel`.

/// An owned unit of work, submitted once and executed exactly once by a
/// worker thread. The returned `i32` is ignored by the pool itself but is
/// available to wrappers (e.g. task-group wrappers) that choose to inspect
/// it.
pub trait Runnable: Send {
    fn run(&self) -> i32;
}

impl<F> Runnable for F
where
    F: Fn() -> i32 + Send,
{
    fn run(&self) -> i32 {
        self()
    }
}
