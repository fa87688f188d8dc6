//! Basic thread pool example
//!
//! Demonstrates submitting tasks to an elastic pool and waiting for them
//! to drain.

use concur::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== Thread Pool Basic Example ===\n");

    let pool = ThreadPool::config().minimum_threads(2).maximum_threads(4).build();
    let started = pool.start(2);
    println!("Started {} worker thread(s)\n", started);

    let completed = Arc::new(AtomicUsize::new(0));
    let total_tasks = 8;

    println!("Submitting {} tasks...\n", total_tasks);
    for i in 0..total_tasks {
        let c = Arc::clone(&completed);
        let accepted = pool.execute(
            move || {
                println!("[task {}] running", i);
                std::thread::sleep(Duration::from_millis(5));
                c.fetch_add(1, Ordering::SeqCst);
                println!("[task {}] done", i);
                0
            },
            None,
        );
        if !accepted {
            println!("[task {}] rejected, queue full", i);
        }
    }

    println!("\nWaiting for all tasks to finish...");
    pool.wait_done();

    let count = completed.load(Ordering::SeqCst);
    println!("\n{}/{} tasks completed!", count, total_tasks);

    pool.stop();
    println!("\n=== Example Complete ===");
}
