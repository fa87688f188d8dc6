//! Task group example
//!
//! Demonstrates grouping related tasks so their completion can be awaited
//! as a unit, including the group's destructor waiting automatically.

use concur::{TaskGroup, ThreadPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== Task Group Example ===\n");

    let pool = ThreadPool::new(64);
    pool.start(3);

    let processed = Arc::new(AtomicUsize::new(0));

    {
        let group = TaskGroup::with_pool(pool.clone());
        println!("Submitting a batch of 12 tasks to the group...\n");
        for i in 0..12 {
            let c = Arc::clone(&processed);
            group.execute(move || {
                println!("[group task {}] running", i);
                std::thread::sleep(Duration::from_millis(3));
                c.fetch_add(1, Ordering::SeqCst);
                0
            });
        }
        println!("\nWaiting for the group to finish...");
        group.wait_done();
        println!("Group reports done: {} tasks processed", processed.load(Ordering::SeqCst));
    }
    // The group's Drop already waited, but dropping out of scope here is
    // where it would happen if wait_done() hadn't been called explicitly.

    println!("\n{} tasks processed overall", processed.load(Ordering::SeqCst));
    pool.stop();
    println!("\n=== Example Complete ===");
}
