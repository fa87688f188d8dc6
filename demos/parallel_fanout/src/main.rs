//! Data-parallel fan-out example
//!
//! Demonstrates running the same task across a range of arguments on a
//! fixed worker pool, then waiting for the whole batch via a shared
//! completion counter.

use concur::core::Completion;
use concur::{ParallelExecutor, ParallelTask};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn main() {
    println!("=== Parallel Fan-out Example ===\n");

    let executor = ParallelExecutor::new();
    let started = executor.start(4, 16);
    println!("Started {} worker thread(s)\n", started);

    let partial_sums = Arc::new(Mutex::new(vec![0usize; 4]));
    let invocations = Arc::new(AtomicUsize::new(0));

    let sums = Arc::clone(&partial_sums);
    let count = Arc::clone(&invocations);
    let task: Arc<dyn ParallelTask> = Arc::new(move |i: usize| {
        let worker_slot = i % 4;
        sums.lock().unwrap()[worker_slot] += i;
        count.fetch_add(1, Ordering::SeqCst);
    });

    let argc = 40;
    println!("Dispatching {} parallel invocations...\n", argc);
    let completion = Arc::new(Completion::new());
    let dispatched = executor.execute_with_completion(&completion, task, argc, 0);
    println!("Dispatched {}/{} invocations", dispatched, argc);

    completion.wait();

    let total: usize = partial_sums.lock().unwrap().iter().sum();
    println!(
        "\nAll invocations done: {} ran, partial sums summed to {}",
        invocations.load(Ordering::SeqCst),
        total
    );
    assert_eq!(total, (0..argc).sum());

    executor.stop();
    executor.wait();
    println!("\n=== Example Complete ===");
}
