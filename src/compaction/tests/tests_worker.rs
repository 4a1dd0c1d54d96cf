use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::compaction::Worker;

#[test]
fn worker_runs_submitted_tasks() {
    let worker = Worker::start();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = counter.clone();
        worker
            .submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
    }

    // Give the background thread a moment to drain the queue.
    for _ in 0..100 {
        if counter.load(Ordering::SeqCst) == 10 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn dropping_worker_joins_the_thread() {
    let worker = Worker::start();
    worker.submit(Box::new(|| {})).unwrap();
    drop(worker);
    // If the thread were not joined this test would still pass, but a
    // hang here (test timeout) would indicate the drop never returns.
}
