use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::ThreadPool;
use crate::config::PoolConfig;
use crate::test_util;

fn pool(workers: usize) -> ThreadPool {
    test_util::init();
    ThreadPool::new(PoolConfig { workers }).expect("threads can be spawned in tests")
}

#[test]
fn test_queue_and_wait() {
    let pool = pool(4);
    assert!(pool.is_running());
    assert_eq!(pool.workers(), 4);

    let futures: Vec<_> = (0..32_u64).map(|i| pool.queue_task(move || i * i)).collect();
    assert!(futures.iter().all(|future| future.is_valid()));

    let results: Vec<_> = futures.into_iter().map(|future| future.wait().expect("valid")).collect();
    assert_eq!(results, (0..32_u64).map(|i| i * i).collect::<Vec<_>>());
}

#[test]
fn test_try_take() {
    let pool = pool(1);
    let mut future = pool.queue_task(|| 7);

    pool.drain();
    assert_eq!(future.try_take(), Some(7));
    assert!(!future.is_valid());
    assert_eq!(future.try_take(), None);
    assert_eq!(future.wait(), None);
}

#[test]
fn test_drain_waits_for_all_jobs() {
    let pool = pool(2);
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..8 {
        let done = Arc::clone(&done);
        pool.queue_task(move || {
            thread::sleep(Duration::from_millis(5));
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    pool.drain();
    assert_eq!(done.load(Ordering::SeqCst), 8);
    assert_eq!(pool.pending(), 0);
}

#[test]
fn test_shutdown_stops_jobs() {
    let pool = pool(2);
    let iterations = Arc::new(AtomicUsize::new(0));

    let future = pool.queue_stoppable({
        let iterations = Arc::clone(&iterations);
        move |token| {
            while !token.is_stop_requested() {
                iterations.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
            "stopped"
        }
    });

    while iterations.load(Ordering::SeqCst) == 0 {
        thread::yield_now();
    }

    pool.shutdown();
    assert!(!pool.is_running());
    assert_eq!(future.wait(), Some("stopped"));

    // idempotent
    pool.shutdown();

    let rejected = pool.queue_task(|| 1);
    assert!(!rejected.is_valid());
    assert_eq!(rejected.wait(), None);
}

#[test]
fn test_shutdown_joins_workers() {
    let pool = pool(3);
    pool.shutdown();
    assert_eq!(pool.shared.exited.get(), 3);
}

#[test]
#[should_panic = "job failed"]
fn test_panic_is_resumed_on_wait() {
    let pool = pool(1);
    let future = pool.queue_task(|| -> u32 { panic!("job failed") });
    future.wait();
}

#[test]
fn test_zero_workers_is_clamped() {
    let pool = pool(0);
    assert_eq!(pool.workers(), 1);
    assert_eq!(pool.queue_task(|| 3).wait(), Some(3));
}
