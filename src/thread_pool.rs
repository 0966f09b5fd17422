//! A worker pool for background jobs such as asset loading.
//!
//! Jobs run on a dedicated rayon pool.
//! Each queued job returns a [`TaskFuture`] that can be waited on.
//! Long-running jobs can be queued with [`ThreadPool::queue_stoppable`]
//! to observe a [`StopToken`] set when the pool shuts down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;

#[cfg(test)]
mod tests;

/// Errors from starting a [`ThreadPool`].
#[derive(Debug, thiserror::Error)]
pub enum ThreadPoolError {
    /// The worker threads could not be spawned.
    #[error("cannot start worker threads: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// A counter that can be waited on until it reaches a value.
#[derive(Default)]
struct Counter {
    value:   Mutex<usize>,
    changed: Condvar,
}

impl Counter {
    fn increment(&self) {
        *self.value.lock() += 1;
        self.changed.notify_all();
    }

    fn decrement(&self) {
        let mut value = self.value.lock();
        *value = value.checked_sub(1).expect("counter underflow");
        self.changed.notify_all();
    }

    fn wait_until(&self, target: usize) {
        let mut value = self.value.lock();
        while *value != target {
            self.changed.wait(&mut value);
        }
    }

    fn get(&self) -> usize { *self.value.lock() }
}

#[derive(Default)]
struct Shared {
    /// Jobs queued or running.
    in_flight: Counter,
    /// Worker threads that have exited.
    exited:    Counter,
    stop:      AtomicBool,
}

/// Observes whether the pool that runs a job is shutting down.
#[derive(Clone)]
pub struct StopToken {
    shared: Arc<Shared>,
}

impl StopToken {
    /// Whether the job should return early.
    pub fn is_stop_requested(&self) -> bool { self.shared.stop.load(Ordering::Acquire) }
}

type JobResult<T> = Result<T, Box<dyn Any + Send>>;

struct Slot<T> {
    result: Mutex<Option<JobResult<T>>>,
    ready:  Condvar,
}

/// The pending result of a queued job.
///
/// A future returned by a pool that is not running is invalid and never completes.
pub struct TaskFuture<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> TaskFuture<T> {
    fn invalid() -> Self { Self { slot: None } }

    /// Whether the job was accepted by the pool and its result has not been taken.
    pub fn is_valid(&self) -> bool { self.slot.is_some() }

    /// Blocks until the job completes and returns its result.
    ///
    /// Returns `None` if the future is invalid.
    /// If the job panicked, the panic is resumed on the calling thread.
    pub fn wait(mut self) -> Option<T> {
        let slot = self.slot.take()?;
        let mut result = slot.result.lock();
        loop {
            if let Some(result) = result.take() {
                return Some(unwrap_job(result));
            }
            slot.ready.wait(&mut result);
        }
    }

    /// Takes the result if the job has completed.
    ///
    /// The future becomes invalid after the result is taken.
    pub fn try_take(&mut self) -> Option<T> {
        let result = self.slot.as_ref()?.result.lock().take()?;
        self.slot = None;
        Some(unwrap_job(result))
    }
}

fn unwrap_job<T>(result: JobResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// A fixed set of worker threads.
pub struct ThreadPool {
    /// `None` after shutdown.
    pool:    Mutex<Option<rayon::ThreadPool>>,
    workers: usize,
    shared:  Arc<Shared>,
}

impl ThreadPool {
    /// Starts `config.workers` worker threads.
    pub fn new(config: PoolConfig) -> Result<Self, ThreadPoolError> {
        let workers = config.workers.max(1);
        let shared = Arc::new(Shared::default());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("kiln worker #{index}"))
            .exit_handler({
                let shared = Arc::clone(&shared);
                move |index| {
                    log::trace!("Worker #{index} exited");
                    shared.exited.increment();
                }
            })
            .build()?;

        log::debug!("Started thread pool with {workers} workers");
        Ok(Self { pool: Mutex::new(Some(pool)), workers, shared })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize { self.workers }

    /// Whether the pool accepts new jobs.
    pub fn is_running(&self) -> bool { self.pool.lock().is_some() }

    /// Queues a job.
    ///
    /// Returns an invalid future if the pool has been shut down.
    pub fn queue_task<T, F>(&self, job: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let pool = self.pool.lock();
        let Some(pool) = &*pool else {
            log::warn!("Job queued on a thread pool that is shut down");
            return TaskFuture::invalid();
        };

        let slot = Arc::new(Slot { result: Mutex::new(None), ready: Condvar::new() });
        self.shared.in_flight.increment();

        pool.spawn({
            let slot = Arc::clone(&slot);
            let shared = Arc::clone(&self.shared);
            move || {
                let result = panic::catch_unwind(AssertUnwindSafe(job));
                if result.is_err() {
                    log::error!("A job on the thread pool panicked");
                }

                *slot.result.lock() = Some(result);
                slot.ready.notify_all();
                shared.in_flight.decrement();
            }
        });

        TaskFuture { slot: Some(slot) }
    }

    /// Queues a job that receives a [`StopToken`].
    pub fn queue_stoppable<T, F>(&self, job: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&StopToken) -> T + Send + 'static,
    {
        let token = StopToken { shared: Arc::clone(&self.shared) };
        self.queue_task(move || job(&token))
    }

    /// Number of jobs queued or running.
    pub fn pending(&self) -> usize { self.shared.in_flight.get() }

    /// Blocks until every queued job has completed.
    ///
    /// Must not be called from a job on the same pool.
    pub fn drain(&self) { self.shared.in_flight.wait_until(0); }

    /// Stops accepting jobs, requests stoppable jobs to stop,
    /// waits for queued jobs and joins the worker threads.
    ///
    /// Calling this again has no effect.
    pub fn shutdown(&self) {
        let Some(pool) = self.pool.lock().take() else { return };

        log::debug!("Shutting down thread pool");
        self.shared.stop.store(true, Ordering::Release);
        self.drain();

        drop(pool);
        self.shared.exited.wait_until(self.workers);
        log::debug!("All {} workers exited", self.workers);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) { self.shutdown(); }
}

static_assertions::assert_impl_all!(ThreadPool: Send, Sync);
static_assertions::assert_impl_all!(TaskFuture<u32>: Send);
