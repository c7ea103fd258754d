//! # Worker Pool
//!
//! The shared task queue behind asynchronous event dispatch and
//! [`AsyncResult`](super::future::AsyncResult) callback delivery.
//!
//! Backed by a tokio runtime: blocking jobs go through `spawn_blocking`, whose
//! thread cap (`max_blocking_threads`) is the pool's concurrency bound. Async
//! jobs (HTTP fetches) run on the runtime's single async worker.
//!
//! Jobs are isolated: a panicking job is logged and the pool keeps going.

use log::{debug, error};
use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

/// Default number of threads that may run blocking jobs at once.
pub const DEFAULT_WORKERS: usize = 4;

/// Cheaply cloneable handle to a bounded worker pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    runtime: Option<Runtime>,
    handle: Handle,
    workers: usize,
}

impl WorkerPool {
    /// Builds a pool that runs at most `workers` blocking jobs concurrently.
    pub fn new(workers: usize) -> io::Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("bowser-worker")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        debug!("Worker pool started with {} blocking workers", workers);
        Ok(Self {
            inner: Arc::new(PoolInner {
                runtime: Some(runtime),
                handle,
                workers,
            }),
        })
    }

    /// Maximum number of blocking jobs that run at the same time.
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Queues a blocking job. Never runs `job` on the calling thread.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.handle.spawn_blocking(move || run_isolated(job));
    }

    /// Queues an async job on the pool's runtime.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.handle.spawn(job);
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // The last handle may be dropped from inside a job; a blocking
        // shutdown would panic there.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn run_isolated<F: FnOnce()>(job: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!("Worker job panicked: {}", panic_message(payload.as_ref()));
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_submit_runs_off_the_calling_thread() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();
        pool.submit(move || {
            tx.send(thread::current().id()).unwrap();
        });
        let worker = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_panicking_job_does_not_poison_pool() {
        let pool = WorkerPool::new(1).unwrap();
        pool.submit(|| panic!("boom"));
        let (tx, rx) = mpsc::channel();
        pool.submit(move || tx.send(42).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 42);
    }

    #[test]
    fn test_spawn_runs_async_jobs() {
        let pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tx.send("done").unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "done");
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.workers(), 1);
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
