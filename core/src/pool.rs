use anyhow::{anyhow, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    /// Jobs submitted but not yet finished, counting the ones currently running.
    pending: Mutex<usize>,
    idle: Condvar,
    failures: AtomicUsize,
}

impl Shared {
    fn complete(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Fixed set of worker threads draining one FIFO queue.
///
/// Jobs may submit more jobs to the same pool. [`WorkerPool::finish`] waits until every
/// submitted job, including the ones submitted from inside other jobs, has completed.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Starts `threads` workers (at least one). If a worker cannot be spawned, the ones
    /// already started are shut down and joined before the error is returned.
    pub fn new(threads: usize) -> io::Result<Self> {
        let size = threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            available: Condvar::new(),
            pending: Mutex::new(0),
            idle: Condvar::new(),
            failures: AtomicUsize::new(0),
        });
        let pool = Self { shared, workers: Mutex::new(Vec::with_capacity(size)), size };
        for id in 0..size {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker_loop(id, shared));
            match spawned {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(err) => {
                    tracing::error!(worker = id, error = %err, "unable to spawn worker");
                    pool.shutdown();
                    pool.join();
                    return Err(err);
                }
            }
        }
        tracing::debug!(threads = size, "worker pool started");
        Ok(pool)
    }

    /// Queues `job` without blocking. Returns `false` once the pool is shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            tracing::warn!("job rejected: worker pool is shut down");
            return false;
        }
        *self.shared.pending.lock() += 1;
        queue.jobs.push_back(Box::new(job));
        drop(queue);
        self.shared.available.notify_one();
        true
    }

    /// Blocks until no job is queued or running. Must not be called from inside a job.
    pub fn finish(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }

    /// Stops accepting jobs; workers exit once the queue is drained.
    pub fn shutdown(&self) {
        let mut queue = self.shared.queue.lock();
        if !queue.shutdown {
            queue.shutdown = true;
            tracing::debug!("worker pool shutting down");
        }
        drop(queue);
        self.shared.available.notify_all();
    }

    /// Waits for every worker to exit. Call after [`WorkerPool::shutdown`].
    pub fn join(&self) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
    }

    pub fn threads(&self) -> usize { self.size }

    /// Jobs that returned an error or panicked so far.
    pub fn failures(&self) -> usize { self.shared.failures.load(Ordering::Relaxed) }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.shutdown {
                    tracing::trace!(worker = id, "worker exiting");
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(job))
            .unwrap_or_else(|payload| Err(anyhow!("job panicked: {}", panic_message(&*payload))));
        if let Err(err) = outcome {
            shared.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(worker = id, error = %err, "job failed");
        }
        shared.complete();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
