//! Task executor used for concurrent page and chapter fetches.
//!
//! Work is submitted with [submit], which returns a [TaskHandle]; the caller
//! later blocks on [TaskHandle::wait]. Handles can be awaited in any order, so
//! callers that need ordered results simply wait on them in submission order.

use crate::scraper::error::ScraperError;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Boxed unit of work accepted by an [Executor].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs, usually on other threads.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// Pending result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    task: String,
    rx: flume::Receiver<Result<T, ScraperError>>,
}

impl<T> TaskHandle<T> {
    /// Label given at submission (used in logs and errors).
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Block until the task finishes and return its result.
    ///
    /// A task that panicked, or that the executor dropped without running,
    /// yields [ScraperError::TaskAborted].
    pub fn wait(self) -> Result<T, ScraperError> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(flume::RecvError::Disconnected) => Err(ScraperError::TaskAborted { task: self.task }),
        }
    }
}

/// Submit `f` to `executor` without blocking.
pub fn submit<E, T, F>(executor: &E, task: impl Into<String>, f: F) -> TaskHandle<T>
where
    E: Executor + ?Sized,
    T: Send + 'static,
    F: FnOnce() -> Result<T, ScraperError> + Send + 'static,
{
    let (tx, rx) = flume::bounded(1);
    executor.execute(Box::new(move || {
        // The handle may already be gone; nobody wants the result then.
        let _ = tx.send(f());
    }));
    TaskHandle {
        task: task.into(),
        rx,
    }
}

/// Fixed-size pool of worker threads fed over a shared job queue.
///
/// Dropping the pool closes the queue, lets queued jobs finish and joins the workers.
pub struct ThreadPool {
    sender: Option<flume::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = flume::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("novelscrape-worker-{}", i))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            warn!(worker = i, "task panicked");
                        }
                    }
                })?;
            workers.push(handle);
        }
        debug!(workers = size, "thread pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) {
        let sent = self
            .sender
            .as_ref()
            .map(|s| s.send(job).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!("thread pool is shut down; task dropped");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread exited abnormally");
            }
        }
    }
}
