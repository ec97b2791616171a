//! Task Runners
//!
//! A [`TaskRunner`] is the only way the resource core reaches another thread.
//! [`Task::run`] hands a closure to a runner and returns a [`Task`] handle
//! backed by a oneshot channel, so checking for completion never blocks.
//!
//! Provided runners:
//! - [`ImmediateTaskRunner`] runs the closure on the calling thread
//! - [`QueuedTaskRunner`] stores closures until [`QueuedTaskRunner::run_next`] is called
//! - [`ThreadPoolTaskRunner`] a fixed set of worker threads fed through a `flume` queue
//! - [`TokioTaskRunner`] the blocking pool of a Tokio runtime

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::errors::{ForgeError, Result};

/// A unit of work handed to a [`TaskRunner`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait TaskRunner: Send + Sync {
    fn spawn(&self, job: Job);
}

// ============================================================================
// Task handle
// ============================================================================

/// Handle to the result of a closure executing on a [`TaskRunner`].
///
/// Dropping the handle discards the result; the closure still runs to completion.
#[derive(Debug)]
pub struct Task<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T: Send + 'static> Task<T> {
    pub fn run(runner: &dyn TaskRunner, f: impl FnOnce() -> T + Send + 'static) -> Self {
        let (sender, receiver) = oneshot::channel();
        runner.spawn(Box::new(move || {
            // The receiver may be gone if the owner lost interest.
            let _ = sender.send(f());
        }));
        Self { receiver }
    }

    /// Task that is already resolved with `value`.
    pub fn ready(value: T) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(value);
        Self { receiver }
    }
}

impl<T> Task<T> {
    /// Non-blocking completion check.
    ///
    /// Returns `None` while the closure is still running and
    /// `Some(Err(ForgeError::TaskCancelled))` if the runner dropped it.
    pub fn try_result(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(ForgeError::TaskCancelled)),
        }
    }

    /// Blocks the calling thread until the task resolves.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|result| result.map_err(|oneshot::Canceled| ForgeError::TaskCancelled))
    }
}

// ============================================================================
// Runners
// ============================================================================

/// Runs every job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateTaskRunner;

impl TaskRunner for ImmediateTaskRunner {
    fn spawn(&self, job: Job) {
        job();
    }
}

/// Keeps jobs until they are explicitly executed.
///
/// Useful for driving work during idle time and for stepping through
/// resource transitions deterministically.
#[derive(Default)]
pub struct QueuedTaskRunner {
    jobs: Mutex<VecDeque<Job>>,
}

impl QueuedTaskRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Executes the oldest job. Returns false if there was none.
    pub fn run_next(&self) -> bool {
        let job = self.jobs.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Executes jobs until the queue is empty, including jobs queued meanwhile.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next() {
            count += 1;
        }
        count
    }
}

impl TaskRunner for QueuedTaskRunner {
    fn spawn(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

/// Fixed-size pool of worker threads.
pub struct ThreadPoolTaskRunner {
    sender: Option<flume::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolTaskRunner {
    pub fn new(thread_count: usize) -> Result<Self> {
        let (sender, receiver) = flume::unbounded::<Job>();
        let workers = (0..thread_count.max(1))
            .map(|index| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("forge-worker-{index}"))
                    .spawn(move || worker_loop(&receiver))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Pool sized to the available parallelism of the machine.
    pub fn with_available_parallelism() -> Result<Self> {
        let count = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::new(count)
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: &flume::Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!(
                "Task panicked on {}",
                std::thread::current().name().unwrap_or("worker")
            );
        }
    }
}

impl TaskRunner for ThreadPoolTaskRunner {
    fn spawn(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(job).is_err() {
            log::warn!("Thread pool is shut down, discarding task");
        }
    }
}

impl Drop for ThreadPoolTaskRunner {
    fn drop(&mut self) {
        // Closing the channel lets every worker leave its loop.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Runs jobs on the blocking thread pool of a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTaskRunner {
    handle: tokio::runtime::Handle,
}

impl TokioTaskRunner {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Runner for the runtime the caller is executing in, if any.
    #[must_use]
    pub fn from_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl TaskRunner for TokioTaskRunner {
    fn spawn(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_immediate_runner_resolves_at_once() {
        let mut task = Task::run(&ImmediateTaskRunner, || 42);
        assert_eq!(task.try_result().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_queued_runner_defers_until_run() {
        let runner = QueuedTaskRunner::new();
        let mut task = Task::run(&runner, || "done");
        assert!(task.try_result().is_none());
        assert_eq!(runner.pending(), 1);

        assert!(runner.run_next());
        assert_eq!(task.try_result().unwrap().unwrap(), "done");
        assert!(!runner.run_next());
    }

    #[test]
    fn test_dropped_job_cancels_task() {
        let runner = QueuedTaskRunner::new();
        let mut task = Task::run(&runner, || 1);
        runner.jobs.lock().clear();
        assert!(matches!(task.try_result(), Some(Err(ForgeError::TaskCancelled))));
    }

    #[test]
    fn test_thread_pool_runs_all_jobs() {
        let runner = ThreadPoolTaskRunner::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let counter = Arc::clone(&counter);
                Task::run(&runner, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    i * 2
                })
            })
            .collect();

        let results: Vec<usize> = tasks.into_iter().map(|t| t.wait().unwrap()).collect();
        assert_eq!(results, (0..16).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_thread_pool_survives_panicking_job() {
        let runner = ThreadPoolTaskRunner::new(1).unwrap();
        let failed = Task::run(&runner, || -> u32 { panic!("boom") });
        assert!(matches!(failed.wait(), Err(ForgeError::TaskCancelled)));

        let ok = Task::run(&runner, || 7u32);
        assert_eq!(ok.wait().unwrap(), 7);
    }
}
