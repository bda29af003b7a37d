//! Concurrency-capped task spawner for app drivers.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Upper bound on concurrently running app drivers.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    max_concurrency: NonZeroUsize,
}

impl SchedulerConfig {
    /// Creates a new configuration with the supplied concurrency limit.
    #[must_use]
    pub const fn new(max_concurrency: NonZeroUsize) -> Self {
        Self { max_concurrency }
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(16).expect("non-zero"))
    }
}

/// Lightweight wrapper around `tokio::spawn` that enforces the driver cap.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    /// Constructs a scheduler using the provided configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let permits = config.max_concurrency().get();
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Returns `true` if the scheduler has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the scheduler. New spawns are rejected and tasks still waiting
    /// for a permit are dropped without running.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
    }

    /// Spawns a driver future, respecting the configured concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] when the scheduler is closed before
    /// the task is enqueued.
    pub fn spawn<F>(&self, future: F) -> SchedulerResult<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }

        let semaphore = Arc::clone(&self.semaphore);

        let handle = tokio::spawn(async move {
            // A close while waiting drops the driver before it ever ran.
            let Ok(permit) = semaphore.acquire_owned().await else {
                return;
            };
            future.await;
            drop(permit);
        });

        Ok(handle)
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduler is closed and will not accept new tasks.
    #[error("scheduler closed")]
    Closed,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
