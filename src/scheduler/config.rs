//! Scheduler configuration.

use std::thread;
use std::time::Duration;

use super::Scheduler;
use crate::error::{Error, Result};

/// Name given to worker threads unless configured otherwise.
pub const DEFAULT_THREAD_NAME: &str = "arrowhead-worker";

/// Settings for a [`Scheduler`].
///
/// Configurations are plain data: build one, inspect it, then hand it to
/// [`Scheduler::with_config`] or [`SchedulerBuilder`].
///
/// # Examples
///
/// ```rust
/// use arrowhead_async::SchedulerConfig;
/// use std::time::Duration;
///
/// let config = SchedulerConfig::default()
///     .with_worker_threads(4)
///     .with_quiet_period(Duration::from_millis(20));
///
/// assert_eq!(config.worker_threads(), 4);
/// assert_eq!(config.thread_name(), "arrowhead-worker");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    worker_threads: usize,
    thread_name: String,
    quiet_period: Duration,
    exit_timeout: Duration,
}

impl Default for SchedulerConfig {
    /// Twice the available hardware parallelism, 100 ms quiet period and a
    /// 5 s exit-hook timeout.
    fn default() -> Self {
        let parallelism = thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            worker_threads: parallelism * 2,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            quiet_period: Duration::from_millis(100),
            exit_timeout: Duration::from_secs(5),
        }
    }
}

impl SchedulerConfig {
    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set how often a draining scheduler re-checks for idleness.
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = period;
        self
    }

    /// Set the deadline used by [`Scheduler::install_default_exit_hook`].
    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    /// Number of worker threads.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Worker thread name.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Drain re-check interval.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Exit-hook shutdown deadline.
    pub fn exit_timeout(&self) -> Duration {
        self.exit_timeout
    }

    /// Reject settings the worker pool cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::InvalidArgument("worker thread count must be positive"));
        }
        if self.quiet_period.is_zero() {
            return Err(Error::InvalidArgument("quiet period must be non-zero"));
        }
        Ok(())
    }
}

/// Builder for a [`Scheduler`].
///
/// # Examples
///
/// ```rust
/// use arrowhead_async::{await_result, Scheduler};
/// use std::time::Duration;
///
/// let scheduler = Scheduler::builder()
///     .worker_threads(2)
///     .thread_name("registry-worker")
///     .build()
///     .unwrap();
///
/// assert_eq!(await_result(scheduler.submit(|| Ok(1 + 1))).unwrap(), 2);
/// await_result(scheduler.shutdown(Duration::from_secs(1))).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    /// Start from [`SchedulerConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`SchedulerConfig::with_worker_threads`].
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config = self.config.with_worker_threads(threads);
        self
    }

    /// See [`SchedulerConfig::with_thread_name`].
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_thread_name(name);
        self
    }

    /// See [`SchedulerConfig::with_quiet_period`].
    pub fn quiet_period(mut self, period: Duration) -> Self {
        self.config = self.config.with_quiet_period(period);
        self
    }

    /// See [`SchedulerConfig::with_exit_timeout`].
    pub fn exit_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_exit_timeout(timeout);
        self
    }

    /// Start the worker pool.
    pub fn build(self) -> Result<Scheduler> {
        Scheduler::with_config(self.config)
    }
}
