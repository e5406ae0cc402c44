//! A fixed-size worker pool that hands out [`Future`]s for submitted work
//!
//! Every operation returns a future for the eventual outcome of the work:
//! the task's value, its error, or [`Error::Panicked`] if it panicked. Task
//! failures only ever reach the task's own future; the pool keeps running.
//!
//! # Lifecycle
//!
//! A scheduler moves through `Running -> ShuttingDown -> Drained`
//! (see [`SchedulerState`]). [`Scheduler::shutdown`] first notifies every
//! [`ShutdownListener`] in the calling thread, then stops accepting work and
//! drains the pool on a dedicated thread, up to the given deadline.
//!
//! # Examples
//!
//! ```rust
//! use arrowhead_async::{await_result, Error, Scheduler};
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(2).unwrap();
//!
//! let answer = scheduler.submit(|| Ok(6 * 7));
//! assert_eq!(await_result(answer).unwrap(), 42);
//!
//! let broken = scheduler.submit(|| -> arrowhead_async::Result<()> { Err(Error::msg("E")) });
//! assert_eq!(await_result(broken).unwrap_err().to_string(), "E");
//!
//! await_result(scheduler.shutdown(Duration::from_secs(1))).unwrap();
//! assert!(await_result(scheduler.submit(|| Ok(1))).unwrap_err().is_shut_down());
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, debug_span, info, Instrument};

use crate::error::{Error, Result};
use crate::future::Completer;
use crate::Future;

mod config;
mod global;
mod periodic;
mod shutdown;
mod tasks;

pub use config::{SchedulerBuilder, SchedulerConfig, DEFAULT_THREAD_NAME};
pub use global::ExitGuard;
pub use shutdown::ShutdownListener;

use shutdown::Listeners;
use tasks::TaskCounter;

/// Stand-in for a deadline too far away for [`Instant`] to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `delay` from now. Delays past what [`Instant`] can hold land decades out.
pub(crate) fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Lifecycle state of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Accepting and running work.
    Running,
    /// Shutdown has begun; listeners have been notified and the pool is draining.
    ShuttingDown,
    /// The pool has stopped.
    Drained,
}

impl SchedulerState {
    const fn to_u8(self) -> u8 {
        match self {
            SchedulerState::Running => 0,
            SchedulerState::ShuttingDown => 1,
            SchedulerState::Drained => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => SchedulerState::Running,
            1 => SchedulerState::ShuttingDown,
            _ => SchedulerState::Drained,
        }
    }
}

/// Whether a cancel request aborts a task that has already started.
#[derive(Debug, Clone, Copy)]
enum Interrupt {
    /// Only when the canceller asked for interruption.
    OnRequest,
    /// Always; used for periodic work, which never completes on its own.
    Always,
}

/// Handle to a worker pool. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: SchedulerConfig,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    tasks: Arc<TaskCounter>,
    state: AtomicU8,
    stop: watch::Sender<bool>,
    listeners: Listeners,
    waiters: Mutex<Vec<Completer<()>>>,
}

impl Scheduler {
    /// Start a scheduler with `worker_threads` threads and default settings.
    ///
    /// Fails with [`Error::InvalidArgument`] for zero threads.
    pub fn new(worker_threads: usize) -> Result<Self> {
        Self::builder().worker_threads(worker_threads).build()
    }

    /// A builder starting from [`SchedulerConfig::default`].
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Start a scheduler from `config`.
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads())
            .thread_name(config.thread_name())
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        let (stop, _) = watch::channel(false);

        info!(
            worker_threads = config.worker_threads(),
            thread_name = config.thread_name(),
            "worker pool started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                runtime: Mutex::new(Some(runtime)),
                handle,
                tasks: TaskCounter::new(),
                state: AtomicU8::new(SchedulerState::Running.to_u8()),
                stop,
                listeners: Listeners::new(),
                waiters: Mutex::new(Vec::new()),
            }),
        })
    }

    /// The settings this scheduler was started with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Returns true once shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.state() != SchedulerState::Running
    }

    /// Run `task` on the pool. The future succeeds with `()` when it returns.
    pub fn execute<F>(&self, task: F) -> Future<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(move || {
            task();
            Ok(())
        })
    }

    /// Run `task` on the pool and complete with whatever it returns.
    ///
    /// Fails with [`Error::ShutDown`] without running if shutdown has begun
    /// and the listeners have already been notified.
    pub fn submit<T, F>(&self, task: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.launch("submit", None, Interrupt::OnRequest, async move { task() })
    }

    /// Run an async computation on the pool.
    ///
    /// Cancelling with interruption aborts it at its next `.await`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::{await_result, Scheduler};
    /// use std::time::Duration;
    ///
    /// let scheduler = Scheduler::new(1).unwrap();
    /// let value = scheduler.spawn(async {
    ///     tokio::time::sleep(Duration::from_millis(5)).await;
    ///     Ok("slept")
    /// });
    /// assert_eq!(await_result(value).unwrap(), "slept");
    /// # await_result(scheduler.shutdown(Duration::from_secs(1))).unwrap();
    /// ```
    pub fn spawn<T, W>(&self, work: W) -> Future<T>
    where
        T: Send + 'static,
        W: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        self.launch("spawn", None, Interrupt::OnRequest, work)
    }

    /// Run `task` once, `delay` from now.
    pub fn schedule_after<T, F>(&self, delay: Duration, task: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.schedule_at(deadline_after(delay), task)
    }

    /// Run `task` once, at `deadline`. A deadline in the past runs promptly.
    pub fn schedule_at<T, F>(&self, deadline: Instant, task: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.launch(
            "delayed",
            Some(deadline),
            Interrupt::OnRequest,
            async move { task() },
        )
    }

    /// Spawn `work` on the pool, wired to a fresh future.
    ///
    /// The task holds a drain guard for its whole life, including any initial
    /// delay. Cancelling before the work starts always aborts it; afterwards
    /// only if `interrupt` allows.
    fn launch<T, W>(
        &self,
        kind: &'static str,
        at: Option<Instant>,
        interrupt: Interrupt,
        work: W,
    ) -> Future<T>
    where
        T: Send + 'static,
        W: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        let Some(guard) = self.inner.tasks.enter() else {
            debug!(kind, "rejected submission: scheduler is shut down");
            return Future::failure(Error::ShutDown);
        };

        let (future, completer) = Future::pending();
        let started = Arc::new(AtomicBool::new(false));
        let abort: Arc<Mutex<Option<AbortHandle>>> = Arc::default();

        let hook_started = Arc::clone(&started);
        let hook_abort = Arc::clone(&abort);
        completer.on_cancel(move |may_interrupt| {
            let abort_now = match interrupt {
                Interrupt::Always => true,
                Interrupt::OnRequest => may_interrupt || !hook_started.load(Ordering::SeqCst),
            };
            if abort_now {
                if let Some(handle) = hook_abort.lock().as_ref() {
                    handle.abort();
                }
            }
        });

        let task = async move {
            let _guard = guard;
            if let Some(at) = at {
                tokio::time::sleep_until(at.into()).await;
            }
            if completer.is_cancelled() {
                return;
            }
            started.store(true, Ordering::SeqCst);
            let result = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .map_err(Error::from_panic)
                .and_then(|result| result);
            completer.complete(result);
        };
        let handle = self
            .inner
            .handle
            .spawn(task.instrument(debug_span!("task", kind)));
        *abort.lock() = Some(handle.abort_handle());
        future
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("worker_threads", &self.inner.config.worker_threads())
            .field("in_flight", &self.inner.tasks.in_flight())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
