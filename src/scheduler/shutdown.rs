//! Two-phase graceful shutdown: notify listeners, then drain the pool.

use std::io;
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, info_span, warn};

use super::{Inner, Scheduler, SchedulerState};
use crate::error::{catch_result, Error, Result, ShutdownError};
use crate::future::Completer;
use crate::Future;

/// Notified once, when shutdown of a [`Scheduler`] begins.
///
/// Listeners run synchronously in the thread that called
/// [`Scheduler::shutdown`], before the pool stops accepting work, so they may
/// still submit final tasks. An error (or panic) from one listener is
/// collected into the shutdown result and does not stop the others.
///
/// Closures taking `(&Scheduler, Duration)` implement this trait.
///
/// # Examples
///
/// ```rust
/// use arrowhead_async::{await_result, Result, Scheduler, ShutdownListener};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = Scheduler::new(1).unwrap();
/// let listener: Arc<dyn ShutdownListener> =
///     Arc::new(|scheduler: &Scheduler, _grace: Duration| -> Result<()> {
///         // Still accepted: the pool stops accepting after listeners ran.
///         let _ = scheduler.execute(|| {});
///         Ok(())
///     });
/// assert!(scheduler.add_shutdown_listener(listener));
///
/// await_result(scheduler.shutdown(Duration::from_secs(1))).unwrap();
/// ```
pub trait ShutdownListener: Send + Sync + 'static {
    /// Called with the scheduler being shut down and the drain deadline.
    fn on_shutdown(&self, scheduler: &Scheduler, timeout: Duration) -> Result<()>;
}

impl<F> ShutdownListener for F
where
    F: Fn(&Scheduler, Duration) -> Result<()> + Send + Sync + 'static,
{
    fn on_shutdown(&self, scheduler: &Scheduler, timeout: Duration) -> Result<()> {
        self(scheduler, timeout)
    }
}

/// Membership-unique listener set. Closed (`None`) once shutdown has begun.
pub(super) struct Listeners {
    entries: Mutex<Option<Vec<Arc<dyn ShutdownListener>>>>,
}

impl Listeners {
    pub(super) fn new() -> Self {
        Self {
            entries: Mutex::new(Some(Vec::new())),
        }
    }

    fn add(&self, listener: Arc<dyn ShutdownListener>) -> bool {
        let mut entries = self.entries.lock();
        match entries.as_mut() {
            Some(entries) if !entries.iter().any(|l| Arc::ptr_eq(l, &listener)) => {
                entries.push(listener);
                true
            }
            _ => false,
        }
    }

    fn remove(&self, listener: &Arc<dyn ShutdownListener>) -> bool {
        let mut entries = self.entries.lock();
        let Some(entries) = entries.as_mut() else {
            return false;
        };
        let before = entries.len();
        entries.retain(|l| !Arc::ptr_eq(l, listener));
        entries.len() != before
    }

    fn close(&self) -> Vec<Arc<dyn ShutdownListener>> {
        self.entries.lock().take().unwrap_or_default()
    }
}

impl Scheduler {
    /// Register a listener to run when shutdown begins.
    ///
    /// Returns false if it is already registered or shutdown has already begun.
    pub fn add_shutdown_listener(&self, listener: Arc<dyn ShutdownListener>) -> bool {
        self.inner.listeners.add(listener)
    }

    /// Deregister a listener. Returns false if it was not registered.
    pub fn remove_shutdown_listener(&self, listener: &Arc<dyn ShutdownListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Shut the scheduler down, allowing up to `timeout` for work to finish.
    ///
    /// Listeners run first, in this thread. Then the pool stops accepting
    /// work, periodic tasks end with [`Error::ShutDown`], and the remaining
    /// tasks are drained on a dedicated thread. Tasks still running at the
    /// deadline are terminated.
    ///
    /// The returned future completes once the pool is drained. It fails with
    /// [`Error::Shutdown`] if any listener failed or the drain missed its
    /// deadline; the [`ShutdownError`] carries every cause. Calling this again
    /// returns [`Scheduler::termination`].
    pub fn shutdown(&self, timeout: Duration) -> Future<()> {
        let began = self.inner.state.compare_exchange(
            SchedulerState::Running.to_u8(),
            SchedulerState::ShuttingDown.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if began.is_err() {
            return self.termination();
        }

        let _span = info_span!("shutdown", ?timeout).entered();
        info!("notifying shutdown listeners");
        let failures = self.notify_listeners(timeout);

        self.inner.tasks.stop_accepting();
        self.inner.stop.send_replace(true);
        info!(
            in_flight = self.inner.tasks.in_flight(),
            "stopped accepting work; draining"
        );

        let (future, completer) = Future::pending();
        let job = Arc::new(Mutex::new(Some(Drain {
            inner: Arc::clone(&self.inner),
            completer,
            failures,
            timeout,
        })));
        let for_thread = Arc::clone(&job);
        let spawned = thread::Builder::new()
            .name(format!("{}-shutdown", self.inner.config.thread_name()))
            .spawn(move || {
                let drain = for_thread.lock().take();
                if let Some(drain) = drain {
                    drain.run();
                }
            });
        if let Err(error) = spawned {
            let drain = job.lock().take();
            if let Some(drain) = drain {
                drain.abandon(error);
            }
        }
        future
    }

    /// A future that succeeds once the scheduler has drained.
    ///
    /// Unlike the future returned by [`Scheduler::shutdown`], it never fails.
    pub fn termination(&self) -> Future<()> {
        let mut waiters = self.inner.waiters.lock();
        if self.state() == SchedulerState::Drained {
            return Future::done();
        }
        let (future, completer) = Future::pending();
        waiters.push(completer);
        future
    }

    fn notify_listeners(&self, timeout: Duration) -> Vec<Error> {
        let listeners = self.inner.listeners.close();
        let mut failures = Vec::new();
        for listener in listeners {
            if let Err(error) = catch_result(|| listener.on_shutdown(self, timeout)) {
                warn!(%error, "shutdown listener failed");
                failures.push(error);
            }
        }
        failures
    }
}

/// Drain phase, run off the caller's thread.
struct Drain {
    inner: Arc<Inner>,
    completer: Completer<()>,
    failures: Vec<Error>,
    timeout: Duration,
}

impl Drain {
    fn run(self) {
        let deadline = Instant::now().checked_add(self.timeout);
        let pending = self
            .inner
            .tasks
            .wait_idle(deadline, self.inner.config.quiet_period());

        // Without a deadline the pool is already idle here.
        let remaining = deadline.map_or(Duration::ZERO, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        let runtime = self.inner.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(remaining);
        }

        let drain = if pending == 0 {
            None
        } else {
            warn!(
                pending,
                timeout = ?self.timeout,
                "drain deadline passed; terminating remaining tasks"
            );
            Some(Error::DrainIncomplete {
                pending,
                timeout: self.timeout,
            })
        };
        self.finish(drain);
    }

    /// The drain thread could not be started: stop the pool without waiting.
    fn abandon(self, error: io::Error) {
        warn!(%error, "could not start drain thread; stopping pool immediately");
        let runtime = self.inner.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
        self.finish(Some(Error::Runtime(error)));
    }

    fn finish(self, drain: Option<Error>) {
        let Drain {
            inner,
            completer,
            failures,
            ..
        } = self;

        let waiters = {
            let mut waiters = inner.waiters.lock();
            inner
                .state
                .store(SchedulerState::Drained.to_u8(), Ordering::SeqCst);
            mem::take(&mut *waiters)
        };
        info!(listener_failures = failures.len(), "scheduler drained");

        let result = if drain.is_none() && failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError::new(drain, failures).into())
        };
        completer.complete(result);
        for waiter in waiters {
            waiter.succeed(());
        }
    }
}
