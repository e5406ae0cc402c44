//! The process-wide default scheduler.
//!
//! Components should take a [`Scheduler`] as a collaborator. The default
//! exists for call sites that have nothing to inject: it is created lazily on
//! first use, sized by [`SchedulerConfig::default`], or installed once with
//! [`Scheduler::set_global`].

use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use super::{Scheduler, SchedulerConfig};
use crate::error::{Error, Result};
use crate::future::await_timeout;

static GLOBAL: Mutex<Option<Scheduler>> = parking_lot::const_mutex(None);

impl Scheduler {
    /// The process-wide default scheduler, created on first call.
    ///
    /// Once the default has been shut down it stays shut down; later calls
    /// return the same, drained, scheduler.
    pub fn global() -> Result<Scheduler> {
        let mut global = GLOBAL.lock();
        if let Some(scheduler) = global.as_ref() {
            return Ok(scheduler.clone());
        }
        let scheduler = Scheduler::with_config(SchedulerConfig::default())?;
        *global = Some(scheduler.clone());
        Ok(scheduler)
    }

    /// Install `scheduler` as the process-wide default.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if a default has already been
    /// installed or created by [`Scheduler::global`].
    pub fn set_global(scheduler: Scheduler) -> Result<()> {
        let mut global = GLOBAL.lock();
        if global.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        *global = Some(scheduler);
        Ok(())
    }

    /// Tie the default scheduler's lifetime to the returned guard.
    ///
    /// Keep the guard alive in `main`; dropping it shuts the default scheduler
    /// down with `timeout` and blocks until it has drained.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use arrowhead_async::Scheduler;
    /// use std::time::Duration;
    ///
    /// fn main() -> arrowhead_async::Result<()> {
    ///     let _exit = Scheduler::install_exit_hook(Duration::from_secs(10))?;
    ///     let _ = Scheduler::global()?.execute(|| println!("serving"));
    ///     Ok(())
    /// }
    /// ```
    pub fn install_exit_hook(timeout: Duration) -> Result<ExitGuard> {
        Ok(ExitGuard {
            scheduler: Self::global()?,
            timeout,
        })
    }

    /// [`Scheduler::install_exit_hook`] with the default scheduler's
    /// configured exit timeout.
    pub fn install_default_exit_hook() -> Result<ExitGuard> {
        let scheduler = Self::global()?;
        let timeout = scheduler.config().exit_timeout();
        Ok(ExitGuard { scheduler, timeout })
    }
}

/// Shuts the default scheduler down when dropped.
#[must_use = "the default scheduler is shut down as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ExitGuard {
    scheduler: Scheduler,
    timeout: Duration,
}

impl ExitGuard {
    /// The scheduler this guard shuts down.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let shutdown = self.scheduler.shutdown(self.timeout);
        let grace = self
            .timeout
            .saturating_add(self.scheduler.config().quiet_period());
        if let Err(error) = await_timeout(shutdown, grace) {
            warn!(%error, "default scheduler did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::await_result;
    use crate::SchedulerState;

    #[test]
    fn test_exit_guard_with_unbounded_timeout_drains() {
        let scheduler = Scheduler::builder().worker_threads(1).build().unwrap();
        let ran = scheduler.submit(|| Ok("ran"));
        let guard = ExitGuard {
            scheduler: scheduler.clone(),
            timeout: Duration::MAX,
        };
        drop(guard);
        assert_eq!(scheduler.state(), SchedulerState::Drained);
        assert_eq!(await_result(ran).unwrap(), "ran");
    }
}
