//! Recurring tasks.
//!
//! A periodic task gets one future for its whole life. The future stays
//! pending across ticks and only resolves when the task fails (with the task's
//! error), when the scheduler shuts down (with [`Error::ShutDown`]), or never,
//! if the caller cancels it. It carries no tick count or per-tick result.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use super::{deadline_after, Interrupt, Scheduler, FAR_FUTURE};
use crate::error::{Error, Result};
use crate::Future;

impl Scheduler {
    /// Run `task` every `period`, starting `initial_delay` from now.
    ///
    /// Ticks are measured from the start time, not from the end of the
    /// previous run; runs that fall behind are caught up back to back.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::{await_result, Error, Scheduler};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let scheduler = Scheduler::new(1).unwrap();
    /// let ticks = Arc::new(AtomicUsize::new(0));
    /// let counter = ticks.clone();
    /// let heartbeat = scheduler.schedule_at_fixed_rate(
    ///     Duration::ZERO,
    ///     Duration::from_millis(5),
    ///     move || {
    ///         if counter.fetch_add(1, Ordering::SeqCst) == 2 {
    ///             return Err(Error::msg("third beat failed"));
    ///         }
    ///         Ok(())
    ///     },
    /// );
    ///
    /// let error = await_result(heartbeat).unwrap_err();
    /// assert_eq!(error.to_string(), "third beat failed");
    /// assert_eq!(ticks.load(Ordering::SeqCst), 3);
    /// # await_result(scheduler.shutdown(Duration::from_secs(1))).unwrap();
    /// ```
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> Future<()>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if period.is_zero() {
            return Future::failure(Error::InvalidArgument("period must be non-zero"));
        }
        let stop = self.inner.stop.subscribe();
        let start = deadline_after(initial_delay);
        let period = period.min(FAR_FUTURE);
        self.launch(
            "fixed-rate",
            None,
            Interrupt::Always,
            fixed_rate(stop, start, period, task),
        )
    }

    /// Run `task` repeatedly with `delay` between the end of one run and the
    /// start of the next, starting `initial_delay` from now.
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: F,
    ) -> Future<()>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if delay.is_zero() {
            return Future::failure(Error::InvalidArgument("delay must be non-zero"));
        }
        let stop = self.inner.stop.subscribe();
        self.launch(
            "fixed-delay",
            None,
            Interrupt::Always,
            fixed_delay(
                stop,
                initial_delay.min(FAR_FUTURE),
                delay.min(FAR_FUTURE),
                task,
            ),
        )
    }
}

async fn fixed_rate<F>(
    mut stop: watch::Receiver<bool>,
    start: Instant,
    period: Duration,
    mut task: F,
) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let mut ticks = time::interval_at(start.into(), period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => return Err(Error::ShutDown),
            _ = ticks.tick() => {}
        }
        task()?;
    }
}

async fn fixed_delay<F>(
    mut stop: watch::Receiver<bool>,
    initial_delay: Duration,
    delay: Duration,
    mut task: F,
) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let mut pause = initial_delay;
    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => return Err(Error::ShutDown),
            _ = time::sleep(pause) => {}
        }
        task()?;
        pause = delay;
    }
}

/// Resolves once shutdown has begun, or the scheduler is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
