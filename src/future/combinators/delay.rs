//! Delay combinators - hold a result back on the scheduler's timer.

use std::time::{Duration, Instant};

use crate::{Future, Scheduler};

impl<V: Send + 'static> Future<V> {
    /// Deliver this future's result `duration` after it arrives.
    ///
    /// The delay runs on `scheduler`; if the scheduler has shut down, the
    /// derived future fails with [`Error::ShutDown`](crate::Error::ShutDown).
    pub fn delay(self, scheduler: &Scheduler, duration: Duration) -> Future<V> {
        let scheduler = scheduler.clone();
        self.flat_map_result(move |result| scheduler.schedule_after(duration, move || result))
    }

    /// Deliver this future's result no earlier than `deadline`.
    pub fn delay_until(self, scheduler: &Scheduler, deadline: Instant) -> Future<V> {
        let scheduler = scheduler.clone();
        self.flat_map_result(move |result| scheduler.schedule_at(deadline, move || result))
    }
}
