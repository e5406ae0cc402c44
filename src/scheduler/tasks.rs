//! In-flight task accounting for the drain phase.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct Counts {
    in_flight: usize,
    accepting: bool,
}

/// Counts tasks that were accepted and have not finished yet.
#[derive(Debug)]
pub(crate) struct TaskCounter {
    counts: Mutex<Counts>,
    idle: Condvar,
}

/// Held by a running task; dropping it marks the task finished.
#[derive(Debug)]
pub(crate) struct TaskGuard {
    counter: Arc<TaskCounter>,
}

impl TaskCounter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new(Counts {
                in_flight: 0,
                accepting: true,
            }),
            idle: Condvar::new(),
        })
    }

    /// Admit a task, or return `None` once the counter stopped accepting.
    pub(crate) fn enter(self: &Arc<Self>) -> Option<TaskGuard> {
        let mut counts = self.counts.lock();
        if !counts.accepting {
            return None;
        }
        counts.in_flight += 1;
        Some(TaskGuard {
            counter: Arc::clone(self),
        })
    }

    pub(crate) fn stop_accepting(&self) {
        self.counts.lock().accepting = false;
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.counts.lock().in_flight
    }

    /// Wait until no task is in flight or `deadline` passes, waking at least
    /// every `quiet_period`. Returns the number of tasks still in flight.
    ///
    /// With no deadline this waits until the pool is idle.
    pub(crate) fn wait_idle(&self, deadline: Option<Instant>, quiet_period: Duration) -> usize {
        let mut counts = self.counts.lock();
        loop {
            if counts.in_flight == 0 {
                return 0;
            }
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return counts.in_flight;
            }
            let wake = match (deadline, now.checked_add(quiet_period)) {
                (Some(deadline), Some(quiet)) => Some(deadline.min(quiet)),
                (deadline, quiet) => deadline.or(quiet),
            };
            match wake {
                Some(wake) => {
                    self.idle.wait_until(&mut counts, wake);
                }
                None => self.idle.wait(&mut counts),
            }
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut counts = self.counter.counts.lock();
        counts.in_flight -= 1;
        if counts.in_flight == 0 {
            self.counter.idle.notify_all();
        }
    }
}
