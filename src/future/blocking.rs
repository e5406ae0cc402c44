//! Blocking bridges for callers outside the callback world.
//!
//! Waiting uses a mutex/condition-variable handshake: the waiting thread
//! sleeps until a consumer delivers, the future is cancelled, the deadline
//! passes, or an [`Interrupter`] fires.
//!
//! # Examples
//!
//! ```rust
//! use arrowhead_async::{Awaiter, Error, Future};
//! use std::thread;
//!
//! let awaiter = Awaiter::new();
//! let interrupter = awaiter.interrupter();
//! let (never, _completer) = Future::<()>::pending();
//!
//! thread::spawn(move || interrupter.interrupt());
//! assert!(matches!(awaiter.await_result(never), Err(Error::Interrupted)));
//! ```

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::Future;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Flags {
    interrupted: bool,
}

#[derive(Debug, Default)]
struct Signal {
    flags: Mutex<Flags>,
    condvar: Condvar,
}

impl Signal {
    fn notify(&self) {
        let _flags = self.flags.lock();
        self.condvar.notify_all();
    }
}

enum SlotState<V> {
    Waiting,
    Ready(Result<V>),
    Taken,
    Dropped,
}

struct Slot<V> {
    state: Mutex<SlotState<V>>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Waiting),
        }
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Ready(_))
    }

    fn is_dropped(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Dropped)
    }

    fn take(&self) -> Option<Result<V>> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Ready(result) => Some(result),
            other => {
                *state = other;
                None
            }
        }
    }
}

/// The consumer side of a slot. Dropping it undelivered marks the slot as
/// dropped, which is how a cancelled future reaches the waiter.
struct Delivery<V> {
    slot: Arc<Slot<V>>,
    signal: Arc<Signal>,
    delivered: bool,
}

impl<V> Delivery<V> {
    fn deliver(mut self, result: Result<V>) {
        *self.slot.state.lock() = SlotState::Ready(result);
        self.delivered = true;
        self.signal.notify();
    }
}

impl<V> Drop for Delivery<V> {
    fn drop(&mut self) {
        if !self.delivered {
            *self.slot.state.lock() = SlotState::Dropped;
            self.signal.notify();
        }
    }
}

/// Blocks the current thread until futures complete.
///
/// An `Awaiter` can be interrupted from another thread through its
/// [`Interrupter`]; the wait then fails with [`Error::Interrupted`], which is
/// distinct from any failure of the awaited future itself. The interrupt flag
/// is cleared when it is reported. A pending interrupt makes the next wait
/// fail immediately.
#[derive(Debug, Default)]
pub struct Awaiter {
    signal: Arc<Signal>,
}

/// Interrupts the waits of one [`Awaiter`].
#[derive(Debug, Clone)]
pub struct Interrupter {
    signal: Arc<Signal>,
}

impl Interrupter {
    /// Interrupt the current or next wait.
    pub fn interrupt(&self) {
        let mut flags = self.signal.flags.lock();
        flags.interrupted = true;
        self.signal.condvar.notify_all();
    }
}

impl Awaiter {
    /// Create an awaiter with no pending interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that interrupts this awaiter's waits.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Block until `future` completes.
    pub fn await_result<V: Send + 'static>(&self, future: Future<V>) -> Result<V> {
        self.await_deadline(future, None)
    }

    /// Block until `future` completes or `timeout` elapses.
    ///
    /// On timeout the future is cancelled and [`Error::TimedOut`] is returned.
    /// A timeout too large to represent as a deadline waits without one.
    pub fn await_timeout<V: Send + 'static>(
        &self,
        future: Future<V>,
        timeout: Duration,
    ) -> Result<V> {
        let deadline = Instant::now().checked_add(timeout).map(|at| (at, timeout));
        self.await_deadline(future, deadline)
    }

    /// Block until every future completes.
    ///
    /// Returns the values in input order, or the first failure in input
    /// order. If any future is cancelled the wait fails with
    /// [`Error::Cancelled`] without waiting for the rest.
    pub fn await_all<V, I>(&self, futures: I) -> Result<Vec<V>>
    where
        V: Send + 'static,
        I: IntoIterator<Item = Future<V>>,
    {
        let futures: Vec<Future<V>> = futures.into_iter().collect();
        let slots: Vec<Arc<Slot<V>>> = futures.iter().map(|f| self.subscribe(f)).collect();

        let outcome = self.wait(None, || {
            if slots.iter().any(|slot| slot.is_dropped()) {
                return Some(Err(Error::Cancelled));
            }
            if !slots.iter().all(|slot| slot.is_ready()) {
                return None;
            }
            let results: Vec<Result<V>> = slots.iter().filter_map(|slot| slot.take()).collect();
            Some(results.into_iter().collect())
        });

        if outcome.is_err() {
            for future in &futures {
                future.cancel();
            }
        }
        outcome
    }

    fn await_deadline<V: Send + 'static>(
        &self,
        future: Future<V>,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<V> {
        let slot = self.subscribe(&future);
        let outcome = self.wait(deadline, || {
            if slot.is_dropped() {
                return Some(Err(Error::Cancelled));
            }
            slot.take()
        });
        if matches!(outcome, Err(Error::TimedOut(_)) | Err(Error::Interrupted)) {
            future.cancel();
        }
        outcome
    }

    fn subscribe<V: Send + 'static>(&self, future: &Future<V>) -> Arc<Slot<V>> {
        let slot = Arc::new(Slot::new());
        let delivery = Delivery {
            slot: Arc::clone(&slot),
            signal: Arc::clone(&self.signal),
            delivered: false,
        };
        future.on_result(move |result| delivery.deliver(result));
        slot
    }

    /// Wait until `poll` yields an outcome. `poll` runs with the signal lock
    /// held, so a delivery cannot slip between the check and the sleep.
    fn wait<T>(
        &self,
        deadline: Option<(Instant, Duration)>,
        mut poll: impl FnMut() -> Option<Result<T>>,
    ) -> Result<T> {
        let mut flags = self.signal.flags.lock();
        loop {
            if let Some(outcome) = poll() {
                return outcome;
            }
            if flags.interrupted {
                flags.interrupted = false;
                return Err(Error::Interrupted);
            }
            match deadline {
                Some((at, timeout)) => {
                    if self.signal.condvar.wait_until(&mut flags, at).timed_out() {
                        return poll().unwrap_or(Err(Error::TimedOut(timeout)));
                    }
                }
                None => self.signal.condvar.wait(&mut flags),
            }
        }
    }
}

/// Block until `future` completes.
///
/// Intended for the few synchronous boundaries of a program, such as `main`
/// waiting for shutdown.
pub fn await_result<V: Send + 'static>(future: Future<V>) -> Result<V> {
    Awaiter::new().await_result(future)
}

/// Block until `future` completes or `timeout` elapses.
pub fn await_timeout<V: Send + 'static>(future: Future<V>, timeout: Duration) -> Result<V> {
    Awaiter::new().await_timeout(future, timeout)
}

/// Block until every future completes. See [`Awaiter::await_all`].
pub fn await_all<V, I>(futures: I) -> Result<Vec<V>>
where
    V: Send + 'static,
    I: IntoIterator<Item = Future<V>>,
{
    Awaiter::new().await_all(futures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_await_completed_future() {
        assert_eq!(await_result(Future::success(3)).unwrap(), 3);
    }

    #[test]
    fn test_await_cross_thread_completion() {
        let (future, completer) = Future::pending();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.succeed(99);
        });
        assert_eq!(await_result(future).unwrap(), 99);
    }

    #[test]
    fn test_await_failure_is_returned() {
        let result = await_result(Future::<()>::failure(Error::msg("bad")));
        assert_eq!(result.unwrap_err().to_string(), "bad");
    }

    #[test]
    fn test_await_timeout_cancels() {
        let (future, completer) = Future::<i32>::pending();
        let result = await_timeout(future, Duration::from_millis(20));
        assert!(matches!(result, Err(Error::TimedOut(_))));
        assert!(completer.is_cancelled());
    }

    #[test]
    fn test_abandoned_producer_fails_wait() {
        let (future, completer) = Future::<i32>::pending();
        thread::spawn(move || drop(completer));
        assert!(matches!(await_result(future), Err(Error::Abandoned)));
    }

    #[test]
    fn test_abandoned_producer_propagates_through_map() {
        let (future, completer) = Future::<i32>::pending();
        let derived = future.map(|x| x + 1);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            drop(completer);
        });
        assert!(matches!(await_result(derived), Err(Error::Abandoned)));
    }

    #[test]
    fn test_cancel_from_another_handle_fails_wait() {
        let (future, _completer) = Future::<i32>::pending();
        let derived = future.map(|x| x + 1);
        let handle = Future::from_source(derived.source.clone());
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            handle.cancel();
        });
        assert!(matches!(await_result(derived), Err(Error::Cancelled)));
    }

    #[test]
    fn test_pending_interrupt_fails_next_wait_once() {
        let awaiter = Awaiter::new();
        awaiter.interrupter().interrupt();
        let (future, completer) = Future::<i32>::pending();
        assert!(matches!(
            awaiter.await_result(future),
            Err(Error::Interrupted)
        ));
        assert!(completer.is_cancelled());
        assert_eq!(awaiter.await_result(Future::success(1)).unwrap(), 1);
    }

    #[test]
    fn test_await_all_in_order() {
        let (late, completer) = Future::pending();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            completer.succeed(1);
        });
        let values = await_all(vec![late, Future::success(2), Future::success(3)]).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_await_all_reports_first_failure() {
        let result = await_all(vec![
            Future::success(1),
            Future::failure(Error::msg("second")),
            Future::failure(Error::msg("third")),
        ]);
        assert_eq!(result.unwrap_err().to_string(), "second");
    }

    #[test]
    fn test_await_timeout_unbounded_waits_for_result() {
        assert_eq!(await_timeout(Future::success(1), Duration::MAX).unwrap(), 1);

        let (future, completer) = Future::pending();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.succeed("late");
        });
        assert_eq!(await_timeout(future, Duration::MAX).unwrap(), "late");
    }
}
