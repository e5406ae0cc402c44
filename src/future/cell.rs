//! The completable cell behind pending and derived futures.
//!
//! State transitions:
//!
//! * `Pending`   -> `Completed`: result arrived before a consumer registered
//! * `Pending`   -> `Delivered`: result arrived and was handed to the consumer
//! * `Pending`   -> `Cancelled`
//! * `Completed` -> `Delivered`: a consumer registered and took the result
//! * `Completed` -> `Cancelled`: the stored result is discarded
//!
//! `Delivered` and `Cancelled` are final. Every transition happens under the
//! state lock; consumers and hooks always run after the lock is released.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use super::cancel::Cancellable;
use super::{Consumer, Source};
use crate::error::{Error, Result};

pub(crate) type StartHook = Box<dyn FnOnce() + Send + 'static>;
pub(crate) type CancelHook = Box<dyn FnOnce(bool) + Send + 'static>;

enum State<V> {
    Pending {
        consumer: Option<Consumer<V>>,
        start: Option<StartHook>,
        on_cancel: Option<CancelHook>,
    },
    Completed(Result<V>),
    Delivered,
    Cancelled {
        interrupted: bool,
    },
}

impl<V> State<V> {
    fn name(&self) -> &'static str {
        match self {
            State::Pending { .. } => "pending",
            State::Completed(_) => "completed",
            State::Delivered => "delivered",
            State::Cancelled { .. } => "cancelled",
        }
    }
}

pub(crate) struct Cell<V> {
    state: Mutex<State<V>>,
}

impl<V: Send + 'static> Cell<V> {
    pub(crate) fn new() -> Self {
        Self::with_hooks(None, None)
    }

    /// A cell whose `start` hook runs the first time a consumer registers.
    pub(crate) fn with_hooks(start: Option<StartHook>, on_cancel: Option<CancelHook>) -> Self {
        Self {
            state: Mutex::new(State::Pending {
                consumer: None,
                start,
                on_cancel,
            }),
        }
    }

    /// Complete the cell. Returns false if it was already completed or cancelled.
    pub(crate) fn complete(&self, result: Result<V>) -> bool {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Delivered) {
            State::Pending {
                consumer: Some(consumer),
                start,
                on_cancel,
            } => {
                drop(state);
                drop((start, on_cancel));
                consumer(result);
                true
            }
            State::Pending {
                consumer: None,
                start,
                on_cancel,
            } => {
                *state = State::Completed(result);
                drop(state);
                drop((start, on_cancel));
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }

    pub(crate) fn set_cancel_hook(&self, hook: CancelHook) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Pending { on_cancel, .. } => {
                let previous = on_cancel.replace(hook);
                drop(state);
                drop(previous);
            }
            State::Cancelled { interrupted } => {
                let interrupted = *interrupted;
                drop(state);
                hook(interrupted);
            }
            State::Completed(_) | State::Delivered => {}
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(*self.state.lock(), State::Cancelled { .. })
    }
}

impl<V: Send + 'static> Cancellable for Cell<V> {
    fn cancel(&self, may_interrupt: bool) -> bool {
        let mut state = self.state.lock();
        let cancelled = State::Cancelled {
            interrupted: may_interrupt,
        };
        match mem::replace(&mut *state, cancelled) {
            State::Pending {
                consumer,
                start,
                on_cancel,
            } => {
                drop(state);
                drop((consumer, start));
                if let Some(hook) = on_cancel {
                    hook(may_interrupt);
                }
                true
            }
            State::Completed(result) => {
                drop(state);
                drop(result);
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }
}

impl<V: Send + 'static> Source<V> for Cell<V> {
    fn on_result(&self, consumer: Consumer<V>) {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Delivered) {
            State::Pending {
                consumer: previous,
                start,
                on_cancel,
            } => {
                *state = State::Pending {
                    consumer: Some(consumer),
                    start: None,
                    on_cancel,
                };
                drop(state);
                drop(previous);
                if let Some(start) = start {
                    start();
                }
            }
            State::Completed(result) => {
                drop(state);
                consumer(result);
            }
            other => {
                *state = other;
                drop(state);
                drop(consumer);
            }
        }
    }

    fn status(&self) -> &'static str {
        self.state.lock().name()
    }
}

/// Producer half of [`Future::pending`](crate::Future::pending).
///
/// Completing consumes the completer. Dropping it without completing fails the
/// future with [`Error::Abandoned`], so a producer that dies never leaves its
/// consumer waiting forever.
///
/// # Examples
///
/// ```rust
/// use arrowhead_async::{Future, testing::Recorder};
///
/// let (future, completer) = Future::<i32>::pending();
/// let recorder = Recorder::new();
/// future.on_result(recorder.consumer());
/// assert_eq!(recorder.calls(), 0);
///
/// completer.succeed(7);
/// assert_eq!(recorder.take().unwrap().unwrap(), 7);
/// ```
pub struct Completer<V: Send + 'static> {
    cell: Option<Arc<Cell<V>>>,
}

impl<V: Send + 'static> Completer<V> {
    pub(crate) fn new(cell: Arc<Cell<V>>) -> Self {
        Self { cell: Some(cell) }
    }

    /// Complete with `result`. Returns false if the future was cancelled.
    pub fn complete(mut self, result: Result<V>) -> bool {
        match self.cell.take() {
            Some(cell) => cell.complete(result),
            None => false,
        }
    }

    /// Complete successfully.
    pub fn succeed(self, value: V) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with a failure.
    pub fn fail(self, error: Error) -> bool {
        self.complete(Err(error))
    }

    /// Returns true once a consumer has cancelled the future.
    ///
    /// Producers may check this to skip work nobody will observe.
    pub fn is_cancelled(&self) -> bool {
        self.cell.as_ref().is_some_and(|cell| cell.is_cancelled())
    }

    /// Run `hook` when the future is cancelled, with the `may_interrupt` flag
    /// of the cancel request. Runs immediately if the future is already
    /// cancelled. Replaces any earlier hook.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if let Some(cell) = &self.cell {
            cell.set_cancel_hook(Box::new(hook));
        }
    }
}

impl<V: Send + 'static> Drop for Completer<V> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.complete(Err(Error::Abandoned));
        }
    }
}

impl<V: Send + 'static> std::fmt::Debug for Completer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.cell.as_ref().map_or("completed", |cell| cell.status());
        f.debug_struct("Completer").field("status", &status).finish()
    }
}
