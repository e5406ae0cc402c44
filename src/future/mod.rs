//! Single-assignment futures.
//!
//! A [`Future`] produces exactly one [`Result`], pushed to the single consumer
//! registered with [`Future::on_result`]. It can be cancelled while pending,
//! after which its consumer is never invoked, even if the underlying work later
//! finishes.
//!
//! # Core Concepts
//!
//! - **Push-based**: results are delivered to a callback, not polled
//! - **Single consumer**: registering again replaces the earlier consumer
//! - **Lazy composition**: `map`, `flat_map` and friends only subscribe upstream
//!   once their own consumer is registered
//! - **Forward cancellation**: cancelling a derived future cancels whichever
//!   future it currently depends on
//!
//! # Examples
//!
//! ```rust
//! use arrowhead_async::{Future, testing::Recorder};
//!
//! let recorder = Recorder::new();
//! Future::success(5)
//!     .map(|x| x + 1)
//!     .flat_map(|x| Future::success(x * 2))
//!     .on_result(recorder.consumer());
//!
//! assert_eq!(recorder.take().unwrap().unwrap(), 12);
//! ```
//!
//! ## Producing a result later
//!
//! ```rust
//! use arrowhead_async::{await_result, Future};
//! use std::thread;
//!
//! let (future, completer) = Future::pending();
//! thread::spawn(move || completer.succeed("done"));
//!
//! assert_eq!(await_result(future).unwrap(), "done");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

mod blocking;
mod bridge;
mod cancel;
mod cell;
pub(crate) mod combinators;
mod ready;

pub use blocking::{await_all, await_result, await_timeout, Awaiter, Interrupter};
pub use cell::Completer;

pub(crate) use cancel::{CancelTarget, Cancellable};
use cell::Cell;
use ready::Ready;

/// Callback receiving a future's result.
pub(crate) type Consumer<V> = Box<dyn FnOnce(Result<V>) + Send + 'static>;

/// The contract every future implementation fulfils.
pub(crate) trait Source<V>: Cancellable {
    /// Register the consumer; see [`Future::on_result`].
    fn on_result(&self, consumer: Consumer<V>);

    /// Human-readable state for `Debug` output.
    fn status(&self) -> &'static str;
}

/// A single-assignment asynchronous result.
///
/// See the [module documentation](self) for the contract.
#[must_use = "a future must have `on_result` or `cancel` called on it"]
pub struct Future<V: Send + 'static> {
    pub(crate) source: Arc<dyn Source<V>>,
}

impl<V: Send + 'static> Future<V> {
    pub(crate) fn from_source(source: Arc<dyn Source<V>>) -> Self {
        Self { source }
    }

    /// A future that has already succeeded with `value`.
    pub fn success(value: V) -> Self {
        Self::from_result(Ok(value))
    }

    /// A future that has already failed with `error`.
    pub fn failure(error: Error) -> Self {
        Self::from_result(Err(error))
    }

    /// A future that is already resolved with `result`.
    pub fn from_result(result: Result<V>) -> Self {
        Self::from_source(Arc::new(Ready::new(result)))
    }

    /// A pending future and the [`Completer`] that resolves it.
    pub fn pending() -> (Self, Completer<V>) {
        let cell = Arc::new(Cell::new());
        let completer = Completer::new(Arc::clone(&cell));
        (Self::from_source(cell), completer)
    }

    /// Register the consumer of this future's result.
    ///
    /// If the future has already completed, `consumer` runs before this call
    /// returns. If it is cancelled, `consumer` never runs. Registering again
    /// replaces a consumer that has not been invoked yet; once a result has
    /// been delivered, further registrations are ignored.
    pub fn on_result<F>(&self, consumer: F)
    where
        F: FnOnce(Result<V>) + Send + 'static,
    {
        self.source.on_result(Box::new(consumer));
    }

    /// Register a consumer that only sees a successful value.
    pub fn on_success<F>(&self, consumer: F)
    where
        F: FnOnce(V) + Send + 'static,
    {
        self.on_result(move |result| {
            if let Ok(value) = result {
                consumer(value);
            }
        });
    }

    /// Register a consumer that only sees a failure.
    pub fn on_error<F>(&self, consumer: F)
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_result(move |result| {
            if let Err(error) = result {
                consumer(error);
            }
        });
    }

    /// Cancel without interrupting work that is already running.
    ///
    /// Returns true if this call cancelled a future that was still pending.
    pub fn cancel(&self) -> bool {
        self.cancel_with(false)
    }

    /// Cancel, asking the executor to interrupt running work if
    /// `may_interrupt_if_running` is set.
    ///
    /// Idempotent. Once this returns, the registered consumer will never run.
    pub fn cancel_with(&self, may_interrupt_if_running: bool) -> bool {
        self.source.cancel(may_interrupt_if_running)
    }
}

impl Future<()> {
    /// A future that has already succeeded with `()`.
    pub fn done() -> Self {
        Self::success(())
    }
}

impl<V: Send + 'static> fmt::Debug for Future<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("status", &self.source.status())
            .finish()
    }
}
