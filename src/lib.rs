//! # Arrowhead Async
//!
//! The asynchronous result-propagation engine behind Arrowhead services.
//!
//! Anything that may not complete synchronously (service registration,
//! request dispatch, identity resolution, I/O-bound encoding) returns a
//! [`Future`]: a single-assignment, push-based cell that delivers exactly one
//! [`Result`] to one registered consumer, or nothing at all if it is cancelled.
//!
//! ## Building Blocks
//!
//! - [`Future`] and its combinators (`map`, `flat_map`, result- and
//!   failure-level variants) with forward cancellation
//! - [`serial`]: ordered reduction and collection over sequences of futures
//! - [`Scheduler`]: a worker pool whose submissions return futures, with a
//!   listener-aware graceful [`shutdown`](Scheduler::shutdown)
//! - Blocking bridges ([`await_result`], [`await_all`]) for the few
//!   synchronous boundaries of a program
//!
//! ## Quick Example
//!
//! ```rust
//! use arrowhead_async::{await_result, serial, Future, Scheduler};
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(2).unwrap();
//!
//! let lookups: Vec<Future<u32>> = (1..=3)
//!     .map(|port| scheduler.submit(move || Ok(8000 + port)))
//!     .collect();
//! let total = serial::reduce(lookups, 0, |acc, port| acc + port)
//!     .map(|sum| format!("sum of ports: {}", sum));
//!
//! assert_eq!(await_result(total).unwrap(), "sum of ports: 24006");
//! await_result(scheduler.shutdown(Duration::from_secs(1))).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod future;
pub mod scheduler;
pub mod serial;
pub mod testing;

// Re-exports
pub use error::{BoxError, Error, Result, ShutdownError};
pub use future::{
    await_all, await_result, await_timeout, Awaiter, Completer, Future, Interrupter,
};
pub use scheduler::{
    ExitGuard, Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerState, ShutdownListener,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::future::{await_all, await_result, Completer, Future};
    pub use crate::scheduler::{Scheduler, ShutdownListener};
    pub use crate::serial;
}
