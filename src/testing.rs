//! Testing utilities for code built on futures
//!
//! This module provides helpers for observing futures in tests: a recording
//! consumer, assertion macros for results, and (behind the `proptest` feature)
//! a strategy producing arbitrary outcomes.
//!
//! # Examples
//!
//! ## Recorder
//!
//! ```rust
//! use arrowhead_async::{Future, testing::Recorder};
//!
//! let recorder = Recorder::new();
//! let future = Future::success(1);
//! future.on_result(recorder.consumer());
//! future.on_result(recorder.consumer());
//!
//! assert_eq!(recorder.calls(), 1);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use arrowhead_async::{assert_failed, assert_succeeded, Error};
//!
//! let ok: arrowhead_async::Result<i32> = Ok(42);
//! assert_succeeded!(ok, 42);
//!
//! let err: arrowhead_async::Result<i32> = Err(Error::msg("nope"));
//! assert_failed!(err);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

struct Recorded<V> {
    calls: usize,
    last: Option<Result<V>>,
}

/// A consumer factory that counts deliveries and keeps the last result.
///
/// Every consumer handed out by [`Recorder::consumer`] reports into the same
/// recorder, which makes "invoked exactly once" and "never invoked" checks
/// straightforward.
pub struct Recorder<V> {
    inner: Arc<Mutex<Recorded<V>>>,
}

impl<V: Send + 'static> Recorder<V> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recorded {
                calls: 0,
                last: None,
            })),
        }
    }

    /// A consumer to pass to [`Future::on_result`](crate::Future::on_result).
    pub fn consumer(&self) -> impl FnOnce(Result<V>) + Send + 'static {
        let inner = Arc::clone(&self.inner);
        move |result| {
            let mut recorded = inner.lock();
            recorded.calls += 1;
            recorded.last = Some(result);
        }
    }

    /// Number of times any consumer from this recorder was invoked.
    pub fn calls(&self) -> usize {
        self.inner.lock().calls
    }

    /// Take the most recently delivered result.
    pub fn take(&self) -> Option<Result<V>> {
        self.inner.lock().last.take()
    }
}

impl<V: Send + 'static> Default for Recorder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Recorder<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for Recorder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("calls", &self.inner.lock().calls)
            .finish()
    }
}

/// Assert that a result succeeded, optionally with an expected value.
///
/// # Example
///
/// ```rust
/// use arrowhead_async::assert_succeeded;
///
/// let result: arrowhead_async::Result<&str> = Ok("up");
/// assert_succeeded!(result, "up");
/// ```
#[macro_export]
macro_rules! assert_succeeded {
    ($result:expr) => {
        match $result {
            ::std::result::Result::Ok(_) => {}
            ::std::result::Result::Err(e) => {
                panic!("Expected success, got failure: {:?}", e);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            ::std::result::Result::Ok(value) => assert_eq!(value, $expected),
            ::std::result::Result::Err(e) => {
                panic!("Expected success, got failure: {:?}", e);
            }
        }
    };
}

/// Assert that a result failed, optionally matching the error against a pattern.
///
/// # Example
///
/// ```rust
/// use arrowhead_async::{assert_failed, Error};
///
/// let result: arrowhead_async::Result<()> = Err(Error::ShutDown);
/// assert_failed!(result, Error::ShutDown);
/// ```
#[macro_export]
macro_rules! assert_failed {
    ($result:expr) => {
        match $result {
            ::std::result::Result::Err(_) => {}
            ::std::result::Result::Ok(v) => {
                panic!("Expected failure, got success: {:?}", v);
            }
        }
    };
    ($result:expr, $pattern:pat) => {
        match $result {
            ::std::result::Result::Err($pattern) => {}
            ::std::result::Result::Err(e) => {
                panic!(
                    "Expected failure matching {}, got: {:?}",
                    stringify!($pattern),
                    e
                );
            }
            ::std::result::Result::Ok(v) => {
                panic!("Expected failure, got success: {:?}", v);
            }
        }
    };
}

/// Strategy producing successes from `V`'s arbitrary values and failures with
/// short lowercase messages.
#[cfg(feature = "proptest")]
pub fn outcomes<V>() -> proptest::strategy::BoxedStrategy<Result<V>>
where
    V: proptest::arbitrary::Arbitrary + Send + 'static,
{
    use proptest::prelude::*;

    prop_oneof![
        any::<V>().prop_map(Ok),
        "[a-z]{1,8}".prop_map(|message| Err(crate::Error::msg(message))),
    ]
    .boxed()
}
