//! Map combinators - transform a result once it arrives.

use super::derive;
use crate::error::{catch, catch_result, Error, Result};
use crate::future::{Cancellable, Source};
use crate::Future;

impl<V: Send + 'static> Future<V> {
    /// Transform the whole result.
    ///
    /// The base of every map-style combinator: `f` sees success and failure
    /// alike. A panic in `f` fails the derived future. Cancelling the derived
    /// future cancels this one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::{Error, Future, testing::Recorder};
    ///
    /// let recorder = Recorder::new();
    /// Future::<i32>::failure(Error::msg("missing"))
    ///     .map_result(|result| Ok(result.unwrap_or(0)))
    ///     .on_result(recorder.consumer());
    ///
    /// assert_eq!(recorder.take().unwrap().unwrap(), 0);
    /// ```
    pub fn map_result<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<V>) -> Result<U> + Send + 'static,
    {
        let upstream = self.source;
        let cancel_target = upstream.clone();
        derive(
            move |cell| {
                upstream.on_result(Box::new(move |result| {
                    cell.complete(catch_result(|| f(result)));
                }));
            },
            move |may_interrupt| {
                cancel_target.cancel(may_interrupt);
            },
        )
    }

    /// Transform a successful value. Failures pass through untouched and `f`
    /// is not called.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::{Future, testing::Recorder};
    ///
    /// let recorder = Recorder::new();
    /// Future::success(5).map(|x| x + 1).on_result(recorder.consumer());
    /// assert_eq!(recorder.take().unwrap().unwrap(), 6);
    /// ```
    pub fn map<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(V) -> U + Send + 'static,
    {
        self.map_result(move |result| result.map(f))
    }

    /// Transform a successful value with a fallible function; an `Err`
    /// returned by `f` fails the derived future.
    pub fn try_map<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(V) -> Result<U> + Send + 'static,
    {
        self.map_result(move |result| result.and_then(f))
    }

    /// Observe the result without changing it.
    pub fn inspect<F>(self, f: F) -> Future<V>
    where
        F: FnOnce(&Result<V>) + Send + 'static,
    {
        self.map_result(move |result| {
            catch(|| f(&result))?;
            result
        })
    }

    /// Replace a successful value with `value`.
    pub fn pass<U>(self, value: U) -> Future<U>
    where
        U: Send + 'static,
    {
        self.map_result(move |result| result.map(|_| value))
    }

    /// Turn success into a failure with `error`. An existing failure is kept.
    pub fn fail<U>(self, error: Error) -> Future<U>
    where
        U: Send + 'static,
    {
        self.map_result(move |result| match result {
            Ok(_) => Err(error),
            Err(existing) => Err(existing),
        })
    }
}
