//! FlatMap combinators - chain a dependent future.

use std::sync::Arc;

use super::derive;
use crate::error::{catch, Result};
use crate::future::{CancelTarget, Cancellable, Source};
use crate::Future;

impl<V: Send + 'static> Future<V> {
    /// Chain a future produced from the whole result.
    ///
    /// Cancellation first targets this future. Once `f` has produced the next
    /// future, cancellation is re-targeted to it. A cancel that arrives before
    /// `f` starts cancels this future and `f` is never called; one that
    /// arrives while `f` runs cancels the future `f` returns.
    pub fn flat_map_result<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<V>) -> Future<U> + Send + 'static,
    {
        let upstream = self.source;
        let target = Arc::new(CancelTarget::armed(upstream.clone()));
        let cancel_target = Arc::clone(&target);
        derive(
            move |cell| {
                upstream.on_result(Box::new(move |result| {
                    if !target.disarm() {
                        return;
                    }
                    let next = catch(|| f(result)).unwrap_or_else(Future::failure);
                    let next = next.source;
                    if target.arm(next.clone()) {
                        next.on_result(Box::new(move |result| {
                            cell.complete(result);
                        }));
                    }
                }));
            },
            move |may_interrupt| {
                cancel_target.cancel(may_interrupt);
            },
        )
    }

    /// Chain a future produced from a successful value.
    ///
    /// Failures pass through untouched and `f` is not called.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::{Future, testing::Recorder};
    ///
    /// let recorder = Recorder::new();
    /// Future::success(20)
    ///     .flat_map(|x| Future::success(x + 22))
    ///     .on_result(recorder.consumer());
    ///
    /// assert_eq!(recorder.take().unwrap().unwrap(), 42);
    /// ```
    pub fn flat_map<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(V) -> Future<U> + Send + 'static,
    {
        self.flat_map_result(move |result| match result {
            Ok(value) => f(value),
            Err(error) => Future::failure(error),
        })
    }
}
