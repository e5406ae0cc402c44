//! Failure-branch combinators.

use crate::error::{Error, Result};
use crate::Future;

impl<V: Send + 'static> Future<V> {
    /// Transform a failure into another error. Successes pass through.
    pub fn map_fault<F>(self, f: F) -> Future<V>
    where
        F: FnOnce(Error) -> Error + Send + 'static,
    {
        self.map_result(move |result| result.map_err(f))
    }

    /// Recover from a failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::{Error, Future, testing::Recorder};
    ///
    /// let recorder = Recorder::new();
    /// Future::<u16>::failure(Error::msg("no port configured"))
    ///     .map_catch(|_| Ok(8443))
    ///     .on_result(recorder.consumer());
    ///
    /// assert_eq!(recorder.take().unwrap().unwrap(), 8443);
    /// ```
    pub fn map_catch<F>(self, f: F) -> Future<V>
    where
        F: FnOnce(Error) -> Result<V> + Send + 'static,
    {
        self.map_result(move |result| match result {
            Ok(value) => Ok(value),
            Err(error) => f(error),
        })
    }

    /// Recover from a failure with another future.
    pub fn flat_map_fault<F>(self, f: F) -> Future<V>
    where
        F: FnOnce(Error) -> Future<V> + Send + 'static,
    {
        self.flat_map_result(move |result| match result {
            Ok(value) => Future::success(value),
            Err(error) => f(error),
        })
    }
}
