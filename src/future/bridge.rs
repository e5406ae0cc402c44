//! Bridge into `async`/`.await` code.

use std::future::IntoFuture;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};

use super::Future;
use crate::error::{Error, Result};

impl<V: Send + 'static> Future<V> {
    /// Convert into a standard [`std::future::Future`].
    ///
    /// Registers this future's consumer. If the future is cancelled before it
    /// completes, the returned future resolves to [`Error::Cancelled`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrowhead_async::Future;
    ///
    /// # tokio_test::block_on(async {
    /// let value = Future::success(21).map(|x| x * 2).into_async().await;
    /// assert_eq!(value.unwrap(), 42);
    /// # });
    /// ```
    pub fn into_async(self) -> impl std::future::Future<Output = Result<V>> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        self.on_result(move |result| {
            let _ = sender.send(result);
        });
        receiver.map(|delivered| delivered.unwrap_or_else(|_| Err(Error::Cancelled)))
    }
}

impl<V: Send + 'static> IntoFuture for Future<V> {
    type Output = Result<V>;
    type IntoFuture = BoxFuture<'static, Result<V>>;

    fn into_future(self) -> Self::IntoFuture {
        self.into_async().boxed()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, Future};

    #[tokio::test]
    async fn test_await_success() {
        let value = Future::success(1).map(|x| x + 1).await;
        assert_eq!(value.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_await_failure() {
        let result = Future::<i32>::failure(Error::msg("broken")).await;
        assert_eq!(result.unwrap_err().to_string(), "broken");
    }

    #[tokio::test]
    async fn test_cancelled_source_resolves_to_cancelled() {
        let (future, _completer) = Future::<i32>::pending();
        let derived = future.map(|x| x * 2);
        let source_handle = derived.source.clone();
        let awaiting = tokio::spawn(derived.into_async());
        crate::future::Cancellable::cancel(&*source_handle, false);
        let result = awaiting.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_completion_from_another_thread() {
        let (future, completer) = Future::pending();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            completer.succeed("late");
        });
        assert_eq!(future.await.unwrap(), "late");
    }
}
