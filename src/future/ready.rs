//! Leaf futures that are resolved at construction.

use parking_lot::Mutex;

use super::cancel::Cancellable;
use super::{Consumer, Source};
use crate::error::Result;

/// Holds its result until the first consumer takes it. Later registrations
/// are no-ops, and cancelling just discards the unclaimed result.
pub(crate) struct Ready<V> {
    result: Mutex<Option<Result<V>>>,
}

impl<V> Ready<V> {
    pub(crate) fn new(result: Result<V>) -> Self {
        Self {
            result: Mutex::new(Some(result)),
        }
    }
}

impl<V: Send + 'static> Cancellable for Ready<V> {
    fn cancel(&self, _may_interrupt: bool) -> bool {
        self.result.lock().take().is_some()
    }
}

impl<V: Send + 'static> Source<V> for Ready<V> {
    fn on_result(&self, consumer: Consumer<V>) {
        let result = self.result.lock().take();
        if let Some(result) = result {
            consumer(result);
        }
    }

    fn status(&self) -> &'static str {
        if self.result.lock().is_some() {
            "completed"
        } else {
            "delivered"
        }
    }
}
