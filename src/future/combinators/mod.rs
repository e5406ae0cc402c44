//! Combinators deriving new futures from existing ones.
//!
//! Each file contributes methods to [`Future`](crate::Future):
//!
//! - `map`: `map`, `try_map`, `map_result`, `inspect`, `pass`, `fail`
//! - `flat_map`: `flat_map`, `flat_map_result`
//! - `fault`: `map_fault`, `map_catch`, `flat_map_fault`
//! - `delay`: `delay`, `delay_until`
//!
//! Every derived future is backed by a lazy cell: it subscribes to its upstream
//! only when its own consumer is registered, and forwards cancel requests to the
//! future it currently depends on.

use std::sync::{Arc, Weak};

use super::cell::Cell;
use super::Future;

mod delay;
mod fault;
mod flat_map;
mod map;

/// Build a derived future.
///
/// `start` runs once, on first consumer registration, with the cell to
/// complete. `on_cancel` runs if the derived future is cancelled while pending.
pub(crate) fn derive<U, S, C>(start: S, on_cancel: C) -> Future<U>
where
    U: Send + 'static,
    S: FnOnce(Arc<Cell<U>>) + Send + 'static,
    C: FnOnce(bool) + Send + 'static,
{
    let cell = Arc::new_cyclic(|weak: &Weak<Cell<U>>| {
        let weak = weak.clone();
        Cell::with_hooks(
            Some(Box::new(move || {
                if let Some(cell) = weak.upgrade() {
                    start(cell);
                }
            })),
            Some(Box::new(on_cancel)),
        )
    });
    Future::from_source(cell)
}
