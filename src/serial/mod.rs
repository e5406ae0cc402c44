//! Ordered serial reduction over sequences of futures
//!
//! Every function here walks its input strictly left to right: the next
//! element is not subscribed to until the previous step has completed, so side
//! effects of step *n* are visible to step *n + 1*. Element futures that start
//! lazily (every derived future does) therefore start one after another.
//!
//! # Core Concepts
//!
//! - **`reduce`** family: fold into an accumulator, short-circuiting on the
//!   first failure of an element or of the accumulator function
//! - **`serialize`**: collect every element's [`Result`] in input order without
//!   short-circuiting
//!
//! Cancelling the returned future cancels the element currently being waited
//! on, and no further elements are visited. Elements a fold never reaches,
//! because it short-circuited or was cancelled, are cancelled too.
//!
//! # Examples
//!
//! ```
//! use arrowhead_async::{serial, Error, Future, await_result};
//!
//! let total = serial::reduce(
//!     vec![Future::success(1), Future::success(2), Future::success(3)],
//!     0,
//!     |acc, x| acc + x,
//! );
//! assert_eq!(await_result(total).unwrap(), 6);
//!
//! let outcomes = serial::serialize(vec![
//!     Future::success(1),
//!     Future::failure(Error::msg("E")),
//! ]);
//! let outcomes = await_result(outcomes).unwrap();
//! assert!(outcomes[0].is_ok());
//! assert!(outcomes[1].is_err());
//! ```

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{catch, Error, Result};
use crate::future::combinators::derive;
use crate::future::{CancelTarget, Completer};
use crate::Future;

/// Fold futures of values with a plain accumulator function.
///
/// The first failed element fails the result, and `f` is not called for it or
/// for anything after it. A panic in `f` fails the result the same way.
///
/// # Examples
///
/// ```
/// use arrowhead_async::{serial, Error, Future, await_result};
///
/// let result = serial::reduce(
///     vec![Future::success(1), Future::failure(Error::msg("E")), Future::success(3)],
///     0,
///     |acc, x| acc + x,
/// );
/// assert_eq!(await_result(result).unwrap_err().to_string(), "E");
/// ```
pub fn reduce<V, A, I, F>(elements: I, identity: A, mut f: F) -> Future<A>
where
    V: Send + 'static,
    A: Send + 'static,
    I: IntoIterator<Item = Future<V>>,
    I::IntoIter: Send + 'static,
    F: FnMut(A, V) -> A + Send + 'static,
{
    try_reduce(elements, identity, move |acc, value| Ok(f(acc, value)))
}

/// Fold futures of values with a fallible accumulator function.
///
/// An `Err` returned by `f` fails the result and stops the fold.
pub fn try_reduce<V, A, I, F>(elements: I, identity: A, f: F) -> Future<A>
where
    V: Send + 'static,
    A: Send + 'static,
    I: IntoIterator<Item = Future<V>>,
    I::IntoIter: Send + 'static,
    F: FnMut(A, V) -> Result<A> + Send + 'static,
{
    let f = Arc::new(Mutex::new(f));
    let step = move |acc, element: Future<V>| {
        let f = Arc::clone(&f);
        element.try_map(move |value| (&mut *f.lock())(acc, value))
    };
    fold(identity, elements.into_iter(), step, cancel_unvisited)
}

/// Fold futures of values with an accumulator function that itself returns a
/// future.
///
/// The next element is only subscribed to once the accumulator future has
/// completed.
pub fn flat_reduce<V, A, I, F>(elements: I, identity: A, f: F) -> Future<A>
where
    V: Send + 'static,
    A: Send + 'static,
    I: IntoIterator<Item = Future<V>>,
    I::IntoIter: Send + 'static,
    F: FnMut(A, V) -> Future<A> + Send + 'static,
{
    let f = Arc::new(Mutex::new(f));
    let step = move |acc, element: Future<V>| {
        let f = Arc::clone(&f);
        element.flat_map(move |value| (&mut *f.lock())(acc, value))
    };
    fold(identity, elements.into_iter(), step, cancel_unvisited)
}

/// Fold plain values with an accumulator function that returns a future.
///
/// `f` is called for the next value only after the previous accumulator future
/// has completed.
///
/// # Examples
///
/// ```
/// use arrowhead_async::{serial, Future, await_result};
///
/// let joined = serial::flat_reduce_plain(
///     ["a", "b", "c"],
///     String::new(),
///     |mut acc, part| {
///         acc.push_str(part);
///         Future::success(acc)
///     },
/// );
/// assert_eq!(await_result(joined).unwrap(), "abc");
/// ```
pub fn flat_reduce_plain<T, A, I, F>(values: I, identity: A, f: F) -> Future<A>
where
    T: 'static,
    A: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    F: FnMut(A, T) -> Future<A> + Send + 'static,
{
    fold(identity, values.into_iter(), f, mem::drop)
}

/// Collect the result of every element, in input order.
///
/// Never short-circuits: the returned future succeeds with one entry per
/// element, failures included.
pub fn serialize<V, I>(elements: I) -> Future<Vec<Result<V>>>
where
    V: Send + 'static,
    I: IntoIterator<Item = Future<V>>,
    I::IntoIter: Send + 'static,
{
    let elements = elements.into_iter();
    let capacity = elements.size_hint().0;
    let step = |mut collected: Vec<Result<V>>, element: Future<V>| {
        element.map_result(move |result| {
            collected.push(result);
            Ok(collected)
        })
    };
    fold(
        Vec::with_capacity(capacity),
        elements,
        step,
        cancel_unvisited,
    )
}

fn cancel_unvisited<V: Send + 'static>(element: Future<V>) {
    element.cancel();
}

enum Step<A: Send + 'static> {
    Next(Future<A>),
    Done(A),
}

/// The input side of a fold. Items still unvisited when the walk is dropped
/// go to `discard`, which cancels element futures nobody will subscribe to.
struct Walk<I: Iterator, F> {
    items: I,
    step: F,
    discard: fn(I::Item),
}

impl<I: Iterator, F> Walk<I, F> {
    fn next<A>(&mut self, acc: A) -> Step<A>
    where
        A: Send + 'static,
        F: FnMut(A, I::Item) -> Future<A>,
    {
        match self.items.next() {
            None => Step::Done(acc),
            Some(item) => Step::Next((self.step)(acc, item)),
        }
    }

    fn release(&mut self) {
        for item in self.items.by_ref() {
            (self.discard)(item);
        }
    }
}

impl<I: Iterator, F> Drop for Walk<I, F> {
    fn drop(&mut self) {
        let _ = catch(|| self.release());
    }
}

/// Drive `step` over `items` one step future at a time.
///
/// The returned future is lazy like every derived future: nothing is visited
/// until a consumer registers. However the fold ends, whatever it did not
/// visit is handed to `discard`.
fn fold<A, I, F>(identity: A, items: I, step: F, discard: fn(I::Item)) -> Future<A>
where
    A: Send + 'static,
    I: Iterator + Send + 'static,
    F: FnMut(A, I::Item) -> Future<A> + Send + 'static,
{
    let walk = Walk {
        items: items.fuse(),
        step,
        discard,
    };
    let target = Arc::new(CancelTarget::idle());
    let cancel_target = Arc::clone(&target);
    derive(
        move |cell| {
            let driver = Fold {
                walk,
                completer: Completer::new(cell),
                target,
            };
            driver.run(identity);
        },
        move |may_interrupt| {
            cancel_target.cancel(may_interrupt);
        },
    )
}

struct Fold<A: Send + 'static, I: Iterator, F> {
    walk: Walk<I, F>,
    completer: Completer<A>,
    target: Arc<CancelTarget>,
}

/// Rendezvous between the driver and a step's consumer. Whoever arrives
/// second continues the fold, so synchronous steps loop instead of recursing.
enum Handoff<A: Send + 'static, I: Iterator, F> {
    Empty,
    Delivered(Result<A>),
    Parked(Fold<A, I, F>),
    Taken,
}

impl<A, I, F> Fold<A, I, F>
where
    A: Send + 'static,
    I: Iterator + Send + 'static,
    F: FnMut(A, I::Item) -> Future<A> + Send + 'static,
{
    fn run(mut self, mut acc: A) {
        loop {
            let step = match catch(|| self.walk.next(acc)) {
                Ok(step) => step,
                Err(error) => {
                    self.fail(error);
                    return;
                }
            };
            let future = match step {
                Step::Done(acc) => {
                    self.completer.succeed(acc);
                    return;
                }
                Step::Next(future) => future,
            };
            if !self.target.arm(future.source.clone()) {
                return;
            }

            let handoff = Arc::new(Mutex::new(Handoff::Empty));
            let slot = Arc::clone(&handoff);
            future.on_result(move |result| {
                let mut state = slot.lock();
                match mem::replace(&mut *state, Handoff::Taken) {
                    Handoff::Parked(driver) => {
                        drop(state);
                        driver.resume(result);
                    }
                    _ => *state = Handoff::Delivered(result),
                }
            });

            let mut state = handoff.lock();
            match mem::replace(&mut *state, Handoff::Taken) {
                Handoff::Delivered(result) => {
                    drop(state);
                    match self.settle(result) {
                        Some((driver, next)) => {
                            self = driver;
                            acc = next;
                        }
                        None => return,
                    }
                }
                _ => {
                    *state = Handoff::Parked(self);
                    return;
                }
            }
        }
    }

    fn resume(self, result: Result<A>) {
        if let Some((driver, acc)) = self.settle(result) {
            driver.run(acc);
        }
    }

    /// Finish a step. Returns the driver and accumulator if the fold goes on.
    fn settle(self, result: Result<A>) -> Option<(Self, A)> {
        if !self.target.disarm() {
            return None;
        }
        match result {
            Ok(acc) => Some((self, acc)),
            Err(error) => {
                self.fail(error);
                None
            }
        }
    }

    /// Short-circuit: release the unvisited input, then fail the fold.
    fn fail(mut self, error: Error) {
        let _ = catch(|| self.walk.release());
        self.completer.fail(error);
    }
}

#[cfg(test)]
mod tests;
