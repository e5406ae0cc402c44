//! Integration tests for the future contract through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arrowhead_async::prelude::*;
use arrowhead_async::testing::Recorder;
use arrowhead_async::{assert_failed, assert_succeeded, await_timeout, Awaiter};

#[test]
fn late_registration_fires_exactly_once() {
    let (future, completer) = Future::pending();
    let producer = thread::spawn(move || completer.succeed(41));
    assert!(producer.join().unwrap());

    let recorder = Recorder::new();
    let mapped = future.map(|x| x + 1);
    mapped.on_result(recorder.consumer());
    mapped.on_result(recorder.consumer());
    assert_eq!(recorder.calls(), 1);
    assert_succeeded!(recorder.take().unwrap(), 42);
}

#[test]
fn flat_map_retargets_cancellation_to_inner() {
    let (source, source_completer) = Future::<u32>::pending();
    let (inner, inner_completer) = Future::<u32>::pending();
    let invocations = Arc::new(AtomicUsize::new(0));
    let count = invocations.clone();
    let mut inner = Some(inner);

    let derived = source.flat_map(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        inner.take().unwrap_or_else(|| Future::failure(Error::msg("reused")))
    });
    let recorder = Recorder::new();
    derived.on_result(recorder.consumer());

    source_completer.succeed(1);
    derived.cancel();

    assert!(inner_completer.is_cancelled());
    assert!(!inner_completer.succeed(2));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.calls(), 0);
}

#[test]
fn flat_map_cancel_before_source_completes() {
    let (source, source_completer) = Future::<u32>::pending();
    let invocations = Arc::new(AtomicUsize::new(0));
    let count = invocations.clone();
    let derived = source.flat_map(move |x| {
        count.fetch_add(1, Ordering::SeqCst);
        Future::success(x)
    });
    derived.on_result(|_| panic!("cancelled future delivered"));

    derived.cancel_with(true);
    assert!(source_completer.is_cancelled());
    source_completer.succeed(1);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn producer_is_told_about_cancellation() {
    let (future, completer) = Future::<()>::pending();
    let interrupted = Arc::new(AtomicUsize::new(0));
    let flag = interrupted.clone();
    completer.on_cancel(move |may_interrupt| {
        flag.store(usize::from(may_interrupt) + 1, Ordering::SeqCst);
    });

    future.map(|_| ()).cancel_with(true);
    assert_eq!(interrupted.load(Ordering::SeqCst), 2);
    assert!(completer.is_cancelled());
}

#[test]
fn abandoned_producer_fails_the_future() {
    let (future, completer) = Future::<String>::pending();
    drop(completer);
    assert_failed!(await_result(future), Error::Abandoned);
}

#[test]
fn recovery_combinators() {
    let recovered = Future::<u16>::failure(Error::msg("no port"))
        .map_catch(|_| Ok(8443))
        .map(|port| format!("https://localhost:{}", port));
    assert_succeeded!(await_result(recovered), "https://localhost:8443");

    let wrapped = Future::<u16>::failure(Error::msg("denied"))
        .map_fault(|e| Error::msg(format!("registration: {}", e)));
    assert_eq!(
        await_result(wrapped).unwrap_err().to_string(),
        "registration: denied"
    );
}

#[test]
fn awaiter_interrupt_is_distinct_from_failure() {
    let awaiter = Awaiter::new();
    let interrupter = awaiter.interrupter();
    let (future, completer) = Future::<u8>::pending();

    let waker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        interrupter.interrupt();
    });
    assert_failed!(awaiter.await_result(future), Error::Interrupted);
    assert!(completer.is_cancelled());
    waker.join().unwrap();
}

#[test]
fn await_timeout_gives_up() {
    let (future, _completer) = Future::<u8>::pending();
    assert_failed!(
        await_timeout(future, Duration::from_millis(10)),
        Error::TimedOut(_)
    );
}

#[tokio::test]
async fn into_async_bridges_to_await() {
    let (future, completer) = Future::pending();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        completer.succeed(7u8);
    });
    assert_eq!(future.map(|x| x * 6).into_async().await.unwrap(), 42);
}
