use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use super::*;
use crate::testing::Recorder;
use crate::{await_result, Error};

type Log = Arc<Mutex<Vec<String>>>;

/// A lazy element that logs when it starts and completes on another thread.
fn logged_element(log: &Log, index: usize) -> Future<usize> {
    let log = Arc::clone(log);
    Future::done().flat_map(move |_| {
        log.lock().push(format!("start {}", index));
        let (future, completer) = Future::pending();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            log.lock().push(format!("complete {}", index));
            completer.succeed(index);
        });
        future
    })
}

#[test]
fn test_reduce_sums_in_order() {
    let result = reduce(
        vec![Future::success(1), Future::success(2), Future::success(3)],
        Vec::new(),
        |mut acc, x| {
            acc.push(x);
            acc
        },
    );
    assert_eq!(await_result(result).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_reduce_of_nothing_is_identity() {
    let result = reduce(Vec::<Future<i32>>::new(), 7, |acc, x| acc + x);
    assert_eq!(await_result(result).unwrap(), 7);
}

#[test]
fn test_steps_never_overlap() {
    let log: Log = Arc::default();
    let elements: Vec<_> = (1..=3).map(|i| logged_element(&log, i)).collect();
    let result = reduce(elements, 0, |acc, x| acc + x);
    assert_eq!(await_result(result).unwrap(), 6);

    assert_eq!(
        *log.lock(),
        vec![
            "start 1",
            "complete 1",
            "start 2",
            "complete 2",
            "start 3",
            "complete 3",
        ]
    );
}

#[test]
fn test_reduce_short_circuits_on_element_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let result = reduce(
        vec![
            Future::success(1),
            Future::failure(Error::msg("E")),
            Future::success(3),
        ],
        0,
        move |acc, x| {
            c.fetch_add(1, Ordering::SeqCst);
            acc + x
        },
    );
    assert_eq!(await_result(result).unwrap_err().to_string(), "E");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_later_elements_not_started_after_failure() {
    let started = Arc::new(AtomicBool::new(false));
    let s = started.clone();
    let third = Future::done().map(move |_| {
        s.store(true, Ordering::SeqCst);
        3
    });
    let result = reduce(
        vec![Future::success(1), Future::failure(Error::msg("E")), third],
        0,
        |acc, x| acc + x,
    );
    assert!(await_result(result).is_err());
    assert!(!started.load(Ordering::SeqCst));
}

#[test]
fn test_try_reduce_stops_on_accumulator_error() {
    let result = try_reduce(
        vec![Future::success(1), Future::success(-1), Future::success(2)],
        0,
        |acc, x| {
            if x < 0 {
                Err(Error::msg(format!("negative after {}", acc)))
            } else {
                Ok(acc + x)
            }
        },
    );
    assert_eq!(
        await_result(result).unwrap_err().to_string(),
        "negative after 1"
    );
}

#[test]
fn test_reduce_panic_fails_result() {
    let result = reduce(vec![Future::success(1)], 0, |_: i32, _: i32| -> i32 {
        panic!("accumulator broke")
    });
    assert!(await_result(result).unwrap_err().is_panic());
}

#[test]
fn test_flat_reduce_waits_for_accumulator_future() {
    let log: Log = Arc::default();
    let l = log.clone();
    let result = flat_reduce(
        vec![Future::success(1), Future::success(2)],
        0,
        move |acc, x| {
            let log = l.clone();
            let (future, completer) = Future::pending();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                log.lock().push(format!("accumulated {}", x));
                completer.succeed(acc + x);
            });
            future
        },
    );
    assert_eq!(await_result(result).unwrap(), 3);
    assert_eq!(*log.lock(), vec!["accumulated 1", "accumulated 2"]);
}

#[test]
fn test_flat_reduce_plain_over_values() {
    let result = flat_reduce_plain(1..=4, 1, |acc, x| Future::success(acc * x));
    assert_eq!(await_result(result).unwrap(), 24);
}

#[test]
fn test_flat_reduce_plain_failure_short_circuits() {
    let visited = Arc::new(AtomicUsize::new(0));
    let v = visited.clone();
    let result = flat_reduce_plain(vec![1, 2, 3], 0, move |acc, x| {
        v.fetch_add(1, Ordering::SeqCst);
        if x == 2 {
            Future::failure(Error::msg("two"))
        } else {
            Future::success(acc + x)
        }
    });
    assert_eq!(await_result(result).unwrap_err().to_string(), "two");
    assert_eq!(visited.load(Ordering::SeqCst), 2);
}

#[test]
fn test_serialize_collects_everything() {
    let result = serialize(vec![
        Future::success(1),
        Future::failure(Error::msg("E")),
        Future::success(3),
    ]);
    let collected = await_result(result).unwrap();
    assert_eq!(collected.len(), 3);
    assert_eq!(*collected[0].as_ref().unwrap(), 1);
    assert_eq!(collected[1].as_ref().unwrap_err().to_string(), "E");
    assert_eq!(*collected[2].as_ref().unwrap(), 3);
}

#[test]
fn test_fold_is_lazy() {
    let started = Arc::new(AtomicBool::new(false));
    let s = started.clone();
    let element = Future::done().map(move |_| {
        s.store(true, Ordering::SeqCst);
        1
    });
    let result = reduce(vec![element], 0, |acc, x| acc + x);
    assert!(!started.load(Ordering::SeqCst));

    let recorder = Recorder::new();
    result.on_result(recorder.consumer());
    assert!(started.load(Ordering::SeqCst));
    assert_eq!(recorder.take().unwrap().unwrap(), 1);
}

#[test]
fn test_cancel_stops_current_and_remaining_elements() {
    let (first, first_completer) = Future::<i32>::pending();
    let started = Arc::new(AtomicBool::new(false));
    let s = started.clone();
    let second = Future::done().map(move |_| {
        s.store(true, Ordering::SeqCst);
        2
    });

    let result = reduce(vec![first, second], 0, |acc, x| acc + x);
    let recorder = Recorder::new();
    result.on_result(recorder.consumer());

    assert!(result.cancel());
    assert!(first_completer.is_cancelled());
    first_completer.succeed(1);

    assert!(!started.load(Ordering::SeqCst));
    assert_eq!(recorder.calls(), 0);
}

#[test]
fn test_short_circuit_cancels_unvisited_elements() {
    let (second, second_completer) = Future::<i32>::pending();
    let (third, third_completer) = Future::<i32>::pending();
    let result = reduce(
        vec![Future::failure(Error::msg("E")), second, third],
        0,
        |acc, x| acc + x,
    );
    assert_eq!(await_result(result).unwrap_err().to_string(), "E");
    assert!(second_completer.is_cancelled());
    assert!(third_completer.is_cancelled());
}

#[test]
fn test_accumulator_error_cancels_unvisited_elements() {
    let (rest, rest_completer) = Future::<i32>::pending();
    let result = try_reduce(
        vec![Future::success(1), rest],
        0,
        |_, _| -> Result<i32> { Err(Error::msg("rejected")) },
    );
    assert!(await_result(result).is_err());
    assert!(rest_completer.is_cancelled());
}

#[test]
fn test_cancel_before_start_cancels_every_element() {
    let (first, first_completer) = Future::<i32>::pending();
    let (second, second_completer) = Future::<i32>::pending();
    let result = serialize(vec![first, second]);
    assert!(result.cancel());
    assert!(first_completer.is_cancelled());
    assert!(second_completer.is_cancelled());
}

#[test]
fn test_cancel_mid_fold_cancels_remaining_elements() {
    let (first, first_completer) = Future::<i32>::pending();
    let (second, second_completer) = Future::<i32>::pending();
    let result = flat_reduce(vec![first, second], 0, |acc, x| Future::success(acc + x));
    let recorder = Recorder::new();
    result.on_result(recorder.consumer());

    assert!(result.cancel());
    assert!(first_completer.is_cancelled());
    assert!(second_completer.is_cancelled());
    assert_eq!(recorder.calls(), 0);
}

#[test]
fn test_completed_fold_cancels_nothing() {
    let (element, completer) = Future::<i32>::pending();
    let result = reduce(vec![element], 0, |acc, x| acc + x);
    let recorder = Recorder::new();
    result.on_result(recorder.consumer());
    completer.succeed(4);
    assert_eq!(recorder.take().unwrap().unwrap(), 4);
}

#[test]
fn test_long_synchronous_chain_does_not_recurse() {
    let elements: Vec<_> = (0..100_000u64).map(Future::success).collect();
    let result = reduce(elements, 0u64, |acc, x| acc + x);
    assert_eq!(await_result(result).unwrap(), 4_999_950_000);
}

proptest! {
    #[test]
    fn prop_reduce_matches_iterator_fold(values in prop::collection::vec(-1000i64..1000, 0..50)) {
        let expected: i64 = values.iter().sum();
        let elements: Vec<_> = values.into_iter().map(Future::success).collect();
        let result = await_result(reduce(elements, 0, |acc, x| acc + x)).unwrap();
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn prop_reduce_fails_with_first_failure(
        values in prop::collection::vec(any::<bool>(), 1..30),
    ) {
        let first_failure = values.iter().position(|ok| !ok);
        let elements: Vec<Future<usize>> = values
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                if *ok {
                    Future::success(i)
                } else {
                    Future::failure(Error::msg(format!("failed {}", i)))
                }
            })
            .collect();
        let result = await_result(reduce(elements, 0, |acc, _| acc + 1));
        match first_failure {
            Some(index) => prop_assert_eq!(
                result.unwrap_err().to_string(),
                format!("failed {}", index)
            ),
            None => prop_assert_eq!(result.unwrap(), values.len()),
        }
    }

    #[test]
    fn prop_serialize_preserves_order_and_length(
        values in prop::collection::vec(any::<Option<u8>>(), 0..30),
    ) {
        let elements: Vec<Future<u8>> = values
            .iter()
            .map(|v| match v {
                Some(x) => Future::success(*x),
                None => Future::failure(Error::msg("none")),
            })
            .collect();
        let collected = await_result(serialize(elements)).unwrap();
        let observed: Vec<Option<u8>> = collected.into_iter().map(|r| r.ok()).collect();
        prop_assert_eq!(observed, values);
    }
}
