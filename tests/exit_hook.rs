//! The process-wide default scheduler and its exit hook
//!
//! Kept in its own test binary: the default scheduler is process state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arrowhead_async::prelude::*;
use arrowhead_async::SchedulerState;

#[test]
fn exit_guard_drains_default_scheduler() {
    let custom = Scheduler::builder()
        .worker_threads(1)
        .thread_name("exit-hook-test")
        .build()
        .unwrap();
    Scheduler::set_global(custom).unwrap();
    assert!(matches!(
        Scheduler::set_global(Scheduler::new(1).unwrap()),
        Err(Error::AlreadyInitialized)
    ));

    let closed = Arc::new(AtomicBool::new(false));
    let c = closed.clone();
    let guard = Scheduler::install_exit_hook(Duration::from_secs(1)).unwrap();
    assert_eq!(guard.scheduler().config().thread_name(), "exit-hook-test");
    guard
        .scheduler()
        .add_shutdown_listener(Arc::new(move |_: &Scheduler, _: Duration| -> Result<()> {
            c.store(true, Ordering::SeqCst);
            Ok(())
        }));

    let work = Scheduler::global().unwrap().submit(|| Ok("served"));
    assert_eq!(await_result(work).unwrap(), "served");

    drop(guard);
    assert!(closed.load(Ordering::SeqCst));

    let global = Scheduler::global().unwrap();
    assert_eq!(global.state(), SchedulerState::Drained);
    assert!(await_result(global.submit(|| Ok(()))).unwrap_err().is_shut_down());
}
