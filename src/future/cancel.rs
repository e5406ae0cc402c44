//! Cancellation forwarding.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

/// Anything a cancel request can be forwarded to.
pub(crate) trait Cancellable: Send + Sync {
    /// Cancel if still pending. Returns true if this call did the cancelling.
    fn cancel(&self, may_interrupt: bool) -> bool;
}

enum Target {
    Idle,
    Armed(Arc<dyn Cancellable>),
    Cancelled { interrupted: bool },
}

/// The future a cancel request should currently be forwarded to.
///
/// Derived futures point this at their upstream, disarm it while caller code
/// runs, then re-arm it with whatever future comes next. A cancel that lands
/// while disarmed is remembered and applied to the next target on `arm`.
pub(crate) struct CancelTarget {
    state: Mutex<Target>,
}

impl CancelTarget {
    pub(crate) fn idle() -> Self {
        Self {
            state: Mutex::new(Target::Idle),
        }
    }

    pub(crate) fn armed(target: Arc<dyn Cancellable>) -> Self {
        Self {
            state: Mutex::new(Target::Armed(target)),
        }
    }

    /// Point at `target`. If a cancel already happened, `target` is cancelled
    /// instead and false is returned.
    pub(crate) fn arm(&self, target: Arc<dyn Cancellable>) -> bool {
        let mut state = self.state.lock();
        if let Target::Cancelled { interrupted } = *state {
            drop(state);
            target.cancel(interrupted);
            return false;
        }
        let previous = mem::replace(&mut *state, Target::Armed(target));
        drop(state);
        drop(previous);
        true
    }

    /// Stop forwarding. Returns false if a cancel already happened.
    pub(crate) fn disarm(&self) -> bool {
        let mut state = self.state.lock();
        if let Target::Cancelled { .. } = *state {
            return false;
        }
        let previous = mem::replace(&mut *state, Target::Idle);
        drop(state);
        drop(previous);
        true
    }

    pub(crate) fn cancel(&self, may_interrupt: bool) -> bool {
        let mut state = self.state.lock();
        let cancelled = Target::Cancelled {
            interrupted: may_interrupt,
        };
        match mem::replace(&mut *state, cancelled) {
            Target::Armed(target) => {
                drop(state);
                target.cancel(may_interrupt);
                true
            }
            Target::Idle => true,
            already @ Target::Cancelled { .. } => {
                *state = already;
                false
            }
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(*self.state.lock(), Target::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        cancels: AtomicUsize,
    }

    impl Cancellable for Counting {
        fn cancel(&self, _may_interrupt: bool) -> bool {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_cancel_forwards_to_armed_target() {
        let first = Arc::new(Counting::default());
        let target = CancelTarget::armed(first.clone());
        assert!(target.cancel(false));
        assert_eq!(first.cancels.load(Ordering::SeqCst), 1);
        assert!(!target.cancel(false));
        assert_eq!(first.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retarget_moves_cancellation() {
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        let target = CancelTarget::armed(first.clone());
        assert!(target.disarm());
        assert!(target.arm(second.clone()));
        target.cancel(true);
        assert_eq!(first.cancels.load(Ordering::SeqCst), 0);
        assert_eq!(second.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_while_disarmed_applies_on_arm() {
        let next = Arc::new(Counting::default());
        let target = CancelTarget::idle();
        assert!(target.cancel(false));
        assert!(!target.disarm());
        assert!(!target.arm(next.clone()));
        assert_eq!(next.cancels.load(Ordering::SeqCst), 1);
        assert!(target.is_cancelled());
    }
}
