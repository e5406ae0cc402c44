//! Error types carried through the future channel.
//!
//! Every failure in this crate travels as a value: combinator panics, task
//! errors, rejected submissions and shutdown listener failures all end up as an
//! [`Error`] inside a failed [`Result`]. Nothing is thrown across threads.
//!
//! # Examples
//!
//! ```rust
//! use arrowhead_async::Error;
//!
//! let err = Error::msg("connection refused");
//! assert_eq!(err.to_string(), "connection refused");
//! assert!(err.is_failed());
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Boxed caller error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of an asynchronous operation.
pub type Result<V, E = Error> = std::result::Result<V, E>;

/// Failure payload of a [`Result`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An error produced by caller code (a task, a combinator function, a listener).
    #[error(transparent)]
    Failed(BoxError),

    /// Caller code panicked; the panic was caught where the code was invoked.
    #[error("panicked: {message}")]
    Panicked {
        /// The panic payload rendered as text.
        message: String,
    },

    /// An argument was rejected before any work started.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A one-time initialization was attempted a second time.
    #[error("already initialized")]
    AlreadyInitialized,

    /// The scheduler no longer accepts or runs this work.
    #[error("scheduler has been shut down")]
    ShutDown,

    /// The future was cancelled before a result could be delivered.
    #[error("future was cancelled")]
    Cancelled,

    /// A blocking wait was interrupted by its caller.
    #[error("wait interrupted")]
    Interrupted,

    /// A blocking wait gave up before the future completed.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The producer went away without completing the future.
    #[error("future abandoned by its producer")]
    Abandoned,

    /// Tasks were still running when the drain deadline passed.
    #[error("{pending} task(s) still running after {timeout:?}; terminated")]
    DrainIncomplete {
        /// Number of tasks that had not finished.
        pending: usize,
        /// The drain deadline that was exceeded.
        timeout: Duration,
    },

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    Runtime(#[from] std::io::Error),

    /// Scheduler shutdown finished with failures.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

impl Error {
    /// Wrap any error produced by caller code.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Failed(Box::new(error))
    }

    /// Create a caller error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Failed(message.into().into())
    }

    /// Returns true if this error came from caller code.
    pub fn is_failed(&self) -> bool {
        matches!(self, Error::Failed(_))
    }

    /// Returns true if caller code panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked { .. })
    }

    /// Returns true for the scheduler-shutdown rejection.
    pub fn is_shut_down(&self) -> bool {
        matches!(self, Error::ShutDown)
    }

    /// Returns the shutdown aggregate, if this is one.
    pub fn as_shutdown(&self) -> Option<&ShutdownError> {
        match self {
            Error::Shutdown(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    /// Attempt to downcast a caller error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Error::Failed(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Error::Panicked { message }
    }
}

/// Aggregate failure of a scheduler shutdown.
///
/// Holds the drain failure, if the pool failed to drain in time, and every
/// shutdown listener failure in the order the listeners ran.
#[derive(Debug, Default)]
pub struct ShutdownError {
    drain: Option<Box<Error>>,
    listeners: Vec<Error>,
}

impl ShutdownError {
    pub(crate) fn new(drain: Option<Error>, listeners: Vec<Error>) -> Self {
        Self {
            drain: drain.map(Box::new),
            listeners,
        }
    }

    /// The primary cause: the pool drain failure, if any.
    pub fn drain_failure(&self) -> Option<&Error> {
        self.drain.as_deref()
    }

    /// Failures reported by shutdown listeners.
    pub fn listener_failures(&self) -> &[Error] {
        &self.listeners
    }

    /// All causes, primary first.
    pub fn causes(&self) -> impl Iterator<Item = &Error> {
        self.drain.as_deref().into_iter().chain(self.listeners.iter())
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.drain {
            Some(drain) => write!(f, "scheduler shutdown failed: {}", drain)?,
            None => write!(f, "scheduler shutdown completed with failures")?,
        }
        if !self.listeners.is_empty() {
            write!(f, " ({} shutdown listener failure(s)", self.listeners.len())?;
            for failure in &self.listeners {
                write!(f, "; {}", failure)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl StdError for ShutdownError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.causes().next().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Run caller code, turning a panic into [`Error::Panicked`].
pub(crate) fn catch<T>(f: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic)
}

/// Run fallible caller code, turning a panic into [`Error::Panicked`].
pub(crate) fn catch_result<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch(f).and_then(|result| result)
}
