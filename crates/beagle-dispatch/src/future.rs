//! Shared task futures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::TaskError;

/// Outcome of a dispatched task.
pub type TaskResult<T> = Result<T, TaskError>;

struct Shared<T> {
    outcome: Mutex<Option<TaskResult<T>>>,
    ready: Condvar,
}

/// Handle to the eventual outcome of a task.
///
/// A future starts pending and makes exactly one transition to either a value
/// or a [`TaskError`]. Handles are cheap to clone and every clone observes the
/// same outcome.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
}

/// Write side of a [`TaskFuture`].
///
/// Dropping a completer without completing it fails the future with
/// [`TaskError::Abandoned`], so waiters never hang on a lost task.
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> TaskFuture<T> {
    /// Create a pending future together with its completer.
    pub fn pending() -> (Completer<T>, Self) {
        let shared = Arc::new(Shared {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        });
        (
            Completer {
                shared: Some(Arc::clone(&shared)),
            },
            Self { shared },
        )
    }

    /// Create a future that is already fulfilled.
    pub fn ready(value: T) -> Self {
        let (completer, future) = Self::pending();
        completer.fulfill(value);
        future
    }

    /// Create a future that has already failed.
    pub fn failed(error: TaskError) -> Self {
        let (completer, future) = Self::pending();
        completer.fail(error);
        future
    }

    /// Whether the future reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.shared.outcome.lock().is_some()
    }

    /// Whether the future reached the failed state.
    pub fn is_failed(&self) -> bool {
        matches!(*self.shared.outcome.lock(), Some(Err(_)))
    }

    /// Block until the future is terminal without reading the outcome.
    pub fn block_until_done(&self) {
        let mut outcome = self.shared.outcome.lock();
        while outcome.is_none() {
            self.shared.ready.wait(&mut outcome);
        }
    }
}

impl<T: Clone> TaskFuture<T> {
    /// Poll the outcome without blocking.
    pub fn try_result(&self) -> Option<TaskResult<T>> {
        self.shared.outcome.lock().clone()
    }

    /// Block the calling thread until the outcome is available.
    pub fn wait(&self) -> TaskResult<T> {
        let mut outcome = self.shared.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.shared.ready.wait(&mut outcome);
        }
    }

    /// Block for at most `timeout`, returning `None` if still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskResult<T>> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.shared.outcome.lock();
        while outcome.is_none() {
            if self.shared.ready.wait_until(&mut outcome, deadline).timed_out() {
                break;
            }
        }
        outcome.clone()
    }
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.shared.outcome.lock() {
            None => "pending",
            Some(Ok(_)) => "fulfilled",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("TaskFuture").field("state", &state).finish()
    }
}

impl<T> Completer<T> {
    /// Move the future to its terminal state.
    pub fn complete(mut self, result: TaskResult<T>) {
        if let Some(shared) = self.shared.take() {
            Self::resolve(&shared, result);
        }
    }

    /// Fulfil the future with a value.
    pub fn fulfill(self, value: T) {
        self.complete(Ok(value));
    }

    /// Fail the future.
    pub fn fail(self, error: TaskError) {
        self.complete(Err(error));
    }

    fn resolve(shared: &Shared<T>, result: TaskResult<T>) {
        let mut outcome = shared.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(result);
            shared.ready.notify_all();
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            Self::resolve(&shared, Err(TaskError::Abandoned));
        }
    }
}
