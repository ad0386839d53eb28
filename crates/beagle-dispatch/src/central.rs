//! Queue factory and process-wide exception policy.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use color_eyre::eyre;
use parking_lot::RwLock;
use tracing::error;

use crate::error::TaskError;
use crate::future::{TaskFuture, TaskResult};
use crate::queue::{DispatchQueue, QueueKind, Reporting};
use crate::timer::Timer;

/// Callback invoked with the queue label and error of every failing task.
pub type ExceptionHandler = Arc<dyn Fn(&str, &TaskError) + Send + Sync>;

/// Settable policy shared by every queue created from one [`CentralDispatch`].
pub(crate) struct ExceptionPolicy {
    handler: RwLock<ExceptionHandler>,
}

impl ExceptionPolicy {
    fn new() -> Self {
        Self {
            handler: RwLock::new(default_handler()),
        }
    }

    /// Run the current handler. A panicking handler is contained here so it
    /// cannot take down the worker thread that reported the failure.
    pub(crate) fn handle(&self, label: &str, err: &TaskError) {
        let handler = self.handler.read().clone();
        if panic::catch_unwind(AssertUnwindSafe(|| handler(label, err))).is_err() {
            error!(queue = label, "exception handler panicked");
        }
    }
}

fn default_handler() -> ExceptionHandler {
    Arc::new(|label, err| {
        error!(queue = label, "task failed: {}", err.details());
    })
}

/// Runtime context owning the exception policy and creating queues.
///
/// One instance is constructed by the entrypoint and passed to everything that
/// needs to dispatch work. Clones share the same policy.
#[derive(Clone)]
pub struct CentralDispatch {
    policy: Arc<ExceptionPolicy>,
    ephemeral_counter: Arc<AtomicU64>,
}

impl CentralDispatch {
    /// Create a runtime with the default (logging) exception policy.
    pub fn new() -> Self {
        Self {
            policy: Arc::new(ExceptionPolicy::new()),
            ephemeral_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the exception policy for all queues of this runtime, including
    /// queues created before the call.
    pub fn set_exception_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &TaskError) + Send + Sync + 'static,
    {
        *self.policy.handler.write() = Arc::new(handler);
    }

    /// Restore the default logging policy.
    pub fn reset_exception_handler(&self) {
        *self.policy.handler.write() = default_handler();
    }

    /// Create a queue with a single worker.
    pub fn create_serial_queue(&self, label: &str) -> Result<DispatchQueue, TaskError> {
        DispatchQueue::new(label, QueueKind::Serial, Arc::clone(&self.policy))
    }

    /// Create a queue with `width` workers (at least one).
    pub fn create_concurrent_queue(
        &self,
        label: &str,
        width: usize,
    ) -> Result<DispatchQueue, TaskError> {
        let kind = QueueKind::Concurrent {
            width: width.max(1),
        };
        DispatchQueue::new(label, kind, Arc::clone(&self.policy))
    }

    /// Run `task` once on a fresh private serial queue.
    ///
    /// The task is not part of any longer-lived queue's barrier accounting.
    pub fn future<T, F>(&self, task: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> eyre::Result<T> + Send + 'static,
    {
        match self.create_serial_queue(&self.ephemeral_label()) {
            Ok(queue) => queue.submit_async(task),
            Err(err) => TaskFuture::failed(err),
        }
    }

    /// Future resolving once every input future is terminal.
    ///
    /// Fulfilled with all values in input order, or failed with the first
    /// failure in input order. Every input is awaited before the result is
    /// produced, even after a failure. The failure is not reported to the
    /// exception policy again.
    pub fn concat<T>(&self, futures: Vec<TaskFuture<T>>) -> TaskFuture<Vec<T>>
    where
        T: Clone + Send + 'static,
    {
        let queue = match self.create_serial_queue(&self.ephemeral_label()) {
            Ok(queue) => queue,
            Err(err) => return TaskFuture::failed(err),
        };

        queue.submit_task(
            move || {
                let mut values = Vec::with_capacity(futures.len());
                let mut first_failure: Option<TaskError> = None;
                for future in &futures {
                    match future.wait() {
                        Ok(value) => values.push(value),
                        Err(err) => {
                            first_failure.get_or_insert(err);
                        }
                    }
                }
                match first_failure {
                    Some(err) => TaskResult::Err(err),
                    None => Ok(values),
                }
            },
            Reporting::Silent,
        )
    }

    /// Run `tick` every `interval` on its own thread.
    ///
    /// Ticking stops when the returned [`Timer`] is cancelled or dropped, or
    /// when `tick` returns `false`.
    pub fn timer<F>(&self, label: &str, interval: Duration, tick: F) -> Result<Timer, TaskError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Timer::start(label, interval, tick)
    }

    fn ephemeral_label(&self) -> String {
        let n = self.ephemeral_counter.fetch_add(1, Ordering::Relaxed);
        format!("future-{n}")
    }
}

impl Default for CentralDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CentralDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CentralDispatch")
            .field(
                "ephemeral_queues",
                &self.ephemeral_counter.load(Ordering::Relaxed),
            )
            .finish()
    }
}
