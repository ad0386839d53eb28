//! Serial and concurrent dispatch queues.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use color_eyre::eyre;
use compact_str::CompactString;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::central::ExceptionPolicy;
use crate::error::TaskError;
use crate::future::{Completer, TaskFuture, TaskResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution discipline of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// One worker; tasks run strictly in submission order.
    Serial,
    /// `width` workers; tasks may run in any order, at most `width` at once.
    Concurrent { width: usize },
}

impl QueueKind {
    /// Number of worker threads backing the queue.
    pub fn width(&self) -> usize {
        match self {
            QueueKind::Serial => 1,
            QueueKind::Concurrent { width } => *width,
        }
    }
}

/// Whether a failing task is passed to the exception policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reporting {
    Report,
    Silent,
}

/// In-flight bookkeeping for the finish-work barrier.
///
/// `in_flight` is incremented under the lock before a task is queued and
/// decremented after its future is terminal. A task that submits follow-up
/// work does so before its own decrement, so the count cannot reach zero while
/// any transitively submitted task is outstanding.
#[derive(Default)]
struct Accounting {
    in_flight: usize,
    barriers: Vec<Completer<()>>,
}

struct QueueShared {
    label: CompactString,
    kind: QueueKind,
    accounting: Mutex<Accounting>,
    policy: Arc<ExceptionPolicy>,
}

impl QueueShared {
    fn begin(&self) {
        self.accounting.lock().in_flight += 1;
    }

    fn end(&self) {
        let released = {
            let mut accounting = self.accounting.lock();
            accounting.in_flight -= 1;
            if accounting.in_flight == 0 {
                std::mem::take(&mut accounting.barriers)
            } else {
                Vec::new()
            }
        };
        for barrier in released {
            barrier.fulfill(());
        }
    }
}

/// A task submission point backed by a fixed pool of worker threads.
///
/// Cloning the handle shares the same queue. Workers exit once every handle
/// has been dropped and the queued work has drained.
#[derive(Clone)]
pub struct DispatchQueue {
    shared: Arc<QueueShared>,
    sender: Sender<Job>,
}

impl DispatchQueue {
    pub(crate) fn new(
        label: &str,
        kind: QueueKind,
        policy: Arc<ExceptionPolicy>,
    ) -> Result<Self, TaskError> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        for index in 0..kind.width() {
            spawn_worker(label, index, receiver.clone())?;
        }

        debug!(queue = label, workers = kind.width(), "dispatch queue created");

        Ok(Self {
            shared: Arc::new(QueueShared {
                label: CompactString::new(label),
                kind,
                accounting: Mutex::new(Accounting::default()),
                policy,
            }),
            sender,
        })
    }

    /// Queue label, also used to name worker threads.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Execution discipline of this queue.
    pub fn kind(&self) -> QueueKind {
        self.shared.kind
    }

    /// Number of submitted tasks that have not yet reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.shared.accounting.lock().in_flight
    }

    /// Enqueue a task and return immediately.
    ///
    /// An error returned by the task, or a panic inside it, fails the returned
    /// future and is passed to the exception policy. It never reaches the
    /// worker thread or sibling tasks.
    pub fn submit_async<T, F>(&self, task: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> eyre::Result<T> + Send + 'static,
    {
        self.submit_task(move || task().map_err(TaskError::from), Reporting::Report)
    }

    /// Submit a task and block the calling thread until it is terminal.
    ///
    /// Calling this from a task running on the same serial queue deadlocks.
    pub fn await_result<T, F>(&self, task: F) -> TaskResult<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> eyre::Result<T> + Send + 'static,
    {
        self.submit_async(task).wait()
    }

    /// Barrier that resolves once no task on this queue is outstanding.
    ///
    /// Covers every task queued or running when this is called, plus any task
    /// those tasks submit to this queue before they finish.
    pub fn finish_work(&self) -> TaskFuture<()> {
        let mut accounting = self.shared.accounting.lock();
        if accounting.in_flight == 0 {
            return TaskFuture::ready(());
        }
        let (completer, future) = TaskFuture::pending();
        accounting.barriers.push(completer);
        future
    }

    pub(crate) fn submit_task<T, F>(&self, task: F, reporting: Reporting) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> TaskResult<T> + Send + 'static,
    {
        let (completer, future) = TaskFuture::pending();
        let shared = Arc::clone(&self.shared);

        self.shared.begin();

        let job: Job = Box::new(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(result) => result,
                Err(payload) => Err(TaskError::from_panic(payload)),
            };

            if let Err(error) = &result {
                if reporting == Reporting::Report {
                    shared.policy.handle(&shared.label, error);
                }
            }

            completer.complete(result);
            shared.end();
        });

        if let Err(crossbeam_channel::SendError(job)) = self.sender.send(job) {
            // Dropping the job drops its completer, which abandons the future.
            drop(job);
            self.shared.end();
        }

        future
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.shared.label)
            .field("kind", &self.shared.kind)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn spawn_worker(label: &str, index: usize, receiver: Receiver<Job>) -> Result<(), TaskError> {
    thread::Builder::new()
        .name(format!("{label}-{index}"))
        .spawn(move || {
            for job in receiver {
                job();
            }
        })
        .map(|_| ())
        .map_err(|e| TaskError::spawn(label, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CentralDispatch;
    use color_eyre::eyre::eyre;

    #[test]
    fn test_queue_kind_width() {
        assert_eq!(QueueKind::Serial.width(), 1);
        assert_eq!(QueueKind::Concurrent { width: 5 }.width(), 5);
    }

    #[test]
    fn test_finish_work_on_idle_queue_is_ready() {
        let dispatch = CentralDispatch::new();
        let queue = dispatch.create_serial_queue("idle").unwrap();
        assert!(queue.finish_work().is_done());
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn test_await_result_returns_value_and_error() {
        let dispatch = CentralDispatch::new();
        let queue = dispatch.create_serial_queue("await").unwrap();

        assert_eq!(queue.await_result(|| Ok(21 * 2)).unwrap(), 42);

        let err = queue
            .await_result(|| -> eyre::Result<u8> { Err(eyre!("bad input")) })
            .unwrap_err();
        assert_eq!(err.to_string(), "bad input");
    }

    #[test]
    fn test_panic_is_isolated() {
        let dispatch = CentralDispatch::new();
        let queue = dispatch.create_serial_queue("panicky").unwrap();

        let failed = queue.submit_async(|| -> eyre::Result<()> { panic!("worker boom") });
        let after = queue.submit_async(|| Ok("still alive"));

        assert!(matches!(failed.wait(), Err(TaskError::Panicked { .. })));
        assert_eq!(after.wait().unwrap(), "still alive");
    }
}
