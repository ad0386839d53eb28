//! Task dispatch runtime for beagle.
//!
//! This crate provides a small GCD-style runtime built on plain OS threads:
//!
//! - **[`TaskFuture`]** - a shared handle to the outcome of a deferred task
//! - **[`DispatchQueue`]** - a serial (one worker) or concurrent (N workers) queue
//!   with a transitive [`finish_work`](DispatchQueue::finish_work) barrier
//! - **[`CentralDispatch`]** - the queue factory, one-off futures, the
//!   process-wide exception policy, [`concat`](CentralDispatch::concat) and
//!   repeating [`Timer`]s
//!
//! There is no cooperative scheduling: every suspension is a blocking wait on a
//! channel or a future.
//!
//! # Example
//!
//! ```rust,no_run
//! use beagle_dispatch::CentralDispatch;
//!
//! let dispatch = CentralDispatch::new();
//! let queue = dispatch.create_concurrent_queue("work", 4).unwrap();
//!
//! for n in 0..10u64 {
//!     queue.submit_async(move || Ok(n * n));
//! }
//!
//! // Resolves once every task, including tasks submitted by tasks, is done.
//! queue.finish_work().wait().unwrap();
//! ```

mod central;
mod error;
mod future;
mod queue;
mod timer;

pub use central::{CentralDispatch, ExceptionHandler};
pub use error::TaskError;
pub use future::{Completer, TaskFuture, TaskResult};
pub use queue::{DispatchQueue, QueueKind};
pub use timer::Timer;
