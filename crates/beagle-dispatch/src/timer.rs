//! Repeating timers.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::error::TaskError;

/// Handle to a repeating timer thread.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct Timer {
    cancel: Option<Sender<()>>,
}

impl Timer {
    pub(crate) fn start<F>(label: &str, interval: Duration, mut tick: F) -> Result<Self, TaskError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (cancel, cancelled) = crossbeam_channel::bounded::<()>(1);
        let name = label.to_string();

        thread::Builder::new()
            .name(format!("timer-{label}"))
            .spawn(move || {
                loop {
                    match cancelled.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    match panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(_) => {
                            error!(timer = %name, "timer tick panicked");
                            break;
                        }
                    }
                }
                debug!(timer = %name, "timer stopped");
            })
            .map_err(|e| TaskError::spawn(label, &e))?;

        Ok(Self {
            cancel: Some(cancel),
        })
    }

    /// Stop the timer. A tick already in progress runs to completion.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.try_send(());
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
