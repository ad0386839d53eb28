//! Task failure type.

use std::any::Any;

use color_eyre::eyre::Report;
use thiserror::Error;

/// Terminal failure of a dispatched task.
///
/// Cloneable so that every observer of a shared [`TaskFuture`](crate::TaskFuture)
/// receives the same failure.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The task returned an error.
    #[error("{message}")]
    Failed {
        /// Top-level error message.
        message: String,
        /// Full rendering of the error, including its cause chain.
        details: String,
    },

    /// The task panicked.
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// The task was dropped before it produced a result.
    #[error("task was dropped before it completed")]
    Abandoned,

    /// A worker thread could not be started.
    #[error("failed to start worker for queue `{label}`: {message}")]
    Spawn { label: String, message: String },
}

impl TaskError {
    /// Create a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Failed {
            details: message.clone(),
            message,
        }
    }

    /// Create a failure from an error report, keeping its cause chain.
    pub fn from_report(report: Report) -> Self {
        Self::Failed {
            message: report.to_string(),
            details: format!("{report:?}"),
        }
    }

    pub(crate) fn spawn(label: &str, source: &std::io::Error) -> Self {
        Self::Spawn {
            label: label.to_string(),
            message: source.to_string(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Multi-line description suitable for an error screen or log file.
    pub fn details(&self) -> String {
        match self {
            Self::Failed { details, .. } => details.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Report> for TaskError {
    fn from(report: Report) -> Self {
        Self::from_report(report)
    }
}
