//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::folder::FolderId;

/// Errors that can occur during scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found, usually because it vanished mid-scan.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A scan is already running on this coordinator.
    #[error("A scan is already in progress")]
    AlreadyScanning,

    /// The dispatch runtime could not provide a queue.
    #[error("Failed to create dispatch queue: {message}")]
    Dispatch { message: String },

    /// The folder tree rejected an insertion.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error marks a path the scan should treat as empty and move past.
    pub fn is_inaccessible(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::NotFound { .. })
    }
}

/// Errors from mutating a [`FolderTree`](crate::FolderTree).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The parent of an inserted folder is not in the tree.
    #[error("parent folder {parent} is not in the tree")]
    UnknownParent { parent: FolderId },

    /// A folder with this id was already inserted.
    #[error("folder {id} is already in the tree")]
    DuplicateFolder { id: FolderId },
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// The path disappeared while being scanned.
    Vanished,
    /// The entry could not be read for another reason.
    Unreadable,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a vanished path warning.
    pub fn vanished(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Path vanished during scan: {}", path.display()),
            path,
            kind: WarningKind::Vanished,
        }
    }

    /// Classify an I/O error hit while reading one entry of a folder.
    pub fn from_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            std::io::ErrorKind::NotFound => Self::vanished(path),
            _ => Self {
                message: format!("Cannot read {}: {err}", path.display()),
                path,
                kind: WarningKind::Unreadable,
            },
        }
    }

    /// Convert an inaccessible-path error into a warning.
    ///
    /// Returns `None` for errors that are real failures.
    pub fn from_error(err: &ScanError) -> Option<Self> {
        match err {
            ScanError::PermissionDenied { path } => Some(Self::permission_denied(path.clone())),
            ScanError::NotFound { path } => Some(Self::vanished(path.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));
        assert!(err.is_inaccessible());

        let err = ScanError::io("/gone", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_inaccessible());

        let err = ScanError::io("/bad", io::Error::other("disk failure"));
        assert!(matches!(err, ScanError::Io { .. }));
        assert!(!err.is_inaccessible());
    }

    #[test]
    fn test_scan_warning_creation() {
        let warning = ScanWarning::permission_denied("/test/path");
        assert_eq!(warning.kind, WarningKind::PermissionDenied);
        assert!(warning.message.contains("Permission denied"));

        let err = ScanError::NotFound {
            path: "/tmp/gone".into(),
        };
        let warning = ScanWarning::from_error(&err).unwrap();
        assert_eq!(warning.kind, WarningKind::Vanished);

        let err = ScanError::AlreadyScanning;
        assert!(ScanWarning::from_error(&err).is_none());
    }

    #[test]
    fn test_scan_warning_from_io() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            ScanWarning::from_io("/a", &denied).kind,
            WarningKind::PermissionDenied
        );

        let warning = ScanWarning::from_io("/a/b", &io::Error::other("bad sector"));
        assert_eq!(warning.kind, WarningKind::Unreadable);
        assert_eq!(warning.message, "Cannot read /a/b: bad sector");
    }
}
