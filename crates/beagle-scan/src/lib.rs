//! Concurrent folder scanner for beagle.
//!
//! # Overview
//!
//! `beagle-scan` walks a folder tree and builds a [`FolderTree`] of aggregated
//! sizes and modification times:
//!
//! - **Parallel analysis** of folders on a bounded concurrent dispatch queue
//! - **Single-writer collection** of results on a serial queue
//! - **Completion detection** through the queues' finish-work barriers
//! - **Progress updates** via broadcast channels
//!
//! Unreadable or vanished folders are counted as empty and reported as
//! [`ScanWarning`]s instead of failing the scan.
//!
//! # Example
//!
//! ```rust,no_run
//! use beagle_dispatch::{CentralDispatch, TaskFuture};
//! use beagle_scan::{ScanConfig, ScanCoordinator};
//!
//! let dispatch = CentralDispatch::new();
//! let coordinator = ScanCoordinator::new(&dispatch, ScanConfig::new("/path/to/scan")).unwrap();
//! let (_stop, shutdown) = TaskFuture::<()>::pending();
//!
//! let summary = coordinator
//!     .start(&shutdown, |summary| println!("done: {} bytes", summary.total_size))
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//! println!("{} folders", summary.folder_count);
//! ```

mod coordinator;
mod fs;
mod progress;
mod report;

pub use coordinator::{ScanCoordinator, ScanState, ScanSummary, SharedTree};
pub use fs::{FolderListing, read_folder, sub_paths};
pub use progress::ScanProgress;
pub use report::{DEFAULT_REPORT_LIMIT, FolderReport, large_folders};

// Re-export core types for convenience
pub use beagle_core::{
    Folder, FolderId, FolderStats, FolderTree, GIB, ScanConfig, ScanError, ScanWarning,
    WarningKind,
};
