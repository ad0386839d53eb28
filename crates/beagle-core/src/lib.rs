//! Core types for beagle.
//!
//! This crate provides the data structures shared by the scanner and the
//! interface: folders and their aggregated statistics, the folder tree arena,
//! scan configuration and scan errors.

mod config;
mod error;
mod folder;
mod tree;

pub use config::{DEFAULT_WORKERS, ScanConfig, ScanConfigBuilder};
pub use error::{ScanError, ScanWarning, TreeError, WarningKind};
pub use folder::{Folder, FolderId, FolderIdAllocator, FolderStats, GIB};
pub use tree::{DISPLAY_FAN_OUT, FolderTree};
