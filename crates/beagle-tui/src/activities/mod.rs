//! The screens of the application.

mod folder_scan;
mod help;
mod show_exception;

pub use folder_scan::{DEFAULT_DEPTH, FolderScanActivity, MAX_DEPTH, MIN_DEPTH, MenuHandler};
pub use help::HelpActivity;
pub use show_exception::ShowExceptionActivity;
