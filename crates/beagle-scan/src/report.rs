//! Largest-folder report for the non-interactive summary.

use std::fmt;
use std::path::PathBuf;

use beagle_core::{FolderTree, GIB};
use serde::Serialize;

/// Default number of folders listed by [`large_folders`].
pub const DEFAULT_REPORT_LIMIT: usize = 30;

/// One line of the large-folder report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderReport {
    /// Folder path.
    pub path: PathBuf,
    /// Aggregated size in bytes.
    pub size: u64,
    /// Latest modification date, `YYYY-MM-DD` in UTC.
    pub modified: String,
    /// Depth below the scanned root.
    pub depth: usize,
}

impl FolderReport {
    /// Size in gibibytes.
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / GIB as f64
    }
}

impl fmt::Display for FolderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:.2}GB - {}",
            self.modified,
            self.size_gb(),
            self.path.display()
        )
    }
}

/// Folders below the root strictly larger than `min_size` bytes.
///
/// Ordered by last modification (oldest first), then by depth (shallowest
/// first), then by size (largest first), and truncated to `limit`.
pub fn large_folders(tree: &FolderTree, min_size: u64, limit: usize) -> Vec<FolderReport> {
    let mut matches: Vec<_> = tree
        .iter_folders()
        .filter(|folder| folder.stats.size > min_size)
        .map(|folder| (folder, tree.depth_of(folder.id).unwrap_or_default()))
        .collect();

    matches.sort_by(|(a, a_depth), (b, b_depth)| {
        a.stats
            .last_modified
            .cmp(&b.stats.last_modified)
            .then(a_depth.cmp(b_depth))
            .then(b.stats.size.cmp(&a.stats.size))
    });

    matches
        .into_iter()
        .take(limit)
        .map(|(folder, depth)| FolderReport {
            path: folder.path.clone(),
            size: folder.stats.size,
            modified: folder.modified_date(),
            depth,
        })
        .collect()
}
