//! Filesystem access for the scanner.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use beagle_core::{FolderStats, ScanConfig, ScanError, ScanWarning};

/// Result of listing one folder.
#[derive(Debug, Clone)]
pub struct FolderListing {
    /// Size and latest modification of the folder's own files.
    pub stats: FolderStats,
    /// Subfolders to descend into, after hidden/ignore filtering.
    pub sub_paths: Vec<PathBuf>,
    /// Entries that were skipped because they could not be read.
    pub warnings: Vec<ScanWarning>,
}

impl FolderListing {
    /// Listing of a folder with nothing in it.
    pub fn empty() -> Self {
        Self {
            stats: FolderStats::empty(),
            sub_paths: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// List a folder's direct children.
///
/// Only non-directory entries contribute to `stats`; subfolders are returned
/// for separate analysis. Symlinks are never followed and count with their own
/// size. Failing to open the folder is an error; an entry that cannot be read
/// is skipped and reported in `warnings`.
pub fn read_folder(path: &Path, config: &ScanConfig) -> Result<FolderListing, ScanError> {
    let entries = fs::read_dir(path).map_err(|e| ScanError::io(path, e))?;
    Ok(tally_entries(
        path,
        entries.map(|entry| entry.map(|e| e.path())),
        config,
    ))
}

fn tally_entries<I>(path: &Path, entries: I, config: &ScanConfig) -> FolderListing
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut listing = FolderListing::empty();

    for entry in entries {
        let entry_path = match entry {
            Ok(entry_path) => entry_path,
            Err(err) => {
                listing.warnings.push(ScanWarning::from_io(path, &err));
                continue;
            }
        };

        let metadata = match fs::symlink_metadata(&entry_path) {
            Ok(metadata) => metadata,
            Err(err) => {
                listing.warnings.push(ScanWarning::from_io(&entry_path, &err));
                continue;
            }
        };

        if metadata.is_dir() {
            let excluded = entry_path
                .file_name()
                .is_some_and(|name| config.excludes(&name.to_string_lossy()));
            if !excluded {
                listing.sub_paths.push(entry_path);
            }
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        listing
            .stats
            .absorb(&FolderStats::new(metadata.len(), modified));
    }

    listing.sub_paths.sort();
    listing
}

/// Subfolders of `path` that the scan would descend into.
pub fn sub_paths(path: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>, ScanError> {
    read_folder(path, config).map(|listing| listing.sub_paths)
}
