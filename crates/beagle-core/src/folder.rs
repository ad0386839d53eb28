//! Folder node types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Bytes in one gibibyte, the unit sizes are displayed in.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Unique identifier for a folder within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderId(pub u64);

impl FolderId {
    /// Create a new FolderId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out unique folder ids from any thread.
#[derive(Debug, Default)]
pub struct FolderIdAllocator {
    next: AtomicU64,
}

impl FolderIdAllocator {
    /// Create an allocator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id.
    pub fn next_id(&self) -> FolderId {
        FolderId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Aggregated size and modification time of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStats {
    /// Total size in bytes.
    pub size: u64,
    /// Most recent modification time of any contained file.
    pub last_modified: SystemTime,
}

impl FolderStats {
    /// Create stats from a size and modification time.
    pub fn new(size: u64, last_modified: SystemTime) -> Self {
        Self {
            size,
            last_modified,
        }
    }

    /// Stats of a folder with no files.
    pub fn empty() -> Self {
        Self::new(0, SystemTime::UNIX_EPOCH)
    }

    /// Fold another folder's stats into this one.
    pub fn absorb(&mut self, other: &FolderStats) {
        self.size += other.size;
        self.last_modified = self.last_modified.max(other.last_modified);
    }

    /// Size in gibibytes.
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / GIB as f64
    }
}

impl Default for FolderStats {
    fn default() -> Self {
        Self::empty()
    }
}

/// A scanned folder.
///
/// Children and parent are referenced by id; the [`FolderTree`](crate::FolderTree)
/// arena owns every folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    /// Identifier within the tree.
    pub id: FolderId,
    /// Full path of the folder.
    pub path: PathBuf,
    /// Final path component.
    pub name: CompactString,
    /// Own files plus every inserted child.
    pub stats: FolderStats,
    /// Non-owning back-reference used for upward aggregation.
    pub parent: Option<FolderId>,
    /// Children in insertion order.
    pub children: Vec<FolderId>,
}

impl Folder {
    /// Create a folder carrying only its own file-level stats.
    pub fn new(
        id: FolderId,
        path: impl Into<PathBuf>,
        parent: Option<FolderId>,
        stats: FolderStats,
    ) -> Self {
        let path = path.into();
        let name = folder_name(&path);
        Self {
            id,
            path,
            name,
            stats,
            parent,
            children: Vec::new(),
        }
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.stats.size
    }

    /// Whether this folder has no inserted children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Modification date as `YYYY-MM-DD` in UTC.
    pub fn modified_date(&self) -> String {
        let modified: DateTime<Utc> = self.stats.last_modified.into();
        modified.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:.2}GB - {}",
            self.modified_date(),
            self.stats.size_gb(),
            self.path.display()
        )
    }
}

fn folder_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}
