//! Scan progress reporting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

/// Folders collected between two progress broadcasts.
const BROADCAST_EVERY: u64 = 16;

/// Progress information during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanProgress {
    /// Number of folders merged into the tree so far.
    pub folders_scanned: u64,
    /// Total bytes of the merged folders' own files.
    pub bytes_scanned: u64,
    /// Folders treated as empty because they could not be read.
    pub inaccessible_count: u64,
    /// Most recently merged folder.
    pub current_path: PathBuf,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            folders_scanned: 0,
            bytes_scanned: 0,
            inaccessible_count: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in folders per second.
    pub fn folders_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.folders_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared progress counters with a broadcast channel for live updates.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    started: Mutex<Instant>,
    folders_scanned: AtomicU64,
    bytes_scanned: AtomicU64,
    inaccessible_count: AtomicU64,
    current_path: Mutex<PathBuf>,
    tx: broadcast::Sender<ScanProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            started: Mutex::new(Instant::now()),
            folders_scanned: AtomicU64::new(0),
            bytes_scanned: AtomicU64::new(0),
            inaccessible_count: AtomicU64::new(0),
            current_path: Mutex::new(PathBuf::new()),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.tx.subscribe()
    }

    pub fn reset(&self) {
        *self.started.lock() = Instant::now();
        self.folders_scanned.store(0, Ordering::Relaxed);
        self.bytes_scanned.store(0, Ordering::Relaxed);
        self.inaccessible_count.store(0, Ordering::Relaxed);
        self.current_path.lock().clear();
    }

    /// Record a merged folder. Broadcasts a snapshot every few folders.
    pub fn record_folder(&self, path: &Path, own_size: u64) {
        let count = self.folders_scanned.fetch_add(1, Ordering::Relaxed) + 1;
        self.bytes_scanned.fetch_add(own_size, Ordering::Relaxed);
        *self.current_path.lock() = path.to_path_buf();

        if count % BROADCAST_EVERY == 0 {
            self.broadcast();
        }
    }

    pub fn record_inaccessible(&self) {
        self.inaccessible_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inaccessible(&self) -> u64 {
        self.inaccessible_count.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.lock().elapsed()
    }

    /// Send the current snapshot to subscribers, if any.
    pub fn broadcast(&self) {
        let _ = self.tx.send(self.snapshot());
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            folders_scanned: self.folders_scanned.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            inaccessible_count: self.inaccessible_count.load(Ordering::Relaxed),
            current_path: self.current_path.lock().clone(),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
