//! Concurrent scan orchestration.
//!
//! Analysis tasks list folders in parallel on a bounded concurrent queue.
//! Every tree mutation goes through a single serial collect queue, so the
//! tree has exactly one writer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use beagle_core::{
    Folder, FolderId, FolderIdAllocator, FolderTree, ScanConfig, ScanError, ScanWarning,
};
use beagle_dispatch::{CentralDispatch, DispatchQueue, TaskError, TaskFuture};
use color_eyre::eyre::{self, eyre};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::fs::{FolderListing, read_folder};
use crate::progress::{ProgressTracker, ScanProgress};

/// Tree shared between the collect queue (single writer) and readers.
///
/// `None` until the first scan has stat'ed its root. Readers may observe a
/// partially built tree while a scan runs.
pub type SharedTree = Arc<RwLock<Option<FolderTree>>>;

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanState {
    /// No scan has been started.
    Idle,
    /// Analysis tasks are still running.
    Scanning,
    /// Analysis finished; queued collect tasks are being merged.
    Draining,
    /// Every folder has been merged.
    Complete,
}

impl ScanState {
    /// Short label for status bars.
    pub fn label(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Draining => "finishing",
            ScanState::Complete => "complete",
        }
    }
}

/// Outcome of a finished scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Scanned root path.
    pub root: PathBuf,
    /// Aggregated size of the root folder in bytes.
    pub total_size: u64,
    /// Folders in the tree, including the root.
    pub folder_count: usize,
    /// Folders that could not be read and were counted as empty.
    pub inaccessible_count: u64,
    /// Wall time of the scan.
    pub elapsed: Duration,
    /// Whether the scan stopped early because shutdown was requested.
    pub cancelled: bool,
}

struct Shared {
    config: ScanConfig,
    dispatch: CentralDispatch,
    analysis: DispatchQueue,
    collect: DispatchQueue,
    tree: SharedTree,
    state: Mutex<ScanState>,
    ids: FolderIdAllocator,
    progress: ProgressTracker,
    warnings: Mutex<Vec<ScanWarning>>,
}

impl Shared {
    fn set_state(&self, state: ScanState) {
        *self.state.lock() = state;
    }
}

/// Drives recursive folder analysis and tree collection.
///
/// Cloning the coordinator shares the same queues and tree.
#[derive(Clone)]
pub struct ScanCoordinator {
    shared: Arc<Shared>,
}

impl ScanCoordinator {
    /// Create a coordinator with its analysis and collect queues.
    pub fn new(dispatch: &CentralDispatch, config: ScanConfig) -> Result<Self, ScanError> {
        let analysis = dispatch
            .create_concurrent_queue("scan-analysis", config.workers)
            .map_err(dispatch_error)?;
        let collect = dispatch
            .create_serial_queue("scan-collect")
            .map_err(dispatch_error)?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                dispatch: dispatch.clone(),
                analysis,
                collect,
                tree: Arc::new(RwLock::new(None)),
                state: Mutex::new(ScanState::Idle),
                ids: FolderIdAllocator::new(),
                progress: ProgressTracker::new(),
                warnings: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Configuration this coordinator scans with.
    pub fn config(&self) -> &ScanConfig {
        &self.shared.config
    }

    /// Handle to the folder tree.
    pub fn tree(&self) -> SharedTree {
        Arc::clone(&self.shared.tree)
    }

    /// Current scan state.
    pub fn state(&self) -> ScanState {
        *self.shared.state.lock()
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> ScanProgress {
        self.shared.progress.snapshot()
    }

    /// Subscribe to periodic progress snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.shared.progress.subscribe()
    }

    /// Entries the scan skipped or counted as empty because they could not be read.
    pub fn warnings(&self) -> Vec<ScanWarning> {
        self.shared.warnings.lock().clone()
    }

    /// Start scanning the configured root.
    ///
    /// The root is stat'ed on the calling thread, so a missing or unreadable
    /// root is reported here. Everything below it is analysed in the
    /// background. No further analysis is submitted once `shutdown` is done.
    ///
    /// `on_complete` runs exactly once, after every discovered folder has been
    /// merged into the tree. The returned future resolves with the same summary.
    pub fn start<S, F>(
        &self,
        shutdown: &TaskFuture<S>,
        on_complete: F,
    ) -> Result<TaskFuture<ScanSummary>, ScanError>
    where
        S: Send + 'static,
        F: FnOnce(&ScanSummary) + Send + 'static,
    {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if matches!(*state, ScanState::Scanning | ScanState::Draining) {
            return Err(ScanError::AlreadyScanning);
        }

        let root_path = shared.config.root.clone();
        let metadata = fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }
        let listing = read_folder(&root_path, &shared.config)?;

        shared.progress.reset();
        shared.warnings.lock().clear();
        record_warnings(shared, listing.warnings);

        let root_id = shared.ids.next_id();
        let root = Folder::new(root_id, &root_path, None, listing.stats);
        *shared.tree.write() = Some(FolderTree::new(root));
        *state = ScanState::Scanning;
        drop(state);

        info!(
            root = %root_path.display(),
            workers = shared.config.workers,
            "scan started"
        );

        let shutdown = shutdown.clone();
        let run = ScanRun {
            shared: Arc::clone(shared),
            cancelled: Arc::new(move || shutdown.is_done()),
        };

        for sub_path in listing.sub_paths {
            if run.is_cancelled() {
                break;
            }
            run.submit_analysis(sub_path, root_id);
        }

        Ok(shared
            .dispatch
            .future(move || run.await_completion(on_complete)))
    }
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("root", &self.shared.config.root)
            .field("state", &self.state())
            .finish()
    }
}

fn dispatch_error(err: TaskError) -> ScanError {
    ScanError::Dispatch {
        message: err.to_string(),
    }
}

fn record_warnings(shared: &Shared, warnings: Vec<ScanWarning>) {
    if warnings.is_empty() {
        return;
    }
    for warning in &warnings {
        warn!(path = %warning.path.display(), "{}", warning.message);
    }
    shared.warnings.lock().extend(warnings);
}

type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// State captured by the tasks of one scan.
#[derive(Clone)]
struct ScanRun {
    shared: Arc<Shared>,
    cancelled: CancelCheck,
}

impl ScanRun {
    fn is_cancelled(&self) -> bool {
        (self.cancelled)()
    }

    fn submit_analysis(&self, path: PathBuf, parent: FolderId) {
        let id = self.shared.ids.next_id();
        let run = self.clone();
        self.shared
            .analysis
            .submit_async(move || run.analyze(path, id, parent));
    }

    /// Analysis task: list one folder, queue its collection, then fan out.
    ///
    /// The collect task is queued before any child analysis, so the FIFO
    /// collect queue always merges a parent before its children.
    fn analyze(&self, path: PathBuf, id: FolderId, parent: FolderId) -> eyre::Result<()> {
        let listing = self.list(&path)?;
        let folder = Folder::new(id, path, Some(parent), listing.stats);

        if self.is_cancelled() {
            debug!(path = %folder.path.display(), "scan cancelled, dropping folder");
            return Ok(());
        }

        let run = self.clone();
        self.shared
            .collect
            .submit_async(move || run.collect(parent, folder));

        for sub_path in listing.sub_paths {
            if self.is_cancelled() {
                break;
            }
            self.submit_analysis(sub_path, id);
        }
        Ok(())
    }

    /// List a folder, turning inaccessible paths into empty leaves.
    fn list(&self, path: &Path) -> Result<FolderListing, ScanError> {
        match read_folder(path, &self.shared.config) {
            Ok(mut listing) => {
                record_warnings(&self.shared, std::mem::take(&mut listing.warnings));
                Ok(listing)
            }
            Err(err) => match ScanWarning::from_error(&err) {
                Some(warning) => {
                    self.shared.progress.record_inaccessible();
                    record_warnings(&self.shared, vec![warning]);
                    Ok(FolderListing::empty())
                }
                None => Err(err),
            },
        }
    }

    /// Collect task: merge one folder into the tree.
    fn collect(&self, parent: FolderId, folder: Folder) -> eyre::Result<()> {
        let own_size = folder.stats.size;
        let path = folder.path.clone();
        {
            let mut guard = self.shared.tree.write();
            let tree = guard
                .as_mut()
                .ok_or_else(|| eyre!("folder tree has no root"))?;
            tree.insert_folder(parent, folder).map_err(ScanError::from)?;
        }
        self.shared.progress.record_folder(&path, own_size);
        Ok(())
    }

    /// Wait for the analysis barrier, then for both barriers together.
    ///
    /// Analysis tasks queue their collect task before finishing, so once the
    /// analysis barrier resolves every collect submission has happened.
    fn await_completion<F>(&self, on_complete: F) -> eyre::Result<ScanSummary>
    where
        F: FnOnce(&ScanSummary),
    {
        self.shared.analysis.finish_work().wait()?;
        self.shared.set_state(ScanState::Draining);
        debug!(
            pending = self.shared.collect.in_flight(),
            "analysis drained, waiting for collection"
        );

        let barriers = vec![
            self.shared.analysis.finish_work(),
            self.shared.collect.finish_work(),
        ];
        self.shared.dispatch.concat(barriers).wait()?;

        let summary = self.summary();
        self.shared.progress.broadcast();
        self.shared.set_state(ScanState::Complete);
        info!(
            total_size = summary.total_size,
            folders = summary.folder_count,
            inaccessible = summary.inaccessible_count,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            cancelled = summary.cancelled,
            "scan complete"
        );

        on_complete(&summary);
        Ok(summary)
    }

    fn summary(&self) -> ScanSummary {
        let tree = self.shared.tree.read();
        let (total_size, folder_count) = tree
            .as_ref()
            .map(|t| (t.total_size(), t.folder_count()))
            .unwrap_or_default();

        ScanSummary {
            root: self.shared.config.root.clone(),
            total_size,
            folder_count,
            inaccessible_count: self.shared.progress.inaccessible(),
            elapsed: self.shared.progress.elapsed(),
            cancelled: self.is_cancelled(),
        }
    }
}
