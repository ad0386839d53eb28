use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use beagle_dispatch::{CentralDispatch, TaskFuture};
use beagle_scan::{ScanConfig, ScanCoordinator, ScanError, ScanState, large_folders};
use tempfile::TempDir;

const MB: u64 = 1024 * 1024;

fn sparse_file(path: &Path, size: u64) {
    File::create(path).unwrap().set_len(size).unwrap();
}

/// root/{a/(200MB file), b/c/(300MB file)}
fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir(root.join("a")).unwrap();
    fs::create_dir_all(root.join("b/c")).unwrap();
    sparse_file(&root.join("a/data.bin"), 200 * MB);
    sparse_file(&root.join("b/c/data.bin"), 300 * MB);

    temp
}

fn config(root: &Path, workers: usize) -> ScanConfig {
    ScanConfig::builder()
        .root(root)
        .workers(workers)
        .build()
        .unwrap()
}

#[test]
fn test_end_to_end_aggregation() {
    let temp = create_test_tree();
    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 2)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    let done = coordinator
        .start(&shutdown, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let summary = done.wait_timeout(Duration::from_secs(10)).unwrap().unwrap();
    assert_eq!(summary.total_size, 500 * MB);
    assert_eq!(summary.folder_count, 4);
    assert!(!summary.cancelled);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.state(), ScanState::Complete);

    let tree = coordinator.tree();
    let guard = tree.read();
    let tree = guard.as_ref().unwrap();
    assert_eq!(tree.total_size(), 500 * MB);

    let find = |name: &str| tree.iter_folders().find(|f| f.name == name).unwrap();
    let (a, b, c) = (find("a"), find("b"), find("c"));

    assert_eq!(a.stats.size, 200 * MB);
    assert_eq!(b.stats.size, 300 * MB);
    assert_eq!(c.stats.size, 300 * MB);
    assert_eq!(b.children, vec![c.id]);
    assert!(!b.children.contains(&a.id));
    assert_eq!(c.parent, Some(b.id));
    assert_eq!(tree.depth_of(c.id), Some(2));
}

#[test]
fn test_wide_and_deep_tree_is_fully_counted() {
    let temp = TempDir::new().unwrap();
    let mut expected = 0;
    for i in 0..6 {
        let mut dir = temp.path().join(format!("top{i}"));
        for depth in 0..5 {
            dir = dir.join(format!("level{depth}"));
            fs::create_dir_all(&dir).unwrap();
            let size = (i * 10 + depth + 1) as u64 * 1000;
            sparse_file(&dir.join("f"), size);
            expected += size;
        }
    }

    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 3)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();

    let summary = coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();

    assert_eq!(summary.total_size, expected);
    // root + 6 top folders, each with 5 nested levels
    assert_eq!(summary.folder_count, 1 + 6 + 6 * 5);
    assert_eq!(coordinator.progress().folders_scanned, 36);
}

#[test]
fn test_shutdown_stops_new_analysis() {
    let temp = create_test_tree();
    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 2)).unwrap();
    let shutdown = TaskFuture::ready(());

    let summary = coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.folder_count, 1);
    assert_eq!(coordinator.state(), ScanState::Complete);
}

/// `chains` top folders, each with `depth` nested levels below it. Every
/// folder except the root holds one 1000-byte file.
fn create_chains(chains: usize, depth: usize) -> TempDir {
    let temp = TempDir::new().unwrap();
    for chain in 0..chains {
        let mut dir = temp.path().join(format!("chain{chain}"));
        fs::create_dir(&dir).unwrap();
        sparse_file(&dir.join("f"), 1000);
        for level in 0..depth {
            dir = dir.join(format!("d{level}"));
            fs::create_dir(&dir).unwrap();
            sparse_file(&dir.join("f"), 1000);
        }
    }
    temp
}

#[test]
fn test_shutdown_during_scan_leaves_consistent_tree() {
    let (chains, depth) = (24, 40);
    let total_folders = 1 + chains * (depth + 1);
    let temp = create_chains(chains, depth);

    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 1)).unwrap();
    let (stop, shutdown) = TaskFuture::<()>::pending();

    // Request shutdown as soon as the first folders have been merged.
    let mut updates = coordinator.subscribe();
    let stopper = thread::spawn(move || {
        let _ = updates.blocking_recv();
        stop.fulfill(());
    });

    let done = coordinator.start(&shutdown, |_| {}).unwrap();
    let summary = done
        .wait_timeout(Duration::from_secs(10))
        .expect("scan did not finish after shutdown")
        .unwrap();
    stopper.join().unwrap();

    assert!(summary.cancelled);
    assert!(summary.folder_count < total_folders);
    assert_eq!(coordinator.state(), ScanState::Complete);

    // Nothing is merged once completion has resolved.
    thread::sleep(Duration::from_millis(100));
    let tree = coordinator.tree();
    let guard = tree.read();
    let tree = guard.as_ref().unwrap();
    assert_eq!(tree.folder_count(), summary.folder_count);
    assert_eq!(
        coordinator.progress().folders_scanned as usize,
        summary.folder_count - 1
    );

    for folder in tree.iter_folders() {
        let parent = folder.parent.and_then(|id| tree.get(id));
        let parent = parent.expect("parent of a merged folder is missing");
        assert!(parent.children.contains(&folder.id));
    }
    assert_eq!(tree.total_size(), 1000 * (tree.folder_count() as u64 - 1));
}

#[test]
fn test_missing_root_is_an_error() {
    let temp = TempDir::new().unwrap();
    let dispatch = CentralDispatch::new();
    let coordinator =
        ScanCoordinator::new(&dispatch, config(&temp.path().join("missing"), 1)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();

    let err = coordinator.start(&shutdown, |_| {}).unwrap_err();
    assert!(matches!(err, ScanError::NotFound { .. }));
    assert_eq!(coordinator.state(), ScanState::Idle);
}

#[test]
fn test_file_root_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain.txt");
    fs::write(&file, "x").unwrap();

    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(&file, 1)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();

    let err = coordinator.start(&shutdown, |_| {}).unwrap_err();
    assert!(matches!(err, ScanError::NotADirectory { .. }));
}

#[cfg(unix)]
#[test]
fn test_unreadable_folder_counts_as_empty() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_test_tree();
    let locked = temp.path().join("locked");
    fs::create_dir(&locked).unwrap();
    sparse_file(&locked.join("hidden.bin"), 50 * MB);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root can read anything, so the folder is only inaccessible for other users.
    let readable = fs::read_dir(&locked).is_ok();

    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 2)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();
    let summary = coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    if readable {
        assert_eq!(summary.total_size, 550 * MB);
    } else {
        assert_eq!(summary.total_size, 500 * MB);
        assert_eq!(summary.inaccessible_count, 1);
        assert_eq!(coordinator.warnings().len(), 1);
    }
    assert_eq!(summary.folder_count, 5);
}

#[test]
fn test_rescan_after_completion() {
    let temp = create_test_tree();
    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 2)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();

    coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();
    sparse_file(&temp.path().join("a/more.bin"), 100 * MB);
    let summary = coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();

    assert_eq!(summary.total_size, 600 * MB);
    assert_eq!(summary.folder_count, 4);
}

#[test]
fn test_large_folder_report_after_scan() {
    let temp = create_test_tree();
    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config(temp.path(), 2)).unwrap();
    let (_stop, shutdown) = TaskFuture::<()>::pending();
    coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();

    let tree = coordinator.tree();
    let guard = tree.read();
    let report = large_folders(guard.as_ref().unwrap(), 250 * MB, 30);

    let names: Vec<_> = report
        .iter()
        .map(|r| r.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"b".to_string()));
    assert!(names.contains(&"c".to_string()));
}
