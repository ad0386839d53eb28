use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use beagle_core::ScanConfig;
use beagle_dispatch::{CentralDispatch, TaskError, TaskFuture};
use beagle_scan::ScanCoordinator;
use beagle_tui::activities::{FolderScanActivity, HelpActivity, MenuHandler};
use beagle_tui::ui::{BarView, DisplayState, Screen, View};
use beagle_tui::{
    Activity, ActivityContext, ActivityId, AppResult, AppStatus, Application, Event, EventKind,
    MenuAction, SegueMode, Theme, TuiConfig,
};
use color_eyre::eyre::{self, eyre};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use parking_lot::Mutex;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::style::Modifier;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Test terminal that counts completed renders.
struct CountingScreen {
    terminal: Terminal<TestBackend>,
    renders: usize,
}

impl Screen for CountingScreen {
    fn render_views(&mut self, views: &DisplayState, theme: &Theme) -> AppResult<()> {
        self.renders += 1;
        self.terminal.render_views(views, theme)
    }
}

type SharedScreen = Arc<Mutex<CountingScreen>>;

fn screen(width: u16, height: u16) -> SharedScreen {
    Arc::new(Mutex::new(CountingScreen {
        terminal: Terminal::new(TestBackend::new(width, height)).unwrap(),
        renders: 0,
    }))
}

fn renders(screen: &SharedScreen) -> usize {
    screen.lock().renders
}

/// Rows whose first cell is highlighted.
fn highlighted_rows(screen: &SharedScreen) -> Vec<u16> {
    let guard = screen.lock();
    let buffer = guard.terminal.backend().buffer();
    (0..buffer.area.height)
        .filter(|y| buffer[(0, *y)].modifier.contains(Modifier::REVERSED))
        .collect()
}

fn screen_text(screen: &SharedScreen) -> String {
    let guard = screen.lock();
    let buffer = guard.terminal.backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(10));
    }
}

fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

/// Activity that records its lifecycle.
struct LifecycleLog {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    views: DisplayState,
}

impl LifecycleLog {
    fn boxed(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Activity> {
        let mut views = DisplayState::new();
        views.insert("top", View::TopBar(BarView::new([name])));
        Box::new(Self {
            name,
            log: Arc::clone(log),
            views,
        })
    }
}

impl Activity for LifecycleLog {
    fn name(&self) -> &str {
        self.name
    }

    fn on_start(&mut self, ctx: &ActivityContext) -> AppResult<()> {
        self.log.lock().push(format!("start {}", self.name));
        ctx.subscribe(EventKind::Key);
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &ActivityContext) {
        self.log.lock().push(format!("stop {}", self.name));
    }

    fn on_event(&mut self, _event: &Event, _ctx: &ActivityContext) -> AppResult<()> {
        self.log.lock().push(format!("key {}", self.name));
        Ok(())
    }

    fn views(&self) -> &DisplayState {
        &self.views
    }
}

#[test]
fn test_push_push_pop_resumes_first_activity() {
    let dispatch = CentralDispatch::new();
    let app = Application::new(&dispatch, screen(40, 10)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    app.start(LifecycleLog::boxed("A", &log)).unwrap();
    app.segue_to(LifecycleLog::boxed("B", &log), SegueMode::Push)
        .wait()
        .unwrap();
    assert_eq!(app.active_activity().as_deref(), Some("B"));

    app.pop_activity().wait().unwrap();

    assert_eq!(app.active_activity().as_deref(), Some("A"));
    assert_eq!(app.stack_depth(), 1);
    assert_eq!(
        *log.lock(),
        vec!["start A", "stop A", "start B", "stop B", "start A"]
    );
    assert!(app.subscriptions_of(ActivityId(2)).is_empty());
    assert_eq!(app.subscriptions_of(ActivityId(1)), vec![EventKind::Key]);

    app.post(key(KeyCode::Char('x')));
    wait_until(|| log.lock().len() == 6);
    assert_eq!(log.lock()[5], "key A");
}

#[test]
fn test_replace_discards_current_activity() {
    let dispatch = CentralDispatch::new();
    let app = Application::new(&dispatch, screen(40, 10)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    app.start(LifecycleLog::boxed("A", &log)).unwrap();
    app.segue_to(LifecycleLog::boxed("B", &log), SegueMode::Replace)
        .wait()
        .unwrap();

    assert_eq!(app.stack_depth(), 1);
    assert_eq!(app.active_activity().as_deref(), Some("B"));
}

#[test]
fn test_popping_last_activity_stops_application() {
    let dispatch = CentralDispatch::new();
    let app = Application::new(&dispatch, screen(40, 10)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let shutdown = app.start(LifecycleLog::boxed("A", &log)).unwrap();
    app.pop_activity();

    let signal = shutdown.wait_timeout(TIMEOUT).unwrap().unwrap();
    assert!(!signal.is_fatal());
    assert_eq!(app.status(), AppStatus::Stopped);
    assert_eq!(app.active_activity(), None);
    assert!(app.start(LifecycleLog::boxed("again", &log)).is_err());
}

#[test]
fn test_second_fault_while_showing_exception_is_fatal() {
    let dispatch = CentralDispatch::new();
    let app = Application::new(&dispatch, screen(60, 12)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let shutdown = app.start(LifecycleLog::boxed("A", &log)).unwrap();

    dispatch.future(|| -> eyre::Result<()> { Err(eyre!("first")) });
    wait_until(|| app.active_activity().as_deref() == Some("ShowException"));
    assert!(app.last_exception().is_some());

    dispatch.future(|| -> eyre::Result<()> { Err(eyre!("second")) });

    let signal = shutdown.wait_timeout(TIMEOUT).unwrap().unwrap();
    match signal.error {
        Some(TaskError::Failed { message, .. }) => assert_eq!(message, "second"),
        other => panic!("expected the second failure, got {other:?}"),
    }
    assert_eq!(app.status(), AppStatus::Stopped);
}

#[test]
fn test_exception_screen_returns_to_previous_activity() {
    let dispatch = CentralDispatch::new();
    let screen = screen(60, 12);
    let app = Application::new(&dispatch, Arc::clone(&screen)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let shutdown = app.start(LifecycleLog::boxed("A", &log)).unwrap();

    dispatch.future(|| -> eyre::Result<()> { Err(eyre!("disk on fire")) });
    wait_until(|| app.active_activity().as_deref() == Some("ShowException"));
    wait_until(|| screen_text(&screen).contains("App has caught an exception"));
    assert!(screen_text(&screen).contains("disk on fire"));

    app.post(key(KeyCode::Esc));
    wait_until(|| app.active_activity().as_deref() == Some("A"));
    assert!(app.last_exception().is_none());

    // Recovery is re-armed once the exception screen is gone.
    dispatch.future(|| -> eyre::Result<()> { Err(eyre!("again")) });
    wait_until(|| app.active_activity().as_deref() == Some("ShowException"));
    assert!(!shutdown.is_done());
}

#[test]
fn test_help_list_selection_is_clamped() {
    let dispatch = CentralDispatch::new();
    let screen = screen(60, 20);
    let app = Application::new(&dispatch, Arc::clone(&screen)).unwrap();
    app.start(Box::new(HelpActivity::new())).unwrap();
    wait_until(|| renders(&screen) == 1);

    // Top bar (2 rows), filter (1 row) and a spacer come before the list.
    let list_top = 4;
    let selected = || highlighted_rows(&screen).first().map(|y| y - list_top);
    assert_eq!(selected(), Some(0));

    app.post(key(KeyCode::Up));
    wait_until(|| renders(&screen) == 2);
    assert_eq!(selected(), Some(0));

    app.post(key(KeyCode::Down));
    wait_until(|| renders(&screen) == 3);
    assert_eq!(selected(), Some(1));

    for _ in 0..10 {
        app.post(key(KeyCode::Down));
    }
    wait_until(|| renders(&screen) == 13);
    assert_eq!(selected(), Some(9));

    app.post(key(KeyCode::Up));
    wait_until(|| renders(&screen) == 14);
    assert_eq!(selected(), Some(8));
}

#[test]
fn test_folder_menu_posts_chosen_action() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("photos")).unwrap();

    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, ScanConfig::new(temp.path())).unwrap();
    let (_running, shutdown) = TaskFuture::<()>::pending();
    coordinator.start(&shutdown, |_| {}).unwrap().wait().unwrap();

    let chosen: Arc<Mutex<Vec<(MenuAction, PathBuf)>>> = Arc::default();
    let recorded = Arc::clone(&chosen);
    let handler: MenuHandler = Arc::new(
        move |action: MenuAction, path: &Path| -> AppResult<()> {
            recorded.lock().push((action, path.to_path_buf()));
            Ok(())
        },
    );

    let screen = screen(100, 20);
    let app = Application::new(&dispatch, Arc::clone(&screen)).unwrap();
    let activity = FolderScanActivity::new(coordinator, 4).with_menu_handler(handler);
    app.start(Box::new(activity)).unwrap();
    wait_until(|| screen_text(&screen).contains("photos"));
    assert!(app.subscriptions_of(ActivityId(1)).contains(&EventKind::Button));

    app.post(key(KeyCode::Down));
    app.post(key(KeyCode::Char(' ')));
    wait_until(|| screen_text(&screen).contains("Menu: [open in explorer] [delete]"));

    // Right twice wraps back to the first entry.
    for code in [KeyCode::Right, KeyCode::Right, KeyCode::Left, KeyCode::Enter] {
        app.post(key(code));
    }
    wait_until(|| !chosen.lock().is_empty());
    assert_eq!(
        *chosen.lock(),
        vec![(MenuAction::Delete, temp.path().join("photos"))]
    );

    wait_until(|| screen_text(&screen).contains("to trash"));
    assert!(!screen_text(&screen).contains("Menu:"));
}

#[test]
fn test_interactive_session_scans_and_quits() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("photos/2019")).unwrap();
    File::create(temp.path().join("photos/2019/img.raw"))
        .unwrap()
        .set_len(3 * 1024 * 1024)
        .unwrap();

    let screen = screen(100, 20);
    let config = TuiConfig::new(ScanConfig::new(temp.path()));
    let app = beagle_tui::launch(&config, Arc::clone(&screen)).unwrap();

    wait_until(|| {
        let text = screen_text(&screen);
        text.contains("Scan complete") && text.contains("2019")
    });
    assert!(screen_text(&screen).contains("Beagle folder scan"));

    app.post(key(KeyCode::Char('q')));
    beagle_tui::wait_for_shutdown(&app).unwrap();
    assert_eq!(app.status(), AppStatus::Stopped);
}

#[test]
fn test_test_fault_key_opens_exception_screen() {
    let temp = TempDir::new().unwrap();
    let screen = screen(100, 20);
    let config = TuiConfig::new(ScanConfig::new(temp.path()));
    let app = beagle_tui::launch(&config, Arc::clone(&screen)).unwrap();
    wait_until(|| app.active_activity().as_deref() == Some("FolderScan"));

    app.post(key(KeyCode::Char('e')));
    wait_until(|| app.active_activity().as_deref() == Some("ShowException"));
    wait_until(|| screen_text(&screen).contains("This is just a test"));

    app.post(key(KeyCode::Esc));
    wait_until(|| app.active_activity().as_deref() == Some("FolderScan"));

    app.post(key(KeyCode::Char('q')));
    beagle_tui::wait_for_shutdown(&app).unwrap();
}
