//! Live view of the folder tree being scanned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use beagle_core::{FolderId, FolderTree};
use beagle_dispatch::Timer;
use beagle_scan::{ScanCoordinator, ScanProgress, ScanState, ScanSummary};
use color_eyre::eyre::{WrapErr, bail, eyre};
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::HelpActivity;
use crate::AppResult;
use crate::activity::{Activity, ActivityContext};
use crate::application::SegueMode;
use crate::event::{Event, EventKind, KeyAction, MenuAction, describe_key};
use crate::ui::{BarView, ContextMenu, DisplayState, FolderRow, FolderTreeView, View, format_size};

/// Shallowest display depth.
pub const MIN_DEPTH: usize = 1;
/// Deepest display depth.
pub const MAX_DEPTH: usize = 10;
/// Display depth of a new screen.
pub const DEFAULT_DEPTH: usize = 4;

const TOP: &str = "top";
const TREE: &str = "tree";
const BOTTOM: &str = "bottom";

/// Carries out a chosen folder menu entry. Runs on a dispatch queue, and an
/// error opens the exception screen.
pub type MenuHandler = Arc<dyn Fn(MenuAction, &Path) -> AppResult<()> + Send + Sync>;

/// Shows the largest folders of the scan, refreshed every tick.
pub struct FolderScanActivity {
    coordinator: ScanCoordinator,
    depth: usize,
    views: DisplayState,
    timer: Option<Timer>,
    last_key: Option<String>,
    summary: Option<ScanSummary>,
    menu_handler: MenuHandler,
    notice: Option<String>,
}

impl FolderScanActivity {
    pub fn new(coordinator: ScanCoordinator, depth: usize) -> Self {
        let tree = FolderTreeView {
            menu: ContextMenu::new("Menu", MenuAction::iter().map(|a| a.to_string())),
            ..FolderTreeView::default()
        };
        let mut views = DisplayState::new();
        views.insert(TOP, View::TopBar(BarView::default()));
        views.insert(TREE, View::FolderTree(tree));
        views.insert(BOTTOM, View::BottomBar(BarView::default()));

        let mut activity = Self {
            coordinator,
            depth: depth.clamp(MIN_DEPTH, MAX_DEPTH),
            views,
            timer: None,
            last_key: None,
            summary: None,
            menu_handler: Arc::new(run_menu_action),
            notice: None,
        };
        activity.update_bars();
        activity
    }

    /// Replace what the folder menu entries do.
    pub fn with_menu_handler(mut self, handler: MenuHandler) -> Self {
        self.menu_handler = handler;
        self
    }

    /// Current display depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn tree_view(&self) -> Option<&FolderTreeView> {
        match self.views.get(TREE) {
            Some(View::FolderTree(tree)) => Some(tree),
            _ => None,
        }
    }

    fn tree_view_mut(&mut self) -> Option<&mut FolderTreeView> {
        match self.views.get_mut(TREE) {
            Some(View::FolderTree(tree)) => Some(tree),
            _ => None,
        }
    }

    fn update_menu(&mut self, update: impl FnOnce(&mut ContextMenu)) {
        if let Some(view) = self.tree_view_mut() {
            update(&mut view.menu);
        }
    }

    /// Close the menu and post the highlighted entry for the selected folder.
    fn choose_menu_entry(&mut self, ctx: &ActivityContext) {
        let Some(view) = self.tree_view_mut() else {
            return;
        };
        let action = view
            .menu
            .selection()
            .and_then(|index| MenuAction::iter().nth(index));
        let selected = view.selected;
        view.menu.close();

        let (Some(action), Some(id)) = (action, selected) else {
            return;
        };
        let shared = self.coordinator.tree();
        let path = shared
            .read()
            .as_ref()
            .and_then(|tree| tree.get(id))
            .map(|folder| folder.path.clone());
        if let Some(path) = path {
            ctx.events().post(Event::Button { action, path });
        }
    }

    fn on_button(&mut self, action: MenuAction, path: PathBuf, ctx: &ActivityContext) {
        info!(%action, path = %path.display(), "folder menu action");
        self.notice = Some(match action {
            MenuAction::OpenInExplorer => format!("Opening {}", path.display()),
            MenuAction::Delete => format!("Moving {} to trash", path.display()),
        });

        let handler = Arc::clone(&self.menu_handler);
        let _ = ctx.dispatch().future(move || handler(action, &path));
    }

    fn set_depth(&mut self, depth: usize) {
        self.depth = depth.clamp(MIN_DEPTH, MAX_DEPTH);
        self.refresh_tree();
    }

    /// Rebuild the rows from the current, possibly partial, tree.
    fn refresh_tree(&mut self) {
        let shared = self.coordinator.tree();
        let guard = shared.read();
        let Some(tree) = guard.as_ref() else {
            return;
        };

        let rows: Vec<FolderRow> = tree
            .top_folders(self.depth)
            .into_iter()
            .map(|(folder, depth)| FolderRow {
                id: folder.id,
                depth,
                size: folder.size(),
                label: format!("{:.2}GB - {}", folder.stats.size_gb(), folder.path.display()),
            })
            .collect();
        let total = tree.total_size();

        let Some(view) = self.tree_view_mut() else {
            return;
        };
        let selected = visible_selection(tree, &rows, view.selected);
        view.rows = rows;
        view.total = total;
        view.selected = Some(selected);
        drop(guard);

        self.update_bars();
    }

    fn status(&self) -> String {
        match (&self.summary, self.coordinator.state()) {
            (Some(summary), _) if summary.cancelled => "Scan cancelled".to_string(),
            (Some(summary), _) => format!(
                "Scan complete: {} in {} folders, {:.1}s",
                format_size(summary.total_size),
                summary.folder_count,
                summary.elapsed.as_secs_f64()
            ),
            (None, ScanState::Complete) => "Scan complete".to_string(),
            (None, _) => progress_status(&self.coordinator.progress()),
        }
    }

    fn update_bars(&mut self) {
        let mut top = vec![
            "Beagle folder scan".to_string(),
            "Press h for help".to_string(),
            format!("Depth {}", self.depth),
        ];
        if let Some(key) = &self.last_key {
            top.push(format!("Last key: {key}"));
        }

        let percent = self.tree_view().map(FolderTreeView::scroll_percent).unwrap_or(0);
        let mut bottom = vec![self.status()];
        bottom.extend(self.notice.clone());
        let unreadable = self.coordinator.warnings().len();
        if unreadable > 0 {
            bottom.push(format!("{unreadable} unreadable"));
        }
        bottom.push(format!("{percent}%"));

        self.views.insert(TOP, View::TopBar(BarView::new(top)));
        self.views.insert(BOTTOM, View::BottomBar(BarView::new(bottom)));
    }

    fn handle_key(&mut self, event: &Event, ctx: &ActivityContext) -> AppResult<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        self.last_key = Some(describe_key(key));

        let menu_open = self.tree_view().is_some_and(|view| view.menu.visible);
        match KeyAction::from_key_event(*key) {
            KeyAction::MoveUp | KeyAction::MoveDown => {
                if let Some(view) = self.views.get_mut(TREE) {
                    view.handle_key(key);
                }
            }
            KeyAction::MoveLeft if menu_open => self.update_menu(ContextMenu::move_left),
            KeyAction::MoveRight if menu_open => self.update_menu(ContextMenu::move_right),
            KeyAction::Select if menu_open => self.choose_menu_entry(ctx),
            KeyAction::ToggleMenu | KeyAction::Select => self.update_menu(ContextMenu::toggle),
            KeyAction::Back if menu_open => self.update_menu(ContextMenu::close),
            KeyAction::DepthDecrease => self.set_depth(self.depth.saturating_sub(1)),
            KeyAction::DepthIncrease => self.set_depth(self.depth + 1),
            KeyAction::ShowHelp => {
                ctx.segue_to(Box::new(HelpActivity::new()), SegueMode::Push);
            }
            KeyAction::Quit => {
                ctx.pop_activity();
            }
            KeyAction::TestFault => bail!("This is just a test"),
            KeyAction::MoveLeft | KeyAction::MoveRight | KeyAction::Back | KeyAction::None => {}
        }

        self.update_bars();
        Ok(())
    }
}

/// Status line of a running scan.
fn progress_status(progress: &ScanProgress) -> String {
    format!(
        "Folder scan in progress: {} folders, {} ({}/s)",
        progress.folders_scanned,
        format_size(progress.bytes_scanned),
        format_size(progress.bytes_per_second() as u64)
    )
}

/// Open the folder in the system file manager, or move it to the trash.
fn run_menu_action(action: MenuAction, path: &Path) -> AppResult<()> {
    match action {
        MenuAction::OpenInExplorer => open::that_detached(path)
            .wrap_err_with(|| format!("Failed to open {}", path.display())),
        MenuAction::Delete => trash::delete(path)
            .map_err(|e| eyre!("Failed to move {} to trash: {e}", path.display())),
    }
}

/// Keep the selection on a visible row.
///
/// A folder that is no longer shown hands the selection to its nearest
/// shown ancestor; an unknown selection falls back to the root.
fn visible_selection(tree: &FolderTree, rows: &[FolderRow], selected: Option<FolderId>) -> FolderId {
    let is_visible = |id: FolderId| rows.iter().any(|row| row.id == id);
    match selected {
        Some(id) if is_visible(id) => id,
        Some(id) if tree.contains(id) => tree
            .ancestors(id)
            .find(|ancestor| is_visible(*ancestor))
            .unwrap_or_else(|| tree.root_id()),
        _ => tree.root_id(),
    }
}

impl Activity for FolderScanActivity {
    fn name(&self) -> &str {
        "FolderScan"
    }

    fn on_start(&mut self, ctx: &ActivityContext) -> AppResult<()> {
        for kind in [
            EventKind::Key,
            EventKind::Tick,
            EventKind::ScanStarted,
            EventKind::ScanComplete,
            EventKind::Button,
        ] {
            ctx.subscribe(kind);
        }

        let events = ctx.events();
        let interval = self.coordinator.config().refresh_interval;
        self.timer = Some(
            ctx.dispatch()
                .timer("refresh", interval, move || events.post(Event::Tick))?,
        );

        self.refresh_tree();
        self.update_bars();
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &ActivityContext) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn on_event(&mut self, event: &Event, ctx: &ActivityContext) -> AppResult<()> {
        match event {
            Event::Key(_) => return self.handle_key(event, ctx),
            Event::Tick => self.refresh_tree(),
            Event::ScanStarted => {
                self.summary = None;
                debug!("scan started");
            }
            Event::ScanComplete(summary) => {
                self.summary = Some(summary.clone());
                self.refresh_tree();
            }
            Event::Button { action, path } => self.on_button(*action, path.clone(), ctx),
            Event::Resize(..) | Event::ExceptionOccurred { .. } => {}
        }
        self.update_bars();
        Ok(())
    }

    fn views(&self) -> &DisplayState {
        &self.views
    }
}
