//! Terminal user interface for beagle.
//!
//! This crate provides the interactive front end: an event-driven
//! [`Application`] that stacks [`Activity`] screens and draws their
//! declarative views with ratatui.
//!
//! # Overview
//!
//! - **Event bus** - producers on any thread post [`Event`]s; subscriber
//!   callbacks run one at a time on the application's main queue
//! - **Activity stack** - push, replace and pop screens; closing the last
//!   screen ends the program
//! - **Exception recovery** - a failing task opens an exception screen; a
//!   second failure while it is shown ends the program with that failure
//!
//! # Usage
//!
//! ```rust,no_run
//! use beagle_core::ScanConfig;
//! use beagle_tui::TuiConfig;
//!
//! let config = TuiConfig::new(ScanConfig::new("/path/to/explore"));
//! beagle_tui::run_with_config(config).unwrap();
//! ```
//!
//! # Keyboard Navigation
//!
//! - `Up`/`Down` - Move the selection
//! - `Space`/`Enter` - Open the folder menu; `Left`/`Right` and `Enter` choose
//!   an entry
//! - `[`/`]` - Show one level less/more of the tree
//! - `h` - Help
//! - `Esc` - Return to the previous screen
//! - `q` - Close the current screen
//! - `Ctrl-C` - Exit

pub mod activities;
mod activity;
mod application;
mod event;
mod input;
mod theme;
pub mod ui;

use std::fs;
use std::path::Path;

use beagle_core::{ScanConfig, ScanError};
use beagle_dispatch::CentralDispatch;
use beagle_scan::ScanCoordinator;
use color_eyre::eyre::{Report, WrapErr};
use tracing::info;

pub use activity::{Activity, ActivityContext, ActivityId};
pub use application::{AppStatus, Application, SegueMode};
pub use event::{Event, EventKind, EventSender, KeyAction, MenuAction, StopSignal};
pub use input::spawn_input_reader;
pub use theme::Theme;

use activities::FolderScanActivity;

/// Result type used throughout the TUI.
pub type AppResult<T> = color_eyre::Result<T>;

/// Settings of an interactive session.
#[derive(Debug, Clone)]
pub struct TuiConfig {
    /// What to scan.
    pub scan: ScanConfig,
    /// Tree depth shown when the scan screen opens.
    pub initial_depth: usize,
}

impl TuiConfig {
    pub fn new(scan: ScanConfig) -> Self {
        Self {
            scan,
            initial_depth: activities::DEFAULT_DEPTH,
        }
    }

    /// Set the initial tree depth, clamped to the supported range.
    pub fn with_initial_depth(mut self, depth: usize) -> Self {
        self.initial_depth = depth.clamp(activities::MIN_DEPTH, activities::MAX_DEPTH);
        self
    }
}

/// Run the TUI on the configured root until the user quits.
pub fn run_with_config(config: TuiConfig) -> AppResult<()> {
    preflight(&config.scan.root)?;

    let terminal = ratatui::init();
    let result = launch(&config, terminal).and_then(|app| {
        spawn_input_reader(&app);
        wait_for_shutdown(&app)
    });
    ratatui::restore();

    result
}

/// Start the application and the scan without reading terminal input.
///
/// The scan stops submitting work once the application shuts down.
pub fn launch<S>(config: &TuiConfig, screen: S) -> AppResult<Application>
where
    S: ui::Screen + Send + 'static,
{
    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config.scan.clone())?;
    let app = Application::new(&dispatch, screen)?;

    let shutdown = app.start(Box::new(FolderScanActivity::new(
        coordinator.clone(),
        config.initial_depth,
    )))?;

    app.post(Event::ScanStarted);
    let events = app.events();
    let started = coordinator.start(&shutdown, move |summary| {
        events.post(Event::ScanComplete(summary.clone()));
    });
    if let Err(err) = started {
        app.post_stop(StopSignal::normal());
        shutdown.block_until_done();
        return Err(err.into());
    }

    info!(root = %config.scan.root.display(), "interactive session started");
    Ok(app)
}

/// Block until the application stops. A fatal stop becomes an error.
pub fn wait_for_shutdown(app: &Application) -> AppResult<()> {
    let signal = app
        .shutdown_signal()
        .wait()
        .wrap_err("event loop ended unexpectedly")?;
    match signal.error {
        Some(error) => Err(Report::new(error).wrap_err("stopped after a repeated failure")),
        None => Ok(()),
    }
}

fn preflight(root: &Path) -> AppResult<()> {
    let metadata = fs::metadata(root).map_err(|e| ScanError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
