//! Screen shown when a task fails.

use beagle_dispatch::TaskError;
use crossterm::event::KeyCode;
use rand::seq::SliceRandom;

use crate::AppResult;
use crate::activity::{Activity, ActivityContext};
use crate::event::{Event, EventKind};
use crate::ui::{BarView, DisplayState, ScrollList, View};

const ADMONISHMENTS: &[&str] = &[
    "Please try harder next time.",
    "Typical...",
    "Ugh, Again?",
    "Really? You're better than this",
    "Good thing I was here to catch it",
    "Won't be the last time!",
    "Computers are terrible.",
];

const ERROR: &str = "error";

/// Shows a failure with its details until the user presses Esc.
///
/// Stopping this screen re-arms the application's exception recovery.
pub struct ShowExceptionActivity {
    views: DisplayState,
}

impl ShowExceptionActivity {
    pub fn new(queue: &str, error: &TaskError) -> Self {
        let admonishment = ADMONISHMENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default();
        let text = format!("Failure on queue `{queue}`:\n\n{}", error.details());

        let mut views = DisplayState::new();
        views.insert(
            "top",
            View::TopBar(BarView::new([
                "App has caught an exception",
                "Press ESC to try and go back",
            ])),
        );
        views.insert(ERROR, View::MultilineText(ScrollList::from_text(&text)));
        views.insert("bottom", View::BottomBar(BarView::new([admonishment])));
        Self { views }
    }
}

impl Activity for ShowExceptionActivity {
    fn name(&self) -> &str {
        "ShowException"
    }

    fn on_start(&mut self, ctx: &ActivityContext) -> AppResult<()> {
        ctx.subscribe(EventKind::Key);
        Ok(())
    }

    fn on_stop(&mut self, ctx: &ActivityContext) {
        ctx.app().clear_last_exception();
    }

    fn on_event(&mut self, event: &Event, ctx: &ActivityContext) -> AppResult<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.code == KeyCode::Esc {
            ctx.pop_activity();
        } else if let Some(view) = self.views.get_mut(ERROR) {
            view.handle_key(key);
        }
        Ok(())
    }

    fn views(&self) -> &DisplayState {
        &self.views
    }
}
