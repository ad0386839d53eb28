//! Key binding reference.

use crossterm::event::KeyCode;

use crate::AppResult;
use crate::activity::{Activity, ActivityContext};
use crate::event::{Event, EventKind, get_key_bindings};
use crate::ui::{BarView, DisplayState, ScrollList, TextInput, View};

const FILTER: &str = "filter";
const COMMANDS: &str = "commands";

/// Lists the key bindings, filtered by what the user types.
pub struct HelpActivity {
    views: DisplayState,
}

impl HelpActivity {
    pub fn new() -> Self {
        let mut views = DisplayState::new();
        views.insert(
            "top",
            View::TopBar(BarView::new(["Command help", "Press ESC to return"])),
        );
        views.insert(FILTER, View::TextInput(TextInput::new("Filter")));
        views.insert("gap", View::Spacer(1));
        views.insert(COMMANDS, View::ScrollList(ScrollList::new(command_lines(""))));
        Self { views }
    }

    fn apply_filter(&mut self) {
        let filter = match self.views.get(FILTER) {
            Some(View::TextInput(input)) => input.text.clone(),
            _ => return,
        };
        if let Some(View::ScrollList(list)) = self.views.get_mut(COMMANDS) {
            list.set_items(command_lines(&filter));
        }
    }
}

impl Default for HelpActivity {
    fn default() -> Self {
        Self::new()
    }
}

fn command_lines(filter: &str) -> Vec<String> {
    let filter = filter.to_lowercase();
    get_key_bindings()
        .into_iter()
        .filter(|binding| binding.description.to_lowercase().contains(&filter))
        .map(|binding| format!("{:>10}  {}", binding.keys, binding.description))
        .collect()
}

impl Activity for HelpActivity {
    fn name(&self) -> &str {
        "Help"
    }

    fn on_start(&mut self, ctx: &ActivityContext) -> AppResult<()> {
        ctx.subscribe(EventKind::Key);
        Ok(())
    }

    fn on_event(&mut self, event: &Event, ctx: &ActivityContext) -> AppResult<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };

        match key.code {
            KeyCode::Esc => {
                ctx.pop_activity();
            }
            KeyCode::Up | KeyCode::Down => {
                if let Some(view) = self.views.get_mut(COMMANDS) {
                    view.handle_key(key);
                }
            }
            _ => {
                let edited = self
                    .views
                    .get_mut(FILTER)
                    .is_some_and(|view| view.handle_key(key));
                if edited {
                    self.apply_filter();
                }
            }
        }
        Ok(())
    }

    fn views(&self) -> &DisplayState {
        &self.views
    }
}
