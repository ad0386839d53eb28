//! Declarative views and the terminal screen they are drawn on.

mod views;

pub use views::{BarView, ContextMenu, FolderRow, FolderTreeView, ScrollList, TextInput, View};

use std::sync::Arc;

use color_eyre::eyre::eyre;
use indexmap::IndexMap;
use parking_lot::Mutex;
use ratatui::backend::Backend;
use ratatui::layout::Rect;
use ratatui::{Frame, Terminal};

use crate::AppResult;
use crate::theme::Theme;

/// Named view regions of an activity, drawn top to bottom in insertion order.
pub type DisplayState = IndexMap<&'static str, View>;

/// Something an activity's views can be drawn on.
pub trait Screen {
    /// Replace the screen contents with `views`.
    fn render_views(&mut self, views: &DisplayState, theme: &Theme) -> AppResult<()>;
}

impl<B: Backend> Screen for Terminal<B> {
    fn render_views(&mut self, views: &DisplayState, theme: &Theme) -> AppResult<()> {
        self.draw(|frame| draw_views(frame, views, theme))
            .map(|_| ())
            .map_err(|e| eyre!("failed to draw frame: {e}"))
    }
}

impl<S: Screen> Screen for Arc<Mutex<S>> {
    fn render_views(&mut self, views: &DisplayState, theme: &Theme) -> AppResult<()> {
        self.lock().render_views(views, theme)
    }
}

/// Draw every region that fits into the frame.
pub fn draw_views(frame: &mut Frame, views: &DisplayState, theme: &Theme) {
    let area = frame.area();
    let fixed: Vec<_> = views.values().map(View::fixed_height).collect();
    let heights = distribute_rows(&fixed, area.height);

    let mut y = area.y;
    for (view, height) in views.values().zip(heights) {
        if height == 0 {
            break;
        }
        let region = Rect::new(area.x, y, area.width, height);
        view.render(region, frame.buffer_mut(), theme);
        y += height;
    }
}

/// Split `rows` between regions top to bottom.
///
/// A region with a fixed height gets that height. A flexible region gets
/// whatever is left once the fixed regions below it are reserved. Every
/// region is clipped to the rows still available, and once they run out the
/// remaining regions get nothing.
pub fn distribute_rows(fixed: &[Option<u16>], rows: u16) -> Vec<u16> {
    let mut heights = Vec::with_capacity(fixed.len());
    let mut y: u16 = 0;

    for (index, wanted) in fixed.iter().enumerate() {
        let available = rows.saturating_sub(y);
        let height = match wanted {
            Some(height) => *height,
            None => {
                let reserved = fixed[index + 1..]
                    .iter()
                    .flatten()
                    .fold(0u16, |total, height| total.saturating_add(*height));
                available.saturating_sub(reserved)
            }
        }
        .min(available);

        heights.push(height);
        y += height;
    }

    heights
}

/// Window `[start, end)` of a list of `len` items that keeps `index` centred
/// in `height` rows, clamped at both ends of the list.
pub fn visible_window(index: usize, height: usize, len: usize) -> (usize, usize) {
    if height == 0 || len == 0 {
        return (0, 0);
    }

    let up = height / 2;
    let down = if height % 2 == 0 { up - 1 } else { up };

    if index < up {
        (0, height.min(len))
    } else if index + down >= len {
        (len.saturating_sub(height), len)
    } else {
        (index - up, index + down + 1)
    }
}

/// Format a byte size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Replace tabs with four spaces.
pub fn expand_tabs(text: &str) -> String {
    text.replace('\t', "    ")
}
