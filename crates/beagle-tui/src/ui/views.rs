//! View variants an activity can place in its display state.

use beagle_core::FolderId;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use itertools::Itertools;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;

use super::{expand_tabs, visible_window};
use crate::theme::Theme;

/// One region of an activity's screen.
#[derive(Debug, Clone)]
pub enum View {
    /// Status items on one line, followed by a blank separator line.
    TopBar(BarView),
    /// A blank separator line, followed by status items on one line.
    BottomBar(BarView),
    /// Selectable lines with a highlighted selection.
    ScrollList(ScrollList),
    /// Read-only text scrolled with the arrow keys.
    MultilineText(ScrollList),
    /// Single-line editor.
    TextInput(TextInput),
    /// Indented folder rows with a selected folder.
    FolderTree(FolderTreeView),
    /// Blank rows.
    Spacer(u16),
}

impl View {
    /// Rows this view always takes, or `None` to fill the remaining space.
    pub fn fixed_height(&self) -> Option<u16> {
        match self {
            View::TopBar(_) | View::BottomBar(_) => Some(2),
            View::TextInput(_) => Some(1),
            View::Spacer(rows) => Some(*rows),
            View::ScrollList(_) | View::MultilineText(_) | View::FolderTree(_) => None,
        }
    }

    /// Draw the view into `area`.
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        match self {
            View::TopBar(bar) => {
                buf.set_stringn(area.x, area.y, bar.text(), area.width as usize, theme.header);
            }
            View::BottomBar(bar) => {
                let y = area.y + area.height.saturating_sub(1);
                buf.set_stringn(area.x, y, bar.text(), area.width as usize, theme.footer);
            }
            View::ScrollList(list) => list.render(area, buf, theme.text, Some(theme.selected)),
            View::MultilineText(list) => list.render(area, buf, theme.error_text, None),
            View::TextInput(input) => input.render(area, buf, theme),
            View::FolderTree(tree) => tree.render(area, buf, theme),
            View::Spacer(_) => {}
        }
    }

    /// Let the view react to a key. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match self {
            View::ScrollList(list) | View::MultilineText(list) => list.handle_key(key),
            View::TextInput(input) => input.handle_key(key),
            View::FolderTree(tree) => tree.handle_key(key),
            View::TopBar(_) | View::BottomBar(_) | View::Spacer(_) => false,
        }
    }
}

/// Status bar items, shown separated by `" | "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarView {
    pub items: Vec<String>,
}

impl BarView {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Items joined for display.
    pub fn text(&self) -> String {
        self.items.iter().join(" | ")
    }
}

/// Lines with a selection that is clamped to the list bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollList {
    pub items: Vec<String>,
    pub selected: usize,
}

impl ScrollList {
    pub fn new(items: Vec<String>) -> Self {
        Self { items, selected: 0 }
    }

    /// One item per line of `text`, with tabs expanded.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines().map(expand_tabs).collect())
    }

    pub fn scroll_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    /// Replace the items, keeping the selection in bounds.
    pub fn set_items(&mut self, items: Vec<String>) {
        self.items = items;
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => self.scroll_up(),
            KeyCode::Down => self.scroll_down(),
            _ => return false,
        }
        true
    }

    fn render(&self, area: Rect, buf: &mut Buffer, style: Style, highlight: Option<Style>) {
        let (start, end) = visible_window(self.selected, area.height as usize, self.items.len());
        for (row, index) in (start..end).enumerate() {
            let y = area.y + row as u16;
            let style = match highlight {
                Some(highlight) if index == self.selected => {
                    buf.set_style(Rect::new(area.x, y, area.width, 1), highlight);
                    highlight
                }
                _ => style,
            };
            buf.set_stringn(area.x, y, &self.items[index], area.width as usize, style);
        }
    }
}

/// Single-line text editor. The cursor is a character index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub label: String,
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    fn byte_offset(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map_or(self.text.len(), |(offset, _)| offset)
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn insert(&mut self, c: char) {
        let offset = self.byte_offset(self.cursor);
        self.text.insert(offset, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let offset = self.byte_offset(self.cursor);
        self.text.remove(offset);
    }

    /// Start of the word before the cursor.
    fn previous_word(&self) -> usize {
        let chars: Vec<char> = self.text.chars().collect();
        let mut pos = self.cursor;
        while pos > 0 && chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        pos
    }

    /// End of the word after the cursor.
    fn next_word(&self) -> usize {
        let chars: Vec<char> = self.text.chars().collect();
        let mut pos = self.cursor;
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        while pos < chars.len() && !chars[pos].is_whitespace() {
            pos += 1;
        }
        pos
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Left if ctrl => self.cursor = self.previous_word(),
            KeyCode::Right if ctrl => self.cursor = self.next_word(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.char_count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.char_count(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) if !ctrl => self.insert(c),
            _ => return false,
        }
        true
    }

    fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let prompt = format!("{}: ", self.label);
        let width = area.width as usize;
        let (x, _) = buf.set_stringn(area.x, area.y, &prompt, width, theme.label);
        let used = (x - area.x) as usize;
        buf.set_stringn(x, area.y, &self.text, width.saturating_sub(used), theme.text);

        let cursor_x = x as usize + self.cursor;
        if cursor_x < (area.x + area.width) as usize {
            buf.set_style(Rect::new(cursor_x as u16, area.y, 1, 1), theme.cursor);
        }
    }
}

/// Labelled entries on one line with one entry highlighted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMenu {
    pub label: String,
    pub items: Vec<String>,
    pub selected: usize,
    pub visible: bool,
}

impl ContextMenu {
    pub fn new<I, S>(label: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            items: items.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Show or hide the menu. Either way the first entry is highlighted.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        self.selected = 0;
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.selected = 0;
    }

    /// Highlight the previous entry, wrapping to the last.
    pub fn move_left(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + self.items.len() - 1) % self.items.len();
        }
    }

    /// Highlight the next entry, wrapping to the first.
    pub fn move_right(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }

    /// Index of the highlighted entry while the menu is shown.
    pub fn selection(&self) -> Option<usize> {
        (self.visible && self.selected < self.items.len()).then_some(self.selected)
    }

    fn render(&self, x: u16, y: u16, width: u16, buf: &mut Buffer, theme: &Theme) {
        let end = x.saturating_add(width);
        let label = format!("{}: ", self.label);
        let (mut x, _) = buf.set_stringn(x, y, &label, width as usize, theme.label);

        for (index, item) in self.items.iter().enumerate() {
            let style = if index == self.selected {
                theme.cursor
            } else {
                theme.text
            };
            let text = format!("[{item}]");
            let (after, _) = buf.set_stringn(x, y, &text, end.saturating_sub(x) as usize, style);
            x = after.saturating_add(1);
        }
    }
}

/// One visible folder of the tree view.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderRow {
    pub id: FolderId,
    pub depth: usize,
    pub size: u64,
    pub label: String,
}

/// Folder rows with the selection tracked by folder id, so it survives
/// rows being reordered by a refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderTreeView {
    pub rows: Vec<FolderRow>,
    pub selected: Option<FolderId>,
    /// Size of the root, used to color rows by their share.
    pub total: u64,
    /// Actions for the selected folder, drawn on the line below it.
    pub menu: ContextMenu,
}

impl FolderTreeView {
    /// Position of the selected folder among the rows.
    pub fn selected_index(&self) -> Option<usize> {
        let selected = self.selected?;
        self.rows.iter().position(|row| row.id == selected)
    }

    pub fn scroll_up(&mut self) {
        if let Some(index) = self.selected_index() {
            self.selected = Some(self.rows[index.saturating_sub(1)].id);
        }
    }

    pub fn scroll_down(&mut self) {
        if let Some(index) = self.selected_index() {
            if index + 1 < self.rows.len() {
                self.selected = Some(self.rows[index + 1].id);
            }
        }
    }

    /// Scroll position as a percentage of the rows.
    pub fn scroll_percent(&self) -> usize {
        match self.selected_index() {
            Some(index) if !self.rows.is_empty() => index * 100 / self.rows.len(),
            _ => 0,
        }
    }

    /// Moving the selection closes the menu.
    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => self.scroll_up(),
            KeyCode::Down => self.scroll_down(),
            _ => return false,
        }
        self.menu.close();
        true
    }

    fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let selected = self.selected_index().unwrap_or_default();
        let menu_rows = u16::from(self.menu.visible);
        let height = area.height.saturating_sub(menu_rows) as usize;
        let (start, end) = visible_window(selected, height, self.rows.len());

        let mut y = area.y;
        for (index, row) in self.rows.iter().enumerate().take(end).skip(start) {
            let text = format!("{}{}", " ".repeat(row.depth * 2), row.label);
            let style = if Some(row.id) == self.selected {
                buf.set_style(Rect::new(area.x, y, area.width, 1), theme.selected);
                theme.selected
            } else {
                Style::new().fg(theme.size_color(row.size, self.total))
            };
            buf.set_stringn(area.x, y, &text, area.width as usize, style);
            y += 1;

            if index == selected && self.menu.visible {
                let indent = (row.depth * 2 + 2).min(area.width as usize) as u16;
                let width = area.width - indent;
                self.menu.render(area.x + indent, y, width, buf, theme);
                y += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Modifier;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    #[test]
    fn test_scroll_list_clamps() {
        let mut list = ScrollList::new(vec!["a".into(), "b".into(), "c".into()]);
        list.scroll_up();
        assert_eq!(list.selected, 0);

        for _ in 0..5 {
            list.scroll_down();
        }
        assert_eq!(list.selected, 2);

        list.set_items(vec!["only".into()]);
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn test_scroll_list_from_text_expands_tabs() {
        let list = ScrollList::from_text("first\n\tindented");
        assert_eq!(list.items, vec!["first", "    indented"]);
    }

    #[test]
    fn test_bar_text() {
        let bar = BarView::new(["Folder scan", "Press h for help"]);
        assert_eq!(bar.text(), "Folder scan | Press h for help");
    }

    #[test]
    fn test_text_input_editing() {
        let mut input = TextInput::new("Filter");
        for c in "hello world".chars() {
            input.handle_key(&key(KeyCode::Char(c)));
        }
        assert_eq!(input.cursor, 11);

        input.handle_key(&ctrl(KeyCode::Left));
        assert_eq!(input.cursor, 6);
        input.handle_key(&key(KeyCode::Backspace));
        assert_eq!(input.text, "helloworld");

        input.handle_key(&key(KeyCode::Home));
        input.handle_key(&key(KeyCode::Char('>')));
        assert_eq!(input.text, ">helloworld");

        input.handle_key(&ctrl(KeyCode::Right));
        assert_eq!(input.cursor, input.text.chars().count());

        input.handle_key(&key(KeyCode::Right));
        assert_eq!(input.cursor, 11);
        assert!(!input.handle_key(&ctrl(KeyCode::Char('x'))));
    }

    #[test]
    fn test_text_input_multibyte() {
        let mut input = TextInput::new("Filter");
        input.insert('é');
        input.insert('x');
        input.handle_key(&key(KeyCode::Left));
        input.backspace();
        assert_eq!(input.text, "x");
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn test_folder_tree_selection_follows_id() {
        let row = |id, label: &str| FolderRow {
            id: FolderId(id),
            depth: 0,
            size: 0,
            label: label.into(),
        };
        let mut tree = FolderTreeView {
            rows: vec![row(0, "root"), row(1, "a"), row(2, "b")],
            selected: Some(FolderId(0)),
            ..FolderTreeView::default()
        };
        tree.scroll_up();
        assert_eq!(tree.selected, Some(FolderId(0)));

        tree.scroll_down();
        tree.scroll_down();
        tree.scroll_down();
        assert_eq!(tree.selected, Some(FolderId(2)));
        assert_eq!(tree.scroll_percent(), 66);

        tree.rows.swap(1, 2);
        assert_eq!(tree.selected_index(), Some(1));
    }

    #[test]
    fn test_context_menu_wraps_and_resets() {
        let mut menu = ContextMenu::new("Menu", ["open", "delete", "rename"]);
        assert_eq!(menu.selection(), None);

        menu.toggle();
        menu.move_left();
        assert_eq!(menu.selection(), Some(2));
        menu.move_right();
        menu.move_right();
        assert_eq!(menu.selection(), Some(1));

        menu.toggle();
        assert!(!menu.visible);
        menu.toggle();
        assert_eq!(menu.selection(), Some(0));
    }

    #[test]
    fn test_folder_tree_renders_menu_under_selection() {
        let row = |id, depth, label: &str| FolderRow {
            id: FolderId(id),
            depth,
            size: 0,
            label: label.into(),
        };
        let mut tree = FolderTreeView {
            rows: vec![row(0, 0, "root"), row(1, 1, "a"), row(2, 1, "b")],
            selected: Some(FolderId(1)),
            menu: ContextMenu::new("Menu", ["open", "delete"]),
            ..FolderTreeView::default()
        };
        tree.menu.toggle();
        tree.menu.move_right();

        let area = Rect::new(0, 0, 30, 4);
        let mut buf = Buffer::empty(area);
        let theme = Theme::default();
        tree.render(area, &mut buf, &theme);

        let line = |y: u16| -> String {
            (0..area.width).map(|x| buf[(x, y)].symbol()).collect::<String>()
        };
        assert_eq!(line(1).trim_end(), "  a");
        assert_eq!(line(2).trim_end(), "    Menu: [open] [delete]");
        assert_eq!(line(3).trim_end(), "  b");
        assert!(buf[(17, 2)].modifier.contains(Modifier::REVERSED));
        assert!(!buf[(10, 2)].modifier.contains(Modifier::REVERSED));

        assert!(tree.handle_key(&key(KeyCode::Down)));
        assert!(!tree.menu.visible);
    }

    #[test]
    fn test_fixed_heights() {
        assert_eq!(View::TopBar(BarView::default()).fixed_height(), Some(2));
        assert_eq!(View::Spacer(3).fixed_height(), Some(3));
        assert_eq!(View::ScrollList(ScrollList::default()).fixed_height(), None);
    }
}
