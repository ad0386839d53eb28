//! Color theme for the TUI.
//!
//! A semantic color palette based on Tailwind CSS colors.

use ratatui::style::{Color, Modifier, Style};

/// Color theme for the TUI.
#[derive(Debug, Clone)]
pub struct Theme {
    // Base colors
    pub foreground: Color,
    pub muted: Color,

    // Interactive elements
    pub selected: Style,
    pub cursor: Style,

    // Size indicators (gradient by share of the root)
    pub size_huge: Color,   // > 50%
    pub size_large: Color,  // > 25%
    pub size_medium: Color, // > 10%
    pub size_small: Color,  // <= 10%

    // Bars
    pub header: Style,
    pub footer: Style,
    pub label: Style,

    // Text
    pub text: Style,
    pub error_text: Style,
}

impl Theme {
    /// Dark theme using a slate-based palette.
    pub fn dark() -> Self {
        // Slate palette (Tailwind CSS)
        let slate_100 = Color::Rgb(241, 245, 249);
        let slate_300 = Color::Rgb(203, 213, 225);
        let slate_400 = Color::Rgb(148, 163, 184);
        let slate_500 = Color::Rgb(100, 116, 139);

        // Accent colors (Tailwind CSS)
        let blue_400 = Color::Rgb(96, 165, 250);
        let green_500 = Color::Rgb(34, 197, 94);
        let yellow_500 = Color::Rgb(234, 179, 8);
        let orange_500 = Color::Rgb(249, 115, 22);
        let red_400 = Color::Rgb(248, 113, 113);
        let red_500 = Color::Rgb(239, 68, 68);

        Self {
            foreground: slate_100,
            muted: slate_500,

            // Selection must survive terminals without truecolor.
            selected: Style::new().add_modifier(Modifier::REVERSED | Modifier::BOLD),
            cursor: Style::new().add_modifier(Modifier::REVERSED),

            size_huge: red_500,
            size_large: orange_500,
            size_medium: yellow_500,
            size_small: green_500,

            header: Style::new().fg(slate_100).add_modifier(Modifier::BOLD),
            footer: Style::new().fg(slate_400),
            label: Style::new().fg(blue_400).add_modifier(Modifier::BOLD),

            text: Style::new().fg(slate_300),
            error_text: Style::new().fg(red_400),
        }
    }

    /// Color for a folder holding `size` of `total` bytes.
    pub fn size_color(&self, size: u64, total: u64) -> Color {
        if total == 0 {
            return self.size_small;
        }
        let share = size as f64 / total as f64;
        if share > 0.5 {
            self.size_huge
        } else if share > 0.25 {
            self.size_large
        } else if share > 0.1 {
            self.size_medium
        } else {
            self.size_small
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
