//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::{TaskPriority, TaskStatus};

pub const SLATE: Color = Color::Rgb(100, 116, 139);
pub const SKY: Color = Color::Rgb(14, 165, 233);
pub const AMBER: Color = Color::Rgb(245, 158, 11);
pub const VIOLET: Color = Color::Rgb(139, 92, 246);
pub const EMERALD: Color = Color::Rgb(16, 185, 129);
pub const ROSE: Color = Color::Rgb(225, 29, 72);

/// Background for cards that are not selected.
pub const CARD_BG: Color = Color::Rgb(38, 38, 38);

/// Accent color of a board lane.
pub fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Backlog => SLATE,
        TaskStatus::Todo => SKY,
        TaskStatus::InProgress => AMBER,
        TaskStatus::InReview => VIOLET,
        TaskStatus::Done => EMERALD,
    }
}

pub fn priority_color(priority: TaskPriority) -> Color {
    match priority {
        TaskPriority::Low => SLATE,
        TaskPriority::Medium => SKY,
        TaskPriority::High => AMBER,
        TaskPriority::Urgent => ROSE,
    }
}

/// Readable foreground on top of `bg`.
pub fn text_on(bg: Color) -> Color {
    match bg {
        AMBER | EMERALD | SKY => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}
