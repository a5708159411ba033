//! Enumerations for TUI state management.

/// Which screen or modal receives keyboard input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppState {
    #[default]
    Board,
    /// Typing the free-text query in the toolbar.
    Query,
    TaskDetail,
    /// Writing a comment inside the detail popup.
    Comment,
    AddTask,
    Help,
}
