//! Board TUI entry point and terminal setup.

use std::io;
use std::path::PathBuf;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};

use crate::db::Database;
use crate::error::Result;
use crate::fields::ViewMode;
use crate::store::StoreContext;
use crate::tui::board::BoardApp;

/// Run the board until the user quits. Returns the view mode in use at exit so it can be
/// remembered for the next session.
pub fn run_board_tui(db: Database, db_path: PathBuf, context: StoreContext, view: ViewMode) -> Result<ViewMode> {
    let mut app = BoardApp::new(db, Some(db_path), context, view)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result?;
    tracing::debug!(view = ?app.view_mode(), "board closed");
    Ok(app.view_mode())
}
