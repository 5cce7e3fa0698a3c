//! Terminal User Interface module
//!
//! Live dashboard for watching the bot trade: engine state, open grid
//! orders and a rolling activity log.

pub mod app;
pub mod event;
pub mod runner;
pub mod theme;
pub mod ui;
pub mod widgets;


pub use app::DashboardApp;
pub use event::KeyAction;
pub use runner::run_dashboard;
pub use theme::Theme;

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to normal mode
pub fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
