//! Main UI rendering logic
//!
//! Orchestrates the layout and renders all widgets.

use ratatui::{
    layout::{Constraint, Layout},
    Frame,
};

use crate::tui::app::DashboardApp;
use crate::tui::widgets;

/// Render the entire UI
pub fn render(f: &mut Frame, app: &DashboardApp) {
    // Main vertical layout
    let chunks = Layout::vertical([
        Constraint::Length(3),  // Header bar
        Constraint::Length(8),  // Round status panel
        Constraint::Min(8),     // Open orders panel (fills remaining)
        Constraint::Length(10), // Activity log panel
        Constraint::Length(1),  // Footer status bar
    ])
    .split(f.area());

    // Render each panel
    widgets::render_header(f, chunks[0], app);
    widgets::render_status(f, chunks[1], app);
    widgets::render_orders(f, chunks[2], app);
    widgets::render_logs(f, chunks[3], app);
    widgets::render_footer(f, chunks[4], app);
}
