//! Activity log panel widget
//!
//! Rolling view of the engine's recent decisions, newest at the bottom.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::app::DashboardApp;
use crate::tui::theme::THEME;

/// Render the activity log panel
pub fn render_logs(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let block = Block::default()
        .title(" ACTIVITY ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let log_lines = &app.snapshot.log_lines;
    if log_lines.is_empty() {
        let empty = Paragraph::new(" Waiting for activity...").style(THEME.inactive_style());
        f.render_widget(empty, inner);
        return;
    }

    let visible = inner.height as usize;
    let skip = log_lines.len().saturating_sub(visible);

    let lines: Vec<Line> = log_lines
        .iter()
        .skip(skip)
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!(" {}  ", entry.at.format("%H:%M:%S")),
                    THEME.inactive_style(),
                ),
                Span::styled(entry.message.clone(), THEME.text_style()),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}
