//! Header bar widget
//!
//! Symbol, venue, trading mode and the latest traded price.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::app::DashboardApp;
use crate::tui::theme::THEME;

/// Render the header bar
pub fn render_header(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let block = Block::default()
        .title(" LADDER ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let snap = &app.snapshot;

    let mode_style = if snap.paper {
        THEME.highlight_style()
    } else {
        THEME.loss_style()
    };

    let last = snap
        .last_price
        .map(|p| p.normalize().to_string())
        .unwrap_or_else(|| "-".to_string());

    let line = Line::from(vec![
        Span::styled(format!(" {}", snap.symbol), THEME.title_style()),
        Span::styled(format!("  {}", snap.exchange_id), THEME.inactive_style()),
        Span::raw("  "),
        Span::styled(app.mode_label(), mode_style),
        Span::raw("   Last: "),
        Span::styled(last, THEME.text_style()),
        Span::raw("   "),
        Span::styled(
            snap.updated_at.format("%H:%M:%S UTC").to_string(),
            THEME.inactive_style(),
        ),
    ]);

    f.render_widget(Paragraph::new(line), inner);
}
