//! Footer status bar widget
//!
//! Key hints plus mode and state badges.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::tui::app::DashboardApp;
use crate::tui::theme::THEME;

/// Render the footer status bar
pub fn render_footer(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let snap = &app.snapshot;

    let mut spans = vec![
        Span::styled("  q", THEME.highlight_style()),
        Span::styled(" quit  ", THEME.inactive_style()),
        Span::raw("  Orders: "),
        Span::styled(format!("{}", snap.open_orders.len()), THEME.highlight_style()),
        Span::raw("  Safety: "),
        Span::styled(
            format!("{}/{}", snap.filled_safety_orders, snap.max_safety_orders),
            THEME.highlight_style(),
        ),
        Span::raw("  "),
    ];

    if snap.paper {
        spans.push(Span::styled("[PAPER]", THEME.highlight_style()));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(
        format!("[{}]", snap.status),
        THEME.border_style(),
    ));

    let paragraph = Paragraph::new(Line::from(spans));
    f.render_widget(paragraph, area);
}
