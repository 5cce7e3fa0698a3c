//! Open orders panel widget
//!
//! Displays the resting grid: safety buys below, take profit above.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use rust_decimal::Decimal;

use crate::domain::OrderSide;
use crate::tui::app::DashboardApp;
use crate::tui::theme::THEME;

/// Render the open orders panel
pub fn render_orders(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let block = Block::default()
        .title(" OPEN ORDERS ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.snapshot.open_orders.is_empty() {
        let empty = Paragraph::new(" No open orders").style(THEME.inactive_style());
        f.render_widget(empty, inner);
        return;
    }

    let header = Line::from(vec![
        Span::styled(" ROLE          ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("SIDE  ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("      PRICE  ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("      AMOUNT", Style::default().add_modifier(Modifier::BOLD)),
    ]);

    let visible_rows = (inner.height as usize).saturating_sub(1);

    let mut lines: Vec<Line> = vec![header];
    for row in app.snapshot.open_orders.iter().take(visible_rows) {
        let (side_str, side_style) = match row.side {
            OrderSide::Buy => ("BUY ", THEME.profit_style()),
            OrderSide::Sell => ("SELL", THEME.loss_style()),
        };

        let price = row
            .price
            .map(|p| p.normalize().to_string())
            .unwrap_or_else(|| "market".to_string());

        lines.push(Line::from(vec![
            Span::raw(format!(" {:<13} ", row.role)),
            Span::styled(side_str, side_style),
            Span::raw(format!("  {:>11}", price)),
            Span::raw(format!("  {:>10}", fmt_amount(row.amount))),
        ]));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn fmt_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}
