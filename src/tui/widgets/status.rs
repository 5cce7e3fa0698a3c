//! Round status panel widget
//!
//! Engine state, entry prices, position size and the working exit levels.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use rust_decimal::Decimal;

use crate::domain::EngineStatus;
use crate::tui::app::DashboardApp;
use crate::tui::theme::THEME;

/// Render the round status panel
pub fn render_status(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let block = Block::default()
        .title(" ROUND ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let snap = &app.snapshot;
    let mut lines = Vec::new();

    lines.push(Line::from(vec![
        Span::styled(" Status     ", THEME.inactive_style()),
        Span::styled(snap.status.to_string(), status_style(snap.status)),
    ]));

    lines.push(Line::from(vec![
        Span::styled(" Start      ", THEME.inactive_style()),
        Span::raw(fmt_price(snap.start_price)),
        Span::styled("   Avg entry ", THEME.inactive_style()),
        Span::raw(fmt_price(snap.average_entry_price)),
    ]));

    let mut position_spans = vec![
        Span::styled(" Position   ", THEME.inactive_style()),
        Span::raw(snap.position_amount.normalize().to_string()),
        Span::styled("   Cost ", THEME.inactive_style()),
        Span::raw(snap.position_cost.normalize().to_string()),
    ];
    if let Some(pnl) = snap.unrealized_pnl {
        position_spans.push(Span::styled("   uPnL ", THEME.inactive_style()));
        position_spans.push(Span::styled(
            format!("{:+.4}", pnl),
            THEME.pnl_style(pnl >= Decimal::ZERO),
        ));
    }
    lines.push(Line::from(position_spans));

    lines.push(Line::from(vec![
        Span::styled(" Take profit ", THEME.inactive_style()),
        Span::raw(fmt_price(snap.take_profit_price)),
        Span::styled("   Stop loss ", THEME.inactive_style()),
        Span::raw(fmt_price(snap.stop_loss_price)),
    ]));

    lines.push(Line::from(vec![
        Span::styled(" Safety     ", THEME.inactive_style()),
        Span::styled(
            format!("{}/{}", snap.filled_safety_orders, snap.max_safety_orders),
            THEME.highlight_style(),
        ),
    ]));

    if let Some(secs) = snap.cooldown_remaining_secs {
        lines.push(Line::from(vec![
            Span::styled(" Cooldown   ", THEME.inactive_style()),
            Span::styled(format!("{}s remaining", secs), THEME.highlight_style()),
        ]));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn status_style(status: EngineStatus) -> Style {
    match status {
        EngineStatus::PositionOpen => THEME.profit_style(),
        EngineStatus::RoundFailed | EngineStatus::ExecutingStopLoss => THEME.loss_style(),
        EngineStatus::PlacingOrders | EngineStatus::EndingRound | EngineStatus::Cooldown => {
            THEME.highlight_style()
        }
        EngineStatus::Initializing | EngineStatus::Recovering => THEME.inactive_style(),
        EngineStatus::Watching | EngineStatus::AwaitingFills => THEME.border_style(),
    }
}

fn fmt_price(value: Option<Decimal>) -> String {
    value
        .map(|p| p.normalize().to_string())
        .unwrap_or_else(|| "-".to_string())
}
