//! Dashboard loop wired to the engine's snapshot channel.
//!
//! The runner repaints whenever the engine publishes a snapshot and maps
//! quit keys to a graceful shutdown request. It never blocks the engine:
//! the watch channel always holds the latest snapshot and dropped frames
//! are fine.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::backend::Backend;
use ratatui::Terminal;
use tokio::sync::watch;

use crate::coordination::{ShutdownController, ShutdownMode};
use crate::domain::DashboardSnapshot;
use crate::tui::app::DashboardApp;
use crate::tui::event::KeyAction;
use crate::tui::{init_terminal, restore_terminal, ui};

/// Run the dashboard until shutdown is requested.
pub async fn run_dashboard(
    mut snapshot_rx: watch::Receiver<DashboardSnapshot>,
    controller: Arc<ShutdownController>,
) -> io::Result<()> {
    let mut terminal = init_terminal()?;
    let result = run_event_loop(&mut terminal, &mut snapshot_rx, &controller).await;
    restore_terminal()?;
    result
}

/// Repaint on every snapshot and wake for the keyboard at ~20fps.
///
/// Input is a zero-timeout poll inside a select arm, so an idle dashboard
/// parks on the watch channel instead of holding a runtime worker.
pub(crate) async fn run_event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    snapshot_rx: &mut watch::Receiver<DashboardSnapshot>,
    controller: &ShutdownController,
) -> io::Result<()> {
    let mut app = DashboardApp::new(snapshot_rx.borrow().clone());

    loop {
        terminal.draw(|f| ui::render(f, &app))?;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if crossterm::event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(crossterm::event::Event::Key(key)) = crossterm::event::read() {
                        if KeyAction::from(key) == KeyAction::Quit {
                            controller.request(ShutdownMode::Graceful);
                        }
                    }
                }
            }
            changed = snapshot_rx.changed() => match changed {
                Ok(()) => app.update(snapshot_rx.borrow_and_update().clone()),
                // Engine gone; nothing further will render.
                Err(_) => break,
            },
        }

        if controller.mode().is_some() {
            break;
        }
    }

    Ok(())
}
