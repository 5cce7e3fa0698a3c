//! Dashboard application state.
//!
//! The dashboard is a passive view: all state arrives as engine snapshots
//! and the app never talks back to the engine except through the shutdown
//! controller.

use crate::domain::DashboardSnapshot;

/// TUI application state
pub struct DashboardApp {
    /// Latest engine snapshot
    pub snapshot: DashboardSnapshot,
}

impl DashboardApp {
    /// Create the app from the engine's initial snapshot
    pub fn new(snapshot: DashboardSnapshot) -> Self {
        Self { snapshot }
    }

    /// Replace the displayed snapshot
    pub fn update(&mut self, snapshot: DashboardSnapshot) {
        self.snapshot = snapshot;
    }

    /// Badge shown next to the symbol
    pub fn mode_label(&self) -> &'static str {
        if self.snapshot.paper {
            "[PAPER]"
        } else {
            "[LIVE]"
        }
    }

    /// True once the round holds any base asset
    pub fn has_position(&self) -> bool {
        self.snapshot.position_amount > rust_decimal::Decimal::ZERO
    }
}
