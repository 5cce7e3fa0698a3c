use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::order::OrderSide;

/// Engine state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Starting up, nothing wired yet
    Initializing,
    /// Reconciling a previous run against the venue
    Recovering,
    /// Idle: waiting for entry conditions
    Watching,
    /// Idle: a round just ended, waiting out the pause
    Cooldown,
    /// Idle: the base order failed; no new rounds until restart
    RoundFailed,
    /// Submitting the base and safety orders
    PlacingOrders,
    /// Grid on the book, no fills yet
    AwaitingFills,
    /// Holding a position, take profit working
    PositionOpen,
    /// Market-selling the position after a stop-loss breach
    ExecutingStopLoss,
    /// Canceling residual orders and resetting
    EndingRound,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Initializing => "INITIALIZING",
            EngineStatus::Recovering => "RECOVERING",
            EngineStatus::Watching => "WATCHING",
            EngineStatus::Cooldown => "COOLDOWN",
            EngineStatus::RoundFailed => "ROUND_FAILED",
            EngineStatus::PlacingOrders => "PLACING_ORDERS",
            EngineStatus::AwaitingFills => "AWAITING_FILLS",
            EngineStatus::PositionOpen => "POSITION_OPEN",
            EngineStatus::ExecutingStopLoss => "EXECUTING_STOP_LOSS",
            EngineStatus::EndingRound => "ENDING_ROUND",
        }
    }

    /// No round exists in these states.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            EngineStatus::Watching | EngineStatus::Cooldown | EngineStatus::RoundFailed
        )
    }

    pub fn in_round(&self) -> bool {
        matches!(
            self,
            EngineStatus::PlacingOrders
                | EngineStatus::AwaitingFills
                | EngineStatus::PositionOpen
                | EngineStatus::ExecutingStopLoss
                | EngineStatus::EndingRound
        )
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line in the dashboard's rolling log
#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Open order row for the dashboard table
#[derive(Debug, Clone)]
pub struct OpenOrderRow {
    pub role: String,
    pub side: OrderSide,
    pub price: Option<Decimal>,
    pub amount: Decimal,
}

/// Read-only view of engine state for the dashboard. Published through a
/// watch channel; the dashboard never mutates engine state.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub symbol: String,
    pub exchange_id: String,
    pub paper: bool,
    pub status: EngineStatus,
    pub last_price: Option<Decimal>,
    pub start_price: Option<Decimal>,
    pub average_entry_price: Option<Decimal>,
    pub position_amount: Decimal,
    pub position_cost: Decimal,
    pub unrealized_pnl: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub filled_safety_orders: u32,
    pub max_safety_orders: u32,
    pub cooldown_remaining_secs: Option<u64>,
    pub open_orders: Vec<OpenOrderRow>,
    pub log_lines: VecDeque<LogLine>,
    pub updated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Snapshot shown before the engine publishes anything.
    pub fn initial(symbol: &str, exchange_id: &str, paper: bool, max_safety_orders: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange_id: exchange_id.to_string(),
            paper,
            status: EngineStatus::Initializing,
            last_price: None,
            start_price: None,
            average_entry_price: None,
            position_amount: Decimal::ZERO,
            position_cost: Decimal::ZERO,
            unrealized_pnl: None,
            take_profit_price: None,
            stop_loss_price: None,
            filled_safety_orders: 0,
            max_safety_orders,
            cooldown_remaining_secs: None,
            open_orders: Vec::new(),
            log_lines: VecDeque::new(),
            updated_at: Utc::now(),
        }
    }
}
