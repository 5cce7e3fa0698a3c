//! The round: one base order plus its safety ladder, take profit and
//! stop loss, tracked from first placement to final exit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::order::ExchangeOrder;

/// Mutable state of the active round. At most one exists at a time and
/// exactly one task owns it.
#[derive(Debug, Clone)]
pub struct Round {
    /// Anchor price chosen when the round opened; immutable afterwards and
    /// encoded into every client order id of the round.
    pub start_price: Decimal,
    pub started_at: DateTime<Utc>,
    /// Computed once from the start price; never repriced.
    pub fixed_stop_loss_price: Option<Decimal>,
    /// Open base/safety orders, unique by venue order id
    pub buy_orders: Vec<ExchangeOrder>,
    /// The one working take-profit sell, if any
    pub take_profit_order: Option<ExchangeOrder>,
    /// Net base units held, after fees
    pub position_amount: Decimal,
    /// Gross quote spent on fills
    pub position_cost: Decimal,
    pub average_entry_price: Decimal,
    pub filled_safety_orders: u32,
    /// Venue order ids whose fills are already in the ledger
    pub processed_order_ids: HashSet<String>,
}

impl Round {
    pub fn new(start_price: Decimal) -> Self {
        Self {
            start_price,
            started_at: Utc::now(),
            fixed_stop_loss_price: None,
            buy_orders: Vec::new(),
            take_profit_order: None,
            position_amount: Decimal::ZERO,
            position_cost: Decimal::ZERO,
            average_entry_price: Decimal::ZERO,
            filled_safety_orders: 0,
            processed_order_ids: HashSet::new(),
        }
    }

    /// Apply a filled buy to the position ledger.
    ///
    /// Net amount is the fill minus the fee; cost is the gross quote spent.
    /// Returns false without touching the ledger when the order id was
    /// already processed (duplicate delivery) or the fill is empty.
    pub fn apply_fill(&mut self, order: &ExchangeOrder, fee_rate: Decimal) -> bool {
        if self.processed_order_ids.contains(&order.id) {
            return false;
        }
        if order.filled <= Decimal::ZERO {
            return false;
        }
        self.processed_order_ids.insert(order.id.clone());

        let fill_price = order.fill_price().unwrap_or(self.start_price);
        let cost = if order.cost > Decimal::ZERO {
            order.cost
        } else {
            order.filled * fill_price
        };

        self.position_amount += order.filled * (Decimal::ONE - fee_rate);
        self.position_cost += cost;
        if self.position_amount > Decimal::ZERO {
            self.average_entry_price = self.position_cost / self.position_amount;
        }
        true
    }

    /// Drop a buy order from the open set, returning it if present.
    pub fn remove_buy_order(&mut self, order_id: &str) -> Option<ExchangeOrder> {
        let idx = self.buy_orders.iter().position(|o| o.id == order_id)?;
        Some(self.buy_orders.remove(idx))
    }

    pub fn has_position(&self) -> bool {
        self.position_amount > Decimal::ZERO
    }

    /// Mark-to-market PnL of the open position, net of the exit fee.
    pub fn unrealized_pnl(
        &self,
        last_price: Decimal,
        contract_size: Decimal,
        fee_rate: Decimal,
    ) -> Decimal {
        let gross = last_price * self.position_amount * contract_size;
        gross * (Decimal::ONE - fee_rate) - self.position_cost
    }
}
