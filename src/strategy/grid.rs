//! Order-grid pricing engine.
//!
//! Turns the strategy configuration into the concrete ladder of buy orders
//! for one round, plus the derived take-profit and stop-loss levels. All of
//! it is pure arithmetic over [`Decimal`], so the geometry can be validated
//! and previewed before a single order is sent.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::BotConfig;
use crate::domain::OrderRole;
use crate::error::{LadderError, Result};

/// One buy level of the ladder.
#[derive(Debug, Clone, Serialize)]
pub struct GridLevel {
    pub role: OrderRole,
    pub price: Decimal,
    /// Quote currency committed at this level
    pub quote_size: Decimal,
    /// Percent below the round start price; zero for the base order
    pub cumulative_deviation: Decimal,
}

impl GridLevel {
    /// Base amount bought if this level fills exactly at its limit price,
    /// before fees and venue rounding.
    pub fn base_amount(&self) -> Decimal {
        if self.price <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.quote_size / self.price
        }
    }
}

/// The full buy ladder for a round opened at `start_price`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderGrid {
    pub start_price: Decimal,
    pub base: GridLevel,
    pub safety: Vec<GridLevel>,
    /// Cumulative deviation of the deepest safety order, percent
    pub final_deviation: Decimal,
}

impl OrderGrid {
    /// Base order first, then safety orders in ladder order.
    pub fn levels(&self) -> impl Iterator<Item = &GridLevel> {
        std::iter::once(&self.base).chain(self.safety.iter())
    }
}

/// Reject ladder geometry that could never complete a round.
///
/// Field-level sanity lives in [`BotConfig::validate`]; this checks the
/// derived ladder and runs before any order is placed.
pub fn validate(config: &BotConfig) -> Result<()> {
    if config.take_profit <= Decimal::ZERO {
        return Err(LadderError::Validation(format!(
            "take_profit must be positive, got {}%",
            config.take_profit
        )));
    }

    let mut cumulative = Decimal::ZERO;
    let mut step = config.price_deviation;
    for i in 1..=config.max_safety_orders {
        if i > 1 {
            step *= config.price_deviation_multiplier;
        }
        cumulative += step;
        if cumulative >= Decimal::ONE_HUNDRED {
            return Err(LadderError::Validation(format!(
                "cumulative price deviation reaches {cumulative}% at safety order {i}, \
                 which implies a zero or negative order price"
            )));
        }
    }

    if config.stop_loss > Decimal::ZERO
        && cumulative > Decimal::ZERO
        && config.stop_loss <= cumulative
    {
        return Err(LadderError::Validation(format!(
            "stop_loss at {}% would trigger before the final safety order at {}% \
             cumulative deviation; deepen the stop or shorten the ladder",
            config.stop_loss, cumulative
        )));
    }

    Ok(())
}

/// Price every level of the ladder for a round opened at `start_price`.
pub fn compute_grid(start_price: Decimal, config: &BotConfig) -> Result<OrderGrid> {
    if start_price <= Decimal::ZERO {
        return Err(LadderError::Validation(format!(
            "start price must be positive, got {start_price}"
        )));
    }
    validate(config)?;

    let base = GridLevel {
        role: OrderRole::Base,
        price: start_price,
        quote_size: config.base_order_size,
        cumulative_deviation: Decimal::ZERO,
    };

    let mut safety = Vec::with_capacity(config.max_safety_orders as usize);
    let mut cumulative = Decimal::ZERO;
    let mut step = config.price_deviation;
    let mut quote_size = config.safety_order_size;
    for i in 1..=config.max_safety_orders {
        if i > 1 {
            step *= config.price_deviation_multiplier;
        }
        cumulative += step;
        safety.push(GridLevel {
            role: OrderRole::Safety(i),
            price: start_price * (Decimal::ONE - cumulative / Decimal::ONE_HUNDRED),
            quote_size,
            cumulative_deviation: cumulative,
        });
        quote_size *= config.safety_order_size_multiplier;
    }

    Ok(OrderGrid {
        start_price,
        base,
        safety,
        final_deviation: cumulative,
    })
}

/// Take-profit target for the current cost basis. Repriced after every buy
/// fill; sell fills never move it.
pub fn take_profit_price(average_entry: Decimal, config: &BotConfig) -> Decimal {
    average_entry * (Decimal::ONE + config.take_profit / Decimal::ONE_HUNDRED)
}

/// Fixed stop level for a round opened at `start_price`; `None` when the
/// stop loss is disabled.
pub fn stop_loss_price(start_price: Decimal, config: &BotConfig) -> Option<Decimal> {
    if config.stop_loss > Decimal::ZERO {
        Some(start_price * (Decimal::ONE - config.stop_loss / Decimal::ONE_HUNDRED))
    } else {
        None
    }
}

/// One row of the pre-trade plan shown at confirmation time.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRow {
    pub label: String,
    pub price: Decimal,
    /// Average entry after this buy, for buy rows
    pub average_entry: Option<Decimal>,
    /// Deviation from the start price, percent
    pub deviation: Option<Decimal>,
    /// Quote size for buy rows; net base amount for exit rows
    pub size: Decimal,
    /// Realized profit or loss if the round ends at this row's price
    pub pnl: Decimal,
}

/// Chronological trade plan: each exit target listed above the buy that
/// produces it, with the stop-loss row last. Fees are netted on both legs.
pub fn plan_rows(
    start_price: Decimal,
    config: &BotConfig,
    fee_rate: Decimal,
) -> Result<Vec<PlanRow>> {
    let grid = compute_grid(start_price, config)?;
    let fee_keep = Decimal::ONE - fee_rate;
    let mut rows = Vec::new();
    let mut cost = Decimal::ZERO;
    let mut amount_net = Decimal::ZERO;

    for level in grid.levels() {
        cost += level.quote_size;
        amount_net += level.base_amount() * fee_keep;
        if amount_net <= Decimal::ZERO {
            continue;
        }
        let average = cost / amount_net;
        let tp = take_profit_price(average, config);
        rows.push(PlanRow {
            label: format!("TP after {}", level.role.label()),
            price: tp,
            average_entry: None,
            deviation: None,
            size: amount_net,
            pnl: tp * amount_net * fee_keep - cost,
        });
        rows.push(PlanRow {
            label: level.role.label(),
            price: level.price,
            average_entry: Some(average),
            deviation: Some(level.cumulative_deviation),
            size: level.quote_size,
            pnl: if level.role == OrderRole::Base {
                Decimal::ZERO
            } else {
                level.price * amount_net * fee_keep - cost
            },
        });
    }

    if let Some(sl_price) = stop_loss_price(start_price, config) {
        rows.push(PlanRow {
            label: OrderRole::StopLoss.label(),
            price: sl_price,
            average_entry: None,
            deviation: Some(config.stop_loss),
            size: amount_net,
            pnl: sl_price * amount_net * fee_keep - cost,
        });
    }

    Ok(rows)
}
