//! Startup recovery.
//!
//! Runs once before the live loops start. Rebuilds an in-progress round from
//! the venue's order history, cross-checks the rebuilt ledger against the
//! actual position, and refuses to trade when the two cannot be reconciled.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::{BotConfig, TradeType};
use crate::domain::{client_id, ExchangeOrder, OrderRole, OrderSide, Round};
use crate::error::{LadderError, Result};
use crate::exchange::{cancel_bot_orders, ExchangeClient};
use crate::strategy::grid;

/// How deep into the order history a prior round is searched for.
pub const RECOVERY_HISTORY_LIMIT: u32 = 100;

/// Rebuild an in-progress round from the venue, if there is one.
///
/// `Ok(None)` means a clean start. A fatal ledger-vs-venue divergence
/// propagates untouched; every other failure degrades to a clean start
/// after cancelling this bot's leftover orders.
pub async fn recover_state(
    client: &dyn ExchangeClient,
    config: &BotConfig,
    fee_rate: Decimal,
) -> Result<Option<Round>> {
    info!("Attempting to recover state from the exchange");
    match try_recover(client, config, fee_rate).await {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_state_inconsistency() => Err(e),
        Err(e) => {
            warn!("State recovery failed: {}; starting clean", e);
            let canceled = cancel_bot_orders(client).await;
            if canceled > 0 {
                info!("Cancelled {} leftover orders before the clean start", canceled);
            }
            Ok(None)
        }
    }
}

async fn try_recover(
    client: &dyn ExchangeClient,
    config: &BotConfig,
    fee_rate: Decimal,
) -> Result<Option<Round>> {
    let history = client.fetch_order_history(RECOVERY_HISTORY_LIMIT).await?;
    let ours: Vec<&ExchangeOrder> = history
        .iter()
        .filter(|o| client_id::has_prefix(&o.client_order_id))
        .collect();
    if ours.is_empty() {
        info!("No previous orders found, starting fresh");
        return Ok(None);
    }

    let Some(latest) = ours.iter().max_by_key(|o| o.timestamp) else {
        return Ok(None);
    };
    let Some(decoded) = client_id::decode(&latest.client_order_id) else {
        return Err(LadderError::Recovery(format!(
            "cannot determine the round start price from client order id '{}'",
            latest.client_order_id
        )));
    };
    let start_price = decoded.start_price;
    let group = client_id::group_key(start_price);
    let round_orders: Vec<&ExchangeOrder> = ours
        .iter()
        .copied()
        .filter(|o| client_id::belongs_to_group(&o.client_order_id, &group))
        .collect();

    if round_orders
        .iter()
        .any(|o| o.side == OrderSide::Sell && o.is_filled())
    {
        info!("Last round was completed by a sell fill, starting fresh");
        return Ok(None);
    }

    let filled_buys: Vec<&ExchangeOrder> = round_orders
        .iter()
        .copied()
        .filter(|o| o.side == OrderSide::Buy && o.is_filled())
        .collect();
    if filled_buys.is_empty() {
        info!("Previous round left only unfilled orders; cancelling them");
        let canceled = cancel_bot_orders(client).await;
        debug!("Cancelled {} stale orders", canceled);
        return Ok(None);
    }

    let fee_keep = Decimal::ONE - fee_rate;
    let calculated: Decimal = filled_buys.iter().map(|o| o.filled * fee_keep).sum();
    let actual = fetch_actual_position(client, config).await;
    let dust = client.market_meta().dust_threshold();

    if calculated > dust && actual < dust {
        warn!(
            "History implies a position of {} base but the venue holds none; \
             the round was likely closed manually. Cleaning up.",
            calculated
        );
        let canceled = cancel_bot_orders(client).await;
        debug!("Cancelled {} orphaned orders", canceled);
        return Ok(None);
    }

    if calculated > dust {
        let lower = calculated * dec!(0.9);
        let upper = calculated * dec!(1.1);
        if actual < lower || actual > upper {
            return Err(LadderError::StateInconsistency { calculated, actual });
        }
    }

    let mut round = Round::new(start_price);
    round.fixed_stop_loss_price = grid::stop_loss_price(start_price, config);
    for order in &filled_buys {
        if round.apply_fill(order, fee_rate)
            && matches!(order.role(), Some(role) if role.is_safety())
        {
            round.filled_safety_orders += 1;
        }
    }
    for order in round_orders.iter().filter(|o| o.status.is_open()) {
        match order.role() {
            Some(OrderRole::Base) | Some(OrderRole::Safety(_)) => {
                round.buy_orders.push((*order).clone());
            }
            Some(OrderRole::TakeProfit) => round.take_profit_order = Some((*order).clone()),
            _ => debug!("Ignoring open order {} with unrecognized role", order.id),
        }
    }

    info!(
        "Recovered round at start price {}: {} base at average {}, {} safety fills, \
         {} open buys",
        start_price,
        round.position_amount,
        round.average_entry_price,
        round.filled_safety_orders,
        round.buy_orders.len()
    );
    Ok(Some(round))
}

/// Venue-reported position, used only to cross-check the rebuilt ledger.
/// Unavailable data counts as zero so the ghost-position path can judge it.
async fn fetch_actual_position(client: &dyn ExchangeClient, config: &BotConfig) -> Decimal {
    let fetched = match config.trade_type {
        TradeType::Futures => client.fetch_position_amount().await,
        TradeType::Spot => client.fetch_base_balance().await.map(|b| b.free),
    };
    match fetched {
        Ok(amount) => amount.max(Decimal::ZERO),
        Err(e) => {
            warn!("Could not fetch the position for validation: {}", e);
            Decimal::ZERO
        }
    }
}
