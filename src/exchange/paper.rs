//! Simulated venue used by `--paper` mode and the integration tests.
//!
//! Prices follow a seeded random walk; resting limit orders fill the moment
//! the walk crosses their limit price. Fills are queued and handed out through
//! [`ExchangeClient::watch_orders`] exactly like a live order stream, so the
//! engine runs unmodified on top of it.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{Mutex, Notify};

use crate::config::MarginMode;
use crate::domain::{
    Balance, ExchangeOrder, MarketMeta, OrderSide, OrderStatus, OrderType, Ticker,
};
use crate::exchange::{ExchangeClient, ExchangeResult};
use crate::error::ExchangeError;

#[derive(Debug, Clone)]
pub struct PaperConfig {
    pub initial_price: Decimal,
    /// Max per-tick move, in basis points of the current price.
    pub volatility_bps: i64,
    pub tick_interval: Duration,
    pub seed: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_price: dec!(100),
            volatility_bps: 20,
            tick_interval: Duration::from_millis(250),
            seed: 42,
        }
    }
}

/// Market metadata for a simulated market. Steps and fees mirror what a large
/// spot venue would report for a liquid pair.
pub fn paper_meta(symbol: &str) -> MarketMeta {
    let spot = symbol.split(':').next().unwrap_or(symbol);
    let (base, quote) = spot.split_once('/').unwrap_or((spot, "USDT"));
    MarketMeta {
        symbol: symbol.to_string(),
        market_id: spot.replace('/', ""),
        base: base.to_string(),
        quote: quote.to_string(),
        price_step: dec!(0.01),
        amount_step: dec!(0.000001),
        min_amount: dec!(0.0001),
        contract_size: Decimal::ONE,
        taker_fee: dec!(0.001),
        maker_fee: dec!(0.001),
    }
}

struct PaperState {
    rng: StdRng,
    volatility_bps: i64,
    last_price: Decimal,
    seq: u64,
    open_orders: Vec<ExchangeOrder>,
    history: Vec<ExchangeOrder>,
    pending_fills: VecDeque<ExchangeOrder>,
    base_balance: Decimal,
}

pub struct PaperExchange {
    meta: MarketMeta,
    state: Mutex<PaperState>,
    fills_ready: Notify,
    tick_interval: Duration,
}

impl PaperExchange {
    pub fn new(meta: MarketMeta, config: PaperConfig) -> Self {
        Self {
            meta,
            state: Mutex::new(PaperState {
                rng: StdRng::seed_from_u64(config.seed),
                volatility_bps: config.volatility_bps,
                last_price: config.initial_price,
                seq: 0,
                open_orders: Vec::new(),
                history: Vec::new(),
                pending_fills: VecDeque::new(),
                base_balance: Decimal::ZERO,
            }),
            fills_ready: Notify::new(),
            tick_interval: config.tick_interval,
        }
    }

    /// Pin the simulated price and run the matcher at that level.
    pub async fn set_price(&self, price: Decimal) {
        let mut state = self.state.lock().await;
        state.last_price = price;
        self.match_open_orders(&mut state);
    }

    pub async fn last_price(&self) -> Decimal {
        self.state.lock().await.last_price
    }

    pub async fn open_order_count(&self) -> usize {
        self.state.lock().await.open_orders.len()
    }

    pub async fn seed_balance(&self, amount: Decimal) {
        self.state.lock().await.base_balance = amount;
    }

    pub async fn seed_history(&self, orders: Vec<ExchangeOrder>) {
        self.state.lock().await.history.extend(orders);
    }

    pub async fn seed_open_orders(&self, orders: Vec<ExchangeOrder>) {
        self.state.lock().await.open_orders.extend(orders);
    }

    fn fill_order(&self, state: &mut PaperState, order: &mut ExchangeOrder, fill_price: Decimal) {
        order.status = OrderStatus::Closed;
        order.filled = order.amount;
        order.average = Some(fill_price);
        order.cost = fill_price * order.amount;
        match order.side {
            // Spot buys pay the fee in base currency; sells pay it from
            // the quote proceeds, so the base leg moves in full.
            OrderSide::Buy => {
                state.base_balance += order.amount * (Decimal::ONE - self.meta.taker_fee);
            }
            OrderSide::Sell => state.base_balance -= order.amount,
        }
        upsert_history(state, order.clone());
        state.pending_fills.push_back(order.clone());
        self.fills_ready.notify_one();
    }

    fn match_open_orders(&self, state: &mut PaperState) {
        let last = state.last_price;
        let mut resting = Vec::new();
        for mut order in std::mem::take(&mut state.open_orders) {
            match order.price {
                Some(limit)
                    if (order.side == OrderSide::Buy && last <= limit)
                        || (order.side == OrderSide::Sell && last >= limit) =>
                {
                    self.fill_order(state, &mut order, limit);
                }
                _ => resting.push(order),
            }
        }
        state.open_orders = resting;
    }

    fn next_order(
        &self,
        state: &mut PaperState,
        side: OrderSide,
        order_type: OrderType,
        price: Option<Decimal>,
        amount: Decimal,
        client_order_id: &str,
    ) -> ExchangeOrder {
        state.seq += 1;
        ExchangeOrder {
            id: format!("paper-{}", state.seq),
            client_order_id: client_order_id.to_string(),
            side,
            order_type,
            status: OrderStatus::Open,
            price,
            amount,
            filled: Decimal::ZERO,
            average: None,
            cost: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }
}

fn upsert_history(state: &mut PaperState, order: ExchangeOrder) {
    if let Some(existing) = state.history.iter_mut().find(|o| o.id == order.id) {
        *existing = order;
    } else {
        state.history.push(order);
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    fn market_meta(&self) -> &MarketMeta {
        &self.meta
    }

    async fn fetch_ticker(&self) -> ExchangeResult<Ticker> {
        let state = self.state.lock().await;
        Ok(Ticker {
            last: state.last_price,
            timestamp: Utc::now(),
        })
    }

    async fn watch_ticker(&self) -> ExchangeResult<Ticker> {
        tokio::time::sleep(self.tick_interval).await;
        let mut state = self.state.lock().await;
        if state.volatility_bps > 0 {
            let span = state.volatility_bps;
            let bps = state.rng.gen_range(-span..=span);
            let factor = Decimal::ONE + Decimal::new(bps, 4);
            let next = self
                .meta
                .round_price(state.last_price * factor)
                .max(self.meta.price_step);
            state.last_price = next;
        }
        self.match_open_orders(&mut state);
        Ok(Ticker {
            last: state.last_price,
            timestamp: Utc::now(),
        })
    }

    async fn watch_orders(&self) -> ExchangeResult<Vec<ExchangeOrder>> {
        loop {
            {
                let mut state = self.state.lock().await;
                if !state.pending_fills.is_empty() {
                    return Ok(state.pending_fills.drain(..).collect());
                }
            }
            self.fills_ready.notified().await;
        }
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<ExchangeOrder>> {
        Ok(self.state.lock().await.open_orders.clone())
    }

    async fn fetch_order_history(&self, limit: u32) -> ExchangeResult<Vec<ExchangeOrder>> {
        let state = self.state.lock().await;
        let skip = state.history.len().saturating_sub(limit as usize);
        Ok(state.history[skip..].to_vec())
    }

    async fn create_limit_order(
        &self,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        client_order_id: &str,
    ) -> ExchangeResult<ExchangeOrder> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::Rejected(format!(
                "limit order amount must be positive, got {amount}"
            )));
        }
        let mut state = self.state.lock().await;
        let mut order = self.next_order(
            &mut state,
            side,
            OrderType::Limit,
            Some(price),
            amount,
            client_order_id,
        );
        let last = state.last_price;
        let crossed = match side {
            OrderSide::Buy => last <= price,
            OrderSide::Sell => last >= price,
        };
        if crossed {
            // Immediate fill: the created order comes back Closed AND the
            // fill is still delivered on the order stream, as live venues do.
            self.fill_order(&mut state, &mut order, price);
        } else {
            state.open_orders.push(order.clone());
            upsert_history(&mut state, order.clone());
        }
        Ok(order)
    }

    async fn create_market_sell(&self, amount: Decimal) -> ExchangeResult<ExchangeOrder> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::Rejected(format!(
                "market sell amount must be positive, got {amount}"
            )));
        }
        let mut state = self.state.lock().await;
        let mut order = self.next_order(
            &mut state,
            OrderSide::Sell,
            OrderType::Market,
            None,
            amount,
            "",
        );
        let last = state.last_price;
        self.fill_order(&mut state, &mut order, last);
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.open_orders.iter().position(|o| o.id == order_id) else {
            return Err(ExchangeError::OrderNotFound {
                order_id: order_id.to_string(),
            });
        };
        let mut order = state.open_orders.remove(pos);
        order.status = OrderStatus::Canceled;
        upsert_history(&mut state, order);
        Ok(())
    }

    async fn fetch_position_amount(&self) -> ExchangeResult<Decimal> {
        Ok(self.state.lock().await.base_balance)
    }

    async fn fetch_base_balance(&self) -> ExchangeResult<Balance> {
        let state = self.state.lock().await;
        Ok(Balance {
            free: state.base_balance,
            total: state.base_balance,
        })
    }

    async fn set_leverage(&self, _leverage: u32, _margin_mode: MarginMode) -> ExchangeResult<()> {
        Ok(())
    }
}
