//! The round engine.
//!
//! A single task owns the [`Round`] and consumes both event streams, so every
//! state transition runs to completion before the next event is looked at.
//! Fills queued ahead of a price tick are always applied before that tick's
//! stop-loss evaluation; otherwise a take-profit that has already filled
//! could be mistaken for a live order while the stop fires underneath it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::BotConfig;
use crate::coordination::ShutdownController;
use crate::domain::{
    client_id, DashboardSnapshot, EngineStatus, ExchangeOrder, LogLine, OpenOrderRow, OrderRole,
    OrderSide, Round, Ticker,
};
use crate::error::Result;
use crate::exchange::{cancel_bot_orders, ExchangeClient};
use crate::strategy::grid;

/// Rolling log lines kept for the dashboard.
const LOG_RING_CAPACITY: usize = 15;

/// Receiving ends of the two feed channels.
pub struct EngineChannels {
    pub ticks: mpsc::Receiver<Ticker>,
    pub fills: mpsc::Receiver<Vec<ExchangeOrder>>,
}

pub struct Engine {
    config: BotConfig,
    client: Arc<dyn ExchangeClient>,
    shutdown: Arc<ShutdownController>,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    status: EngineStatus,
    round: Option<Round>,
    last_price: Option<Decimal>,
    fee_rate: Decimal,
    /// Set when a round ends with a cooldown; `None` also re-arms the
    /// trigger price for the next round.
    last_round_end: Option<Instant>,
    /// Sticky: a failed base-order placement blocks new rounds until restart.
    round_failed: bool,
    log_ring: VecDeque<LogLine>,
}

impl Engine {
    pub fn new(
        config: BotConfig,
        client: Arc<dyn ExchangeClient>,
        shutdown: Arc<ShutdownController>,
        snapshot_tx: watch::Sender<DashboardSnapshot>,
        fee_rate: Decimal,
    ) -> Self {
        Self {
            config,
            client,
            shutdown,
            snapshot_tx,
            status: EngineStatus::Initializing,
            round: None,
            last_price: None,
            fee_rate,
            last_round_end: None,
            round_failed: false,
            log_ring: VecDeque::with_capacity(LOG_RING_CAPACITY),
        }
    }

    /// Install a recovered round and make sure its exit order exists.
    pub async fn adopt_round(&mut self, round: Round) {
        self.note(format!(
            "Resuming recovered round started at {}",
            round.start_price
        ));
        let needs_take_profit = round.has_position() && round.take_profit_order.is_none();
        let has_position = round.has_position();
        self.round = Some(round);
        self.set_status(if has_position {
            EngineStatus::PositionOpen
        } else {
            EngineStatus::AwaitingFills
        });
        if needs_take_profit {
            self.update_take_profit().await;
        }
        self.publish_snapshot();
    }

    /// Consume both streams until shutdown or channel close.
    ///
    /// The select is biased: a shutdown request wins over pending events, and
    /// queued fills win over queued ticks. Before any tick is processed, the
    /// fill channel is drained so the stop-loss check never runs against a
    /// round whose exit has already filled.
    pub async fn run(mut self, mut channels: EngineChannels) -> Result<()> {
        if self.status == EngineStatus::Initializing {
            self.set_status(EngineStatus::Watching);
        }
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Engine stopping");
                    break;
                }
                batch = channels.fills.recv() => match batch {
                    Some(batch) => self.on_fills(batch).await,
                    None => break,
                },
                tick = channels.ticks.recv() => match tick {
                    Some(tick) => {
                        while let Ok(batch) = channels.fills.try_recv() {
                            self.on_fills(batch).await;
                        }
                        self.on_tick(tick).await;
                    }
                    None => break,
                },
            }
        }
        Ok(())
    }

    async fn on_fills(&mut self, batch: Vec<ExchangeOrder>) {
        for order in batch {
            self.handle_order_update(order).await;
        }
        self.publish_snapshot();
    }

    async fn on_tick(&mut self, tick: Ticker) {
        self.last_price = Some(tick.last);

        if let Some(stop) = self.round.as_ref().and_then(|r| r.fixed_stop_loss_price) {
            if tick.last <= stop {
                self.note(format!(
                    "Stop loss price {} hit at {}, selling the position at market",
                    stop, tick.last
                ));
                self.execute_stop_loss().await;
                return;
            }
        }

        if self.round.is_none() {
            self.maybe_start_round(tick.last).await;
        }
        self.publish_snapshot();
    }

    async fn maybe_start_round(&mut self, last: Decimal) {
        if self.shutdown.is_requested() {
            return;
        }
        if self.round_failed {
            self.set_status(EngineStatus::RoundFailed);
            return;
        }
        if let Some(remaining) = self.cooldown_remaining() {
            self.set_status(EngineStatus::Cooldown);
            debug!("In cooldown, {}s left", remaining.as_secs());
            return;
        }
        if self.config.lower_price_range.is_some_and(|lower| last < lower)
            || self.config.upper_price_range.is_some_and(|upper| last > upper)
        {
            self.set_status(EngineStatus::Watching);
            return;
        }

        self.note("Entry conditions met, starting a new trading round".to_string());
        // The trigger anchors the first ladder: its base order rests at the
        // trigger price until the market reaches it. Once any round has
        // ended with a cooldown, later rounds anchor at the live price.
        let start_price = match self.config.trigger_price {
            Some(trigger) if self.last_round_end.is_none() => trigger,
            _ => last,
        };
        self.start_round(start_price).await;
    }

    async fn start_round(&mut self, start_price: Decimal) {
        let grid = match grid::compute_grid(start_price, &self.config) {
            Ok(grid) => grid,
            Err(e) => {
                self.note(format!("Cannot start a round at {}: {}", start_price, e));
                self.round_failed = true;
                self.set_status(EngineStatus::RoundFailed);
                return;
            }
        };
        self.set_status(EngineStatus::PlacingOrders);

        let mut round = Round::new(start_price);
        round.fixed_stop_loss_price = grid::stop_loss_price(start_price, &self.config);
        if let Some(stop) = round.fixed_stop_loss_price {
            self.note(format!("Stop loss for this round is fixed at {}", stop));
        }
        self.round = Some(round);

        let meta = self.client.market_meta().clone();
        let placements = grid.levels().map(|level| {
            let price = meta.round_price(level.price);
            let amount = meta.round_amount(level.base_amount());
            let cid = client_id::encode(level.role, start_price, &meta.market_id);
            let client = Arc::clone(&self.client);
            let role = level.role;
            async move {
                let placed = client
                    .create_limit_order(OrderSide::Buy, amount, price, &cid)
                    .await;
                (role, placed)
            }
        });
        let results = futures::future::join_all(placements).await;

        let mut filled_at_placement = Vec::new();
        for (role, placed) in results {
            match placed {
                Ok(order) => {
                    self.note(format!("Placed {} order {}", role.label(), order.id));
                    if order.is_filled() {
                        filled_at_placement.push(order);
                    } else if let Some(round) = self.round.as_mut() {
                        round.buy_orders.push(order);
                    }
                }
                Err(e) if role == OrderRole::Base => {
                    self.note(format!(
                        "Failed to place the critical BASE order: {}. Aborting round.",
                        e
                    ));
                    self.round_failed = true;
                    self.end_round(false).await;
                    return;
                }
                Err(e) => {
                    self.note(format!("Failed to place {} order: {}", role.label(), e));
                }
            }
        }

        self.set_status(EngineStatus::AwaitingFills);
        for order in filled_at_placement {
            self.handle_order_update(order).await;
        }
        self.publish_snapshot();
    }

    async fn handle_order_update(&mut self, order: ExchangeOrder) {
        if !order.is_filled() || !client_id::has_prefix(&order.client_order_id) {
            return;
        }
        let Some(start_price) = self.round.as_ref().map(|r| r.start_price) else {
            debug!("Ignoring fill for order {} outside a round", order.id);
            return;
        };
        // A fill from a just-ended round can race its cancel and arrive
        // after the next round opened; its id encodes the old anchor.
        let group = client_id::group_key(start_price);
        if !client_id::belongs_to_group(&order.client_order_id, &group) {
            debug!("Ignoring fill for order {} from an earlier round", order.id);
            return;
        }

        let is_take_profit = self
            .round
            .as_ref()
            .and_then(|r| r.take_profit_order.as_ref())
            .is_some_and(|tp| tp.id == order.id);
        if is_take_profit {
            if let Some(round) = self.round.as_mut() {
                round.processed_order_ids.insert(order.id.clone());
            }
            self.note(format!(
                "Trade round concluded by take profit order {}",
                order.id
            ));
            self.end_round(true).await;
            return;
        }

        if order.side != OrderSide::Buy {
            return;
        }

        let applied = match self.round.as_mut() {
            Some(round) => {
                round.remove_buy_order(&order.id);
                let applied = round.apply_fill(&order, self.fee_rate);
                if applied && matches!(order.role(), Some(role) if role.is_safety()) {
                    round.filled_safety_orders += 1;
                }
                applied
            }
            None => false,
        };
        if !applied {
            debug!("Ignoring duplicate or empty fill event for order {}", order.id);
            return;
        }

        let role_label = order
            .role()
            .map(|role| role.label())
            .unwrap_or_else(|| "Buy".to_string());
        self.note(format!(
            "{} order {} filled: {} @ {}",
            role_label,
            order.id,
            order.filled,
            order.fill_price().unwrap_or_default()
        ));
        self.set_status(EngineStatus::PositionOpen);
        self.update_take_profit().await;
    }

    /// Cancel-before-replace: the previous take-profit is removed before the
    /// repriced one goes out, so at most one exit order ever rests.
    async fn update_take_profit(&mut self) {
        let previous = self.round.as_mut().and_then(|r| r.take_profit_order.take());
        if let Some(tp) = previous {
            match self.client.cancel_order(&tp.id).await {
                Ok(()) => self.note(format!("Canceled previous TP order {}", tp.id)),
                Err(e) if e.is_order_not_found() => {
                    debug!("Previous TP order {} already gone", tp.id);
                }
                Err(e) => {
                    // Keep the reference so the next fill retries the cancel;
                    // a second live TP could sell more than the round holds.
                    self.note(format!("Error canceling TP order {}: {}", tp.id, e));
                    if let Some(round) = self.round.as_mut() {
                        round.take_profit_order = Some(tp);
                    }
                    return;
                }
            }
        }

        let Some((position, average, start_price)) = self
            .round
            .as_ref()
            .map(|r| (r.position_amount, r.average_entry_price, r.start_price))
        else {
            return;
        };
        if position <= Decimal::ZERO {
            return;
        }

        let meta = self.client.market_meta().clone();
        let amount = meta.round_amount(position);
        if amount <= meta.min_amount {
            self.note(format!(
                "Position {} is below the minimum order size, waiting for more fills",
                position
            ));
            return;
        }
        let price = meta.round_price(grid::take_profit_price(average, &self.config));
        let cid = client_id::encode(OrderRole::TakeProfit, start_price, &meta.market_id);

        self.note(format!("Placing new TP order for {} at {}", amount, price));
        match self
            .client
            .create_limit_order(OrderSide::Sell, amount, price, &cid)
            .await
        {
            Ok(order) => {
                if let Some(round) = self.round.as_mut() {
                    round.take_profit_order = Some(order);
                }
            }
            Err(e) => self.note(format!("Failed to create TP order: {}", e)),
        }
    }

    /// Virtual stop: no order rests at the stop level. Cancel the exit,
    /// then market-sell exactly the tracked position, never the wallet.
    async fn execute_stop_loss(&mut self) {
        self.set_status(EngineStatus::ExecutingStopLoss);

        let previous = self.round.as_mut().and_then(|r| r.take_profit_order.take());
        if let Some(tp) = previous {
            match self.client.cancel_order(&tp.id).await {
                Ok(()) => self.note(format!("Canceled TP order {}", tp.id)),
                Err(e) if e.is_order_not_found() => {
                    debug!("TP order {} already gone", tp.id);
                }
                Err(e) => self.note(format!("Error canceling TP order {}: {}", tp.id, e)),
            }
        }

        let position = self
            .round
            .as_ref()
            .map(|r| r.position_amount)
            .unwrap_or_default();
        let meta = self.client.market_meta().clone();
        let amount = meta.round_amount(position);
        if amount > meta.min_amount {
            self.note(format!(
                "Market selling this round's position: {} {}",
                amount, meta.base
            ));
            if let Err(e) = self.client.create_market_sell(amount).await {
                self.note(format!("Failed to market sell for the stop loss: {}", e));
            }
        } else {
            self.note(format!(
                "Stop loss triggered but the tracked position {} is too small to sell",
                position
            ));
        }

        self.end_round(true).await;
    }

    async fn end_round(&mut self, start_cooldown: bool) {
        self.note("Ending trading round".to_string());
        self.set_status(EngineStatus::EndingRound);

        let canceled = cancel_bot_orders(self.client.as_ref()).await;
        if canceled > 0 {
            self.note(format!("Canceled {} open order(s)", canceled));
        }

        self.round = None;
        if start_cooldown {
            self.last_round_end = Some(Instant::now());
            self.note(format!(
                "Cooldown started, waiting {}s",
                self.config.cooldown_between_rounds
            ));
            self.set_status(EngineStatus::Cooldown);
        } else {
            self.last_round_end = None;
            self.set_status(if self.round_failed {
                EngineStatus::RoundFailed
            } else {
                EngineStatus::Watching
            });
        }
        self.publish_snapshot();
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        let end = self.last_round_end?;
        let cooldown = Duration::from_secs(self.config.cooldown_between_rounds);
        let elapsed = end.elapsed();
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    fn note(&mut self, message: String) {
        info!("{}", message);
        self.log_ring.push_back(LogLine {
            at: Utc::now(),
            message,
        });
        while self.log_ring.len() > LOG_RING_CAPACITY {
            self.log_ring.pop_front();
        }
    }

    fn set_status(&mut self, status: EngineStatus) {
        if self.status != status {
            debug!("Status: {} -> {}", self.status, status);
            self.status = status;
            self.publish_snapshot();
        }
    }

    fn publish_snapshot(&self) {
        let meta = self.client.market_meta();
        let mut snapshot = DashboardSnapshot::initial(
            &self.config.symbol,
            &self.config.exchange_id,
            self.config.paper,
            self.config.max_safety_orders,
        );
        snapshot.status = self.status;
        snapshot.last_price = self.last_price;
        snapshot.cooldown_remaining_secs = self.cooldown_remaining().map(|d| d.as_secs());
        snapshot.log_lines = self.log_ring.clone();
        snapshot.updated_at = Utc::now();

        if let Some(round) = &self.round {
            snapshot.start_price = Some(round.start_price);
            snapshot.position_amount = round.position_amount;
            snapshot.position_cost = round.position_cost;
            snapshot.filled_safety_orders = round.filled_safety_orders;
            snapshot.stop_loss_price = round.fixed_stop_loss_price;
            if round.has_position() {
                snapshot.average_entry_price = Some(round.average_entry_price);
                snapshot.take_profit_price = round
                    .take_profit_order
                    .as_ref()
                    .and_then(|o| o.price)
                    .or_else(|| {
                        Some(grid::take_profit_price(
                            round.average_entry_price,
                            &self.config,
                        ))
                    });
                if let Some(last) = self.last_price {
                    snapshot.unrealized_pnl = Some(round.unrealized_pnl(
                        last,
                        meta.contract_size,
                        self.fee_rate,
                    ));
                }
            }
            for order in &round.buy_orders {
                snapshot.open_orders.push(OpenOrderRow {
                    role: order
                        .role()
                        .map(|r| r.label())
                        .unwrap_or_else(|| "BUY".to_string()),
                    side: order.side,
                    price: order.price,
                    amount: order.amount,
                });
            }
            if let Some(tp) = &round.take_profit_order {
                snapshot.open_orders.push(OpenOrderRow {
                    role: OrderRole::TakeProfit.label(),
                    side: tp.side,
                    price: tp.price,
                    amount: tp.amount,
                });
            }
        }

        self.snapshot_tx.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::ShutdownMode;
    use crate::domain::{OrderStatus, OrderType};
    use crate::exchange::{paper_meta, MockExchangeClient};
    use rust_decimal_macros::dec;

    fn test_config() -> BotConfig {
        BotConfig {
            symbol: "BTC/USDT".to_string(),
            price_deviation: dec!(1),
            take_profit: dec!(3),
            stop_loss: dec!(10),
            max_safety_orders: 1,
            cooldown_between_rounds: 60,
            ..BotConfig::default()
        }
    }

    fn mock_with_meta() -> MockExchangeClient {
        let mut client = MockExchangeClient::new();
        client
            .expect_market_meta()
            .return_const(paper_meta("BTC/USDT"));
        client
    }

    fn order(
        id: &str,
        cid: &str,
        side: OrderSide,
        status: OrderStatus,
        filled: Decimal,
        price: Decimal,
    ) -> ExchangeOrder {
        ExchangeOrder {
            id: id.to_string(),
            client_order_id: cid.to_string(),
            side,
            order_type: OrderType::Limit,
            status,
            price: Some(price),
            amount: filled.max(dec!(0.0999)),
            filled,
            average: (filled > Decimal::ZERO).then_some(price),
            cost: filled * price,
            timestamp: Utc::now(),
        }
    }

    fn engine_with_config(
        config: BotConfig,
        client: MockExchangeClient,
    ) -> (Engine, watch::Receiver<DashboardSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(DashboardSnapshot::initial(
            &config.symbol,
            &config.exchange_id,
            true,
            config.max_safety_orders,
        ));
        let engine = Engine::new(
            config,
            Arc::new(client),
            Arc::new(ShutdownController::new()),
            snapshot_tx,
            dec!(0.001),
        );
        (engine, snapshot_rx)
    }

    fn engine_with(client: MockExchangeClient) -> (Engine, watch::Receiver<DashboardSnapshot>) {
        engine_with_config(test_config(), client)
    }

    /// Placement result for an order that rests on the book unfilled.
    fn resting(
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        cid: &str,
    ) -> crate::exchange::ExchangeResult<ExchangeOrder> {
        Ok(ExchangeOrder {
            id: format!("r-{price}"),
            client_order_id: cid.to_string(),
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::Open,
            price: Some(price),
            amount,
            filled: Decimal::ZERO,
            average: None,
            cost: Decimal::ZERO,
            timestamp: Utc::now(),
        })
    }

    fn open_round() -> Round {
        let mut round = Round::new(dec!(100));
        round.fixed_stop_loss_price = Some(dec!(90));
        let base_fill = order(
            "b1",
            "ladr1-btcusdt-p10000-bo-aaaaaa",
            OrderSide::Buy,
            OrderStatus::Closed,
            dec!(0.1),
            dec!(100),
        );
        assert!(round.apply_fill(&base_fill, dec!(0.001)));
        round.take_profit_order = Some(order(
            "tp1",
            "ladr1-btcusdt-p10000-tp-bbbbbb",
            OrderSide::Sell,
            OrderStatus::Open,
            Decimal::ZERO,
            dec!(103.11),
        ));
        round
    }

    #[tokio::test]
    async fn take_profit_fill_wins_over_stop_breach_in_the_same_cycle() {
        let mut client = mock_with_meta();
        // end_round's cancel sweep after the TP fill
        client
            .expect_fetch_open_orders()
            .returning(|| Ok(Vec::new()));
        // No create_market_sell expectation: if the stale stop fired after
        // the TP fill, the mock would panic.

        let (mut engine, snapshot_rx) = engine_with(client);
        engine.adopt_round(open_round()).await;

        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (fill_tx, fill_rx) = mpsc::channel(8);
        let tp_fill = order(
            "tp1",
            "ladr1-btcusdt-p10000-tp-bbbbbb",
            OrderSide::Sell,
            OrderStatus::Closed,
            dec!(0.0999),
            dec!(103.11),
        );
        fill_tx.send(vec![tp_fill]).await.expect("queue fill");
        tick_tx
            .send(Ticker {
                last: dec!(89),
                timestamp: Utc::now(),
            })
            .await
            .expect("queue tick");
        drop(tick_tx);

        engine
            .run(EngineChannels {
                ticks: tick_rx,
                fills: fill_rx,
            })
            .await
            .expect("engine run");
        drop(fill_tx);

        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.status, EngineStatus::Cooldown);
        assert_eq!(snapshot.position_amount, Decimal::ZERO);
        assert!(snapshot.open_orders.is_empty());
    }

    #[tokio::test]
    async fn stop_loss_sells_exactly_the_tracked_position() {
        let mut client = mock_with_meta();
        client
            .expect_cancel_order()
            .withf(|id| id == "tp1")
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_create_market_sell()
            // 0.1 filled nets 0.0999 after the 0.1% fee; the sell must be
            // exactly that, not the wallet balance.
            .withf(|amount| *amount == dec!(0.0999))
            .times(1)
            .returning(|amount| {
                Ok(ExchangeOrder {
                    id: "ms1".to_string(),
                    client_order_id: String::new(),
                    side: OrderSide::Sell,
                    order_type: OrderType::Market,
                    status: OrderStatus::Closed,
                    price: None,
                    amount,
                    filled: amount,
                    average: Some(dec!(89)),
                    cost: amount * dec!(89),
                    timestamp: Utc::now(),
                })
            });
        client
            .expect_fetch_open_orders()
            .returning(|| Ok(Vec::new()));

        let (mut engine, snapshot_rx) = engine_with(client);
        engine.adopt_round(open_round()).await;

        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (fill_tx, fill_rx) = mpsc::channel(8);
        tick_tx
            .send(Ticker {
                last: dec!(89),
                timestamp: Utc::now(),
            })
            .await
            .expect("queue tick");
        drop(tick_tx);

        engine
            .run(EngineChannels {
                ticks: tick_rx,
                fills: fill_rx,
            })
            .await
            .expect("engine run");
        drop(fill_tx);

        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.status, EngineStatus::Cooldown);
        assert_eq!(snapshot.position_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn failed_base_order_blocks_future_rounds() {
        let mut client = mock_with_meta();
        client
            .expect_create_limit_order()
            .withf(|_, _, _, cid| cid.contains("-bo-"))
            .times(1)
            .returning(|_, _, _, _| {
                Err(crate::error::ExchangeError::Rejected(
                    "insufficient funds".to_string(),
                ))
            });
        client
            .expect_create_limit_order()
            .withf(|_, _, _, cid| cid.contains("-so1-"))
            .times(1)
            .returning(|side, amount, price, cid| {
                Ok(ExchangeOrder {
                    id: "so1".to_string(),
                    client_order_id: cid.to_string(),
                    side,
                    order_type: OrderType::Limit,
                    status: OrderStatus::Open,
                    price: Some(price),
                    amount,
                    filled: Decimal::ZERO,
                    average: None,
                    cost: Decimal::ZERO,
                    timestamp: Utc::now(),
                })
            });
        client
            .expect_fetch_open_orders()
            .returning(|| Ok(Vec::new()));

        let (mut engine, snapshot_rx) = engine_with(client);

        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (fill_tx, fill_rx) = mpsc::channel(8);
        for _ in 0..2 {
            tick_tx
                .send(Ticker {
                    last: dec!(100),
                    timestamp: Utc::now(),
                })
                .await
                .expect("queue tick");
        }
        drop(tick_tx);

        engine
            .run(EngineChannels {
                ticks: tick_rx,
                fills: fill_rx,
            })
            .await
            .expect("engine run");
        drop(fill_tx);

        // The second tick must not have retried placement: the limit-order
        // expectations above are times(1) each, and the status stays failed.
        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.status, EngineStatus::RoundFailed);
    }

    #[tokio::test]
    async fn buy_fill_reprices_the_take_profit() {
        let mut client = mock_with_meta();
        client
            .expect_cancel_order()
            .withf(|id| id == "tp1")
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_create_limit_order()
            .withf(|side, _, _, cid| *side == OrderSide::Sell && cid.contains("-tp-"))
            .times(1)
            .returning(|side, amount, price, cid| {
                Ok(ExchangeOrder {
                    id: "tp2".to_string(),
                    client_order_id: cid.to_string(),
                    side,
                    order_type: OrderType::Limit,
                    status: OrderStatus::Open,
                    price: Some(price),
                    amount,
                    filled: Decimal::ZERO,
                    average: None,
                    cost: Decimal::ZERO,
                    timestamp: Utc::now(),
                })
            });

        let (mut engine, snapshot_rx) = engine_with(client);
        engine.adopt_round(open_round()).await;

        let safety_fill = order(
            "s1",
            "ladr1-btcusdt-p10000-so1-cccccc",
            OrderSide::Buy,
            OrderStatus::Closed,
            dec!(0.1),
            dec!(99),
        );
        engine.handle_order_update(safety_fill).await;
        engine.publish_snapshot();

        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.status, EngineStatus::PositionOpen);
        assert_eq!(snapshot.filled_safety_orders, 1);
        // 0.2 gross, 0.1998 net, 19.9 quote spent
        assert_eq!(snapshot.position_amount, dec!(0.1998));
        assert_eq!(snapshot.position_cost, dec!(19.9));
    }

    #[tokio::test]
    async fn duplicate_fill_events_do_not_double_count() {
        let mut client = mock_with_meta();
        client
            .expect_cancel_order()
            .withf(|id| id == "tp1")
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_create_limit_order()
            .times(1)
            .returning(|side, amount, price, cid| {
                Ok(ExchangeOrder {
                    id: "tp2".to_string(),
                    client_order_id: cid.to_string(),
                    side,
                    order_type: OrderType::Limit,
                    status: OrderStatus::Open,
                    price: Some(price),
                    amount,
                    filled: Decimal::ZERO,
                    average: None,
                    cost: Decimal::ZERO,
                    timestamp: Utc::now(),
                })
            });

        let (mut engine, _snapshot_rx) = engine_with(client);
        engine.adopt_round(open_round()).await;

        let fill = order(
            "s1",
            "ladr1-btcusdt-p10000-so1-cccccc",
            OrderSide::Buy,
            OrderStatus::Closed,
            dec!(0.1),
            dec!(99),
        );
        engine.handle_order_update(fill.clone()).await;
        let amount_after_first = engine.round.as_ref().map(|r| r.position_amount);
        engine.handle_order_update(fill).await;
        let amount_after_second = engine.round.as_ref().map(|r| r.position_amount);

        assert_eq!(amount_after_first, amount_after_second);
        assert_eq!(amount_after_first, Some(dec!(0.1998)));
    }

    #[tokio::test]
    async fn shutdown_request_stops_the_engine_before_new_rounds() {
        let client = mock_with_meta();
        let (engine, snapshot_rx) = engine_with(client);
        let controller = Arc::clone(&engine.shutdown);
        controller.request(ShutdownMode::Graceful);

        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (_fill_tx, fill_rx) = mpsc::channel(8);
        tick_tx
            .send(Ticker {
                last: dec!(100),
                timestamp: Utc::now(),
            })
            .await
            .expect("queue tick");
        drop(tick_tx);

        engine
            .run(EngineChannels {
                ticks: tick_rx,
                fills: fill_rx,
            })
            .await
            .expect("engine run");

        // No placement calls happened (the mock had no expectations), and
        // the engine never left its initial idle state.
        assert_eq!(snapshot_rx.borrow().status, EngineStatus::Watching);
    }

    #[tokio::test]
    async fn first_round_anchors_at_the_trigger_price() {
        let mut client = mock_with_meta();
        // Base rests at the trigger, not at the live price, and every id
        // encodes the trigger anchor.
        client
            .expect_create_limit_order()
            .withf(|_, _, price, cid| {
                cid.contains("-p9500-") && cid.contains("-bo-") && *price == dec!(95)
            })
            .times(1)
            .returning(resting);
        client
            .expect_create_limit_order()
            .withf(|_, _, price, cid| {
                cid.contains("-p9500-") && cid.contains("-so1-") && *price == dec!(94.05)
            })
            .times(1)
            .returning(resting);

        let mut config = test_config();
        config.trigger_price = Some(dec!(95));
        let (mut engine, snapshot_rx) = engine_with_config(config, client);

        engine
            .on_tick(Ticker {
                last: dec!(100),
                timestamp: Utc::now(),
            })
            .await;

        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.status, EngineStatus::AwaitingFills);
        assert_eq!(snapshot.start_price, Some(dec!(95)));
    }

    #[tokio::test]
    async fn the_trigger_only_anchors_the_first_round() {
        let mut client = mock_with_meta();
        client
            .expect_create_limit_order()
            .withf(|_, _, _, cid| cid.contains("-p10000-"))
            .times(2)
            .returning(resting);

        let mut config = test_config();
        config.trigger_price = Some(dec!(95));
        config.cooldown_between_rounds = 0;
        let (mut engine, snapshot_rx) = engine_with_config(config, client);
        // A round already ended; later rounds anchor at the live price.
        engine.last_round_end = Some(Instant::now());

        engine
            .on_tick(Ticker {
                last: dec!(100),
                timestamp: Utc::now(),
            })
            .await;

        let snapshot = snapshot_rx.borrow();
        assert_eq!(snapshot.status, EngineStatus::AwaitingFills);
        assert_eq!(snapshot.start_price, Some(dec!(100)));
    }

    #[tokio::test]
    async fn ticks_outside_the_price_range_never_start_a_round() {
        // No placement expectations: any order placed out of range panics.
        let client = mock_with_meta();
        let mut config = test_config();
        config.lower_price_range = Some(dec!(90));
        config.upper_price_range = Some(dec!(110));
        let (mut engine, snapshot_rx) = engine_with_config(config, client);

        for last in [dec!(89.99), dec!(110.01)] {
            engine
                .on_tick(Ticker {
                    last,
                    timestamp: Utc::now(),
                })
                .await;
        }

        assert!(engine.round.is_none());
        assert_eq!(snapshot_rx.borrow().status, EngineStatus::Watching);
    }

    #[tokio::test]
    async fn failed_take_profit_cancel_keeps_the_old_exit_order() {
        let mut client = mock_with_meta();
        client
            .expect_cancel_order()
            .withf(|id| id == "tp1")
            .times(1)
            .returning(|_| {
                Err(crate::error::ExchangeError::Rejected(
                    "venue busy".to_string(),
                ))
            });
        // No create_limit_order expectation: the replacement must not go
        // out while the old take profit might still be live.

        let (mut engine, _snapshot_rx) = engine_with(client);
        engine.adopt_round(open_round()).await;

        let safety_fill = order(
            "s1",
            "ladr1-btcusdt-p10000-so1-cccccc",
            OrderSide::Buy,
            OrderStatus::Closed,
            dec!(0.1),
            dec!(99),
        );
        engine.handle_order_update(safety_fill).await;

        let round = engine.round.as_ref().expect("round");
        // The fill is booked, and the old exit order reference survives so
        // the next fill retries the cancel.
        assert_eq!(round.position_amount, dec!(0.1998));
        assert_eq!(
            round.take_profit_order.as_ref().map(|tp| tp.id.as_str()),
            Some("tp1")
        );
    }

    #[tokio::test]
    async fn buy_fill_from_an_earlier_round_is_not_booked() {
        // No cancel/create expectations: a cross-round fill must leave the
        // exit order alone too.
        let client = mock_with_meta();
        let (mut engine, _snapshot_rx) = engine_with(client);
        engine.adopt_round(open_round()).await;

        // Same bot prefix, but anchored at 99 instead of this round's 100.
        let stale_fill = order(
            "s9",
            "ladr1-btcusdt-p9900-so1-eeeee1",
            OrderSide::Buy,
            OrderStatus::Closed,
            dec!(0.1),
            dec!(99),
        );
        engine.handle_order_update(stale_fill).await;

        let round = engine.round.as_ref().expect("round");
        assert_eq!(round.position_amount, dec!(0.0999));
        assert_eq!(round.filled_safety_orders, 0);
    }
}
