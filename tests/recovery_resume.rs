//! Restart recovery against the paper venue: a previous round is rebuilt
//! from order history, adopted by the engine, and finished normally; a
//! ledger-vs-venue divergence outside the tolerance band refuses to trade.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tokio::time::timeout;

use ladder::config::BotConfig;
use ladder::coordination::{ShutdownController, ShutdownMode};
use ladder::domain::{
    client_id, DashboardSnapshot, EngineStatus, ExchangeOrder, OrderRole, OrderSide, OrderStatus,
    OrderType,
};
use ladder::exchange::{paper_meta, ExchangeClient, PaperConfig, PaperExchange};
use ladder::strategy::{feeds, recover_state, Engine, EngineChannels};

fn resume_config() -> BotConfig {
    BotConfig {
        symbol: "BTC/USDT".to_string(),
        paper: true,
        no_confirm: true,
        price_deviation: dec!(1.0),
        take_profit: dec!(3.0),
        base_order_size: dec!(10.0),
        safety_order_size: dec!(10.0),
        max_safety_orders: 1,
        cooldown_between_rounds: 300,
        ..BotConfig::default()
    }
}

fn pinned_paper(config: &BotConfig, initial_price: Decimal) -> Arc<PaperExchange> {
    Arc::new(PaperExchange::new(
        paper_meta(&config.symbol),
        PaperConfig {
            initial_price,
            volatility_bps: 0,
            tick_interval: Duration::from_millis(10),
            seed: 11,
        },
    ))
}

fn filled_base_order(market_id: &str, start_price: Decimal) -> ExchangeOrder {
    ExchangeOrder {
        id: "101".to_string(),
        client_order_id: client_id::encode(OrderRole::Base, start_price, market_id),
        side: OrderSide::Buy,
        order_type: OrderType::Limit,
        status: OrderStatus::Closed,
        price: Some(start_price),
        amount: dec!(0.1),
        filled: dec!(0.1),
        average: Some(start_price),
        cost: dec!(10),
        timestamp: Utc::now() - chrono::Duration::seconds(120),
    }
}

fn open_take_profit(market_id: &str, start_price: Decimal) -> ExchangeOrder {
    ExchangeOrder {
        id: "102".to_string(),
        client_order_id: client_id::encode(OrderRole::TakeProfit, start_price, market_id),
        side: OrderSide::Sell,
        order_type: OrderType::Limit,
        status: OrderStatus::Open,
        price: Some(dec!(103.10)),
        amount: dec!(0.0999),
        filled: Decimal::ZERO,
        average: None,
        cost: Decimal::ZERO,
        timestamp: Utc::now() - chrono::Duration::seconds(60),
    }
}

async fn wait_for(
    rx: &mut watch::Receiver<DashboardSnapshot>,
    what: &str,
    predicate: impl Fn(&DashboardSnapshot) -> bool,
) -> DashboardSnapshot {
    let outcome = timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("engine dropped its snapshot channel while waiting for {what}");
            }
        }
    })
    .await;
    match outcome {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

#[tokio::test]
async fn recovered_round_resumes_and_finishes() {
    let config = resume_config();
    let client = pinned_paper(&config, dec!(100));
    let market_id = client.market_meta().market_id.clone();

    // A previous run bought the base order, placed its take profit and died.
    client
        .seed_history(vec![
            filled_base_order(&market_id, dec!(100)),
            open_take_profit(&market_id, dec!(100)),
        ])
        .await;
    client
        .seed_open_orders(vec![open_take_profit(&market_id, dec!(100))])
        .await;
    // Venue holdings agree with the fee-netted ledger.
    client.seed_balance(dec!(0.0999)).await;

    let dyn_client: Arc<dyn ExchangeClient> = client.clone();
    let fee_rate = dyn_client.market_meta().effective_fee_rate(None);

    let round = recover_state(dyn_client.as_ref(), &config, fee_rate)
        .await
        .expect("recovery should succeed")
        .expect("a round should be rebuilt");

    assert_eq!(round.start_price, dec!(100));
    assert_eq!(round.position_amount, dec!(0.0999));
    assert_eq!(round.position_cost, dec!(10));
    assert_eq!(round.filled_safety_orders, 0);
    assert!(round.buy_orders.is_empty());
    let tp = round.take_profit_order.as_ref().expect("reattached take profit");
    assert_eq!(tp.id, "102");

    // Adopt the round and let a price push finish it.
    let controller = Arc::new(ShutdownController::new());
    let (snapshot_tx, mut snapshot_rx) = watch::channel(DashboardSnapshot::initial(
        &config.symbol,
        &config.exchange_id,
        true,
        config.max_safety_orders,
    ));
    let mut engine = Engine::new(
        config.clone(),
        Arc::clone(&dyn_client),
        Arc::clone(&controller),
        snapshot_tx,
        fee_rate,
    );
    engine.adopt_round(round).await;

    let (ticks, fills, _feed_handles) = feeds::spawn(Arc::clone(&dyn_client), &controller);
    let engine_task = tokio::spawn(engine.run(EngineChannels { ticks, fills }));

    wait_for(&mut snapshot_rx, "the adopted position to show", |s| {
        s.status == EngineStatus::PositionOpen && s.position_amount == dec!(0.0999)
    })
    .await;

    client.set_price(dec!(104)).await;

    let done = wait_for(&mut snapshot_rx, "the resumed round to finish", |s| {
        s.status == EngineStatus::Cooldown
    })
    .await;
    assert_eq!(done.position_amount, Decimal::ZERO);
    assert_eq!(client.open_order_count().await, 0);

    controller.request(ShutdownMode::Graceful);
    timeout(Duration::from_secs(5), engine_task)
        .await
        .expect("engine to stop after shutdown")
        .expect("engine task")
        .expect("engine result");
}

#[tokio::test]
async fn divergent_venue_position_refuses_to_trade() {
    let config = resume_config();
    let client = pinned_paper(&config, dec!(100));
    let market_id = client.market_meta().market_id.clone();

    client
        .seed_history(vec![filled_base_order(&market_id, dec!(100))])
        .await;
    // The venue reports a fraction of what the fills add up to.
    client.seed_balance(dec!(0.001)).await;

    let dyn_client: Arc<dyn ExchangeClient> = client.clone();
    let fee_rate = dyn_client.market_meta().effective_fee_rate(None);

    let err = recover_state(dyn_client.as_ref(), &config, fee_rate)
        .await
        .expect_err("divergence outside the band must be fatal");
    assert!(err.is_state_inconsistency());
    let message = err.to_string();
    assert!(message.contains("0.0999"), "calculated figure in: {message}");
    assert!(message.contains("0.001"), "actual figure in: {message}");
}
