pub mod paper;
mod traits;

use std::sync::Arc;

use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::config::{ApiCredentials, BotConfig};
use crate::domain::client_id;
use crate::error::{LadderError, Result};

pub use paper::{paper_meta, PaperConfig, PaperExchange};
pub use traits::{ExchangeClient, ExchangeResult};

#[cfg(test)]
pub use traits::MockExchangeClient;

/// Cancel every open order carrying this bot's client-order-id prefix.
///
/// Returns how many orders were canceled. A racing fill surfaces as
/// `OrderNotFound` and is tolerated; other cancel failures are logged and
/// skipped so a single stuck order cannot wedge a shutdown.
pub async fn cancel_bot_orders(client: &dyn ExchangeClient) -> usize {
    let orders = match client.fetch_open_orders().await {
        Ok(orders) => orders,
        Err(e) => {
            warn!("Failed to list open orders for cleanup: {}", e);
            return 0;
        }
    };

    let mut canceled = 0;
    for order in orders
        .iter()
        .filter(|o| client_id::has_prefix(&o.client_order_id))
    {
        match client.cancel_order(&order.id).await {
            Ok(()) => canceled += 1,
            Err(e) if e.is_order_not_found() => {
                debug!("Order {} already gone during cleanup", order.id);
            }
            Err(e) => {
                warn!("Failed to cancel order {} during cleanup: {}", order.id, e);
            }
        }
    }
    canceled
}

/// Create the runtime exchange client for the configured market.
pub fn build_client(
    config: &BotConfig,
    credentials: Option<&ApiCredentials>,
) -> Result<Arc<dyn ExchangeClient>> {
    if config.paper {
        let paper_config = PaperConfig {
            initial_price: config.trigger_price.unwrap_or(dec!(100)),
            ..PaperConfig::default()
        };
        let client = PaperExchange::new(paper_meta(&config.symbol), paper_config);
        return Ok(Arc::new(client));
    }

    if credentials.is_none() {
        return Err(LadderError::Validation(
            "live trading needs API credentials; set LADDER__API__API_KEY and \
             LADDER__API__API_SECRET or add an [api] section to ladder.toml"
                .to_string(),
        ));
    }

    Err(LadderError::Validation(format!(
        "exchange '{}' has no connectivity adapter in this build; run with --paper",
        config.exchange_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderSide, OrderStatus, OrderType};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn open_order(id: &str, client_order_id: &str) -> crate::domain::ExchangeOrder {
        crate::domain::ExchangeOrder {
            id: id.to_string(),
            client_order_id: client_order_id.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status: OrderStatus::Open,
            price: Some(dec!(95)),
            amount: dec!(1),
            filled: Decimal::ZERO,
            average: None,
            cost: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn cancel_bot_orders_skips_foreign_orders() {
        let mut client = MockExchangeClient::new();
        client.expect_fetch_open_orders().returning(|| {
            Ok(vec![
                open_order("1", "ladr1-btcusdt-p10000-so1-abc123"),
                open_order("2", "someone-elses-order"),
            ])
        });
        client
            .expect_cancel_order()
            .withf(|id| id == "1")
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(cancel_bot_orders(&client).await, 1);
    }

    #[tokio::test]
    async fn cancel_bot_orders_tolerates_racing_fills() {
        let mut client = MockExchangeClient::new();
        client.expect_fetch_open_orders().returning(|| {
            Ok(vec![
                open_order("1", "ladr1-btcusdt-p10000-bo-abc123"),
                open_order("2", "ladr1-btcusdt-p10000-tp-abc123"),
            ])
        });
        client.expect_cancel_order().withf(|id| id == "1").returning(|_| {
            Err(crate::error::ExchangeError::OrderNotFound {
                order_id: "1".to_string(),
            })
        });
        client
            .expect_cancel_order()
            .withf(|id| id == "2")
            .returning(|_| Ok(()));

        assert_eq!(cancel_bot_orders(&client).await, 1);
    }

    #[test]
    fn paper_mode_builds_without_credentials() {
        let mut config = crate::config::BotConfig::default();
        config.symbol = "BTC/USDT".to_string();
        config.paper = true;
        let client = build_client(&config, None).expect("paper client");
        assert_eq!(client.market_meta().symbol, "BTC/USDT");
    }

    #[test]
    fn live_mode_without_credentials_is_rejected() {
        let mut config = crate::config::BotConfig::default();
        config.symbol = "BTC/USDT".to_string();
        config.paper = false;
        let err = build_client(&config, None).expect_err("must fail");
        assert!(err.to_string().contains("credentials"));
    }
}
