use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::MarginMode;
use crate::domain::{Balance, ExchangeOrder, MarketMeta, OrderSide, Ticker};
use crate::error::ExchangeError;

#[cfg(test)]
use mockall::automock;

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// Venue-facing surface the engine drives a round through.
///
/// The `watch_*` methods resolve once with the next event rather than handing
/// back a stream; the feed tasks call them in a loop and forward into channels.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn market_meta(&self) -> &MarketMeta;

    async fn fetch_ticker(&self) -> ExchangeResult<Ticker>;

    /// Resolves with the next price update for the configured market.
    async fn watch_ticker(&self) -> ExchangeResult<Ticker>;

    /// Resolves with the next batch of order updates for the configured market.
    async fn watch_orders(&self) -> ExchangeResult<Vec<ExchangeOrder>>;

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<ExchangeOrder>>;

    /// Recent orders for this market, oldest first, capped at `limit`.
    async fn fetch_order_history(&self, limit: u32) -> ExchangeResult<Vec<ExchangeOrder>>;

    async fn create_limit_order(
        &self,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        client_order_id: &str,
    ) -> ExchangeResult<ExchangeOrder>;

    async fn create_market_sell(&self, amount: Decimal) -> ExchangeResult<ExchangeOrder>;

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()>;

    /// Net base position for futures markets.
    async fn fetch_position_amount(&self) -> ExchangeResult<Decimal>;

    /// Base-asset balance for spot markets.
    async fn fetch_base_balance(&self) -> ExchangeResult<Balance>;

    async fn set_leverage(&self, leverage: u32, margin_mode: MarginMode) -> ExchangeResult<()>;
}

impl std::fmt::Debug for dyn ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExchangeClient")
    }
}
