use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Order status as reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Working on the book
    Open,
    /// Done: fully filled, or closed by the venue
    Closed,
    /// Canceled before completion
    Canceled,
    /// Refused by the venue
    Rejected,
}

impl OrderStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Open)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

/// Role an order plays within a round. Encoded in the client order id and
/// parsed back out once, so downstream code never string-matches tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRole {
    /// The opening buy at the round start price
    Base,
    /// Ladder rung `n` (1-indexed)
    Safety(u32),
    TakeProfit,
    StopLoss,
}

impl OrderRole {
    /// Short tag used inside client order ids: bo, so<N>, tp, sl.
    pub fn tag(&self) -> String {
        match self {
            OrderRole::Base => "bo".to_string(),
            OrderRole::Safety(n) => format!("so{n}"),
            OrderRole::TakeProfit => "tp".to_string(),
            OrderRole::StopLoss => "sl".to_string(),
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "bo" => Some(OrderRole::Base),
            "tp" => Some(OrderRole::TakeProfit),
            "sl" => Some(OrderRole::StopLoss),
            other => other
                .strip_prefix("so")
                .and_then(|n| n.parse().ok())
                .map(OrderRole::Safety),
        }
    }

    pub fn is_safety(&self) -> bool {
        matches!(self, OrderRole::Safety(_))
    }

    /// Human label for dashboards and logs.
    pub fn label(&self) -> String {
        match self {
            OrderRole::Base => "BASE".to_string(),
            OrderRole::Safety(n) => format!("SAFETY {n}"),
            OrderRole::TakeProfit => "TAKE PROFIT".to_string(),
            OrderRole::StopLoss => "STOP LOSS".to_string(),
        }
    }
}

impl std::fmt::Display for OrderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An order as the venue reports it, both in snapshots and on the
/// order-update stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeOrder {
    /// Venue-assigned order id
    pub id: String,
    pub client_order_id: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Limit price; None for market orders
    pub price: Option<Decimal>,
    pub amount: Decimal,
    pub filled: Decimal,
    /// Average fill price, when the venue reports one
    pub average: Option<Decimal>,
    /// Cumulative quote cost of the filled part
    pub cost: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl ExchangeOrder {
    /// Role decoded from the client order id, if the order is ours.
    pub fn role(&self) -> Option<OrderRole> {
        super::client_id::decode(&self.client_order_id).map(|decoded| decoded.role)
    }

    /// A closed order that actually traded.
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Closed && self.filled > Decimal::ZERO
    }

    /// Price the fill should be accounted at.
    pub fn fill_price(&self) -> Option<Decimal> {
        self.average.or(self.price)
    }
}

/// Last-trade price snapshot from the ticker stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub last: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Base-asset balance, used by spot recovery validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub total: Decimal,
}
