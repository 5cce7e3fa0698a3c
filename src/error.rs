use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the trading bot
#[derive(Error, Debug)]
pub enum LadderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    Validation(String),

    // Exchange boundary errors
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    // Recovery errors
    #[error("Recovery failed: {0}")]
    Recovery(String),

    /// The position reconstructed from order history disagrees with what the
    /// venue reports by more than the tolerated band. Trading must not resume.
    #[error(
        "State inconsistency detected.\n\
         Calculated position from order history: {calculated}\n\
         Actual position reported by the exchange: {actual}\n\
         The difference exceeds the 10% tolerance band.\n\
         Manual intervention required: reconcile the position on the exchange,\n\
         cancel any leftover bot orders, then restart."
    )]
    StateInconsistency {
        calculated: Decimal,
        actual: Decimal,
    },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LadderError {
    /// True for the fatal ledger-vs-venue mismatch that must halt trading.
    pub fn is_state_inconsistency(&self) -> bool {
        matches!(self, LadderError::StateInconsistency { .. })
    }
}

/// Result type alias for LadderError
pub type Result<T> = std::result::Result<T, LadderError>;

/// Errors surfaced by the exchange client boundary
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Network or stream failure; the caller may retry or resubscribe
    #[error("Transport error: {0}")]
    Transport(String),

    /// The venue refused or failed a request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The referenced order does not exist (already filled or canceled)
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
}

impl ExchangeError {
    /// Cancel paths treat this as success: the order is already gone.
    pub fn is_order_not_found(&self) -> bool {
        matches!(self, ExchangeError::OrderNotFound { .. })
    }
}
