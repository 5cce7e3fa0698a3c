pub mod client_id;
pub mod market;
pub mod order;
pub mod round;
pub mod state;

pub use market::MarketMeta;
pub use order::{Balance, ExchangeOrder, OrderRole, OrderSide, OrderStatus, OrderType, Ticker};
pub use round::Round;
pub use state::{DashboardSnapshot, EngineStatus, LogLine, OpenOrderRow};
