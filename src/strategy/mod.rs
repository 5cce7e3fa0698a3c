//! Trading strategy: grid pricing, market data feeds, round recovery and
//! the order-management engine that ties them together.

pub mod engine;
pub mod feeds;
pub mod grid;
pub mod recovery;

pub use engine::{Engine, EngineChannels};
pub use grid::{GridLevel, OrderGrid, PlanRow};
pub use recovery::recover_state;
