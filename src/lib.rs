pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod strategy;
pub mod tui;

pub use config::BotConfig;
pub use coordination::{ShutdownController, ShutdownMode};
pub use error::{ExchangeError, LadderError, Result};
