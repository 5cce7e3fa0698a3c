//! Command line interface for the ladder bot.
//!
//! One flat command: every strategy parameter is a flag with the same
//! defaults the paper venue is tuned for, so `ladder -s BTC/USDT --paper`
//! trades out of the box.

use std::io::{self, Write};

use clap::Parser;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::config::{BotConfig, MarginMode, TradeType};
use crate::error::{LadderError, Result};
use crate::strategy::grid;

/// DCA ladder trading bot for a single crypto market
#[derive(Parser, Debug)]
#[command(name = "ladder")]
#[command(author, version, about = "DCA ladder trading bot for a single crypto market")]
pub struct Cli {
    /// Market symbol, e.g. BTC/USDT (spot) or SOL/USDT:USDT (futures)
    #[arg(short, long)]
    pub symbol: String,

    /// Exchange to trade on
    #[arg(long, default_value = "binance")]
    pub exchange_id: String,

    /// Trade against the built-in paper venue instead of a live exchange
    #[arg(long)]
    pub paper: bool,

    /// Market kind: spot or futures
    #[arg(long, default_value = "spot")]
    pub trade_type: TradeType,

    /// Margin mode for futures: isolated or cross
    #[arg(long, default_value = "isolated")]
    pub margin_mode: MarginMode,

    /// Leverage for futures accounts
    #[arg(long, default_value = "1")]
    pub leverage: u32,

    /// Price drop that triggers the first safety order, percent
    #[arg(long, default_value = "1.0")]
    pub price_deviation: Decimal,

    /// Multiplier applied to each further safety-order step
    #[arg(long, default_value = "1.0")]
    pub price_deviation_multiplier: Decimal,

    /// Profit target above the average entry, percent
    #[arg(long, default_value = "3.0")]
    pub take_profit: Decimal,

    /// Drop below the round start that abandons the round, percent (0 disables)
    #[arg(long, default_value = "0")]
    pub stop_loss: Decimal,

    /// Override the venue taker fee rate (a fraction, e.g. 0.001)
    #[arg(long)]
    pub fee_rate: Option<Decimal>,

    /// Quote currency spent on the base order
    #[arg(long, default_value = "10.0")]
    pub base_order_size: Decimal,

    /// Quote currency spent on the first safety order
    #[arg(long, default_value = "10.0")]
    pub safety_order_size: Decimal,

    /// Multiplier applied to each further safety-order size
    #[arg(long, default_value = "1.0")]
    pub safety_order_size_multiplier: Decimal,

    /// Number of safety orders below the base order
    #[arg(long, default_value = "1")]
    pub max_safety_orders: u32,

    /// Anchor the first round at this price instead of the market price
    #[arg(long)]
    pub trigger_price: Option<Decimal>,

    /// Do not open rounds while the price is below this level
    #[arg(long)]
    pub lower_price_range: Option<Decimal>,

    /// Do not open rounds while the price is above this level
    #[arg(long)]
    pub upper_price_range: Option<Decimal>,

    /// Pause between a finished round and the next entry, seconds
    #[arg(long, default_value = "60")]
    pub cooldown_between_rounds: u64,

    /// Skip the interactive trade-plan confirmation
    #[arg(long)]
    pub no_confirm: bool,

    /// Run without the dashboard, logging to stdout
    #[arg(long)]
    pub headless: bool,

    /// Print the trade plan and exit without trading
    #[arg(long)]
    pub plan: bool,

    /// JSON output for --plan
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Strategy parameters as an immutable run config.
    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            symbol: self.symbol.clone(),
            exchange_id: self.exchange_id.clone(),
            trade_type: self.trade_type,
            margin_mode: self.margin_mode,
            leverage: self.leverage,
            price_deviation: self.price_deviation,
            price_deviation_multiplier: self.price_deviation_multiplier,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            fee_rate: self.fee_rate,
            base_order_size: self.base_order_size,
            safety_order_size: self.safety_order_size,
            safety_order_size_multiplier: self.safety_order_size_multiplier,
            max_safety_orders: self.max_safety_orders,
            trigger_price: self.trigger_price,
            lower_price_range: self.lower_price_range,
            upper_price_range: self.upper_price_range,
            cooldown_between_rounds: self.cooldown_between_rounds,
            no_confirm: self.no_confirm,
            paper: self.paper,
        }
    }
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct PlanTableRow {
    level: String,
    price: String,
    avg_entry: String,
    deviation: String,
    size: String,
    pnl: String,
}

impl From<&grid::PlanRow> for PlanTableRow {
    fn from(row: &grid::PlanRow) -> Self {
        Self {
            level: row.label.clone(),
            price: row.price.normalize().to_string(),
            avg_entry: row
                .average_entry
                .map(|p| p.normalize().to_string())
                .unwrap_or_default(),
            deviation: row
                .deviation
                .map(|d| format!("{}%", d.normalize()))
                .unwrap_or_default(),
            size: row.size.normalize().to_string(),
            pnl: row.pnl.round_dp(4).normalize().to_string(),
        }
    }
}

/// Print the trade plan the grid produces at `start_price`.
pub fn print_plan(
    config: &BotConfig,
    start_price: Decimal,
    fee_rate: Decimal,
    mode: OutputMode,
) -> Result<()> {
    let rows = grid::plan_rows(start_price, config, fee_rate)?;
    match mode {
        OutputMode::Table => {
            println!(
                "Trade plan for {} on {} (start price {}, fee rate {}):",
                config.symbol,
                config.exchange_id,
                start_price.normalize(),
                fee_rate.normalize()
            );
            let table_rows: Vec<PlanTableRow> = rows.iter().map(PlanTableRow::from).collect();
            let table = Table::new(&table_rows).to_string();
            println!("{table}");
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(&rows)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Show the trade plan and ask for a go-ahead before the first order.
///
/// Returns `Ok(true)` when the run is confirmed. `--no-confirm` skips the
/// prompt but still prints the plan.
pub async fn confirm_trade_plan(
    config: &BotConfig,
    start_price: Decimal,
    fee_rate: Decimal,
) -> Result<bool> {
    let mode = if config.paper { "paper" } else { "LIVE" };
    println!(
        "ladder: {} on {} [{}], base {} + {} safety orders",
        config.symbol, config.exchange_id, mode, config.base_order_size, config.max_safety_orders
    );
    print_plan(config, start_price, fee_rate, OutputMode::Table)?;

    if config.no_confirm {
        return Ok(true);
    }

    // Blocking stdin read off the runtime.
    let confirmed = tokio::task::spawn_blocking(|| {
        print!("Start trading? [y/N] ");
        io::stdout().flush().ok();
        let mut input = String::new();
        io::stdin().read_line(&mut input).ok();
        matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    })
    .await
    .map_err(|e| LadderError::Internal(format!("confirmation prompt failed: {e}")))?;

    Ok(confirmed)
}
