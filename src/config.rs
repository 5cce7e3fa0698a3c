use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Market kind to trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    #[default]
    Spot,
    Futures,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Futures => "futures",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "futures" | "future" | "swap" => Ok(Self::Futures),
            _ => Err("invalid trade type; expected spot|futures"),
        }
    }
}

/// Margin mode for futures accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarginMode {
    #[default]
    Isolated,
    Cross,
}

impl MarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::Cross => "cross",
        }
    }
}

impl std::fmt::Display for MarginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarginMode {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "isolated" => Ok(Self::Isolated),
            "cross" | "crossed" => Ok(Self::Cross),
            _ => Err("invalid margin mode; expected isolated|cross"),
        }
    }
}

/// Strategy parameters for a single run, immutable once the bot starts
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Market symbol, e.g. "BTC/USDT"
    pub symbol: String,
    /// Exchange identifier
    pub exchange_id: String,
    pub trade_type: TradeType,
    pub margin_mode: MarginMode,
    pub leverage: u32,
    /// First safety order deviation below the start price, percent
    pub price_deviation: Decimal,
    /// Multiplier applied to each subsequent deviation step
    pub price_deviation_multiplier: Decimal,
    /// Take profit above the average entry price, percent
    pub take_profit: Decimal,
    /// Stop loss below the round start price, percent; zero disables it
    pub stop_loss: Decimal,
    /// Manual fee rate override; defaults to the market taker fee
    pub fee_rate: Option<Decimal>,
    /// Base order size in quote currency
    pub base_order_size: Decimal,
    /// Safety order size in quote currency
    pub safety_order_size: Decimal,
    /// Multiplier applied to each subsequent safety order size
    pub safety_order_size_multiplier: Decimal,
    pub max_safety_orders: u32,
    /// Start the first round only once price falls to this level
    pub trigger_price: Option<Decimal>,
    /// Do not open rounds below this price
    pub lower_price_range: Option<Decimal>,
    /// Do not open rounds above this price
    pub upper_price_range: Option<Decimal>,
    /// Seconds to wait after a round ends before opening the next one
    pub cooldown_between_rounds: u64,
    pub no_confirm: bool,
    /// Trade against the built-in simulated venue
    pub paper: bool,
}

impl BotConfig {
    /// Validate field-level sanity. Ladder geometry (cumulative deviation,
    /// stop loss depth) is validated by the pricing engine.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.symbol.trim().is_empty() {
            errors.push("symbol must not be empty".to_string());
        }

        if self.base_order_size <= Decimal::ZERO {
            errors.push(format!(
                "base_order_size must be positive, got {}",
                self.base_order_size
            ));
        }

        if self.safety_order_size <= Decimal::ZERO {
            errors.push(format!(
                "safety_order_size must be positive, got {}",
                self.safety_order_size
            ));
        }

        if self.price_deviation <= Decimal::ZERO {
            errors.push(format!(
                "price_deviation must be positive, got {}%",
                self.price_deviation
            ));
        }

        if self.price_deviation_multiplier <= Decimal::ZERO {
            errors.push(format!(
                "price_deviation_multiplier must be positive, got {}",
                self.price_deviation_multiplier
            ));
        }

        if self.safety_order_size_multiplier <= Decimal::ZERO {
            errors.push(format!(
                "safety_order_size_multiplier must be positive, got {}",
                self.safety_order_size_multiplier
            ));
        }

        if self.stop_loss < Decimal::ZERO {
            errors.push(format!("stop_loss must not be negative, got {}%", self.stop_loss));
        }

        if self.leverage == 0 {
            errors.push("leverage must be at least 1".to_string());
        }

        if let Some(fee) = self.fee_rate {
            if fee < Decimal::ZERO || fee >= Decimal::ONE {
                errors.push(format!("fee_rate must be a fraction in [0, 1), got {fee}"));
            }
        }

        if let (Some(lower), Some(upper)) = (self.lower_price_range, self.upper_price_range) {
            if lower >= upper {
                errors.push(format!(
                    "lower_price_range {lower} must be below upper_price_range {upper}"
                ));
            }
        }

        if let Some(trigger) = self.trigger_price {
            if trigger <= Decimal::ZERO {
                errors.push(format!("trigger_price must be positive, got {trigger}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            exchange_id: "binance".to_string(),
            trade_type: TradeType::default(),
            margin_mode: MarginMode::default(),
            leverage: 1,
            price_deviation: dec!(1.0),
            price_deviation_multiplier: dec!(1.0),
            take_profit: dec!(3.0),
            stop_loss: Decimal::ZERO,
            fee_rate: None,
            base_order_size: dec!(10.0),
            safety_order_size: dec!(10.0),
            safety_order_size_multiplier: dec!(1.0),
            max_safety_orders: 1,
            trigger_price: None,
            lower_price_range: None,
            upper_price_range: None,
            cooldown_between_rounds: 60,
            no_confirm: false,
            paper: false,
        }
    }
}

/// API credentials, zeroized when dropped
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Crate-level log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file used while the dashboard owns the terminal
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_log_file() -> String {
    "ladder.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// File/environment settings: credentials and logging.
/// Strategy parameters come from the CLI instead.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: Option<ApiCredentials>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load from `ladder.toml` and `LADDER__*` environment variables
    /// (e.g. LADDER__API__API_KEY, LADDER__LOGGING__LEVEL).
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("logging.level", default_log_level())?
            .set_default("logging.file", default_log_file())?
            .add_source(File::with_name("ladder").required(false))
            .add_source(
                Environment::with_prefix("LADDER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
