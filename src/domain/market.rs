use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fallback taker fee when the venue reports none
pub fn default_taker_fee() -> Decimal {
    Decimal::new(1, 3) // 0.1%
}

/// Static metadata for the traded market: precision steps, minimum
/// order size, contract size and fee schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMeta {
    /// Human symbol, e.g. "BTC/USDT"
    pub symbol: String,
    /// Venue market identifier, embedded (truncated) in client order ids
    pub market_id: String,
    pub base: String,
    pub quote: String,
    /// Price tick size; quotes are quantized down to a multiple of this
    pub price_step: Decimal,
    /// Amount step size; amounts are quantized down to a multiple of this
    pub amount_step: Decimal,
    /// Smallest order the venue accepts, in base units
    pub min_amount: Decimal,
    /// Base units per contract; 1 for spot markets
    pub contract_size: Decimal,
    pub taker_fee: Decimal,
    pub maker_fee: Decimal,
}

impl MarketMeta {
    /// Quantize a price down to the venue's tick size.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        quantize_down(price, self.price_step)
    }

    /// Quantize an amount down to the venue's step size.
    pub fn round_amount(&self, amount: Decimal) -> Decimal {
        quantize_down(amount, self.amount_step)
    }

    /// Residue below this amount is treated as no position at all.
    pub fn dust_threshold(&self) -> Decimal {
        if self.amount_step > Decimal::ZERO {
            self.amount_step
        } else {
            Decimal::new(1, 6) // 0.000001
        }
    }

    /// Fee rate to apply to fills: manual override wins, then the venue
    /// taker fee, then a conservative default.
    pub fn effective_fee_rate(&self, override_rate: Option<Decimal>) -> Decimal {
        match override_rate {
            Some(rate) => rate,
            None if self.taker_fee > Decimal::ZERO => self.taker_fee,
            None => default_taker_fee(),
        }
    }
}

fn quantize_down(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn meta() -> MarketMeta {
        MarketMeta {
            symbol: "BTC/USDT".to_string(),
            market_id: "BTCUSDT".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            price_step: dec!(0.01),
            amount_step: dec!(0.00001),
            min_amount: dec!(0.0001),
            contract_size: dec!(1),
            taker_fee: dec!(0.001),
            maker_fee: dec!(0.001),
        }
    }

    #[test]
    fn prices_quantize_down_to_tick() {
        let meta = meta();
        assert_eq!(meta.round_price(dec!(100.129)), dec!(100.12));
        assert_eq!(meta.round_price(dec!(100.12)), dec!(100.12));
    }

    #[test]
    fn amounts_quantize_down_to_step() {
        let meta = meta();
        assert_eq!(meta.round_amount(dec!(0.123456789)), dec!(0.12345));
    }

    #[test]
    fn zero_step_passes_values_through() {
        let mut meta = meta();
        meta.price_step = Decimal::ZERO;
        assert_eq!(meta.round_price(dec!(100.129)), dec!(100.129));
    }

    #[test]
    fn fee_resolution_prefers_override() {
        let meta = meta();
        assert_eq!(meta.effective_fee_rate(Some(dec!(0.002))), dec!(0.002));
        assert_eq!(meta.effective_fee_rate(None), dec!(0.001));

        let mut feeless = meta.clone();
        feeless.taker_fee = Decimal::ZERO;
        assert_eq!(feeless.effective_fee_rate(None), default_taker_fee());
    }

    #[test]
    fn dust_threshold_follows_amount_step() {
        let meta = meta();
        assert_eq!(meta.dust_threshold(), dec!(0.00001));

        let mut stepless = meta.clone();
        stepless.amount_step = Decimal::ZERO;
        assert_eq!(stepless.dust_threshold(), dec!(0.000001));
    }
}
