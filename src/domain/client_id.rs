//! Client-order-id codec.
//!
//! Every order the bot places carries a structured client order id:
//! `<prefix>-<market id, 8 chars>-p<start price in cents>-<role>-<random>`.
//! The encoded start price and role are the only state that survives a
//! restart, so recovery reconstructs rounds from these ids alone.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::order::OrderRole;

/// Identifies this bot's orders on the venue. Changing it orphans every
/// order placed by earlier builds, so it is versioned, not configurable.
pub const CLIENT_ORDER_ID_PREFIX: &str = "ladr1";

/// Most venues cap client order ids at 36 characters.
pub const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

const RANDOM_SUFFIX_LEN: usize = 6;

/// Fields recovered from a decoded client order id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedClientId {
    pub start_price: Decimal,
    pub role: OrderRole,
}

/// Build a client order id for an order of the given role in a round
/// anchored at `start_price`.
pub fn encode(role: OrderRole, start_price: Decimal, market_id: &str) -> String {
    let market_part: String = market_id
        .chars()
        .filter(|c| *c != '/' && *c != ':')
        .flat_map(char::to_lowercase)
        .take(8)
        .collect();

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();

    let id = format!(
        "{CLIENT_ORDER_ID_PREFIX}-{market_part}-p{}-{}-{suffix}",
        price_key(start_price),
        role.tag(),
    );
    id.chars().take(MAX_CLIENT_ORDER_ID_LEN).collect()
}

/// Parse the start price and role back out of a client order id.
/// Returns None for ids this bot did not generate.
pub fn decode(client_order_id: &str) -> Option<DecodedClientId> {
    let rest = client_order_id
        .strip_prefix(CLIENT_ORDER_ID_PREFIX)?
        .strip_prefix('-')?;

    let mut parts = rest.split('-');
    let _market = parts.next()?;
    let price_part = parts.next()?;
    let role_part = parts.next()?;

    let cents: i64 = price_part.strip_prefix('p')?.parse().ok()?;
    let role = OrderRole::parse(role_part)?;

    Some(DecodedClientId {
        start_price: Decimal::new(cents, 2),
        role,
    })
}

pub fn has_prefix(client_order_id: &str) -> bool {
    client_order_id.starts_with(CLIENT_ORDER_ID_PREFIX)
}

/// Integer key for a start price: cents, fraction truncated. Two rounds
/// with the same key belong to the same grouping bucket.
pub fn price_key(price: Decimal) -> i64 {
    (price * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0)
}

/// Substring shared by every order of the round anchored at `start_price`.
pub fn group_key(start_price: Decimal) -> String {
    format!("-p{}-", price_key(start_price))
}

pub fn belongs_to_group(client_order_id: &str, key: &str) -> bool {
    client_order_id.contains(key)
}
