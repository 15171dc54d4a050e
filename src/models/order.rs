//! Decoded order-book types.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::address::Address;

/// Which queue an order rests on.
///
/// The venue's wire tags for the two sides are asymmetric; see the
/// constants in [`crate::codec`] for the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Ask,
    Bid,
}

/// Largest order amount accepted by the decoder, in 9-decimal base units.
/// Keeps notional arithmetic exact within 96-bit decimals; larger amounts
/// are treated as malformed records.
pub const MAX_ORDER_AMOUNT: u128 = 1_000_000_000_000_000_000;

/// A single resting order recovered from contract state.
///
/// Immutable once decoded; snapshots are rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Price in settlement units per whole index token.
    pub price: Decimal,
    /// The same price as the wire's fixed-point integer (scale 10,000).
    pub price_scaled: u32,
    /// Order size in 9-decimal base units of the index asset.
    pub amount: u128,
    /// The account that placed the order.
    pub trader: Address,
}

impl Order {
    /// Builds an order from wire values, deriving the decimal price.
    pub fn new(price_scaled: u32, amount: u128, trader: Address) -> Self {
        Order {
            price: Decimal::new(price_scaled as i64, 4),
            price_scaled,
            amount,
            trader,
        }
    }

    /// Notional value in settlement units: `amount × price`.
    ///
    /// Exact: the product of a capped amount (≤ 10^18) and a 32-bit scaled
    /// price fits a 96-bit mantissa at scale 13 (9 amount + 4 price digits).
    pub fn notional(&self) -> Decimal {
        let mantissa = self.amount * self.price_scaled as u128;
        Decimal::from_i128_with_scale(mantissa as i128, 13).normalize()
    }

    /// Settlement cost of consuming this order in full, in 6-decimal base
    /// units of the settlement asset. Truncates sub-unit dust.
    pub fn settlement_amount(&self) -> u128 {
        self.amount * self.price_scaled as u128 / 10_000_000
    }
}

/// A freshly decoded order book: asks cheapest-first, bids highest-first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderBookSnapshot {
    /// Sell queue, ascending by price; ties keep on-chain order.
    pub asks: Vec<Order>,
    /// Buy queue, descending by price; ties keep on-chain order.
    pub bids: Vec<Order>,
    /// Per-entry decode failures, if any. Partial failures do not abort
    /// the rest of the decode.
    pub decode_error: Option<String>,
}
