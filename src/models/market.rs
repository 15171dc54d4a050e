//! Corridor and reserve readings.

use rust_decimal::Decimal;
use serde::Serialize;

/// Oracle-maintained acceptable price range.
///
/// `None` bounds mean the corridor could not be read; callers must treat
/// that as "do not trade", never as an open corridor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Corridor {
    pub low: Option<Decimal>,
    pub high: Option<Decimal>,
}

impl Corridor {
    pub fn new(low: Decimal, high: Decimal) -> Self {
        Corridor {
            low: Some(low),
            high: Some(high),
        }
    }

    /// The corridor to use when the oracle read failed.
    pub fn unavailable() -> Self {
        Corridor {
            low: None,
            high: None,
        }
    }

    /// Whether both bounds were read successfully.
    pub fn is_available(&self) -> bool {
        self.low.is_some() && self.high.is_some()
    }

    /// Whether `price` lies inside the corridor. An unavailable corridor
    /// contains nothing.
    pub fn contains(&self, price: Decimal) -> bool {
        match (self.low, self.high) {
            (Some(low), Some(high)) => low <= price && price <= high,
            _ => false,
        }
    }
}

/// Raw token reserves held by the order-book contract, in whole-token
/// units of each asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reserves {
    /// Settlement-asset balance.
    pub settlement_balance: Decimal,
    /// Index-asset balance.
    pub index_balance: Decimal,
}

/// Combined market view returned by the overview tool.
#[derive(Debug, Clone, Serialize)]
pub struct MarketOverview {
    pub corridor: Corridor,
    pub reserves: Reserves,
}
