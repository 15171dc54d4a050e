//! Policy guards evaluated before any trade is built.
//!
//! Pure functions with no hidden state: the same inputs always produce
//! the same verdict. Each raises a [`GuardViolation`] on failure; guard
//! rejections are surfaced to the caller verbatim and never retried.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Corridor;

/// Machine-readable rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardCode {
    /// The caller is not on the configured allow-list.
    Unauthorized,
    /// The price corridor could not be read; trading is blocked.
    NoCorridor,
    /// The price falls outside the oracle corridor.
    OutOfCorridor,
    /// The order's value is below the configured floor.
    BelowMinimum,
}

/// A policy rejection: code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct GuardViolation {
    pub code: GuardCode,
    pub message: String,
}

impl GuardViolation {
    fn new(code: GuardCode, message: String) -> Self {
        GuardViolation { code, message }
    }
}

/// Rejects callers missing from the allow-list.
pub fn assert_owner(caller_id: i64, authorized_ids: &[i64]) -> Result<(), GuardViolation> {
    if authorized_ids.contains(&caller_id) {
        return Ok(());
    }
    Err(GuardViolation::new(
        GuardCode::Unauthorized,
        format!("caller {caller_id} is not authorized to trade"),
    ))
}

/// Rejects when the corridor is unavailable or `price` lies outside it.
pub fn assert_in_corridor(
    price: Decimal,
    corridor: &Corridor,
    label: &str,
) -> Result<(), GuardViolation> {
    let (Some(low), Some(high)) = (corridor.low, corridor.high) else {
        return Err(GuardViolation::new(
            GuardCode::NoCorridor,
            format!("{label}: price corridor is unavailable"),
        ));
    };
    if price < low || price > high {
        return Err(GuardViolation::new(
            GuardCode::OutOfCorridor,
            format!("{label}: price {price} is outside the corridor [{low}, {high}]"),
        ));
    }
    Ok(())
}

/// Rejects when the corridor could not be read at all. Used by flows
/// that have no single price to test yet (buy fills filter per order).
pub fn assert_corridor_available(
    corridor: &Corridor,
    label: &str,
) -> Result<(), GuardViolation> {
    if corridor.is_available() {
        return Ok(());
    }
    Err(GuardViolation::new(
        GuardCode::NoCorridor,
        format!("{label}: price corridor is unavailable"),
    ))
}

/// Rejects values below the configured minimum.
pub fn assert_minimum_value(
    value: Decimal,
    minimum: Decimal,
    label: &str,
) -> Result<(), GuardViolation> {
    if value < minimum {
        return Err(GuardViolation::new(
            GuardCode::BelowMinimum,
            format!("{label}: value {value} is below the minimum {minimum}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn owner_check_accepts_listed_callers() {
        assert!(assert_owner(42, &[7, 42]).is_ok());
    }

    #[test]
    fn owner_check_rejects_unlisted_callers() {
        let err = assert_owner(99, &[7, 42]).unwrap_err();
        assert_eq!(err.code, GuardCode::Unauthorized);
        assert!(err.message.contains("99"));
    }

    #[test]
    fn owner_check_rejects_everyone_on_empty_list() {
        assert!(assert_owner(7, &[]).is_err());
    }

    #[test]
    fn corridor_accepts_inclusive_bounds() {
        let corridor = Corridor::new(dec!(1.30), dec!(1.60));
        assert!(assert_in_corridor(dec!(1.30), &corridor, "Sell order").is_ok());
        assert!(assert_in_corridor(dec!(1.60), &corridor, "Sell order").is_ok());
    }

    #[test]
    fn corridor_rejects_outside_prices() {
        let corridor = Corridor::new(dec!(1.30), dec!(1.60));
        let err = assert_in_corridor(dec!(1.75), &corridor, "Sell order").unwrap_err();
        assert_eq!(err.code, GuardCode::OutOfCorridor);
        assert!(err.message.contains("1.75"));
        assert!(err.message.contains("1.30"));
        assert!(err.message.contains("1.60"));
    }

    #[test]
    fn unavailable_corridor_rejects_any_price() {
        let corridor = Corridor::unavailable();
        for price in [dec!(0), dec!(1.45), dec!(1_000_000)] {
            let err = assert_in_corridor(price, &corridor, "Sell order").unwrap_err();
            assert_eq!(err.code, GuardCode::NoCorridor);
        }
    }

    #[test]
    fn half_available_corridor_still_rejects() {
        let corridor = Corridor {
            low: Some(dec!(1.30)),
            high: None,
        };
        let err = assert_in_corridor(dec!(1.45), &corridor, "Sell order").unwrap_err();
        assert_eq!(err.code, GuardCode::NoCorridor);
    }

    #[test]
    fn corridor_verdicts_are_idempotent() {
        let corridor = Corridor::new(dec!(1.30), dec!(1.60));
        let first = assert_in_corridor(dec!(1.45), &corridor, "Sell order");
        let second = assert_in_corridor(dec!(1.45), &corridor, "Sell order");
        assert_eq!(first, second);
    }

    #[test]
    fn minimum_value_is_inclusive() {
        let err = assert_minimum_value(dec!(1.99), dec!(2.00), "Sell order").unwrap_err();
        assert_eq!(err.code, GuardCode::BelowMinimum);
        assert!(assert_minimum_value(dec!(2.00), dec!(2.00), "Sell order").is_ok());
    }

    #[test]
    fn corridor_availability_guard() {
        assert!(assert_corridor_available(&Corridor::new(dec!(1), dec!(2)), "Buy fill").is_ok());
        let err = assert_corridor_available(&Corridor::unavailable(), "Buy fill").unwrap_err();
        assert_eq!(err.code, GuardCode::NoCorridor);
    }
}
