//! Oracle corridor and reserve reads.
//!
//! The venue exposes one get-method returning a 4-value stack:
//! settlement balance, index balance, and the corridor bounds as prices
//! scaled by 10,000. Both readers unpack that stack; they are cheap,
//! independent reads and may be issued concurrently.

use rust_decimal::Decimal;

use crate::address::Address;
use crate::chain::ChainReader;
use crate::error::{MarlinError, Result};
use crate::models::{Corridor, INDEX_DECIMALS, Reserves, SETTLEMENT_DECIMALS};

/// Venue get-method returning balances and corridor bounds.
const METHOD_GET_PRICES: &str = "get_prices";

/// Reads the oracle-maintained `[low, high]` price corridor.
///
/// Callers must treat a failed read as "do not trade": map the error to
/// [`Corridor::unavailable`] and surface the cause.
pub async fn read_corridor<R: ChainReader>(reader: &R, order_book: &Address) -> Result<Corridor> {
    let stack = fetch_prices(reader, order_book).await?;
    let low = descale_price(stack[2], "min price")?;
    let high = descale_price(stack[3], "max price")?;
    Ok(Corridor::new(low, high))
}

/// Reads the venue's raw token reserves.
pub async fn read_reserves<R: ChainReader>(reader: &R, order_book: &Address) -> Result<Reserves> {
    let stack = fetch_prices(reader, order_book).await?;
    Ok(Reserves {
        settlement_balance: descale_amount(stack[0], SETTLEMENT_DECIMALS, "settlement balance")?,
        index_balance: descale_amount(stack[1], INDEX_DECIMALS, "index balance")?,
    })
}

async fn fetch_prices<R: ChainReader>(reader: &R, order_book: &Address) -> Result<[i128; 4]> {
    let stack = reader
        .run_get_method(order_book, METHOD_GET_PRICES, &[])
        .await?;
    if stack.len() != 4 {
        return Err(MarlinError::Chain(format!(
            "{METHOD_GET_PRICES} returned {} stack values, expected 4",
            stack.len()
        )));
    }
    let mut values = [0i128; 4];
    for (i, value) in stack.iter().enumerate() {
        values[i] = value.as_int().ok_or_else(|| {
            MarlinError::Chain(format!(
                "{METHOD_GET_PRICES} stack entry {i} is not an integer"
            ))
        })?;
    }
    Ok(values)
}

/// Converts a scaled wire price into its decimal form.
fn descale_price(value: i128, what: &str) -> Result<Decimal> {
    if value < 0 || value > u32::MAX as i128 {
        return Err(MarlinError::Chain(format!(
            "{what} {value} out of range for a scaled price"
        )));
    }
    Ok(Decimal::new(value as i64, 4).normalize())
}

/// Converts a base-unit balance into whole-token decimals.
fn descale_amount(value: i128, decimals: u32, what: &str) -> Result<Decimal> {
    if value < 0 {
        return Err(MarlinError::Chain(format!("{what} {value} is negative")));
    }
    Decimal::try_from_i128_with_scale(value, decimals)
        .map(|d| d.normalize())
        .map_err(|e| MarlinError::Chain(format!("{what} {value}: {e}")))
}
