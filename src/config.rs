//! Application configuration loaded from environment variables.
//!
//! Required:
//! - `MARLIN_ORDER_BOOK_ADDRESS` — the venue's order-book contract
//! - `MARLIN_SETTLEMENT_MASTER` — settlement-token master contract
//! - `MARLIN_INDEX_MASTER` — index-token master contract
//! - `MARLIN_OWNER_ADDRESS` — the trading account
//! - `MARLIN_ALLOWED_CALLERS` — comma-separated caller ids allowed to trade
//!
//! Optional overrides: `MARLIN_RPC_ENDPOINT`, `MARLIN_RPC_API_KEY`,
//! `MARLIN_MIN_BUY_VALUE`, `MARLIN_MIN_SELL_VALUE`,
//! `MARLIN_POLL_INTERVAL_SECS`, `MARLIN_CONFIRM_TIMEOUT_SECS`.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::address::Address;
use crate::builder::VenueAddresses;
use crate::error::MarlinError;

/// Default public JSON-RPC gateway.
const DEFAULT_RPC_ENDPOINT: &str = "https://toncenter.com/api/v2/jsonRPC";

/// Default minimum notional for buy fills, in settlement units.
const DEFAULT_MIN_BUY_VALUE: &str = "1.00";

/// Default minimum notional for sell placements. Deliberately a higher
/// floor than buys.
const DEFAULT_MIN_SELL_VALUE: &str = "2.00";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 180;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub venue: VenueConfig,
    pub submit: SubmitConfig,
}

/// JSON-RPC gateway settings.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Venue contracts and trading policy.
#[derive(Debug, Clone)]
pub struct VenueConfig {
    pub addresses: VenueAddresses,
    /// Caller ids allowed to trade. Injected explicitly so guards stay
    /// testable in isolation.
    pub allowed_callers: Vec<i64>,
    /// Minimum notional for buy fills, settlement units.
    pub min_buy_value: Decimal,
    /// Minimum notional for sell placements, settlement units.
    pub min_sell_value: Decimal,
}

/// Submission timing.
#[derive(Debug, Clone, Copy)]
pub struct SubmitConfig {
    pub poll_interval: Duration,
    pub confirm_timeout: Duration,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`MarlinError::Config`] when a required variable is missing
/// or any value fails to parse.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let endpoint =
        non_empty_var("MARLIN_RPC_ENDPOINT").unwrap_or_else(|| DEFAULT_RPC_ENDPOINT.to_string());
    let api_key = non_empty_var("MARLIN_RPC_API_KEY");

    let addresses = VenueAddresses {
        order_book: required_address("MARLIN_ORDER_BOOK_ADDRESS")?,
        settlement_master: required_address("MARLIN_SETTLEMENT_MASTER")?,
        index_master: required_address("MARLIN_INDEX_MASTER")?,
        owner: required_address("MARLIN_OWNER_ADDRESS")?,
    };

    let allowed_callers = parse_callers(&required_var("MARLIN_ALLOWED_CALLERS")?)?;

    let min_buy_value = parse_decimal("MARLIN_MIN_BUY_VALUE", DEFAULT_MIN_BUY_VALUE)?;
    let min_sell_value = parse_decimal("MARLIN_MIN_SELL_VALUE", DEFAULT_MIN_SELL_VALUE)?;

    let submit = SubmitConfig {
        poll_interval: Duration::from_secs(parse_secs(
            "MARLIN_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?),
        confirm_timeout: Duration::from_secs(parse_secs(
            "MARLIN_CONFIRM_TIMEOUT_SECS",
            DEFAULT_CONFIRM_TIMEOUT_SECS,
        )?),
    };

    Ok(AppConfig {
        rpc: RpcConfig { endpoint, api_key },
        venue: VenueConfig {
            addresses,
            allowed_callers,
            min_buy_value,
            min_sell_value,
        },
        submit,
    })
}

/// Returns the value of an environment variable if it exists and is
/// non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn required_var(name: &str) -> crate::Result<String> {
    non_empty_var(name).ok_or_else(|| MarlinError::Config(format!("{name} is not set")))
}

fn required_address(name: &str) -> crate::Result<Address> {
    required_var(name)?
        .parse()
        .map_err(|e| MarlinError::Config(format!("{name}: {e}")))
}

fn parse_callers(raw: &str) -> crate::Result<Vec<i64>> {
    let callers: Vec<i64> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                MarlinError::Config(format!("MARLIN_ALLOWED_CALLERS entry {s:?} is not an id"))
            })
        })
        .collect::<crate::Result<_>>()?;
    if callers.is_empty() {
        return Err(MarlinError::Config(
            "MARLIN_ALLOWED_CALLERS contains no caller ids".to_string(),
        ));
    }
    Ok(callers)
}

fn parse_decimal(name: &str, default: &str) -> crate::Result<Decimal> {
    let raw = non_empty_var(name).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|_| MarlinError::Config(format!("{name} {raw:?} is not a decimal")))
}

fn parse_secs(name: &str, default: u64) -> crate::Result<u64> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| MarlinError::Config(format!("{name} {raw:?} is not a duration in seconds"))),
    }
}
