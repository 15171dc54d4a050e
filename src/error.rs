//! Crate-level error types.
//!
//! [`MarlinError`] unifies every error source (configuration, cell codec,
//! chain I/O, policy guards) behind a single enum so callers can match on
//! the variant they care about while still using the `?` operator for easy
//! propagation.

use crate::address::AddressParseError;
use crate::boc::BocError;
use crate::cell::CellError;
use crate::guard::GuardViolation;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MarlinError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum MarlinError {
    /// A configuration value could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A policy guard rejected the trading intent. Never retried.
    #[error("guard violation: {0}")]
    Guard(#[from] GuardViolation),

    /// Bit-level cell read or write failed.
    #[error("cell error: {0}")]
    Cell(#[from] CellError),

    /// Raw contract state could not be deserialized into cells.
    #[error("bag-of-cells error: {0}")]
    Boc(#[from] BocError),

    /// The order-book state was present but yielded no decodable orders.
    #[error("order book decode failed: {0}")]
    Decode(String),

    /// An account address string was malformed.
    #[error("address error: {0}")]
    Address(#[from] AddressParseError),

    /// An HTTP request to the chain endpoint failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The chain endpoint answered but the response was unusable
    /// (missing state, failed get-method, malformed stack).
    #[error("chain error: {0}")]
    Chain(String),

    /// A caller-supplied argument was out of range or mis-scaled.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
