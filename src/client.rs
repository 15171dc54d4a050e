//! Tool-facing client for the order-book venue.
//!
//! One instance per venue wires the read-only chain client, the signer-
//! backed sender, and the trading policy together. Every public
//! operation returns a structured, serializable result; the companion
//! [`agent_payload`] helper renders results (or capped error
//! descriptions) for the calling agent, so no error ever escapes a tool
//! boundary unstructured.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::builder::MessageBuilder;
use crate::chain::{ChainReader, ChainSender};
use crate::codec;
use crate::config::{SubmitConfig, VenueConfig};
use crate::corridor::{read_corridor, read_reserves};
use crate::error::{MarlinError, Result};
use crate::guard;
use crate::matcher::plan_buy;
use crate::models::{
    Corridor, FillReport, FillStatus, MarketOverview, OrderBookSnapshot, PRICE_SCALE, Side,
};
use crate::submitter::Submitter;

/// Longest error description handed to the calling agent.
const MAX_AGENT_ERROR_LEN: usize = 500;

/// The order-book client: guards, matching, message building, and
/// sequential submission behind tool-shaped operations.
pub struct OrderBookClient<R: ChainReader, S: ChainSender> {
    reader: R,
    submitter: Submitter<S>,
    venue: VenueConfig,
}

impl<R: ChainReader, S: ChainSender> OrderBookClient<R, S> {
    pub fn new(reader: R, sender: S, venue: VenueConfig, submit: SubmitConfig) -> Self {
        OrderBookClient {
            reader,
            submitter: Submitter::new(sender)
                .with_timing(submit.poll_interval, submit.confirm_timeout),
            venue,
        }
    }

    /// Corridor plus reserves. The two reads are independent and issued
    /// concurrently; only submissions must serialize.
    pub async fn market_overview(&self) -> Result<MarketOverview> {
        let order_book = &self.venue.addresses.order_book;
        let (corridor, reserves) = futures_util::future::try_join(
            read_corridor(&self.reader, order_book),
            read_reserves(&self.reader, order_book),
        )
        .await?;
        Ok(MarketOverview { corridor, reserves })
    }

    /// Decodes a fresh order-book snapshot from contract state.
    pub async fn order_book(&self) -> Result<OrderBookSnapshot> {
        let raw = self
            .reader
            .account_state(&self.venue.addresses.order_book)
            .await?
            .ok_or_else(|| {
                MarlinError::Chain("order-book contract has no state".to_string())
            })?;
        let snapshot = codec::decode_order_book(&raw)?;
        if let Some(detail) = &snapshot.decode_error {
            warn!(detail = %detail, "order book decoded with skipped entries");
        }
        Ok(snapshot)
    }

    /// Fills up to `target_value` of notional against the ask queue.
    ///
    /// Guard checks run first and reject with a [`GuardViolation`]
    /// error; a guardable request then matches, builds one transfer per
    /// selected ask, and submits them sequentially. An empty plan is a
    /// no-op reported as [`FillStatus::NoMatch`].
    pub async fn fill_buy(
        &self,
        caller_id: i64,
        target_value: Decimal,
        price_ceiling: Option<Decimal>,
    ) -> Result<FillReport> {
        guard::assert_owner(caller_id, &self.venue.allowed_callers)?;
        guard::assert_minimum_value(target_value, self.venue.min_buy_value, "Buy fill")?;

        let corridor = self.corridor_or_unavailable().await;
        guard::assert_corridor_available(&corridor, "Buy fill")?;

        let snapshot = self.order_book().await?;
        let plan = plan_buy(
            target_value,
            &snapshot.asks,
            &corridor,
            price_ceiling,
            self.venue.min_buy_value,
        );
        if plan.is_empty() {
            info!(%target_value, "no resting ask qualified for the fill");
            return Ok(FillReport {
                status: FillStatus::NoMatch,
                plan: Vec::new(),
                results: Vec::new(),
                total_value: Decimal::ZERO,
            });
        }
        info!(
            orders = plan.entries.len(),
            total = %plan.total_value,
            "executing buy plan"
        );

        let builder = MessageBuilder::new(&self.reader, &self.venue.addresses);
        let messages = builder.buy_messages(&plan.entries).await?;
        let results = self.submitter.submit(&messages).await;

        Ok(FillReport {
            status: FillReport::status_from(&results),
            total_value: plan.total_value,
            plan: plan.entries,
            results,
        })
    }

    /// Places a resting sell: `amount` whole index tokens at `price`.
    ///
    /// Sell-side guards, in order: owner, minimum value (a higher floor
    /// than buys), corridor membership of the quoted price.
    pub async fn place_sell(
        &self,
        caller_id: i64,
        amount: Decimal,
        price: Decimal,
    ) -> Result<FillReport> {
        guard::assert_owner(caller_id, &self.venue.allowed_callers)?;
        let notional = amount * price;
        guard::assert_minimum_value(notional, self.venue.min_sell_value, "Sell order")?;

        let corridor = self.corridor_or_unavailable().await;
        guard::assert_in_corridor(price, &corridor, "Sell order")?;

        let price_scaled = scale_price(price)?;
        let base_amount = index_base_units(amount)?;

        let builder = MessageBuilder::new(&self.reader, &self.venue.addresses);
        let message = builder.sell_message(base_amount, price_scaled).await?;
        info!(%amount, %price, "submitting sell placement");
        let results = self.submitter.submit(std::slice::from_ref(&message)).await;

        Ok(FillReport {
            status: FillReport::status_from(&results),
            plan: Vec::new(),
            results,
            total_value: notional,
        })
    }

    /// Cancels the owner's resting order on `side`.
    pub async fn cancel_order(&self, caller_id: i64, side: Side) -> Result<FillReport> {
        guard::assert_owner(caller_id, &self.venue.allowed_callers)?;

        let builder = MessageBuilder::new(&self.reader, &self.venue.addresses);
        let message = builder.cancel_message(side)?;
        info!(?side, "submitting cancel");
        let results = self.submitter.submit(std::slice::from_ref(&message)).await;

        Ok(FillReport {
            status: FillReport::status_from(&results),
            plan: Vec::new(),
            results,
            total_value: Decimal::ZERO,
        })
    }

    /// Reads the corridor, degrading a failed read to "unavailable" so
    /// the guards block the trade while the cause is still logged.
    async fn corridor_or_unavailable(&self) -> Corridor {
        match read_corridor(&self.reader, &self.venue.addresses.order_book).await {
            Ok(corridor) => corridor,
            Err(e) => {
                warn!(error = %e, "corridor read failed; blocking trades");
                Corridor::unavailable()
            }
        }
    }
}

/// Converts a decimal price to the wire's fixed-point form.
fn scale_price(price: Decimal) -> Result<u32> {
    let scaled = price * Decimal::from(PRICE_SCALE);
    if scaled <= Decimal::ZERO || !scaled.fract().is_zero() {
        return Err(MarlinError::InvalidInput(format!(
            "price {price} must be positive with at most 4 decimal places"
        )));
    }
    scaled.to_u32().ok_or_else(|| {
        MarlinError::InvalidInput(format!("price {price} exceeds the wire range"))
    })
}

/// Converts a whole-token amount to 9-decimal base units.
fn index_base_units(amount: Decimal) -> Result<u128> {
    let base = amount * Decimal::from(1_000_000_000u64);
    if base <= Decimal::ZERO || !base.fract().is_zero() {
        return Err(MarlinError::InvalidInput(format!(
            "amount {amount} must be positive with at most 9 decimal places"
        )));
    }
    base.to_u128().ok_or_else(|| {
        MarlinError::InvalidInput(format!("amount {amount} exceeds the supported range"))
    })
}

/// Renders a tool outcome for the calling agent: either the serialized
/// result or a structured error with a capped description.
pub fn agent_payload<T: Serialize>(outcome: &Result<T>) -> serde_json::Value {
    match outcome {
        Ok(value) => json!({ "ok": true, "result": value }),
        Err(MarlinError::Guard(violation)) => json!({
            "ok": false,
            "code": violation.code,
            "error": cap(&violation.message),
        }),
        Err(other) => json!({ "ok": false, "error": cap(&other.to_string()) }),
    }
}

fn cap(message: &str) -> String {
    if message.len() <= MAX_AGENT_ERROR_LEN {
        return message.to_string();
    }
    let mut end = MAX_AGENT_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &message[..end])
}
