//! Outbound message construction.
//!
//! Turns matched plan entries, sell intents, and cancel requests into
//! fully formed [`OutboundMessage`]s. Order placements ride a token
//! transfer sent to the trader's asset wallet, which the builder
//! resolves through the token master's get-method; cancels address the
//! order-book contract directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::address::Address;
use crate::cell::CellBuilder;
use crate::chain::{ChainReader, OutboundMessage, StackValue};
use crate::codec;
use crate::error::{MarlinError, Result};
use crate::models::{PlanEntry, Side};

/// Native value attached to order-placement transfers, in base units.
pub const ORDER_MESSAGE_VALUE: u128 = 300_000_000;

/// Native value attached to cancel messages, in base units.
pub const CANCEL_MESSAGE_VALUE: u128 = 100_000_000;

/// Token-master get-method resolving an owner's asset wallet.
const METHOD_GET_WALLET: &str = "get_wallet_address";

/// Tracks the last query id issued so every call returns a strictly
/// increasing value even when the wall-clock hasn't advanced.
static LAST_QUERY_ID: AtomicU64 = AtomicU64::new(0);

/// Returns a strictly monotonically-increasing query id with nanosecond
/// resolution.
pub fn next_query_id() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_nanos() as u64;

    let mut prev = LAST_QUERY_ID.load(Ordering::Relaxed);
    loop {
        let id = now.max(prev + 1);
        match LAST_QUERY_ID.compare_exchange_weak(prev, id, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return id,
            Err(actual) => prev = actual,
        }
    }
}

/// Addresses the builder needs to route orders for one venue.
#[derive(Debug, Clone)]
pub struct VenueAddresses {
    /// The order-book contract.
    pub order_book: Address,
    /// Master contract of the stable settlement token.
    pub settlement_master: Address,
    /// Master contract of the index token.
    pub index_master: Address,
    /// The trading account whose wallets carry the funds.
    pub owner: Address,
}

/// Builds wire-ready messages against one venue.
pub struct MessageBuilder<'a, R: ChainReader> {
    reader: &'a R,
    addresses: &'a VenueAddresses,
}

impl<'a, R: ChainReader> MessageBuilder<'a, R> {
    pub fn new(reader: &'a R, addresses: &'a VenueAddresses) -> Self {
        MessageBuilder { reader, addresses }
    }

    /// Builds one transfer per plan entry, all routed through the
    /// owner's settlement wallet (resolved once).
    ///
    /// Buy-side placements carry the venue tag labeled `ask`; see
    /// [`codec::OP_ASK`].
    pub async fn buy_messages(&self, entries: &[PlanEntry]) -> Result<Vec<OutboundMessage>> {
        let wallet = self
            .resolve_wallet(&self.addresses.settlement_master)
            .await?;
        let mut messages = Vec::with_capacity(entries.len());
        for entry in entries {
            let payload = codec::encode_order_payload(Side::Ask, entry.order.price_scaled)?;
            let body = codec::encode_transfer_body(
                next_query_id(),
                entry.order.settlement_amount(),
                &self.addresses.order_book,
                payload,
            )?;
            messages.push(OutboundMessage {
                destination: wallet,
                value: ORDER_MESSAGE_VALUE,
                body: Arc::new(body),
            });
        }
        Ok(messages)
    }

    /// Builds a sell placement: `amount` index base units resting at
    /// `price_scaled`, routed through the owner's index wallet.
    pub async fn sell_message(&self, amount: u128, price_scaled: u32) -> Result<OutboundMessage> {
        let wallet = self.resolve_wallet(&self.addresses.index_master).await?;
        let payload = codec::encode_order_payload(Side::Bid, price_scaled)?;
        let body = codec::encode_transfer_body(
            next_query_id(),
            amount,
            &self.addresses.order_book,
            payload,
        )?;
        Ok(OutboundMessage {
            destination: wallet,
            value: ORDER_MESSAGE_VALUE,
            body: Arc::new(body),
        })
    }

    /// Builds a cancel for the owner's resting order on `side`,
    /// addressed directly to the order-book contract.
    pub fn cancel_message(&self, side: Side) -> Result<OutboundMessage> {
        let order_type = match side {
            Side::Ask => codec::CANCEL_SELL,
            Side::Bid => codec::CANCEL_BUY,
        };
        let body = codec::encode_cancel_body(
            next_query_id(),
            codec::ORDER_PRIORITY,
            order_type,
            &self.addresses.owner,
        )?;
        Ok(OutboundMessage {
            destination: self.addresses.order_book,
            value: CANCEL_MESSAGE_VALUE,
            body: Arc::new(body),
        })
    }

    /// Resolves the owner's wallet for `master` via its get-method.
    async fn resolve_wallet(&self, master: &Address) -> Result<Address> {
        let mut owner_cell = CellBuilder::new();
        owner_cell.store_address(Some(&self.addresses.owner))?;
        let args = [StackValue::Slice(Arc::new(owner_cell.build()))];

        let stack = self
            .reader
            .run_get_method(master, METHOD_GET_WALLET, &args)
            .await?;
        let cell = stack
            .first()
            .and_then(StackValue::as_cell)
            .ok_or_else(|| {
                MarlinError::Chain(format!(
                    "{METHOD_GET_WALLET} returned no address slice"
                ))
            })?;
        let mut slice = crate::cell::CellSlice::new(Arc::clone(cell));
        slice
            .load_address()?
            .ok_or_else(|| MarlinError::Chain(format!("{METHOD_GET_WALLET} returned addr-none")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellSlice;
    use crate::models::Order;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct WalletReader {
        wallet: Address,
    }

    #[async_trait]
    impl ChainReader for WalletReader {
        async fn account_state(&self, _address: &Address) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn run_get_method(
            &self,
            _address: &Address,
            method: &str,
            _args: &[StackValue],
        ) -> Result<Vec<StackValue>> {
            assert_eq!(method, METHOD_GET_WALLET);
            let mut b = CellBuilder::new();
            b.store_address(Some(&self.wallet)).unwrap();
            Ok(vec![StackValue::Slice(Arc::new(b.build()))])
        }
    }

    fn addresses() -> VenueAddresses {
        VenueAddresses {
            order_book: Address::new(0, [1u8; 32]),
            settlement_master: Address::new(0, [2u8; 32]),
            index_master: Address::new(0, [3u8; 32]),
            owner: Address::new(0, [4u8; 32]),
        }
    }

    #[test]
    fn query_ids_are_strictly_monotonic() {
        let mut prev = next_query_id();
        for _ in 0..1_000 {
            let current = next_query_id();
            assert!(current > prev, "query id did not increase");
            prev = current;
        }
    }

    #[tokio::test]
    async fn buy_messages_route_through_the_settlement_wallet() {
        let wallet = Address::new(0, [0xaa; 32]);
        let reader = WalletReader { wallet };
        let addrs = addresses();
        let builder = MessageBuilder::new(&reader, &addrs);

        let entry = PlanEntry {
            order: Order::new(14_000, 1_000_000_000, addrs.owner),
            notional_value: dec!(1.40),
        };
        let messages = builder.buy_messages(&[entry]).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].destination, wallet);
        assert_eq!(messages[0].value, ORDER_MESSAGE_VALUE);

        // The envelope carries the settlement cost and targets the
        // order-book contract.
        let mut s = CellSlice::new(Arc::clone(&messages[0].body));
        assert_eq!(s.load_uint(32).unwrap(), codec::OP_TRANSFER as u64);
        s.load_uint(64).unwrap(); // query id
        assert_eq!(s.load_coins().unwrap(), 1_400_000);
        assert_eq!(s.load_address().unwrap(), Some(addrs.order_book));

        // Forwarded payload carries the buy flow's `ask`-labeled tag.
        let payload = messages[0].body.refs()[0].clone();
        let mut p = CellSlice::new(payload);
        assert_eq!(p.load_uint(32).unwrap(), codec::OP_ASK as u64);
    }

    #[tokio::test]
    async fn sell_message_uses_the_index_wallet_and_bid_tag() {
        let wallet = Address::new(0, [0xbb; 32]);
        let reader = WalletReader { wallet };
        let addrs = addresses();
        let builder = MessageBuilder::new(&reader, &addrs);

        let message = builder.sell_message(2_000_000_000, 15_000).await.unwrap();
        assert_eq!(message.destination, wallet);
        let mut p = CellSlice::new(message.body.refs()[0].clone());
        assert_eq!(p.load_uint(32).unwrap(), codec::OP_BID as u64);
        assert_eq!(p.load_uint(16).unwrap(), codec::ORDER_PRIORITY as u64);
        assert_eq!(p.load_uint(32).unwrap(), 15_000);
    }

    #[tokio::test]
    async fn cancel_targets_the_order_book_directly() {
        let reader = WalletReader {
            wallet: Address::new(0, [0xcc; 32]),
        };
        let addrs = addresses();
        let builder = MessageBuilder::new(&reader, &addrs);

        let message = builder.cancel_message(Side::Bid).unwrap();
        assert_eq!(message.destination, addrs.order_book);
        assert_eq!(message.value, CANCEL_MESSAGE_VALUE);

        let mut s = CellSlice::new(Arc::clone(&message.body));
        assert_eq!(s.load_uint(32).unwrap(), codec::OP_CANCEL as u64);
        s.load_uint(64).unwrap();
        let mut detail = CellSlice::new(s.load_ref().unwrap());
        assert_eq!(detail.load_uint(16).unwrap(), codec::ORDER_PRIORITY as u64);
        assert_eq!(detail.load_uint(4).unwrap(), codec::CANCEL_BUY as u64);
        assert_eq!(detail.load_address().unwrap(), Some(addrs.owner));
    }
}
