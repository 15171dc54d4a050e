//! Order-book state decoding and outbound message encoding.
//!
//! The venue stores its two order queues as price-keyed dictionaries in
//! the contract's data cell. Decoding walks both dictionaries and each
//! price level's continuation chain; encoding produces the order payload,
//! the fungible-token transfer envelope that carries it, and the cancel
//! body.

use std::collections::HashSet;
use std::sync::Arc;

use crate::address::Address;
use crate::boc;
use crate::cell::{Cell, CellBuilder, CellSlice};
use crate::error::{MarlinError, Result};
use crate::models::order::MAX_ORDER_AMOUNT;
use crate::models::{Order, OrderBookSnapshot, Side};

/// Width of the dictionary key: the price scaled by 10,000.
const PRICE_KEY_BITS: usize = 32;

/// Standard fungible-token transfer operation.
pub const OP_TRANSFER: u32 = 0x0f8a7ea5;

/// Venue op tag the contract labels `ask`. Despite the name, this is the
/// tag the buy flow sends; the crossed naming is intentional venue
/// behavior and the byte value is wire-critical. Do not "correct" it.
pub const OP_ASK: u32 = 0x3d5a1c4f;

/// Venue op tag the contract labels `bid`; consumed by the sell flow.
/// Same caveat as [`OP_ASK`]: the value, not the name, is what matters.
pub const OP_BID: u32 = 0x9c77ab52;

/// Venue cancel operation.
pub const OP_CANCEL: u32 = 0x2a6bd1e0;

/// Order-queue priority. The venue accepts a single priority band.
pub const ORDER_PRIORITY: u16 = 1;

/// Fixed forward-gas allowance attached to order transfers, in native
/// base units.
pub const FORWARD_GAS: u128 = 150_000_000;

/// Cancel discriminator for a resting sell order.
pub const CANCEL_SELL: u8 = 1;
/// Cancel discriminator for a resting buy order.
pub const CANCEL_BUY: u8 = 2;

/// Decodes raw order-book contract state into a snapshot.
///
/// Malformed entries are skipped and reported in the snapshot's
/// `decode_error`; only a state that yields zero decodable orders while
/// containing order data is treated as a failed read.
pub fn decode_order_book(raw_state: &[u8]) -> Result<OrderBookSnapshot> {
    let root = boc::parse(raw_state)?;
    let mut slice = CellSlice::new(root);

    // Dictionary index 0 holds asks, index 1 holds bids; each is a
    // presence bit followed by the tree root reference.
    let mut queues: [Option<Arc<Cell>>; 2] = [None, None];
    for queue in queues.iter_mut() {
        *queue = match slice.load_bit() {
            Ok(true) => Some(slice.load_ref().map_err(MarlinError::Cell)?),
            Ok(false) => None,
            Err(e) => return Err(MarlinError::Decode(format!("state root: {e}"))),
        };
    }
    let [asks_root, bids_root] = queues;

    let mut snapshot = OrderBookSnapshot::default();
    let mut errors: Vec<String> = Vec::new();
    let mut any_queue = false;

    for (label, queue, out) in [
        ("ask", asks_root, &mut snapshot.asks),
        ("bid", bids_root, &mut snapshot.bids),
    ] {
        let Some(root) = queue else { continue };
        any_queue = true;
        match crate::dict::parse_dict(root, PRICE_KEY_BITS) {
            Ok(entries) => {
                for entry in entries {
                    walk_price_level(label, entry.key as u32, entry.value, out, &mut errors);
                }
            }
            Err(e) => errors.push(format!("{label} queue: {e}")),
        }
    }

    // Stable sorts keep on-chain iteration order among equal prices.
    snapshot.asks.sort_by_key(|o| o.price_scaled);
    snapshot
        .bids
        .sort_by_key(|o| std::cmp::Reverse(o.price_scaled));

    if any_queue && snapshot.asks.is_empty() && snapshot.bids.is_empty() && !errors.is_empty() {
        return Err(MarlinError::Decode(errors.join("; ")));
    }
    if !errors.is_empty() {
        snapshot.decode_error = Some(errors.join("; "));
    }
    Ok(snapshot)
}

/// Walks one price level's record chain, collecting orders until the
/// chain ends or a malformed record is hit. Malformed records abort only
/// the remainder of their own chain.
fn walk_price_level(
    label: &str,
    price_scaled: u32,
    first: CellSlice,
    out: &mut Vec<Order>,
    errors: &mut Vec<String>,
) {
    // Explicit loop with a visited-reference guard: chains are unbounded
    // in depth and must not recurse or cycle.
    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    seen.insert(first.cell().repr_hash());
    let mut slice = first;
    loop {
        let amount = match slice.load_coins() {
            Ok(a) => a,
            Err(e) => {
                errors.push(format!("{label} {price_scaled}: {e}"));
                return;
            }
        };
        if amount == 0 || amount > MAX_ORDER_AMOUNT {
            errors.push(format!(
                "{label} {price_scaled}: amount {amount} out of range"
            ));
            return;
        }
        let trader = match slice.load_address() {
            Ok(Some(a)) => a,
            Ok(None) => {
                errors.push(format!("{label} {price_scaled}: missing trader address"));
                return;
            }
            Err(e) => {
                errors.push(format!("{label} {price_scaled}: {e}"));
                return;
            }
        };
        out.push(Order::new(price_scaled, amount, trader));

        if slice.remaining_refs() == 0 {
            return;
        }
        let next = match slice.load_ref() {
            Ok(c) => c,
            Err(e) => {
                errors.push(format!("{label} {price_scaled}: {e}"));
                return;
            }
        };
        if !seen.insert(next.repr_hash()) {
            errors.push(format!("{label} {price_scaled}: continuation cycle"));
            return;
        }
        slice = CellSlice::new(next);
    }
}

/// Encodes the order payload forwarded to the venue with a token
/// transfer: side tag, priority, scaled price.
pub fn encode_order_payload(side: Side, price_scaled: u32) -> Result<Cell> {
    let op = match side {
        Side::Ask => OP_ASK,
        Side::Bid => OP_BID,
    };
    let mut b = CellBuilder::new();
    b.store_uint(op as u64, 32)?;
    b.store_uint(ORDER_PRIORITY as u64, 16)?;
    b.store_uint(price_scaled as u64, 32)?;
    Ok(b.build())
}

/// Wraps an order payload in the standard fungible-token transfer
/// envelope addressed to the venue.
///
/// The response destination is deliberately addr-none: the venue keeps
/// excess message value rather than returning it to the sender.
pub fn encode_transfer_body(
    query_id: u64,
    amount: u128,
    destination: &Address,
    forward_payload: Cell,
) -> Result<Cell> {
    let mut b = CellBuilder::new();
    b.store_uint(OP_TRANSFER as u64, 32)?;
    b.store_uint(query_id, 64)?;
    b.store_coins(amount)?;
    b.store_address(Some(destination))?;
    b.store_address(None)?; // response destination: none
    b.store_bit(false)?; // no custom payload
    b.store_coins(FORWARD_GAS)?;
    b.store_bit(true)?; // forward payload in reference
    b.store_ref(Arc::new(forward_payload))?;
    Ok(b.build())
}

/// Encodes a cancel body addressed directly to the order-book contract.
///
/// `order_type` is the venue's 4-bit discriminator: [`CANCEL_SELL`]
/// removes a resting sell, [`CANCEL_BUY`] a resting buy.
pub fn encode_cancel_body(
    query_id: u64,
    priority: u16,
    order_type: u8,
    trader: &Address,
) -> Result<Cell> {
    let mut detail = CellBuilder::new();
    detail.store_uint(priority as u64, 16)?;
    detail.store_uint(order_type as u64, 4)?;
    detail.store_address(Some(trader))?;

    let mut b = CellBuilder::new();
    b.store_uint(OP_CANCEL as u64, 32)?;
    b.store_uint(query_id, 64)?;
    b.store_ref(Arc::new(detail.build()))?;
    Ok(b.build())
}

/// Builds a price level's record chain for an order queue.
///
/// Records at one price are chained head-first through single forward
/// references, mirroring the venue's on-chain layout.
pub fn encode_price_level(orders: &[(u128, Address)]) -> Result<Cell> {
    let mut tail: Option<Arc<Cell>> = None;
    for (amount, trader) in orders.iter().rev() {
        let mut b = CellBuilder::new();
        b.store_coins(*amount)?;
        b.store_address(Some(trader))?;
        if let Some(next) = tail.take() {
            b.store_ref(next)?;
        }
        tail = Some(Arc::new(b.build()));
    }
    match tail {
        Some(cell) => Ok(Cell::clone(&cell)),
        None => Ok(Cell::empty()),
    }
}

/// Assembles raw order-book state bytes from ask and bid queues.
///
/// The inverse of [`decode_order_book`]'s outer layer; used to stage
/// deterministic states in tests and local tooling.
pub fn encode_order_book_state(
    asks: &[(u32, Cell)],
    bids: &[(u32, Cell)],
) -> Result<Vec<u8>> {
    let mut b = CellBuilder::new();
    for levels in [asks, bids] {
        let mut entries: Vec<(u64, Cell)> = levels
            .iter()
            .map(|(price, cell)| (*price as u64, cell.clone()))
            .collect();
        entries.sort_by_key(|&(price, _)| price);
        match crate::dict::build_dict(&entries, PRICE_KEY_BITS)? {
            Some(root) => {
                b.store_bit(true)?;
                b.store_ref(root)?;
            }
            None => b.store_bit(false)?,
        }
    }
    Ok(boc::serialize(&Arc::new(b.build())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trader(byte: u8) -> Address {
        Address::new(0, [byte; 32])
    }

    fn one_level(price: u32, amount: u128, who: u8) -> (u32, Cell) {
        (price, encode_price_level(&[(amount, trader(who))]).unwrap())
    }

    #[test]
    fn decode_collects_and_sorts_both_queues() {
        let asks = vec![
            one_level(14_500, 2_000_000_000, 2),
            one_level(14_000, 1_000_000_000, 1),
        ];
        let bids = vec![
            one_level(13_000, 500_000_000, 3),
            one_level(13_500, 700_000_000, 4),
        ];
        let raw = encode_order_book_state(&asks, &bids).unwrap();

        let snapshot = decode_order_book(&raw).unwrap();
        assert!(snapshot.decode_error.is_none());
        let ask_prices: Vec<u32> = snapshot.asks.iter().map(|o| o.price_scaled).collect();
        let bid_prices: Vec<u32> = snapshot.bids.iter().map(|o| o.price_scaled).collect();
        assert_eq!(ask_prices, vec![14_000, 14_500]);
        assert_eq!(bid_prices, vec![13_500, 13_000]);
        assert_eq!(snapshot.asks[0].amount, 1_000_000_000);
        assert_eq!(snapshot.asks[0].trader, trader(1));
    }

    #[test]
    fn decode_walks_continuation_chains_in_order() {
        let level = encode_price_level(&[
            (1_000_000_000, trader(1)),
            (2_000_000_000, trader(2)),
            (3_000_000_000, trader(3)),
        ])
        .unwrap();
        let raw = encode_order_book_state(&[(14_000, level)], &[]).unwrap();

        let snapshot = decode_order_book(&raw).unwrap();
        assert_eq!(snapshot.asks.len(), 3);
        let amounts: Vec<u128> = snapshot.asks.iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![1_000_000_000, 2_000_000_000, 3_000_000_000]);
    }

    #[test]
    fn decode_empty_state_is_an_empty_book() {
        let raw = encode_order_book_state(&[], &[]).unwrap();
        let snapshot = decode_order_book(&raw).unwrap();
        assert!(snapshot.asks.is_empty());
        assert!(snapshot.bids.is_empty());
        assert!(snapshot.decode_error.is_none());
    }

    #[test]
    fn malformed_record_skips_only_its_chain_tail() {
        // Second record in the chain is truncated: coins length claims
        // more bytes than the cell holds.
        let mut bad = CellBuilder::new();
        bad.store_uint(0xf, 4).unwrap(); // 15-byte amount, no bytes follow
        let mut first = CellBuilder::new();
        first.store_coins(1_000_000_000).unwrap();
        first.store_address(Some(&trader(1))).unwrap();
        first.store_ref(Arc::new(bad.build())).unwrap();

        let good = encode_price_level(&[(2_000_000_000, trader(2))]).unwrap();
        let raw =
            encode_order_book_state(&[(14_000, first.build()), (14_500, good)], &[]).unwrap();

        let snapshot = decode_order_book(&raw).unwrap();
        // The first record of the damaged chain and the whole second
        // level both survive.
        assert_eq!(snapshot.asks.len(), 2);
        assert!(snapshot.decode_error.is_some());
    }

    #[test]
    fn fully_undecodable_state_is_a_read_failure() {
        // A queue whose only record is garbage: non-empty state, zero
        // decodable orders.
        let mut bad = CellBuilder::new();
        bad.store_uint(0xf, 4).unwrap();
        let raw = encode_order_book_state(&[(14_000, bad.build())], &[]).unwrap();
        assert!(matches!(
            decode_order_book(&raw),
            Err(MarlinError::Decode(_))
        ));
    }

    #[test]
    fn oversized_amount_is_malformed() {
        let level = encode_price_level(&[(MAX_ORDER_AMOUNT + 1, trader(1))]).unwrap();
        let raw = encode_order_book_state(&[(14_000, level)], &[]).unwrap();
        assert!(decode_order_book(&raw).is_err());
    }

    #[test]
    fn order_payload_layout() {
        let cell = encode_order_payload(Side::Ask, 14_000).unwrap();
        assert_eq!(cell.bit_len(), 80);
        let mut s = CellSlice::new(Arc::new(cell));
        assert_eq!(s.load_uint(32).unwrap(), OP_ASK as u64);
        assert_eq!(s.load_uint(16).unwrap(), ORDER_PRIORITY as u64);
        assert_eq!(s.load_uint(32).unwrap(), 14_000);
    }

    #[test]
    fn side_tags_are_asymmetric() {
        let ask = encode_order_payload(Side::Ask, 14_000).unwrap();
        let bid = encode_order_payload(Side::Bid, 14_000).unwrap();
        assert_ne!(ask.data(), bid.data());
        assert_ne!(OP_ASK, OP_BID);
    }

    #[test]
    fn decoded_order_payload_reencodes_to_same_bytes() {
        // Round-trip: decode a state, rebuild each order's payload, and
        // check the bytes are stable across decode cycles.
        let asks = vec![
            one_level(14_000, 1_000_000_000, 1),
            one_level(14_500, 2_000_000_000, 2),
        ];
        let raw = encode_order_book_state(&asks, &[]).unwrap();
        let snapshot = decode_order_book(&raw).unwrap();

        for order in &snapshot.asks {
            let once = encode_order_payload(Side::Ask, order.price_scaled).unwrap();
            let twice = encode_order_payload(Side::Ask, order.price_scaled).unwrap();
            assert_eq!(once, twice);
            let mut s = CellSlice::new(Arc::new(once));
            s.load_uint(32).unwrap();
            s.load_uint(16).unwrap();
            assert_eq!(s.load_uint(32).unwrap(), order.price_scaled as u64);
        }
    }

    #[test]
    fn transfer_envelope_layout() {
        let payload = encode_order_payload(Side::Ask, 14_000).unwrap();
        let dest = trader(9);
        let body = encode_transfer_body(42, 1_400_000, &dest, payload.clone()).unwrap();

        let mut s = CellSlice::new(Arc::new(body));
        assert_eq!(s.load_uint(32).unwrap(), OP_TRANSFER as u64);
        assert_eq!(s.load_uint(64).unwrap(), 42);
        assert_eq!(s.load_coins().unwrap(), 1_400_000);
        assert_eq!(s.load_address().unwrap(), Some(dest));
        assert_eq!(s.load_address().unwrap(), None); // response: none
        assert!(!s.load_bit().unwrap()); // no custom payload
        assert_eq!(s.load_coins().unwrap(), FORWARD_GAS);
        assert!(s.load_bit().unwrap()); // payload in ref
        let forwarded = s.load_ref().unwrap();
        assert_eq!(*forwarded, payload);
        assert_eq!(s.remaining_bits(), 0);
    }

    #[test]
    fn cancel_body_is_deterministic() {
        let who = trader(5);
        let a = encode_cancel_body(42, ORDER_PRIORITY, CANCEL_BUY, &who).unwrap();
        let b = encode_cancel_body(42, ORDER_PRIORITY, CANCEL_BUY, &who).unwrap();
        assert_eq!(a, b);

        let a = Arc::new(a);
        let mut s = CellSlice::new(Arc::clone(&a));
        assert_eq!(s.load_uint(32).unwrap(), OP_CANCEL as u64);
        assert_eq!(s.load_uint(64).unwrap(), 42);
        let mut detail = CellSlice::new(s.load_ref().unwrap());
        assert_eq!(detail.load_uint(16).unwrap(), ORDER_PRIORITY as u64);
        assert_eq!(detail.load_uint(4).unwrap(), CANCEL_BUY as u64);
        assert_eq!(detail.load_address().unwrap(), Some(who));
    }
}
