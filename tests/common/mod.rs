//! Shared fakes and fixtures for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use marlin::address::Address;
use marlin::builder::VenueAddresses;
use marlin::cell::CellBuilder;
use marlin::chain::{ChainReader, ChainSender, OutboundMessage, StackValue};
use marlin::codec::{encode_order_book_state, encode_price_level};
use marlin::config::{SubmitConfig, VenueConfig};
use marlin::error::{MarlinError, Result};

pub fn addr(byte: u8) -> Address {
    Address::new(0, [byte; 32])
}

pub fn venue_config() -> VenueConfig {
    VenueConfig {
        addresses: VenueAddresses {
            order_book: addr(1),
            settlement_master: addr(2),
            index_master: addr(3),
            owner: addr(4),
        },
        allowed_callers: vec![42],
        min_buy_value: dec!(1.00),
        min_sell_value: dec!(2.00),
    }
}

pub fn fast_submit_config() -> SubmitConfig {
    SubmitConfig {
        poll_interval: Duration::from_millis(1),
        confirm_timeout: Duration::from_millis(250),
    }
}

/// Raw order-book state with the scenario queues: asks at 1.40 (1 token)
/// and 1.45 (2 tokens), one bid at 1.35.
pub fn scenario_state() -> Vec<u8> {
    let asks = vec![
        (
            14_000,
            encode_price_level(&[(1_000_000_000, addr(0x11))]).unwrap(),
        ),
        (
            14_500,
            encode_price_level(&[(2_000_000_000, addr(0x12))]).unwrap(),
        ),
    ];
    let bids = vec![(
        13_500,
        encode_price_level(&[(1_000_000_000, addr(0x13))]).unwrap(),
    )];
    encode_order_book_state(&asks, &bids).unwrap()
}

/// Canned read-only chain: serves one account state, one price stack,
/// and wallet resolutions.
pub struct FakeChain {
    pub state: Option<Vec<u8>>,
    /// Stack for `get_prices`; `None` makes the read fail.
    pub prices: Option<[i128; 4]>,
    pub wallet: Address,
}

impl FakeChain {
    pub fn with_scenario() -> Self {
        FakeChain {
            state: Some(scenario_state()),
            // 5000 settlement / 3000 index tokens, corridor [1.30, 1.60].
            prices: Some([5_000_000_000, 3_000_000_000_000, 13_000, 16_000]),
            wallet: addr(0xaa),
        }
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn account_state(&self, _address: &Address) -> Result<Option<Vec<u8>>> {
        Ok(self.state.clone())
    }

    async fn run_get_method(
        &self,
        _address: &Address,
        method: &str,
        _args: &[StackValue],
    ) -> Result<Vec<StackValue>> {
        match method {
            "get_prices" => {
                let values = self
                    .prices
                    .ok_or_else(|| MarlinError::Chain("oracle offline".into()))?;
                Ok(values.into_iter().map(StackValue::Int).collect())
            }
            "get_wallet_address" => {
                let mut b = CellBuilder::new();
                b.store_address(Some(&self.wallet)).unwrap();
                Ok(vec![StackValue::Slice(Arc::new(b.build()))])
            }
            other => Err(MarlinError::Chain(format!("unexpected method {other}"))),
        }
    }
}

/// Sender that advances its sequence counter on every send and records
/// each submitted message into a shared log.
pub struct RecordingSender {
    sequence: AtomicU32,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        RecordingSender {
            sequence: AtomicU32::new(100),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handle onto the submission log, usable after the sender has
    /// moved into a client.
    pub fn log(&self) -> Arc<Mutex<Vec<OutboundMessage>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl ChainSender for RecordingSender {
    async fn sequence_number(&self) -> Result<u32> {
        Ok(self.sequence.load(Ordering::SeqCst))
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
