//! External chain collaborators.
//!
//! The venue is reached through two narrow seams: a read-only query
//! client and a signer-backed sender. Both are traits so the trading
//! logic can be exercised against in-memory fakes; the signer itself
//! (key handling, message wrapping) stays outside this crate.

use std::sync::Arc;

use async_trait::async_trait;

use crate::address::Address;
use crate::cell::Cell;
use crate::error::Result;

/// A value on a get-method result stack.
#[derive(Debug, Clone)]
pub enum StackValue {
    /// An integer entry.
    Int(i128),
    /// A cell entry.
    Cell(Arc<Cell>),
    /// A slice entry (carried as its underlying cell).
    Slice(Arc<Cell>),
}

impl StackValue {
    /// The integer payload, if this entry is one.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            StackValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The cell payload of a cell or slice entry.
    pub fn as_cell(&self) -> Option<&Arc<Cell>> {
        match self {
            StackValue::Cell(c) | StackValue::Slice(c) => Some(c),
            StackValue::Int(_) => None,
        }
    }
}

/// A fully formed message ready for signing and submission.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// The account the message is addressed to.
    pub destination: Address,
    /// Native value attached, in base units.
    pub value: u128,
    /// The message body.
    pub body: Arc<Cell>,
}

/// Read-only chain queries.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetches an account's raw data cell as serialized bytes, or `None`
    /// for an uninitialized account.
    async fn account_state(&self, address: &Address) -> Result<Option<Vec<u8>>>;

    /// Invokes a read-only get-method and returns its result stack.
    async fn run_get_method(
        &self,
        address: &Address,
        method: &str,
        args: &[StackValue],
    ) -> Result<Vec<StackValue>>;
}

/// Signed message submission for a single signing key.
///
/// One signing key owns one mutable sequence counter; implementations
/// are expected to be driven sequentially by the submitter and must not
/// be shared across concurrent submitters.
#[async_trait]
pub trait ChainSender: Send + Sync {
    /// Reads the signing wallet's current outgoing sequence number.
    async fn sequence_number(&self) -> Result<u32>;

    /// Signs and broadcasts a message. Returns once the network accepted
    /// the submission, not once it is confirmed.
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}
