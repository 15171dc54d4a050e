//! On-chain order-book client for a two-asset index trading venue.
//!
//! Decodes the venue's binary order queues straight from contract
//! state, validates trading intents against policy guards and the
//! oracle price corridor, plans whole-lot fills greedily, builds the
//! wire-format placement and cancel messages, and submits them
//! sequentially with confirmation tracking.

pub mod address;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod chain;
pub mod client;
pub mod codec;
pub mod config;
pub mod corridor;
pub mod dict;
pub mod error;
pub mod guard;
pub mod matcher;
pub mod models;
pub mod rpc;
pub mod submitter;

pub use client::OrderBookClient;
pub use error::{MarlinError, Result};
