//! Shared models for the order-book client.
//!
//! Contains the decoded order types, corridor and reserve readings, and
//! the execution-plan/result types handed back to the calling agent.

pub mod market;
pub mod order;
pub mod plan;

pub use market::{Corridor, MarketOverview, Reserves};
pub use order::{Order, OrderBookSnapshot, Side};
pub use plan::{ExecutionPlan, FillReport, FillStatus, PlanEntry, TradeResult};

/// Fixed-point scale applied to prices on the wire (4 decimal places).
pub const PRICE_SCALE: u32 = 10_000;

/// Decimal places of the two index assets' base units.
pub const INDEX_DECIMALS: u32 = 9;

/// Decimal places of the stable settlement asset's base units.
pub const SETTLEMENT_DECIMALS: u32 = 6;
