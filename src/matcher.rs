//! Greedy whole-lot matching against the ask queue.

use rust_decimal::Decimal;

use crate::models::{Corridor, ExecutionPlan, Order, PlanEntry};

/// Selects resting asks to fill `target_value` of notional, cheapest
/// first.
///
/// Each ask is taken whole or not at all: consuming entire resting
/// orders bounds per-fill slippage to one order's price, at the cost of
/// over- or under-shooting the target by at most one order's notional.
/// Asks outside the corridor or above `price_ceiling` are rejected, and
/// asks worth less than `min_order_value` are skipped. Selection stops
/// as soon as the accumulated notional reaches the target. An empty plan
/// means no ask qualified; callers treat that as a no-op.
pub fn plan_buy(
    target_value: Decimal,
    asks: &[Order],
    corridor: &Corridor,
    price_ceiling: Option<Decimal>,
    min_order_value: Decimal,
) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();

    for order in asks {
        if plan.total_value >= target_value {
            break;
        }
        if let Some(ceiling) = price_ceiling
            && order.price > ceiling
        {
            continue;
        }
        if !corridor.contains(order.price) {
            continue;
        }
        let notional = order.notional();
        if notional < min_order_value {
            continue;
        }
        plan.total_value += notional;
        plan.entries.push(PlanEntry {
            order: order.clone(),
            notional_value: notional,
        });
    }

    plan
}
