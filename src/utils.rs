//! Utility functions for identifiers and money rounding

use rust_decimal::{Decimal, RoundingStrategy};
use uuid7::uuid7;

// uuid v7 strings sort by creation time
pub fn new_audit_id() -> String {
    uuid7().to_string()
}

/// Rounds a monetary or percentage figure to two decimal places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
