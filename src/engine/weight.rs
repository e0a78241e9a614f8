//! Activation weight with overflow detection.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeightError {
    #[error("weight overflow: {num_units} units x {tick_count} ticks exceeds u64")]
    Overflow { num_units: u64, tick_count: u64 },
    #[error("epoch total overflow adding {addend} to {total}")]
    TotalOverflow { total: i64, addend: i64 },
}

/// `num_units x tick_count`, failing instead of wrapping.
pub fn atx_weight(num_units: u64, tick_count: u64) -> Result<u64, WeightError> {
    num_units
        .checked_mul(tick_count)
        .ok_or(WeightError::Overflow {
            num_units,
            tick_count,
        })
}

/// Add to a stored running total, failing instead of wrapping.
pub fn add_to_total(total: i64, addend: i64) -> Result<i64, WeightError> {
    total
        .checked_add(addend)
        .ok_or(WeightError::TotalOverflow { total, addend })
}
