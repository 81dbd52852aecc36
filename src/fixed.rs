//! Fixed-scale decimal helpers.
//!
//! All token amounts and fee accumulators are arbitrary-precision decimals.
//! Two scales matter: the canonical scale of 18 fractional digits used for
//! anything that leaves the engine (persisted amounts, transfers, the
//! swap-loop termination test), and a wider working scale applied after
//! every division so intermediate quotients stay deterministic instead of
//! growing without bound. Multiplication is exact and only truncated where
//! a result feeds further divisions.

use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{Signed, Zero};

use crate::error::DexError;

/// Fractional digits of the canonical on-ledger representation.
pub const CANONICAL_SCALE: i64 = 18;

/// Fractional digits kept on intermediate quotients and sqrt prices.
pub const WORKING_SCALE: i64 = 40;

/// Truncates toward zero to the canonical scale. Comparisons of remaining
/// swap amounts against zero go through this so division dust below 1e-18
/// cannot keep the swap loop alive.
pub fn f18(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(CANONICAL_SCALE, RoundingMode::Down)
}

/// Truncates toward zero to the working scale.
pub fn fw(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(WORKING_SCALE, RoundingMode::Down)
}

/// Rejects negative values with a validation failure naming the field.
pub fn require_non_negative(name: &str, value: &BigDecimal) -> Result<(), DexError> {
    if value.is_negative() {
        return Err(DexError::validation(format!(
            "{name} must not be negative, got {value}"
        )));
    }
    Ok(())
}

/// Rejects zero or negative values with a validation failure naming the field.
pub fn require_positive(name: &str, value: &BigDecimal) -> Result<(), DexError> {
    if value.is_zero() || value.is_negative() {
        return Err(DexError::validation(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}
