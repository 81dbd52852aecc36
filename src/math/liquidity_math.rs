use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};

use crate::error::MathError;
use crate::math::swap_math::{amount0_delta, amount1_delta};

/// Applies a signed liquidity change, failing if active liquidity would
/// drop below zero.
pub fn add_liquidity_delta(
    liquidity: &BigDecimal,
    delta: &BigDecimal,
) -> Result<BigDecimal, MathError> {
    let updated = liquidity + delta;
    if updated.is_negative() {
        return Err(MathError::NegativeLiquidity);
    }
    Ok(updated)
}

/// Token amounts a position of `liquidity` over `[lower, upper]` holds at
/// the current price: entirely token0 below the range, entirely token1
/// above it, a split of both inside it.
pub fn amounts_for_liquidity(
    sqrt_price_current: &BigDecimal,
    sqrt_price_lower: &BigDecimal,
    sqrt_price_upper: &BigDecimal,
    liquidity: &BigDecimal,
) -> Result<(BigDecimal, BigDecimal), MathError> {
    if sqrt_price_current <= sqrt_price_lower {
        let amount0 = amount0_delta(sqrt_price_lower, sqrt_price_upper, liquidity)?;
        Ok((amount0, BigDecimal::zero()))
    } else if sqrt_price_current < sqrt_price_upper {
        let amount0 = amount0_delta(sqrt_price_current, sqrt_price_upper, liquidity)?;
        let amount1 = amount1_delta(sqrt_price_lower, sqrt_price_current, liquidity);
        Ok((amount0, amount1))
    } else {
        let amount1 = amount1_delta(sqrt_price_lower, sqrt_price_upper, liquidity);
        Ok((BigDecimal::zero(), amount1))
    }
}
