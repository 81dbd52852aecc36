use bigdecimal::BigDecimal;
use num_traits::{One, Signed, Zero};

use crate::error::MathError;
use crate::fixed::fw;

/// Output of a single swap step: where the price landed and what moved.
#[derive(Debug, Clone)]
pub struct SwapStep {
    pub sqrt_price_next: BigDecimal,
    pub amount_in: BigDecimal,
    pub amount_out: BigDecimal,
    pub fee_amount: BigDecimal,
}

/// Token0 owed between two sqrt prices at the given liquidity:
/// `L * (upper - lower) / (lower * upper)`. Argument order does not matter.
pub fn amount0_delta(
    sqrt_a: &BigDecimal,
    sqrt_b: &BigDecimal,
    liquidity: &BigDecimal,
) -> Result<BigDecimal, MathError> {
    let (lower, upper) = if sqrt_a <= sqrt_b {
        (sqrt_a, sqrt_b)
    } else {
        (sqrt_b, sqrt_a)
    };

    let denominator = fw(&(lower * upper));
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    Ok(fw(&(liquidity * (upper - lower) / denominator)))
}

/// Token1 owed between two sqrt prices at the given liquidity:
/// `L * (upper - lower)`. Argument order does not matter.
pub fn amount1_delta(sqrt_a: &BigDecimal, sqrt_b: &BigDecimal, liquidity: &BigDecimal) -> BigDecimal {
    let diff = if sqrt_a <= sqrt_b {
        sqrt_b - sqrt_a
    } else {
        sqrt_a - sqrt_b
    };
    fw(&(liquidity * diff))
}

/// Price after spending `amount_in` of the paid-in token against constant
/// liquidity. Token0 input pushes the price down, token1 input pushes it up.
pub fn next_sqrt_price_from_input(
    sqrt_price: &BigDecimal,
    liquidity: &BigDecimal,
    amount_in: &BigDecimal,
    zero_for_one: bool,
) -> Result<BigDecimal, MathError> {
    if liquidity.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    if zero_for_one {
        // L * sqrtP / (L + in * sqrtP)
        let denominator = liquidity + fw(&(amount_in * sqrt_price));
        Ok(fw(&(liquidity * sqrt_price / denominator)))
    } else {
        // sqrtP + in / L
        Ok(sqrt_price + fw(&(amount_in / liquidity)))
    }
}

/// Price after withdrawing `amount_out` of the paid-out token against
/// constant liquidity. Fails when the requested output exceeds what the
/// in-range reserves can yield.
pub fn next_sqrt_price_from_output(
    sqrt_price: &BigDecimal,
    liquidity: &BigDecimal,
    amount_out: &BigDecimal,
    zero_for_one: bool,
) -> Result<BigDecimal, MathError> {
    if liquidity.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    if zero_for_one {
        // token1 leaves the pool: sqrtP - out / L
        let next = sqrt_price - fw(&(amount_out / liquidity));
        if !next.is_positive() {
            return Err(MathError::SqrtPriceOutOfBounds);
        }
        Ok(next)
    } else {
        // token0 leaves the pool: L * sqrtP / (L - out * sqrtP)
        let denominator = liquidity - fw(&(amount_out * sqrt_price));
        if !denominator.is_positive() {
            return Err(MathError::SqrtPriceOutOfBounds);
        }
        Ok(fw(&(liquidity * sqrt_price / denominator)))
    }
}

/// Computes one swap step toward `sqrt_price_target`.
///
/// Direction is inferred from the target's side of the current price; the
/// sign of `amount_remaining` selects exact-input (positive) or
/// exact-output (negative). The fee is charged on the input amount only:
/// the step first sets aside `fee_pips` of the remaining input, moves the
/// price with the rest, and settles the exact fee afterwards, so
/// `amount_in + fee_amount` never exceeds the remaining input.
pub fn compute_swap_step(
    sqrt_price_current: &BigDecimal,
    sqrt_price_target: &BigDecimal,
    liquidity: &BigDecimal,
    amount_remaining: &BigDecimal,
    fee_pips: &BigDecimal,
) -> Result<SwapStep, MathError> {
    let one = BigDecimal::one();
    if fee_pips >= &one {
        return Err(MathError::DivisionByZero);
    }

    let zero_for_one = sqrt_price_current >= sqrt_price_target;
    let exact_in = !amount_remaining.is_negative();

    let mut amount_in = BigDecimal::zero();
    let mut amount_out = BigDecimal::zero();

    let sqrt_price_next = if exact_in {
        let amount_remaining_less_fee = fw(&(amount_remaining * (&one - fee_pips)));
        amount_in = if zero_for_one {
            amount0_delta(sqrt_price_target, sqrt_price_current, liquidity)?
        } else {
            amount1_delta(sqrt_price_current, sqrt_price_target, liquidity)
        };
        if amount_remaining_less_fee >= amount_in {
            sqrt_price_target.clone()
        } else {
            next_sqrt_price_from_input(
                sqrt_price_current,
                liquidity,
                &amount_remaining_less_fee,
                zero_for_one,
            )?
        }
    } else {
        amount_out = if zero_for_one {
            amount1_delta(sqrt_price_target, sqrt_price_current, liquidity)
        } else {
            amount0_delta(sqrt_price_current, sqrt_price_target, liquidity)?
        };
        let target_out = amount_remaining.abs();
        if target_out >= amount_out {
            sqrt_price_target.clone()
        } else {
            next_sqrt_price_from_output(sqrt_price_current, liquidity, &target_out, zero_for_one)?
        }
    };

    let reached_target = &sqrt_price_next == sqrt_price_target;

    if zero_for_one {
        if !(reached_target && exact_in) {
            amount_in = amount0_delta(&sqrt_price_next, sqrt_price_current, liquidity)?;
        }
        if !(reached_target && !exact_in) {
            amount_out = amount1_delta(&sqrt_price_next, sqrt_price_current, liquidity);
        }
    } else {
        if !(reached_target && exact_in) {
            amount_in = amount1_delta(sqrt_price_current, &sqrt_price_next, liquidity);
        }
        if !(reached_target && !exact_in) {
            amount_out = amount0_delta(sqrt_price_current, &sqrt_price_next, liquidity)?;
        }
    }

    if !exact_in {
        let target_out = amount_remaining.abs();
        if amount_out > target_out {
            amount_out = target_out;
        }
    }

    let fee_amount = if exact_in && !reached_target {
        // the price stopped short of the target, so everything beyond the
        // net input is the fee; this settles the remainder to exactly zero
        amount_remaining - &amount_in
    } else {
        fw(&(&amount_in * fee_pips / (&one - fee_pips)))
    };

    Ok(SwapStep {
        sqrt_price_next,
        amount_in,
        amount_out,
        fee_amount,
    })
}
