use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};
use tracing::debug;

use crate::error::DexError;
use crate::fixed::{f18, fw};
use crate::ledger::Ledger;
use crate::math::liquidity_math::add_liquidity_delta;
use crate::math::swap_math::compute_swap_step;
use crate::math::tick_bitmap::next_initialized_tick_within_one_word;
use crate::math::tick_math::{
    sqrt_price_to_tick, tick_to_sqrt_price, MAX_SQRT_PRICE, MAX_TICK, MIN_SQRT_PRICE, MIN_TICK,
};
use crate::pool::entity::Pool;
use crate::pool::tick_data::fetch_and_cross_tick;

/// Net result of a swap from the pool's perspective: positive amounts flow
/// into the pool, negative amounts are paid out.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub amount0: BigDecimal,
    pub amount1: BigDecimal,
}

// the top level state of the swap, written back to the pool at the end
struct SwapState {
    // the amount remaining to be swapped in/out of the input/output asset
    amount_specified_remaining: BigDecimal,
    // the amount already swapped out/in of the output/input asset
    amount_calculated: BigDecimal,
    // current sqrt(price)
    sqrt_price: BigDecimal,
    // the tick associated with the current price
    tick: i32,
    // the current liquidity in range
    liquidity: BigDecimal,
    // running fee growth for the token being paid in
    fee_growth_global_x: BigDecimal,
    // protocol's cut of the fees collected by this swap
    protocol_fee: BigDecimal,
}

struct StepComputations {
    // the price at the beginning of the step
    sqrt_price_start: BigDecimal,
    // the next tick to swap to from the current tick in the swap direction
    tick_next: i32,
    // whether tick_next is initialized or not
    initialized: bool,
    // sqrt(price) for the next tick (1/0)
    sqrt_price_next: BigDecimal,
}

/// Executes a swap against the pool, walking initialized ticks until the
/// specified amount is consumed or the price limit is reached.
///
/// `amount_specified` is positive for exact-input, negative for
/// exact-output. The pool is mutated in place and crossed tick records are
/// persisted as the walk proceeds; the caller persists the pool itself.
/// On failure the surrounding ledger transaction discards all writes.
pub fn execute_swap(
    ledger: &mut dyn Ledger,
    pool: &mut Pool,
    amount_specified: BigDecimal,
    zero_for_one: bool,
    sqrt_price_limit: BigDecimal,
) -> Result<SwapOutcome, DexError> {
    if amount_specified.is_zero() {
        return Err(DexError::validation("Swap amount cannot be zero"));
    }

    if zero_for_one {
        if sqrt_price_limit >= pool.sqrt_price || sqrt_price_limit < *MIN_SQRT_PRICE {
            return Err(DexError::validation(format!(
                "sqrtPriceLimit {sqrt_price_limit} must lie between the minimum price and the current price"
            )));
        }
    } else if sqrt_price_limit <= pool.sqrt_price || sqrt_price_limit > *MAX_SQRT_PRICE {
        return Err(DexError::validation(format!(
            "sqrtPriceLimit {sqrt_price_limit} must lie between the current price and the maximum price"
        )));
    }

    let exact_input = amount_specified.is_positive();
    let pool_hash = pool.gen_pool_hash();

    let mut state = SwapState {
        amount_specified_remaining: amount_specified.clone(),
        amount_calculated: BigDecimal::zero(),
        sqrt_price: pool.sqrt_price.clone(),
        tick: pool.tick,
        liquidity: pool.liquidity.clone(),
        fee_growth_global_x: if zero_for_one {
            pool.fee_growth_global0.clone()
        } else {
            pool.fee_growth_global1.clone()
        },
        protocol_fee: BigDecimal::zero(),
    };

    let mut steps = 0u32;
    while !f18(&state.amount_specified_remaining).is_zero() && state.sqrt_price != sqrt_price_limit
    {
        steps += 1;
        let mut step = StepComputations {
            sqrt_price_start: state.sqrt_price.clone(),
            tick_next: 0,
            initialized: false,
            sqrt_price_next: BigDecimal::zero(),
        };

        (step.tick_next, step.initialized) = next_initialized_tick_within_one_word(
            &pool.bitmap,
            state.tick,
            pool.tick_spacing,
            zero_for_one,
            &state.sqrt_price,
        )?;

        if !(MIN_TICK..=MAX_TICK).contains(&step.tick_next) {
            return Err(DexError::insufficient_liquidity());
        }

        step.sqrt_price_next = tick_to_sqrt_price(step.tick_next)?;

        let target = if zero_for_one {
            if step.sqrt_price_next < sqrt_price_limit {
                &sqrt_price_limit
            } else {
                &step.sqrt_price_next
            }
        } else if step.sqrt_price_next > sqrt_price_limit {
            &sqrt_price_limit
        } else {
            &step.sqrt_price_next
        };

        let computed = compute_swap_step(
            &state.sqrt_price,
            target,
            &state.liquidity,
            &state.amount_specified_remaining,
            &pool.fee,
        )?;
        state.sqrt_price = computed.sqrt_price_next;
        let mut fee_amount = computed.fee_amount;

        if exact_input {
            state.amount_specified_remaining =
                &state.amount_specified_remaining - (&computed.amount_in + &fee_amount);
            state.amount_calculated = &state.amount_calculated - &computed.amount_out;
        } else {
            state.amount_specified_remaining =
                &state.amount_specified_remaining + &computed.amount_out;
            state.amount_calculated =
                &state.amount_calculated + (&computed.amount_in + &fee_amount);
        }

        if pool.protocol_fees.is_positive() {
            let delta = f18(&(&fee_amount * &pool.protocol_fees));
            fee_amount = &fee_amount - &delta;
            state.protocol_fee = &state.protocol_fee + &delta;
        }

        if state.liquidity.is_positive() {
            state.fee_growth_global_x =
                &state.fee_growth_global_x + fw(&(&fee_amount / &state.liquidity));
        }

        if state.sqrt_price == step.sqrt_price_next {
            // the step ran all the way to the next tick
            if step.initialized {
                let (outside0, outside1) = if zero_for_one {
                    (&state.fee_growth_global_x, &pool.fee_growth_global1)
                } else {
                    (&pool.fee_growth_global0, &state.fee_growth_global_x)
                };
                let mut liquidity_net =
                    fetch_and_cross_tick(ledger, &pool_hash, step.tick_next, outside0, outside1)?;
                if zero_for_one {
                    liquidity_net = -liquidity_net;
                }
                state.liquidity = add_liquidity_delta(&state.liquidity, &liquidity_net)?;
            }
            state.tick = if zero_for_one {
                step.tick_next - 1
            } else {
                step.tick_next
            };
        } else if state.sqrt_price != step.sqrt_price_start {
            state.tick = sqrt_price_to_tick(&state.sqrt_price)?;
        }
    }

    pool.sqrt_price = state.sqrt_price;
    pool.tick = state.tick;
    pool.liquidity = state.liquidity;
    if zero_for_one {
        pool.fee_growth_global0 = state.fee_growth_global_x;
        pool.protocol_fees_token0 = &pool.protocol_fees_token0 + &state.protocol_fee;
    } else {
        pool.fee_growth_global1 = state.fee_growth_global_x;
        pool.protocol_fees_token1 = &pool.protocol_fees_token1 + &state.protocol_fee;
    }

    debug!(steps, zero_for_one, "swap walk finished");

    let (amount0, amount1) = if zero_for_one == exact_input {
        (
            &amount_specified - &state.amount_specified_remaining,
            state.amount_calculated,
        )
    } else {
        (
            state.amount_calculated,
            &amount_specified - &state.amount_specified_remaining,
        )
    };

    Ok(SwapOutcome { amount0, amount1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{put_object, try_get_object, MemoryLedger};
    use crate::pool::tick_data::{tick_key, TickData};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn pool_with_liquidity(liquidity: &str) -> Pool {
        let mut pool = Pool::new("TOKA", "TOKB", dec("0.003"), dec("1")).unwrap();
        pool.liquidity = dec(liquidity);
        pool
    }

    /// Seeds an initialized tick with the given net liquidity so swaps can
    /// cross it.
    fn seed_tick(ledger: &mut MemoryLedger, pool: &mut Pool, tick: i32, net: &str) {
        let mut data = TickData::new(
            pool.gen_pool_hash(),
            tick,
            pool.tick,
            &pool.fee_growth_global0,
            &pool.fee_growth_global1,
        );
        data.liquidity_net = dec(net);
        data.liquidity_gross = dec(net).abs();
        data.initialised = true;
        put_object(ledger, &data).unwrap();
        pool.flip_tick(tick).unwrap();
    }

    // ------------------------- validation -------------------------

    #[test]
    fn zero_amount_is_rejected() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");
        let err = execute_swap(&mut ledger, &mut pool, dec("0"), true, dec("0.9")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));
    }

    #[test]
    fn price_limit_on_wrong_side_is_rejected() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");

        // limit above current price while selling token0
        let err =
            execute_swap(&mut ledger, &mut pool, dec("10"), true, dec("1.1")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));

        // limit below current price while selling token1
        let err =
            execute_swap(&mut ledger, &mut pool, dec("10"), false, dec("0.9")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));
    }

    // ------------------------- single-step swaps -------------------------

    #[test]
    fn exact_input_without_crossing_consumes_amount_and_accrues_fees() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");

        let outcome =
            execute_swap(&mut ledger, &mut pool, dec("1000"), true, dec("0.9")).unwrap();

        // the pool takes the full input including the fee
        assert_eq!(outcome.amount0, dec("1000"));
        // and pays out slightly less than the net input
        assert_eq!(f18(&outcome.amount1), dec("-996.999999999999005991"));

        // no tick was crossed: liquidity is untouched and the price moved
        // down a hair, to just inside the tick below the start boundary
        assert_eq!(pool.liquidity, dec("1000000000000000000"));
        assert_eq!(pool.tick, -1);
        assert!(pool.sqrt_price < dec("1"));
        assert!(pool.sqrt_price > dec("0.9999"));

        // fee growth is fee / liquidity
        assert_eq!(
            pool.fee_growth_global0,
            dec("0.0000000000000000029999999999999999999999")
        );
        assert!(pool.fee_growth_global1.is_zero());
    }

    #[test]
    fn exact_output_pays_out_requested_amount() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");

        let outcome =
            execute_swap(&mut ledger, &mut pool, dec("-500"), true, dec("0.9")).unwrap();

        assert_eq!(outcome.amount1, dec("-500"));
        // input covers the closed-form amount plus the fee
        assert!(outcome.amount0 > dec("500"));
        assert!(outcome.amount0 < dec("502"));
    }

    #[test]
    fn hitting_the_price_limit_leaves_residue() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");

        // a limit so close that the requested amount cannot fit under it
        let limit = dec("0.9999999999999999");
        let outcome = execute_swap(
            &mut ledger,
            &mut pool,
            dec("1000000"),
            true,
            limit.clone(),
        )
        .unwrap();

        assert_eq!(pool.sqrt_price, limit);
        // only the portion below the limit was consumed
        assert!(outcome.amount0 > dec("0"));
        assert!(outcome.amount0 < dec("1000000"));

        // fee growth reflects the consumed portion only
        let max_growth = dec("1000000") * dec("0.003") / dec("1000000000000000000");
        assert!(pool.fee_growth_global0 < max_growth);
        assert!(pool.fee_growth_global0.is_positive());
    }

    // ------------------------- tick crossing -------------------------

    #[test]
    fn crossing_an_initialized_tick_adjusts_liquidity_and_tick() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");
        // net is negative as stored at the upper end of a range below the
        // current price; crossing downward negates it into the pool
        seed_tick(&mut ledger, &mut pool, -60, "-500000000000000000");

        let limit = tick_to_sqrt_price(-120).unwrap();
        let outcome = execute_swap(
            &mut ledger,
            &mut pool,
            dec("3200000000000000"),
            true,
            limit,
        )
        .unwrap();

        assert_eq!(pool.liquidity, dec("1500000000000000000"));
        assert!(pool.tick <= -61);
        assert!(pool.tick > -120);
        assert_eq!(outcome.amount0, dec("3200000000000000"));
        assert!(outcome.amount1.is_negative());

        // the crossed record's outside values flipped against the fee
        // growth accrued up to the moment of crossing
        let crossed = try_get_object::<TickData>(&ledger, &tick_key(&pool.gen_pool_hash(), -60))
            .unwrap()
            .unwrap();
        assert!(crossed.fee_growth_outside0.is_positive());
        assert!(crossed.fee_growth_outside0 < pool.fee_growth_global0);
        assert!(crossed.fee_growth_outside1.is_zero());

        // tick/price agreement after the walk
        assert!(tick_to_sqrt_price(pool.tick).unwrap() <= pool.sqrt_price);
        assert!(pool.sqrt_price < tick_to_sqrt_price(pool.tick + 1).unwrap());
    }

    #[test]
    fn crossing_upward_uses_positive_net() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");
        seed_tick(&mut ledger, &mut pool, 60, "500000000000000000");

        let limit = tick_to_sqrt_price(120).unwrap();
        execute_swap(
            &mut ledger,
            &mut pool,
            dec("3200000000000000"),
            false,
            limit,
        )
        .unwrap();

        assert_eq!(pool.liquidity, dec("1500000000000000000"));
        assert!(pool.tick >= 60);
    }

    // ------------------------- failure paths -------------------------

    #[test]
    fn running_out_of_ticks_is_insufficient_liquidity() {
        let mut ledger = MemoryLedger::new();
        // empty pool: no liquidity anywhere, nothing initialized
        let mut pool = pool_with_liquidity("0");
        let before = pool.clone();

        let err = execute_swap(
            &mut ledger,
            &mut pool,
            dec("1000"),
            true,
            MIN_SQRT_PRICE.clone(),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Conflict - Not enough liquidity available in pool"
        );
        // nothing was persisted and the ledger never saw a write
        assert!(ledger.is_empty());
        assert_eq!(pool.fee_growth_global0, before.fee_growth_global0);
        assert_eq!(pool.protocol_fees_token0, before.protocol_fees_token0);
    }

    // ------------------------- protocol fee -------------------------

    #[test]
    fn protocol_fee_diverts_a_fraction_of_fees() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");
        pool.configure_protocol_fee(&dec("0.25")).unwrap();

        execute_swap(&mut ledger, &mut pool, dec("1000"), true, dec("0.9")).unwrap();

        // fee is ~3; a quarter goes to the protocol, the rest to growth
        assert_eq!(
            f18(&pool.protocol_fees_token0),
            dec("0.749999999999999999")
        );
        assert_eq!(
            f18(&(&pool.fee_growth_global0 * dec("1000000000000000000"))),
            dec("2.25")
        );
        assert!(pool.protocol_fees_token1.is_zero());
    }

    #[test]
    fn fee_growth_only_moves_for_the_paid_in_token() {
        let mut ledger = MemoryLedger::new();
        let mut pool = pool_with_liquidity("1000000000000000000");

        execute_swap(&mut ledger, &mut pool, dec("1000"), false, dec("1.1")).unwrap();

        assert!(pool.fee_growth_global1.is_positive());
        assert!(pool.fee_growth_global0.is_zero());
    }
}
