use alloy_primitives::U256;
use bigdecimal::BigDecimal;

use crate::error::MathError;
use crate::math::tick_math::{tick_to_sqrt_price, MAX_TICK, MIN_TICK};
use crate::FastMap;
use crate::U256_1;

/// Maps a compressed tick (tick / spacing) into the `(word, bit)`
/// coordinates of the sparse 256-bit bitmap.
pub fn position(compressed: i32) -> (i16, u8) {
    ((compressed >> 8) as i16, (compressed & 0xff) as u8)
}

/// Returns the bitmap word stored at `word`, or zero if absent.
pub fn get_word(bitmap: &FastMap<i16, U256>, word: i16) -> U256 {
    *bitmap.get(&word).unwrap_or(&U256::ZERO)
}

/// Toggles the initialized flag of a tick. The tick must be aligned to the
/// pool's spacing.
pub fn flip_tick(
    bitmap: &mut FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
) -> Result<(), MathError> {
    if tick % tick_spacing != 0 {
        return Err(MathError::UnalignedTick);
    }

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let mask = U256_1 << bit_pos;
    let word = get_word(bitmap, word_pos);
    bitmap.insert(word_pos, word ^ mask);
    Ok(())
}

fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(255 - x.leading_zeros() as u8)
}

fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(x.trailing_zeros() as u8)
}

/// Searches the 256-bit word containing `tick` for the closest initialized
/// tick in the direction of travel: at or below the current compressed
/// tick when `lte`, strictly above it otherwise.
///
/// Returns the candidate tick and whether it is actually initialized; when
/// the word holds no candidate the word-boundary tick comes back with
/// `false`, bounding the caller's work per call to one word. `sqrt_price`
/// is the price the caller is walking from; a price below the compressed
/// tick's own boundary means tick and price have drifted apart and the
/// scan refuses to continue.
pub fn next_initialized_tick_within_one_word(
    bitmap: &FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
    sqrt_price: &BigDecimal,
) -> Result<(i32, bool), MathError> {
    let compressed = tick.div_euclid(tick_spacing);

    if lte {
        let anchor_tick = compressed * tick_spacing;
        if (MIN_TICK..=MAX_TICK).contains(&anchor_tick)
            && sqrt_price < &tick_to_sqrt_price(anchor_tick)?
        {
            return Err(MathError::SqrtPriceOutOfBounds);
        }

        let (word_pos, bit_pos) = position(compressed);
        // all bits at or below bit_pos
        let mask = (U256_1 << bit_pos) - U256_1 + (U256_1 << bit_pos);
        let masked = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();
        let next = if initialized {
            (compressed - (bit_pos - most_significant_bit(masked)?) as i32) * tick_spacing
        } else {
            (compressed - bit_pos as i32) * tick_spacing
        };
        Ok((next, initialized))
    } else {
        let (word_pos, bit_pos) = position(compressed + 1);
        // all bits at or above bit_pos
        let mask = ((U256_1 << bit_pos) - U256_1) ^ U256::MAX;
        let masked = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();
        let next = if initialized {
            (compressed + 1 + (least_significant_bit(masked)? - bit_pos) as i32) * tick_spacing
        } else {
            (compressed + 1 + (255u8 - bit_pos) as i32) * tick_spacing
        };
        Ok((next, initialized))
    }
}
