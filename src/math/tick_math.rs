use bigdecimal::BigDecimal;
use num_traits::One;
use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::error::MathError;
use crate::fixed::fw;

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = -MIN_TICK;

/// `sqrt(1.0001)^(2^k)` for `k = 0..20`, each truncated to the working
/// scale. Iterated multiplication over this table evaluates
/// `1.0001^(tick/2)` for any tick magnitude below 2^20.
const SQRT_BASE_POWERS: [&str; 20] = [
    "1.0000499987500624960940234169937986972154",
    "1.0001000000000000000000000000000000000000",
    "1.0002000100000000000000000000000000000000",
    "1.0004000600040001000000000000000000000000",
    "1.0008002800560070005600280008000100000000",
    "1.0016012005601820436880091441287114408008",
    "1.0032049649635980146665286908110552525144",
    "1.0064202017276139201565339084094192727249",
    "1.0128816224454510970780956319350055709441",
    "1.0259291810877293436587086085789658613926",
    "1.0525306846073389483865893703729238363631",
    "1.1078208420399936138992158110788139883043",
    "1.2272670180582004820505038150908088298815",
    "1.5061843336134673881079559811991517204784",
    "2.2685912468226448269256098593436072401712",
    "5.1465062451603222225379917515038639824535",
    "26.4865265314741986640338118127857696049824",
    "701.5360877024866449530174884937944352521457",
    "492152.8823489110336336838617783549950172012121",
    "242214459604.3410656505717990935397830522077856447896",
];

static POWERS: Lazy<Vec<BigDecimal>> = Lazy::new(|| {
    SQRT_BASE_POWERS
        .iter()
        .map(|s| BigDecimal::from_str(s).expect("power table constant parses"))
        .collect()
});

pub static MIN_SQRT_PRICE: Lazy<BigDecimal> =
    Lazy::new(|| tick_to_sqrt_price(MIN_TICK).expect("minimum tick is in range"));

pub static MAX_SQRT_PRICE: Lazy<BigDecimal> =
    Lazy::new(|| tick_to_sqrt_price(MAX_TICK).expect("maximum tick is in range"));

/// Returns the square-root price at a tick index, `1.0001^(tick/2)`,
/// truncated to the working scale after every step so the result is a pure
/// function of the constant table.
pub fn tick_to_sqrt_price(tick: i32) -> Result<BigDecimal, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfBounds);
    }

    let half_ticks = tick.unsigned_abs();
    let mut ratio = BigDecimal::one();
    for (bit, power) in POWERS.iter().enumerate() {
        if half_ticks & (1u32 << bit) != 0 {
            ratio = fw(&(&ratio * power));
        }
    }

    if tick < 0 {
        ratio = fw(&(BigDecimal::one() / &ratio));
    }

    Ok(ratio)
}

/// Returns the unique tick `t` with
/// `tick_to_sqrt_price(t) <= sqrt_price < tick_to_sqrt_price(t + 1)`.
///
/// Binary search over the monotonic forward mapping; both mappings then
/// agree exactly on boundary prices, which the swap loop relies on when it
/// re-derives the tick mid-step.
pub fn sqrt_price_to_tick(sqrt_price: &BigDecimal) -> Result<i32, MathError> {
    if sqrt_price < &*MIN_SQRT_PRICE || sqrt_price > &*MAX_SQRT_PRICE {
        return Err(MathError::SqrtPriceOutOfBounds);
    }

    let mut low = MIN_TICK;
    let mut high = MAX_TICK;
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if &tick_to_sqrt_price(mid)? <= sqrt_price {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}
