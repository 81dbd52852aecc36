use alloy_primitives::{hex, keccak256, U256};
use bigdecimal::BigDecimal;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{DexError, MathError};
use crate::fixed::require_non_negative;
use crate::ledger::{composite_key, ChainObject};
use crate::math::tick_bitmap;
use crate::math::tick_math::{sqrt_price_to_tick, MAX_SQRT_PRICE, MIN_SQRT_PRICE};
use crate::FastMap;

/// Supported fee tiers and the tick spacing each one implies.
static FEE_TIERS: Lazy<Vec<(BigDecimal, i32)>> = Lazy::new(|| {
    vec![
        (BigDecimal::from_str("0.0005").unwrap(), 10),
        (BigDecimal::from_str("0.003").unwrap(), 60),
        (BigDecimal::from_str("0.01").unwrap(), 200),
    ]
});

/// Tick spacing for a fee tier; unknown tiers are a validation failure.
pub fn tick_spacing_for_fee(fee: &BigDecimal) -> Result<i32, DexError> {
    FEE_TIERS
        .iter()
        .find(|(tier, _)| tier == fee)
        .map(|(_, spacing)| *spacing)
        .ok_or_else(|| DexError::validation(format!("Unsupported fee tier {fee}")))
}

/// The pool chain object: reserves-side state for one `(token0, token1,
/// fee)` market. Amount-like fields are canonical decimals; the sqrt price
/// carries the working scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub token0: String,
    pub token1: String,
    pub fee: BigDecimal,
    pub tick_spacing: i32,
    pub sqrt_price: BigDecimal,
    pub tick: i32,
    pub liquidity: BigDecimal,
    pub fee_growth_global0: BigDecimal,
    pub fee_growth_global1: BigDecimal,
    pub protocol_fees: BigDecimal,
    pub protocol_fees_token0: BigDecimal,
    pub protocol_fees_token1: BigDecimal,
    #[serde(with = "bitmap_serde")]
    pub bitmap: FastMap<i16, U256>,
}

impl ChainObject for Pool {
    const INDEX_KEY: &'static str = "DEXPL";

    fn key_parts(&self) -> Vec<String> {
        vec![
            self.token0.clone(),
            self.token1.clone(),
            self.fee.to_string(),
        ]
    }
}

/// Composite key of the pool for a token pair and fee tier.
pub fn pool_key(token0: &str, token1: &str, fee: &BigDecimal) -> String {
    composite_key(Pool::INDEX_KEY, &[token0, token1, &fee.to_string()])
}

impl Pool {
    /// Creates a pool at an initial price. Token keys must already be in
    /// canonical order; the current tick is derived from the price.
    pub fn new(
        token0: impl Into<String>,
        token1: impl Into<String>,
        fee: BigDecimal,
        initial_sqrt_price: BigDecimal,
    ) -> Result<Self, DexError> {
        let token0 = token0.into();
        let token1 = token1.into();
        if token0 >= token1 {
            return Err(DexError::validation(format!(
                "Token0 must sort before token1, got {token0} / {token1}"
            )));
        }

        let tick_spacing = tick_spacing_for_fee(&fee)?;

        if initial_sqrt_price < *MIN_SQRT_PRICE || initial_sqrt_price > *MAX_SQRT_PRICE {
            return Err(DexError::validation(format!(
                "Initial sqrt price {initial_sqrt_price} out of bounds"
            )));
        }
        let tick = sqrt_price_to_tick(&initial_sqrt_price)?;

        Ok(Pool {
            token0,
            token1,
            fee,
            tick_spacing,
            sqrt_price: initial_sqrt_price,
            tick,
            liquidity: BigDecimal::zero(),
            fee_growth_global0: BigDecimal::zero(),
            fee_growth_global1: BigDecimal::zero(),
            protocol_fees: BigDecimal::zero(),
            protocol_fees_token0: BigDecimal::zero(),
            protocol_fees_token1: BigDecimal::zero(),
            bitmap: FastMap::default(),
        })
    }

    /// Deterministic pool identifier: keccak over the token pair and the
    /// fee tier.
    pub fn gen_pool_hash(&self) -> String {
        let preimage = format!("{}/{}/{}", self.token0, self.token1, self.fee);
        hex::encode(keccak256(preimage.as_bytes()))
    }

    /// Account that holds the pool's reserves at the token ledger.
    pub fn vault_account(&self) -> String {
        format!("service|{}", self.gen_pool_hash())
    }

    /// Sets the fraction of LP fees diverted to the protocol.
    pub fn configure_protocol_fee(&mut self, fraction: &BigDecimal) -> Result<(), DexError> {
        require_non_negative("protocolFee", fraction)?;
        if fraction > &BigDecimal::one() {
            return Err(DexError::validation(format!(
                "protocolFee must not exceed 1, got {fraction}"
            )));
        }
        self.protocol_fees = fraction.clone();
        Ok(())
    }

    /// Toggles a tick's initialized bit in the pool bitmap.
    pub fn flip_tick(&mut self, tick: i32) -> Result<(), MathError> {
        tick_bitmap::flip_tick(&mut self.bitmap, tick, self.tick_spacing)
    }
}

/// Bitmap words persist as hex strings keyed by decimal word index, in
/// sorted key order so serialized pools are byte-stable.
mod bitmap_serde {
    use super::*;
    use serde::de::Error as DeError;
    use serde::{Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        bitmap: &FastMap<i16, U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let ordered: BTreeMap<String, String> = bitmap
            .iter()
            .filter(|(_, word)| !word.is_zero())
            .map(|(index, word)| (index.to_string(), format!("{word:#x}")))
            .collect();
        ordered.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<FastMap<i16, U256>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(index, word)| {
                let index: i16 = index
                    .parse()
                    .map_err(|_| D::Error::custom(format!("bad bitmap word index {index}")))?;
                let word = if let Some(hex_digits) = word.strip_prefix("0x") {
                    U256::from_str_radix(hex_digits, 16)
                } else {
                    U256::from_str_radix(&word, 10)
                }
                .map_err(|_| D::Error::custom(format!("bad bitmap word {word}")))?;
                Ok((index, word))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::U256_1;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn basic_pool() -> Pool {
        Pool::new("TOKA", "TOKB", dec("0.003"), dec("1")).unwrap()
    }

    #[test]
    fn new_pool_derives_spacing_and_tick() {
        let pool = basic_pool();
        assert_eq!(pool.tick_spacing, 60);
        assert_eq!(pool.tick, 0);
        assert!(pool.liquidity.is_zero());
    }

    #[test]
    fn new_pool_rejects_unsorted_tokens() {
        let err = Pool::new("TOKB", "TOKA", dec("0.003"), dec("1")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));

        let err = Pool::new("TOKA", "TOKA", dec("0.003"), dec("1")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));
    }

    #[test]
    fn new_pool_rejects_unknown_fee_tier() {
        let err = Pool::new("TOKA", "TOKB", dec("0.004"), dec("1")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));
    }

    #[test]
    fn new_pool_rejects_out_of_bounds_price() {
        let err = Pool::new("TOKA", "TOKB", dec("0.003"), dec("0")).unwrap_err();
        assert!(matches!(err, DexError::Validation(_)));
    }

    #[test]
    fn pool_hash_is_deterministic_and_distinct_per_market() {
        let pool = basic_pool();
        assert_eq!(pool.gen_pool_hash(), pool.gen_pool_hash());

        let other = Pool::new("TOKA", "TOKB", dec("0.01"), dec("1")).unwrap();
        assert_ne!(pool.gen_pool_hash(), other.gen_pool_hash());

        let renamed = Pool::new("TOKA", "TOKC", dec("0.003"), dec("1")).unwrap();
        assert_ne!(pool.gen_pool_hash(), renamed.gen_pool_hash());
    }

    #[test]
    fn protocol_fee_accepts_fractions_and_rejects_rest() {
        let mut pool = basic_pool();
        pool.configure_protocol_fee(&dec("0.1")).unwrap();
        assert_eq!(pool.protocol_fees, dec("0.1"));

        pool.configure_protocol_fee(&dec("1")).unwrap();
        pool.configure_protocol_fee(&dec("0")).unwrap();

        assert!(pool.configure_protocol_fee(&dec("1.1")).is_err());
        assert!(pool.configure_protocol_fee(&dec("-0.1")).is_err());
    }

    #[test]
    fn bitmap_survives_serialization() {
        let mut pool = basic_pool();
        pool.flip_tick(-120).unwrap();
        pool.flip_tick(180).unwrap();

        let bytes = serde_json::to_vec(&pool).unwrap();
        let restored: Pool = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, pool);
    }

    #[test]
    fn bitmap_deserializes_decimal_words() {
        let json = r#"{"-1":"1","0":"0x2"}"#;
        let mut pool_json = serde_json::to_value(&basic_pool()).unwrap();
        pool_json["bitmap"] = serde_json::from_str(json).unwrap();

        let pool: Pool = serde_json::from_value(pool_json).unwrap();
        assert_eq!(pool.bitmap.get(&-1), Some(&U256_1));
        assert_eq!(pool.bitmap.get(&0), Some(&(U256_1 << 1)));
    }

    #[test]
    fn key_parts_identify_the_market() {
        let pool = basic_pool();
        assert_eq!(
            pool.key(),
            pool_key("TOKA", "TOKB", &dec("0.003"))
        );
        assert_eq!(pool.key(), "\u{0}DEXPL\u{0}TOKA\u{0}TOKB\u{0}0.003\u{0}");
    }
}
