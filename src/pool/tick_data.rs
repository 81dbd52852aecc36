use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::error::DexError;
use crate::ledger::{composite_key, put_object, try_get_object, ChainObject, Ledger};

/// Per-tick accounting record. Lives from the first mint that touches the
/// tick until its gross liquidity returns to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    pub pool_hash: String,
    pub tick: i32,
    pub liquidity_gross: BigDecimal,
    pub liquidity_net: BigDecimal,
    pub fee_growth_outside0: BigDecimal,
    pub fee_growth_outside1: BigDecimal,
    pub initialised: bool,
}

impl ChainObject for TickData {
    const INDEX_KEY: &'static str = "DEXTK";

    fn key_parts(&self) -> Vec<String> {
        vec![self.pool_hash.clone(), self.tick.to_string()]
    }
}

/// Composite key of the tick record for a pool and tick index.
pub fn tick_key(pool_hash: &str, tick: i32) -> String {
    composite_key(TickData::INDEX_KEY, &[pool_hash, &tick.to_string()])
}

impl TickData {
    /// A fresh record. Ticks at or below the pool's current tick start
    /// with their outside accumulators equal to the globals, so that fees
    /// accrued so far count as "below" the tick.
    pub fn new(
        pool_hash: impl Into<String>,
        tick: i32,
        current_tick: i32,
        fee_growth_global0: &BigDecimal,
        fee_growth_global1: &BigDecimal,
    ) -> Self {
        let (outside0, outside1) = if tick <= current_tick {
            (fee_growth_global0.clone(), fee_growth_global1.clone())
        } else {
            (BigDecimal::zero(), BigDecimal::zero())
        };

        TickData {
            pool_hash: pool_hash.into(),
            tick,
            liquidity_gross: BigDecimal::zero(),
            liquidity_net: BigDecimal::zero(),
            fee_growth_outside0: outside0,
            fee_growth_outside1: outside1,
            initialised: false,
        }
    }

    /// Applies a liquidity change to this tick. `upper` selects which end
    /// of the position range the tick is, which flips the sign of the net
    /// contribution. Returns whether the initialized flag toggled, in
    /// which case the caller must flip the pool bitmap bit.
    pub fn apply_liquidity_update(
        &mut self,
        liquidity_delta: &BigDecimal,
        upper: bool,
    ) -> Result<bool, DexError> {
        let gross_after = &self.liquidity_gross + liquidity_delta;
        if gross_after.is_negative() {
            return Err(DexError::Conflict(format!(
                "Tick {} gross liquidity below zero",
                self.tick
            )));
        }

        let flipped = gross_after.is_zero() != self.liquidity_gross.is_zero();
        self.liquidity_gross = gross_after;
        if upper {
            self.liquidity_net = &self.liquidity_net - liquidity_delta;
        } else {
            self.liquidity_net = &self.liquidity_net + liquidity_delta;
        }
        if flipped {
            self.initialised = !self.initialised;
        }
        Ok(flipped)
    }
}

/// Loads the tick record, or starts a fresh one seeded from the current
/// tick position when none exists yet.
pub fn fetch_or_create_tick(
    ledger: &dyn Ledger,
    pool_hash: &str,
    tick: i32,
    current_tick: i32,
    fee_growth_global0: &BigDecimal,
    fee_growth_global1: &BigDecimal,
) -> Result<TickData, DexError> {
    let existing = try_get_object::<TickData>(ledger, &tick_key(pool_hash, tick))?;
    Ok(existing.unwrap_or_else(|| {
        TickData::new(
            pool_hash,
            tick,
            current_tick,
            fee_growth_global0,
            fee_growth_global1,
        )
    }))
}

/// Crosses an initialized tick: flips its outside accumulators relative to
/// the supplied globals, persists the record, and returns its net
/// liquidity. The record must exist — the bitmap said the tick is
/// initialized, so its absence is a store consistency violation.
pub fn fetch_and_cross_tick(
    ledger: &mut dyn Ledger,
    pool_hash: &str,
    tick: i32,
    fee_growth_global0: &BigDecimal,
    fee_growth_global1: &BigDecimal,
) -> Result<BigDecimal, DexError> {
    let mut data = try_get_object::<TickData>(ledger, &tick_key(pool_hash, tick))?.ok_or_else(
        || {
            DexError::Inconsistent(format!(
                "Tick record missing for initialized tick {tick} of pool {pool_hash}"
            ))
        },
    )?;

    data.fee_growth_outside0 = fee_growth_global0 - &data.fee_growth_outside0;
    data.fee_growth_outside1 = fee_growth_global1 - &data.fee_growth_outside1;
    put_object(ledger, &data)?;

    Ok(data.liquidity_net)
}

/// Removes a spent tick record from the store.
pub fn clear_tick(ledger: &mut dyn Ledger, pool_hash: &str, tick: i32) {
    ledger.delete_state(&tick_key(pool_hash, tick));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn new_tick_at_or_below_current_seeds_outside_from_globals() {
        let data = TickData::new("pool", -60, 0, &dec("7"), &dec("9"));
        assert_eq!(data.fee_growth_outside0, dec("7"));
        assert_eq!(data.fee_growth_outside1, dec("9"));
    }

    #[test]
    fn new_tick_above_current_starts_outside_at_zero() {
        let data = TickData::new("pool", 60, 0, &dec("7"), &dec("9"));
        assert!(data.fee_growth_outside0.is_zero());
        assert!(data.fee_growth_outside1.is_zero());
    }

    #[test]
    fn liquidity_update_tracks_gross_and_signed_net() {
        let mut data = TickData::new("pool", -60, 0, &dec("0"), &dec("0"));

        let flipped = data.apply_liquidity_update(&dec("5"), false).unwrap();
        assert!(flipped);
        assert!(data.initialised);
        assert_eq!(data.liquidity_gross, dec("5"));
        assert_eq!(data.liquidity_net, dec("5"));

        // same tick as the upper end of another range
        let flipped = data.apply_liquidity_update(&dec("3"), true).unwrap();
        assert!(!flipped);
        assert_eq!(data.liquidity_gross, dec("8"));
        assert_eq!(data.liquidity_net, dec("2"));
    }

    #[test]
    fn liquidity_update_flips_off_when_gross_returns_to_zero() {
        let mut data = TickData::new("pool", -60, 0, &dec("0"), &dec("0"));
        data.apply_liquidity_update(&dec("5"), false).unwrap();

        let flipped = data.apply_liquidity_update(&dec("-5"), false).unwrap();
        assert!(flipped);
        assert!(!data.initialised);
        assert!(data.liquidity_gross.is_zero());
    }

    #[test]
    fn liquidity_update_rejects_gross_underflow() {
        let mut data = TickData::new("pool", -60, 0, &dec("0"), &dec("0"));
        data.apply_liquidity_update(&dec("5"), false).unwrap();
        assert!(data.apply_liquidity_update(&dec("-6"), false).is_err());
    }

    #[test]
    fn fetch_or_create_round_trips_through_the_store() {
        let mut ledger = MemoryLedger::new();
        let mut data =
            fetch_or_create_tick(&ledger, "pool", -60, 0, &dec("1"), &dec("2")).unwrap();
        data.apply_liquidity_update(&dec("5"), false).unwrap();
        put_object(&mut ledger, &data).unwrap();

        let again = fetch_or_create_tick(&ledger, "pool", -60, 0, &dec("9"), &dec("9")).unwrap();
        assert_eq!(again, data);
    }

    #[test]
    fn crossing_flips_outside_values_and_returns_net() {
        let mut ledger = MemoryLedger::new();
        let mut data = TickData::new("pool", -60, 0, &dec("1"), &dec("2"));
        data.apply_liquidity_update(&dec("5"), false).unwrap();
        put_object(&mut ledger, &data).unwrap();

        let net = fetch_and_cross_tick(&mut ledger, "pool", -60, &dec("10"), &dec("20")).unwrap();
        assert_eq!(net, dec("5"));

        let crossed =
            try_get_object::<TickData>(&ledger, &tick_key("pool", -60)).unwrap().unwrap();
        assert_eq!(crossed.fee_growth_outside0, dec("9"));
        assert_eq!(crossed.fee_growth_outside1, dec("18"));

        // crossing back restores the original outside values
        fetch_and_cross_tick(&mut ledger, "pool", -60, &dec("10"), &dec("20")).unwrap();
        let restored =
            try_get_object::<TickData>(&ledger, &tick_key("pool", -60)).unwrap().unwrap();
        assert_eq!(restored.fee_growth_outside0, dec("1"));
        assert_eq!(restored.fee_growth_outside1, dec("2"));
    }

    #[test]
    fn crossing_a_missing_record_is_inconsistent_state() {
        let mut ledger = MemoryLedger::new();
        let err =
            fetch_and_cross_tick(&mut ledger, "pool", -60, &dec("1"), &dec("1")).unwrap_err();
        assert!(matches!(err, DexError::Inconsistent(_)));
    }

    #[test]
    fn clear_tick_removes_the_record() {
        let mut ledger = MemoryLedger::new();
        let data = TickData::new("pool", -60, 0, &dec("0"), &dec("0"));
        put_object(&mut ledger, &data).unwrap();

        clear_tick(&mut ledger, "pool", -60);
        assert!(try_get_object::<TickData>(&ledger, &tick_key("pool", -60))
            .unwrap()
            .is_none());
    }
}
