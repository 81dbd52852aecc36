//! Concentrated-liquidity AMM core for a keyed ledger.
//!
//! The crate implements the on-ledger half of a tick-based AMM: the swap
//! state machine that walks initialized price ticks, the pool and per-tick
//! chain objects it mutates, and the bookmark protocol used to page a
//! user's positions out of the ledger's composite-key index. Ledger access,
//! token balance mutation, and fee gating are traits supplied by the host.

use alloy_primitives::U256;

pub mod error;
mod hash;

pub mod fixed;
pub mod ledger;
pub mod math;
pub mod ops;
pub mod pool;
pub mod positions;

pub use hash::FastMap;
pub use ledger::{Ledger, MemoryLedger};
pub use ops::DexContext;
pub use pool::entity::Pool;

const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);
