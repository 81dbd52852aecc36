//! Callable operations: the surface the transaction layer dispatches into.
//!
//! Each operation takes a [`DexContext`] (ledger, balance mutator, fee
//! gate, caller identity) plus a request DTO, and either completes fully
//! or fails with a [`DexError`] that aborts the surrounding transaction.

use bigdecimal::BigDecimal;
use num_traits::Signed;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DexError, DexResult};
use crate::fixed::{f18, require_positive};
use crate::ledger::{composite_key, get_object, put_object, try_get_object, ChainObject, Ledger};
use crate::math::liquidity_math::{add_liquidity_delta, amounts_for_liquidity};
use crate::math::tick_math::{tick_to_sqrt_price, MAX_TICK, MIN_TICK};
use crate::pool::entity::{pool_key, Pool};
use crate::pool::swap::execute_swap;
use crate::pool::tick_data::fetch_or_create_tick;
use crate::positions::{
    fetch_user_positions, tick_range_key, DexPosition, DexPositionOwner, PositionPage,
    OWNER_PAGE_SIZE,
};

/// Most positions one listing call may return.
pub const MAX_POSITIONS_LIMIT: usize = 100;

/// Operation classes the fee gate prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeCode {
    CreatePool,
    AddLiquidity,
    Swap,
    RemoveLiquidity,
    CollectPositionFees,
    TransferDexPosition,
}

/// Opaque predicate consulted before every user-facing mutation; a failure
/// rejects the operation.
pub trait FeeGate {
    fn check(&self, caller: &str, code: FeeCode) -> DexResult<()>;
}

/// Fee gate that admits everything; for tests and local simulation.
pub struct NoopFeeGate;

impl FeeGate for NoopFeeGate {
    fn check(&self, _caller: &str, _code: FeeCode) -> DexResult<()> {
        Ok(())
    }
}

/// Token balance collaborator. Amounts are canonical-scale decimals and
/// always positive; direction is carried by `from`/`to`.
pub trait BalanceMutator {
    fn transfer(&mut self, token: &str, from: &str, to: &str, amount: &BigDecimal)
        -> DexResult<()>;
}

/// Balance mutator that records transfers instead of applying them; for
/// tests and local simulation.
#[derive(Default)]
pub struct RecordingBalances {
    pub transfers: Vec<(String, String, String, BigDecimal)>,
}

impl BalanceMutator for RecordingBalances {
    fn transfer(
        &mut self,
        token: &str,
        from: &str,
        to: &str,
        amount: &BigDecimal,
    ) -> DexResult<()> {
        self.transfers
            .push((token.to_string(), from.to_string(), to.to_string(), amount.clone()));
        Ok(())
    }
}

/// Everything an operation needs from its transaction environment.
pub struct DexContext<'a> {
    pub ledger: &'a mut dyn Ledger,
    pub balances: &'a mut dyn BalanceMutator,
    pub fee_gate: &'a dyn FeeGate,
    pub caller: String,
}

/// Identities allowed to administer protocol fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexFeeConfig {
    pub authorities: Vec<String>,
}

impl ChainObject for DexFeeConfig {
    const INDEX_KEY: &'static str = "DEXFC";

    fn key_parts(&self) -> Vec<String> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// create pool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePoolRequest {
    pub token0: String,
    pub token1: String,
    pub fee: BigDecimal,
    pub initial_sqrt_price: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePoolResponse {
    pub pool_hash: String,
}

pub fn create_pool(ctx: &mut DexContext, req: &CreatePoolRequest) -> DexResult<CreatePoolResponse> {
    ctx.fee_gate.check(&ctx.caller, FeeCode::CreatePool)?;

    let pool = Pool::new(
        req.token0.clone(),
        req.token1.clone(),
        req.fee.clone(),
        req.initial_sqrt_price.clone(),
    )?;

    if try_get_object::<Pool>(ctx.ledger, &pool.key())?.is_some() {
        return Err(DexError::Conflict(format!(
            "Pool already exists for {} / {} at fee {}",
            req.token0, req.token1, req.fee
        )));
    }

    put_object(ctx.ledger, &pool)?;
    let pool_hash = pool.gen_pool_hash();
    info!(pool = %pool_hash, "pool created");
    Ok(CreatePoolResponse { pool_hash })
}

// ---------------------------------------------------------------------------
// add liquidity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLiquidityRequest {
    pub token0: String,
    pub token1: String,
    pub fee: BigDecimal,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLiquidityResponse {
    pub position_id: String,
    pub amount0: BigDecimal,
    pub amount1: BigDecimal,
}

pub fn add_liquidity(
    ctx: &mut DexContext,
    req: &AddLiquidityRequest,
) -> DexResult<AddLiquidityResponse> {
    ctx.fee_gate.check(&ctx.caller, FeeCode::AddLiquidity)?;
    require_positive("liquidity", &req.liquidity)?;

    if req.tick_lower >= req.tick_upper {
        return Err(DexError::validation(format!(
            "tickLower {} must be below tickUpper {}",
            req.tick_lower, req.tick_upper
        )));
    }
    if req.tick_lower < MIN_TICK || req.tick_upper > MAX_TICK {
        return Err(DexError::validation("Tick range out of bounds"));
    }

    let mut pool: Pool = get_object(
        ctx.ledger,
        &pool_key(&req.token0, &req.token1, &req.fee),
        "Pool",
    )?;
    if req.tick_lower % pool.tick_spacing != 0 || req.tick_upper % pool.tick_spacing != 0 {
        return Err(DexError::validation(format!(
            "Ticks must be aligned to spacing {}",
            pool.tick_spacing
        )));
    }

    let pool_hash = pool.gen_pool_hash();

    // tick records at both range ends, flipping bitmap bits as they
    // become initialized
    for (tick, upper) in [(req.tick_lower, false), (req.tick_upper, true)] {
        let mut data = fetch_or_create_tick(
            ctx.ledger,
            &pool_hash,
            tick,
            pool.tick,
            &pool.fee_growth_global0,
            &pool.fee_growth_global1,
        )?;
        let flipped = data.apply_liquidity_update(&req.liquidity, upper)?;
        put_object(ctx.ledger, &data)?;
        if flipped {
            pool.flip_tick(tick)?;
        }
    }

    if req.tick_lower <= pool.tick && pool.tick < req.tick_upper {
        pool.liquidity = add_liquidity_delta(&pool.liquidity, &req.liquidity)?;
    }

    let sqrt_price_lower = tick_to_sqrt_price(req.tick_lower)?;
    let sqrt_price_upper = tick_to_sqrt_price(req.tick_upper)?;
    let (amount0, amount1) = amounts_for_liquidity(
        &pool.sqrt_price,
        &sqrt_price_lower,
        &sqrt_price_upper,
        &req.liquidity,
    )?;

    // position record plus the owner's range index
    let range = tick_range_key(req.tick_lower, req.tick_upper);
    let owner_key = DexPositionOwner::new(ctx.caller.clone(), pool_hash.clone()).key();
    let mut owner_record = try_get_object::<DexPositionOwner>(ctx.ledger, &owner_key)?
        .unwrap_or_else(|| DexPositionOwner::new(ctx.caller.clone(), pool_hash.clone()));
    let position_id = format!("pos-{}", owner_record.position_count());
    owner_record.add_position(&range, position_id.clone());
    put_object(ctx.ledger, &owner_record)?;

    let position = DexPosition {
        pool_hash: pool_hash.clone(),
        position_id: position_id.clone(),
        owner: ctx.caller.clone(),
        tick_lower: req.tick_lower,
        tick_upper: req.tick_upper,
        liquidity: req.liquidity.clone(),
    };
    put_object(ctx.ledger, &position)?;

    put_object(ctx.ledger, &pool)?;

    let vault = pool.vault_account();
    let owed0 = f18(&amount0);
    let owed1 = f18(&amount1);
    if owed0.is_positive() {
        ctx.balances
            .transfer(&pool.token0, &ctx.caller, &vault, &owed0)?;
    }
    if owed1.is_positive() {
        ctx.balances
            .transfer(&pool.token1, &ctx.caller, &vault, &owed1)?;
    }

    debug!(pool = %pool_hash, position = %position_id, "liquidity added");
    Ok(AddLiquidityResponse {
        position_id,
        amount0: owed0,
        amount1: owed1,
    })
}

// ---------------------------------------------------------------------------
// swap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    pub token0: String,
    pub token1: String,
    pub fee: BigDecimal,
    pub amount: BigDecimal,
    pub exact_input: bool,
    pub zero_for_one: bool,
    pub sqrt_price_limit: BigDecimal,
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponse {
    pub amount0: BigDecimal,
    pub amount1: BigDecimal,
    pub sqrt_price: BigDecimal,
}

pub fn swap(ctx: &mut DexContext, req: &SwapRequest) -> DexResult<SwapResponse> {
    ctx.fee_gate.check(&ctx.caller, FeeCode::Swap)?;
    require_positive("amount", &req.amount)?;

    let mut pool: Pool = get_object(
        ctx.ledger,
        &pool_key(&req.token0, &req.token1, &req.fee),
        "Pool",
    )?;

    let amount_specified = if req.exact_input {
        req.amount.clone()
    } else {
        -&req.amount
    };

    let outcome = execute_swap(
        ctx.ledger,
        &mut pool,
        amount_specified,
        req.zero_for_one,
        req.sqrt_price_limit.clone(),
    )?;
    put_object(ctx.ledger, &pool)?;

    let vault = pool.vault_account();
    for (token, delta) in [(&pool.token0, &outcome.amount0), (&pool.token1, &outcome.amount1)] {
        let amount = f18(delta);
        if amount.is_positive() {
            ctx.balances.transfer(token, &ctx.caller, &vault, &amount)?;
        } else if amount.is_negative() {
            ctx.balances
                .transfer(token, &vault, &req.recipient, &amount.abs())?;
        }
    }

    debug!(
        amount0 = %outcome.amount0,
        amount1 = %outcome.amount1,
        "swap settled"
    );
    Ok(SwapResponse {
        amount0: f18(&outcome.amount0),
        amount1: f18(&outcome.amount1),
        sqrt_price: pool.sqrt_price.clone(),
    })
}

// ---------------------------------------------------------------------------
// protocol fee configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurePoolDexFeeRequest {
    pub token0: String,
    pub token1: String,
    pub fee: BigDecimal,
    pub protocol_fee: BigDecimal,
}

pub fn configure_pool_dex_fee(
    ctx: &mut DexContext,
    req: &ConfigurePoolDexFeeRequest,
) -> DexResult<()> {
    let config_key = composite_key(DexFeeConfig::INDEX_KEY, &[]);
    let config: DexFeeConfig = get_object(ctx.ledger, &config_key, "Dex fee configuration")?;

    if !config.authorities.iter().any(|a| a == &ctx.caller) {
        return Err(DexError::Unauthorized(format!(
            "CallingUser {} is not authorized to configure fees",
            ctx.caller
        )));
    }

    let mut pool: Pool = get_object(
        ctx.ledger,
        &pool_key(&req.token0, &req.token1, &req.fee),
        "Pool",
    )?;
    pool.configure_protocol_fee(&req.protocol_fee)?;
    put_object(ctx.ledger, &pool)?;

    info!(protocol_fee = %req.protocol_fee, "protocol fee configured");
    Ok(())
}

// ---------------------------------------------------------------------------
// position listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserPositionsRequest {
    pub user: String,
    pub limit: usize,
    pub bookmark: String,
}

pub fn get_user_positions(
    ctx: &DexContext,
    req: &GetUserPositionsRequest,
) -> DexResult<PositionPage> {
    if req.limit == 0 || req.limit > MAX_POSITIONS_LIMIT {
        return Err(DexError::validation(format!(
            "limit must be between 1 and {MAX_POSITIONS_LIMIT}"
        )));
    }
    fetch_user_positions(
        &*ctx.ledger,
        &req.user,
        req.limit,
        &req.bookmark,
        OWNER_PAGE_SIZE,
    )
}
