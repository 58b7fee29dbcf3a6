//! Sizing of the liquidity position and its hedge.
//!
//! Per unit of reference liquidity the position holds `(s, v)` at the current
//! price and `v_mid` of the volatile asset at the range midpoint. Borrowing
//! `v_mid * hedge_ratio` of the volatile asset offsets the position's delta at
//! the midpoint. The borrow funds part of `v`, and the lending market requires
//! `value(debt) / ltv` of stable collateral, so one unit of reference liquidity
//! costs
//!
//!   s + value(v) + value(debt) * (1 / ltv - 1)
//!
//! in stable terms. Liquidity and debt scale linearly with vault value.
//! Quantities the vault receives round down, quantities it pays round up.

use crate::constants::{BPS_PRECISION, MAX_TICK, MIN_TICK, REFERENCE_LIQUIDITY};
use crate::error::{ErrorCode, VaultResult};
use crate::math::bn::U256;
use crate::math::casting::Cast;
use crate::math::liquidity_amounts::{
    get_amount0_for_liquidity, get_amount1_for_liquidity, get_amounts_for_liquidity,
};
use crate::math::price::volatile_to_stable;
use crate::math::safe_math::SafeMath;
use crate::math::shares::{mul_div, Rounding};
use crate::math::tick_math::{floor_to_spacing, get_sqrt_ratio_at_tick, is_aligned};
use crate::validate;
use anchor_lang::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebalanceInput {
    pub sqrt_price_x96: U256,
    pub lower_tick: i32,
    pub upper_tick: i32,
    /// Pool token0 is the volatile asset.
    pub reversed: bool,
    pub stable_balance: u128,
    pub volatile_balance: u128,
    pub target_ltv_bps: u16,
    pub hedge_ratio_bps: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RebalanceTarget {
    /// Stable-denominated value the sizing was computed for.
    pub total_value: u128,
    pub liquidity: u128,
    /// Volatile asset to borrow.
    pub hedge_debt: u128,
    /// Stable asset to supply as collateral.
    pub collateral: u128,
    /// Stable asset the position requires at the current price.
    pub position_stable: u128,
    /// Volatile asset the position requires at the current price.
    pub position_volatile: u128,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RangeTarget {
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub stoploss_lower_tick: i32,
    pub stoploss_upper_tick: i32,
}

pub fn midpoint_tick(lower_tick: i32, upper_tick: i32) -> VaultResult<i32> {
    let sum = lower_tick.cast::<i64>()?.safe_add(upper_tick.cast::<i64>()?)?;
    sum.div_euclid(2).cast::<i32>()
}

/// Splits pool-ordered amounts into (stable, volatile).
pub fn to_vault_order(amount0: u128, amount1: u128, reversed: bool) -> (u128, u128) {
    if reversed {
        (amount1, amount0)
    } else {
        (amount0, amount1)
    }
}

/// Joins (stable, volatile) into pool-ordered amounts.
pub fn to_pool_order(stable: u128, volatile: u128, reversed: bool) -> (u128, u128) {
    if reversed {
        (volatile, stable)
    } else {
        (stable, volatile)
    }
}

fn volatile_at(
    sqrt_price_x96: U256,
    sqrt_lower: U256,
    sqrt_upper: U256,
    liquidity: u128,
    reversed: bool,
) -> VaultResult<u128> {
    let sqrt_price = sqrt_price_x96.max(sqrt_lower).min(sqrt_upper);
    if reversed {
        get_amount0_for_liquidity(sqrt_price, sqrt_upper, liquidity, Rounding::Floor)
    } else {
        get_amount1_for_liquidity(sqrt_lower, sqrt_price, liquidity, Rounding::Floor)
    }
}

pub fn validate_range(lower_tick: i32, upper_tick: i32, tick_spacing: i32) -> VaultResult {
    validate!(
        lower_tick < upper_tick
            && lower_tick >= MIN_TICK
            && upper_tick <= MAX_TICK
            && is_aligned(lower_tick, tick_spacing)
            && is_aligned(upper_tick, tick_spacing),
        ErrorCode::InvalidTickRange,
        "invalid range [{}, {}] for tick spacing {}",
        lower_tick,
        upper_tick,
        tick_spacing
    )
}

pub fn validate_stoploss_range(
    lower_tick: i32,
    upper_tick: i32,
    stoploss_lower_tick: i32,
    stoploss_upper_tick: i32,
) -> VaultResult {
    validate!(
        stoploss_lower_tick < lower_tick
            && stoploss_upper_tick > upper_tick
            && stoploss_lower_tick >= MIN_TICK
            && stoploss_upper_tick <= MAX_TICK,
        ErrorCode::InvalidStoplossRange,
        "stoploss range [{}, {}] must strictly contain [{}, {}]",
        stoploss_lower_tick,
        stoploss_upper_tick,
        lower_tick,
        upper_tick
    )
}

/// Aligned range of `2 * half_width_ticks` around `current_tick`, with a stoploss
/// band `stoploss_buffer_ticks` outside of it on each side.
pub fn compute_range(
    current_tick: i32,
    half_width_ticks: i32,
    stoploss_buffer_ticks: i32,
    tick_spacing: i32,
) -> VaultResult<RangeTarget> {
    validate!(
        tick_spacing > 0 && half_width_ticks > 0 && stoploss_buffer_ticks > 0,
        ErrorCode::InvalidParameter,
        "width {} buffer {} spacing {}",
        half_width_ticks,
        stoploss_buffer_ticks,
        tick_spacing
    )?;

    let lower_tick = floor_to_spacing(current_tick.safe_sub(half_width_ticks)?, tick_spacing);
    let width = floor_to_spacing(half_width_ticks.safe_mul(2)?, tick_spacing).max(tick_spacing);
    let upper_tick = lower_tick.safe_add(width)?;
    let stoploss_lower_tick = lower_tick.safe_sub(stoploss_buffer_ticks)?;
    let stoploss_upper_tick = upper_tick.safe_add(stoploss_buffer_ticks)?;

    validate_range(lower_tick, upper_tick, tick_spacing)?;
    validate_stoploss_range(
        lower_tick,
        upper_tick,
        stoploss_lower_tick,
        stoploss_upper_tick,
    )?;

    Ok(RangeTarget {
        lower_tick,
        upper_tick,
        stoploss_lower_tick,
        stoploss_upper_tick,
    })
}

pub fn compute_rebalance(input: &RebalanceInput) -> VaultResult<RebalanceTarget> {
    validate!(
        input.target_ltv_bps > 0 && input.target_ltv_bps.cast::<u128>()? < BPS_PRECISION,
        ErrorCode::InvalidParameter,
        "target ltv {} bps out of range",
        input.target_ltv_bps
    )?;
    validate!(
        input.hedge_ratio_bps.cast::<u128>()? <= BPS_PRECISION,
        ErrorCode::InvalidParameter,
        "hedge ratio {} bps out of range",
        input.hedge_ratio_bps
    )?;
    validate!(
        input.lower_tick < input.upper_tick,
        ErrorCode::InvalidTickRange
    )?;

    let sqrt_lower = get_sqrt_ratio_at_tick(input.lower_tick)?;
    let sqrt_upper = get_sqrt_ratio_at_tick(input.upper_tick)?;
    let sqrt_mid = get_sqrt_ratio_at_tick(midpoint_tick(input.lower_tick, input.upper_tick)?)?;
    let sqrt_price = input.sqrt_price_x96;
    let reversed = input.reversed;
    let ltv = input.target_ltv_bps.cast::<u128>()?;

    let total_value = input.stable_balance.safe_add(volatile_to_stable(
        input.volatile_balance,
        sqrt_price,
        reversed,
        Rounding::Floor,
    )?)?;

    if total_value == 0 {
        return Ok(RebalanceTarget::default());
    }

    let (ref_amount0, ref_amount1) = get_amounts_for_liquidity(
        sqrt_price,
        sqrt_lower,
        sqrt_upper,
        REFERENCE_LIQUIDITY,
        Rounding::Ceiling,
    )?;
    let (ref_stable, ref_volatile) = to_vault_order(ref_amount0, ref_amount1, reversed);

    let ref_mid_volatile = volatile_at(
        sqrt_mid,
        sqrt_lower,
        sqrt_upper,
        REFERENCE_LIQUIDITY,
        reversed,
    )?;
    let ref_debt = mul_div(
        ref_mid_volatile,
        input.hedge_ratio_bps.cast()?,
        BPS_PRECISION,
        Rounding::Floor,
    )?;
    let ref_debt_value = volatile_to_stable(ref_debt, sqrt_price, reversed, Rounding::Ceiling)?;

    let ref_cost = ref_stable
        .safe_add(volatile_to_stable(
            ref_volatile,
            sqrt_price,
            reversed,
            Rounding::Ceiling,
        )?)?
        .safe_add(mul_div(
            ref_debt_value,
            BPS_PRECISION.safe_sub(ltv)?,
            ltv,
            Rounding::Ceiling,
        )?)?;

    validate!(
        ref_cost > 0,
        ErrorCode::MathError,
        "range [{}, {}] has no cost basis",
        input.lower_tick,
        input.upper_tick
    )?;

    let liquidity = mul_div(total_value, REFERENCE_LIQUIDITY, ref_cost, Rounding::Floor)?;
    let hedge_debt = mul_div(ref_debt, total_value, ref_cost, Rounding::Floor)?;
    let collateral = mul_div(
        volatile_to_stable(hedge_debt, sqrt_price, reversed, Rounding::Ceiling)?,
        BPS_PRECISION,
        ltv,
        Rounding::Ceiling,
    )?;

    let (amount0, amount1) = get_amounts_for_liquidity(
        sqrt_price,
        sqrt_lower,
        sqrt_upper,
        liquidity,
        Rounding::Ceiling,
    )?;
    let (position_stable, position_volatile) = to_vault_order(amount0, amount1, reversed);

    Ok(RebalanceTarget {
        total_value,
        liquidity,
        hedge_debt,
        collateral,
        position_stable,
        position_volatile,
    })
}
