use crate::error::{ErrorCode, VaultResult};
use crate::math::bn::U256;
use crate::math::safe_math::{SafeDivCeil, SafeMath};
use crate::math::shares::Rounding;
use crate::validate;
use anchor_lang::prelude::*;

pub fn q96() -> U256 {
    U256::one() << 96
}

/// `a * b / denominator` over U256 operands with a 512-bit intermediate.
pub fn mul_div_u256(a: U256, b: U256, denominator: U256, rounding: Rounding) -> VaultResult<U256> {
    validate!(!denominator.is_zero(), ErrorCode::DivisionByZero)?;

    let product = a.to_u512().safe_mul(b.to_u512())?;
    let result = match rounding {
        Rounding::Floor => product.safe_div(denominator.to_u512())?,
        Rounding::Ceiling => product.safe_div_ceil(denominator.to_u512())?,
    };

    result.try_to_u256()
}

fn sorted(sqrt_ratio_a: U256, sqrt_ratio_b: U256) -> (U256, U256) {
    if sqrt_ratio_a > sqrt_ratio_b {
        (sqrt_ratio_b, sqrt_ratio_a)
    } else {
        (sqrt_ratio_a, sqrt_ratio_b)
    }
}

/// token0 held by `liquidity` between two sqrt prices.
pub fn get_amount0_for_liquidity(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
    rounding: Rounding,
) -> VaultResult<u128> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_ratio_a, sqrt_ratio_b);
    validate!(!sqrt_lower.is_zero(), ErrorCode::SqrtPriceOutOfBounds)?;

    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = sqrt_upper.safe_sub(sqrt_lower)?;

    let amount = match rounding {
        Rounding::Floor => {
            mul_div_u256(numerator1, numerator2, sqrt_upper, Rounding::Floor)?.safe_div(sqrt_lower)?
        }
        Rounding::Ceiling => mul_div_u256(numerator1, numerator2, sqrt_upper, Rounding::Ceiling)?
            .safe_div_ceil(sqrt_lower)?,
    };

    amount.try_to_u128()
}

/// token1 held by `liquidity` between two sqrt prices.
pub fn get_amount1_for_liquidity(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
    rounding: Rounding,
) -> VaultResult<u128> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_ratio_a, sqrt_ratio_b);

    mul_div_u256(
        U256::from(liquidity),
        sqrt_upper.safe_sub(sqrt_lower)?,
        q96(),
        rounding,
    )?
    .try_to_u128()
}

/// (token0, token1) backing `liquidity` in `[sqrt_ratio_a, sqrt_ratio_b]` at `sqrt_price`.
pub fn get_amounts_for_liquidity(
    sqrt_price: U256,
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
    rounding: Rounding,
) -> VaultResult<(u128, u128)> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_ratio_a, sqrt_ratio_b);

    if sqrt_price <= sqrt_lower {
        Ok((
            get_amount0_for_liquidity(sqrt_lower, sqrt_upper, liquidity, rounding)?,
            0,
        ))
    } else if sqrt_price < sqrt_upper {
        Ok((
            get_amount0_for_liquidity(sqrt_price, sqrt_upper, liquidity, rounding)?,
            get_amount1_for_liquidity(sqrt_lower, sqrt_price, liquidity, rounding)?,
        ))
    } else {
        Ok((
            0,
            get_amount1_for_liquidity(sqrt_lower, sqrt_upper, liquidity, rounding)?,
        ))
    }
}

pub fn get_liquidity_for_amount0(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    amount0: u128,
) -> VaultResult<u128> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_ratio_a, sqrt_ratio_b);
    let intermediate = mul_div_u256(sqrt_lower, sqrt_upper, q96(), Rounding::Floor)?;

    mul_div_u256(
        U256::from(amount0),
        intermediate,
        sqrt_upper.safe_sub(sqrt_lower)?,
        Rounding::Floor,
    )?
    .try_to_u128()
}

pub fn get_liquidity_for_amount1(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    amount1: u128,
) -> VaultResult<u128> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_ratio_a, sqrt_ratio_b);

    mul_div_u256(
        U256::from(amount1),
        q96(),
        sqrt_upper.safe_sub(sqrt_lower)?,
        Rounding::Floor,
    )?
    .try_to_u128()
}

/// Largest liquidity that `amount0` and `amount1` can fund at `sqrt_price`.
pub fn get_liquidity_for_amounts(
    sqrt_price: U256,
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    amount0: u128,
    amount1: u128,
) -> VaultResult<u128> {
    let (sqrt_lower, sqrt_upper) = sorted(sqrt_ratio_a, sqrt_ratio_b);

    if sqrt_price <= sqrt_lower {
        get_liquidity_for_amount0(sqrt_lower, sqrt_upper, amount0)
    } else if sqrt_price < sqrt_upper {
        let liquidity0 = get_liquidity_for_amount0(sqrt_price, sqrt_upper, amount0)?;
        let liquidity1 = get_liquidity_for_amount1(sqrt_lower, sqrt_price, amount1)?;
        Ok(liquidity0.min(liquidity1))
    } else {
        get_liquidity_for_amount1(sqrt_lower, sqrt_upper, amount1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_eq_within;
    use crate::math::tick_math::get_sqrt_ratio_at_tick;

    #[test]
    fn amounts_at_unit_price() {
        // price 1 between ticks -60 and 60: both sides hold about L * 0.003
        let sqrt_price = get_sqrt_ratio_at_tick(0).unwrap();
        let sqrt_lower = get_sqrt_ratio_at_tick(-60).unwrap();
        let sqrt_upper = get_sqrt_ratio_at_tick(60).unwrap();
        let liquidity = 1_000_000_000_000u128;

        let (floor0, floor1) =
            get_amounts_for_liquidity(sqrt_price, sqrt_lower, sqrt_upper, liquidity, Rounding::Floor)
                .unwrap();
        let (ceil0, ceil1) = get_amounts_for_liquidity(
            sqrt_price,
            sqrt_lower,
            sqrt_upper,
            liquidity,
            Rounding::Ceiling,
        )
        .unwrap();

        assert_eq!(floor0, 2_995_354_955);
        assert_eq_within!(floor0, floor1, 1);
        assert_eq!(ceil0, floor0 + 1);
        assert_eq_within!(ceil1, floor1, 1);
    }

    #[test]
    fn out_of_range_is_single_sided() {
        let sqrt_lower = get_sqrt_ratio_at_tick(-205_680).unwrap();
        let sqrt_upper = get_sqrt_ratio_at_tick(-203_760).unwrap();
        let liquidity = 10_000_000_000_000u128;

        let below = get_sqrt_ratio_at_tick(-206_500).unwrap();
        let (amount0, amount1) =
            get_amounts_for_liquidity(below, sqrt_lower, sqrt_upper, liquidity, Rounding::Floor)
                .unwrap();
        assert!(amount0 > 0);
        assert_eq!(amount1, 0);

        let above = get_sqrt_ratio_at_tick(-200_000).unwrap();
        let (amount0, amount1) =
            get_amounts_for_liquidity(above, sqrt_lower, sqrt_upper, liquidity, Rounding::Floor)
                .unwrap();
        assert_eq!(amount0, 0);
        assert!(amount1 > 0);
    }

    #[test]
    fn liquidity_for_amounts_never_exceeds_budget() {
        let sqrt_price = get_sqrt_ratio_at_tick(-204_720).unwrap();
        let sqrt_lower = get_sqrt_ratio_at_tick(-205_680).unwrap();
        let sqrt_upper = get_sqrt_ratio_at_tick(-203_760).unwrap();

        // 0.2 WETH and 250 USDC
        let amount0 = 200_000_000_000_000_000u128;
        let amount1 = 250_000_000u128;

        let liquidity =
            get_liquidity_for_amounts(sqrt_price, sqrt_lower, sqrt_upper, amount0, amount1)
                .unwrap();
        assert!(liquidity > 0);

        let (needed0, needed1) = get_amounts_for_liquidity(
            sqrt_price,
            sqrt_lower,
            sqrt_upper,
            liquidity,
            Rounding::Ceiling,
        )
        .unwrap();
        assert!(needed0 <= amount0);
        assert!(needed1 <= amount1);
        // the binding side is used up to rounding
        assert!(amount0 - needed0 <= amount0 / 1_000_000 || amount1 - needed1 <= 1);
    }
}
