use crate::error::{ErrorCode, VaultResult};
use crate::math::bn::{U256, U512};
use crate::math::safe_math::{SafeDivCeil, SafeMath};
use crate::math::shares::Rounding;
use crate::validate;
use anchor_lang::prelude::*;

fn q192() -> U512 {
    U512::one() << 192
}

fn price_x192(sqrt_price_x96: U256) -> VaultResult<U512> {
    validate!(!sqrt_price_x96.is_zero(), ErrorCode::SqrtPriceOutOfBounds)?;
    let sqrt_price = sqrt_price_x96.to_u512();
    sqrt_price.safe_mul(sqrt_price)
}

fn div_rounding(numerator: U512, denominator: U512, rounding: Rounding) -> VaultResult<u128> {
    match rounding {
        Rounding::Floor => numerator.safe_div(denominator)?,
        Rounding::Ceiling => numerator.safe_div_ceil(denominator)?,
    }
    .try_to_u128()
}

/// Value of `amount0` in pool token1 at the pool price.
pub fn token0_to_token1(amount0: u128, sqrt_price_x96: U256, rounding: Rounding) -> VaultResult<u128> {
    let numerator = U512::from(amount0).safe_mul(price_x192(sqrt_price_x96)?)?;
    div_rounding(numerator, q192(), rounding)
}

/// Value of `amount1` in pool token0 at the pool price.
pub fn token1_to_token0(amount1: u128, sqrt_price_x96: U256, rounding: Rounding) -> VaultResult<u128> {
    let numerator = U512::from(amount1).safe_mul(q192())?;
    div_rounding(numerator, price_x192(sqrt_price_x96)?, rounding)
}

/// Converts a volatile-asset amount into the vault's stable (deposit) asset.
/// `reversed` is true when the volatile asset is the pool's token0.
pub fn volatile_to_stable(
    amount: u128,
    sqrt_price_x96: U256,
    reversed: bool,
    rounding: Rounding,
) -> VaultResult<u128> {
    if reversed {
        token0_to_token1(amount, sqrt_price_x96, rounding)
    } else {
        token1_to_token0(amount, sqrt_price_x96, rounding)
    }
}

pub fn stable_to_volatile(
    amount: u128,
    sqrt_price_x96: U256,
    reversed: bool,
    rounding: Rounding,
) -> VaultResult<u128> {
    if reversed {
        token1_to_token0(amount, sqrt_price_x96, rounding)
    } else {
        token0_to_token1(amount, sqrt_price_x96, rounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_eq_within;
    use crate::math::tick_math::get_sqrt_ratio_at_tick;

    #[test]
    fn weth_usdc_pool_price() {
        // WETH (18 decimals) is token0, USDC (6 decimals) is token1
        let sqrt_price = get_sqrt_ratio_at_tick(-204_720).unwrap();

        let one_weth = 1_000_000_000_000_000_000u128;
        let usdc = volatile_to_stable(one_weth, sqrt_price, true, Rounding::Floor).unwrap();
        // roughly $1285
        assert!(usdc > 1_280_000_000 && usdc < 1_290_000_000);

        let weth = stable_to_volatile(usdc, sqrt_price, true, Rounding::Ceiling).unwrap();
        assert_eq_within!(weth, one_weth, 1_000_000_000_000);
        assert!(weth <= one_weth);
    }

    #[test]
    fn unit_price() {
        let sqrt_price = get_sqrt_ratio_at_tick(0).unwrap();
        assert_eq!(token0_to_token1(1_000, sqrt_price, Rounding::Floor).unwrap(), 1_000);
        assert_eq!(token1_to_token0(1_000, sqrt_price, Rounding::Ceiling).unwrap(), 1_000);
        assert_eq!(
            token0_to_token1(1, U256::zero(), Rounding::Floor),
            Err(ErrorCode::SqrtPriceOutOfBounds)
        );
    }

    #[test]
    fn rounding_direction() {
        let sqrt_price = get_sqrt_ratio_at_tick(-204_721).unwrap();
        let floor = token0_to_token1(123_456_789_012_345, sqrt_price, Rounding::Floor).unwrap();
        let ceil = token0_to_token1(123_456_789_012_345, sqrt_price, Rounding::Ceiling).unwrap();
        assert_eq!(ceil, floor + 1);
    }
}
