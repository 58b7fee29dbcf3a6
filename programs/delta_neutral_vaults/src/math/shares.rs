use crate::constants::SHARE_PRICE_PRECISION;
use crate::error::{ErrorCode, VaultResult};
use crate::math::bn::U256;
use crate::math::safe_math::{SafeDivCeil, SafeMath};
use crate::validate;
use anchor_lang::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rounding {
    Floor,
    Ceiling,
}

/// Computes `value * numerator / denominator` with a 256-bit intermediate.
pub fn mul_div(value: u128, numerator: u128, denominator: u128, rounding: Rounding) -> VaultResult<u128> {
    validate!(denominator > 0, ErrorCode::DivisionByZero)?;

    let product = U256::from(value).safe_mul(U256::from(numerator))?;
    let result = match rounding {
        Rounding::Floor => product.safe_div(U256::from(denominator))?,
        Rounding::Ceiling => product.safe_div_ceil(U256::from(denominator))?,
    };

    result.try_to_u128()
}

/// Shares minted for `amount` deposited into a vault currently worth `total_equity`.
/// The first deposit into an empty vault is minted 1:1.
pub fn amount_to_shares(
    amount: u128,
    total_shares: u128,
    total_equity: u128,
    rounding: Rounding,
) -> VaultResult<u128> {
    if total_shares == 0 {
        return Ok(amount);
    }

    validate!(
        total_equity > 0,
        ErrorCode::InsufficientLiquidity,
        "vault has {} shares outstanding and no equity",
        total_shares
    )?;

    mul_div(amount, total_shares, total_equity, rounding)
}

pub fn shares_to_amount(
    shares: u128,
    total_shares: u128,
    total_equity: u128,
    rounding: Rounding,
) -> VaultResult<u128> {
    if total_shares == 0 {
        return Ok(0);
    }

    mul_div(shares, total_equity, total_shares, rounding)
}

/// Equity per share scaled by SHARE_PRICE_PRECISION.
pub fn share_price(total_shares: u128, total_equity: u128) -> VaultResult<u128> {
    if total_shares == 0 {
        return Ok(SHARE_PRICE_PRECISION);
    }

    mul_div(total_equity, SHARE_PRICE_PRECISION, total_shares, Rounding::Floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_rounding() {
        assert_eq!(mul_div(100, 1, 3, Rounding::Floor).unwrap(), 33);
        assert_eq!(mul_div(100, 1, 3, Rounding::Ceiling).unwrap(), 34);
        assert_eq!(mul_div(100, 3, 2, Rounding::Ceiling).unwrap(), 150);
        assert_eq!(
            mul_div(u128::MAX, u128::MAX, u128::MAX, Rounding::Floor).unwrap(),
            u128::MAX
        );
        assert_eq!(
            mul_div(u128::MAX, 2, 1, Rounding::Floor),
            Err(ErrorCode::CastingFailure)
        );
        assert_eq!(mul_div(1, 1, 0, Rounding::Floor), Err(ErrorCode::DivisionByZero));
    }

    #[test]
    fn first_deposit_is_one_to_one() {
        let shares = amount_to_shares(1_000_000_000, 0, 0, Rounding::Floor).unwrap();
        assert_eq!(shares, 1_000_000_000);
        assert_eq!(share_price(0, 0).unwrap(), SHARE_PRICE_PRECISION);
    }

    #[test]
    fn rounding_favors_vault() {
        // 3 shares backed by 10 units: a deposit of 1 buys 0.3 shares
        assert_eq!(amount_to_shares(1, 3, 10, Rounding::Floor).unwrap(), 0);
        assert_eq!(amount_to_shares(10, 3, 10, Rounding::Floor).unwrap(), 3);
        // redeeming 1 of 3 shares on 10 units yields 3.33
        assert_eq!(shares_to_amount(1, 3, 10, Rounding::Floor).unwrap(), 3);

        assert_eq!(
            amount_to_shares(1, 3, 0, Rounding::Floor),
            Err(ErrorCode::InsufficientLiquidity)
        );
    }
}
