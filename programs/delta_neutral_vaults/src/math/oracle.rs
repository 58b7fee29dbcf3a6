use crate::constants::ORACLE_PRICE_PRECISION;
use crate::error::VaultResult;
use crate::math::safe_math::SafeMath;
use crate::math::shares::{mul_div, Rounding};
use anchor_lang::prelude::*;

pub fn token_a_to_token_b(
    token_a_amount: u128,
    token_a_price: u128,
    token_a_decimals: u32,
    token_b_price: u128,
    token_b_decimals: u32,
) -> VaultResult<u128> {
    let numerator = 10u128
        .checked_pow(token_b_decimals)
        .ok_or_else(crate::math_error!())?
        .safe_mul(token_a_price)?;
    let denominator = token_b_price.safe_mul(
        10u128
            .checked_pow(token_a_decimals)
            .ok_or_else(crate::math_error!())?,
    )?;

    mul_div(token_a_amount, numerator, denominator, Rounding::Floor)
}

/// Value of `amount` base units in oracle quote units (ORACLE_PRICE_PRECISION).
pub fn token_value(
    amount: u128,
    price: u128,
    decimals: u32,
    rounding: Rounding,
) -> VaultResult<u128> {
    let one_token = 10u128
        .checked_pow(decimals)
        .ok_or_else(crate::math_error!())?;
    mul_div(amount, price, one_token, rounding)
}

pub fn quote_to_token(quote: u128, price: u128, decimals: u32, rounding: Rounding) -> VaultResult<u128> {
    let one_token = 10u128
        .checked_pow(decimals)
        .ok_or_else(crate::math_error!())?;
    mul_div(quote, one_token, price, rounding)
}

pub fn one_dollar() -> u128 {
    ORACLE_PRICE_PRECISION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_token_a_to_token_b_same_decimals() {
        let result = token_a_to_token_b(
            1_000_000, // 1 tokenA
            one_dollar(),
            6,
            one_dollar(),
            6,
        )
        .unwrap();
        assert_eq!(result, 1_000_000);
    }

    #[test]
    fn test_convert_token_a_to_token_b_different_decimals() {
        // 1 WETH at $1285 into USDC
        let result = token_a_to_token_b(
            1_000_000_000_000_000_000,
            1_285 * one_dollar(),
            18,
            one_dollar(),
            6,
        )
        .unwrap();
        assert_eq!(result, 1_285_000_000);

        // and back
        let result = token_a_to_token_b(1_285_000_000, one_dollar(), 6, 1_285 * one_dollar(), 18)
            .unwrap();
        assert_eq!(result, 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_token_value() {
        let value = token_value(500_000_000_000_000_000, 1_285 * one_dollar(), 18, Rounding::Floor)
            .unwrap();
        assert_eq!(value, 64_250_000_000);
        assert_eq!(
            quote_to_token(value, 1_285 * one_dollar(), 18, Rounding::Ceiling).unwrap(),
            500_000_000_000_000_000
        );
    }
}
