use crate::error::VaultResult;
use crate::math::bn::{U256, U512};
use crate::math_error;
use anchor_lang::prelude::*;

pub trait SafeMath: Sized {
    fn safe_add(self, rhs: Self) -> VaultResult<Self>;
    fn safe_sub(self, rhs: Self) -> VaultResult<Self>;
    fn safe_mul(self, rhs: Self) -> VaultResult<Self>;
    fn safe_div(self, rhs: Self) -> VaultResult<Self>;
}

/// Division rounding toward positive infinity, for unsigned operands only.
pub trait SafeDivCeil: Sized {
    fn safe_div_ceil(self, rhs: Self) -> VaultResult<Self>;
}

macro_rules! checked_impl {
    ($t:ty) => {
        impl SafeMath for $t {
            #[track_caller]
            #[inline(always)]
            fn safe_add(self, v: $t) -> VaultResult<$t> {
                self.checked_add(v).ok_or_else(math_error!())
            }

            #[track_caller]
            #[inline(always)]
            fn safe_sub(self, v: $t) -> VaultResult<$t> {
                self.checked_sub(v).ok_or_else(math_error!())
            }

            #[track_caller]
            #[inline(always)]
            fn safe_mul(self, v: $t) -> VaultResult<$t> {
                self.checked_mul(v).ok_or_else(math_error!())
            }

            #[track_caller]
            #[inline(always)]
            fn safe_div(self, v: $t) -> VaultResult<$t> {
                self.checked_div(v).ok_or_else(math_error!())
            }
        }
    };
}

macro_rules! div_ceil_impl {
    ($t:ty, $zero:expr, $one:expr) => {
        impl SafeDivCeil for $t {
            #[track_caller]
            #[inline(always)]
            fn safe_div_ceil(self, v: $t) -> VaultResult<$t> {
                let quotient = self.safe_div(v)?;
                let remainder = self.checked_rem(v).ok_or_else(math_error!())?;
                if remainder > $zero {
                    quotient.safe_add($one)
                } else {
                    Ok(quotient)
                }
            }
        }
    };
}

checked_impl!(U512);
checked_impl!(U256);
checked_impl!(u128);
checked_impl!(u64);
checked_impl!(u32);
checked_impl!(u16);
checked_impl!(u8);
checked_impl!(i128);
checked_impl!(i64);
checked_impl!(i32);

div_ceil_impl!(U512, U512::zero(), U512::one());
div_ceil_impl!(U256, U256::zero(), U256::one());
div_ceil_impl!(u128, 0, 1);
div_ceil_impl!(u64, 0, 1);
div_ceil_impl!(u32, 0, 1);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn safe_ops() {
        assert_eq!(u128::MAX.safe_add(1), Err(ErrorCode::MathError));
        assert_eq!(0_u64.safe_sub(1), Err(ErrorCode::MathError));
        assert_eq!(10_u32.safe_div(0), Err(ErrorCode::MathError));
        assert_eq!((-5_i64).safe_mul(3).unwrap(), -15);
    }

    #[test]
    fn div_ceil() {
        assert_eq!(10_u128.safe_div_ceil(3).unwrap(), 4);
        assert_eq!(9_u128.safe_div_ceil(3).unwrap(), 3);
        assert_eq!(0_u64.safe_div_ceil(7).unwrap(), 0);
        assert_eq!(
            U256::from(7u8).safe_div_ceil(U256::from(2u8)).unwrap(),
            U256::from(4u8)
        );
        assert_eq!(1_u32.safe_div_ceil(0), Err(ErrorCode::MathError));
    }
}
