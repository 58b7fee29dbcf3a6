//! Fixed-width big integers for Q64.96 price math.
#![allow(clippy::assign_op_pattern)]
#![allow(clippy::ptr_offset_with_cast)]
#![allow(clippy::manual_range_contains)]

use crate::error::{ErrorCode, VaultResult};
use anchor_lang::prelude::msg;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer.
    pub struct U256(4);
}

construct_uint! {
    /// 512-bit unsigned integer, used as the intermediate of U256 mul-div.
    pub struct U512(8);
}

impl U256 {
    pub fn try_to_u128(self) -> VaultResult<u128> {
        if self.bits() > 128 {
            msg!("U256 {} does not fit in u128", self);
            return Err(ErrorCode::CastingFailure);
        }
        Ok(self.as_u128())
    }

    pub fn to_u512(self) -> U512 {
        let mut bytes = [0u8; 32];
        self.to_little_endian(&mut bytes);
        U512::from_little_endian(&bytes)
    }
}

impl U512 {
    pub fn try_to_u256(self) -> VaultResult<U256> {
        if self.bits() > 256 {
            msg!("U512 does not fit in U256");
            return Err(ErrorCode::CastingFailure);
        }
        let mut bytes = [0u8; 64];
        self.to_little_endian(&mut bytes);
        Ok(U256::from_little_endian(&bytes[..32]))
    }

    pub fn try_to_u128(self) -> VaultResult<u128> {
        self.try_to_u256()?.try_to_u128()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_and_narrowing() {
        let value = U256::from(u128::MAX) * U256::from(3u8);
        let wide = value.to_u512();
        assert_eq!(wide.try_to_u256().unwrap(), value);
        assert_eq!(value.try_to_u128(), Err(ErrorCode::CastingFailure));
        assert_eq!(U256::from(42u64).to_u512().try_to_u128().unwrap(), 42);

        let too_wide = U512::from(u128::MAX) * U512::from(u128::MAX) * U512::from(u128::MAX);
        assert_eq!(too_wide.try_to_u256(), Err(ErrorCode::CastingFailure));
    }
}
