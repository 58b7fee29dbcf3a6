use crate::constants::VAULT_SEED;
use crate::error::{ErrorCode, VaultResult};
use crate::Size;
use anchor_lang::prelude::*;
use static_assertions::const_assert_eq;
use vault_macros::assert_no_slop;

#[derive(Clone, Copy, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub enum VaultStatus {
    Active,
    /// Only observable from inside a rebalance
    Rebalancing,
    /// Unwound by the stoploss. A strategist rebalance reactivates the vault.
    Stopped,
}

impl Default for VaultStatus {
    fn default() -> Self {
        VaultStatus::Active
    }
}

impl TryFrom<u8> for VaultStatus {
    type Error = ErrorCode;

    fn try_from(value: u8) -> VaultResult<Self> {
        match value {
            0 => Ok(VaultStatus::Active),
            1 => Ok(VaultStatus::Rebalancing),
            2 => Ok(VaultStatus::Stopped),
            _ => Err(ErrorCode::InvalidParameter),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub enum VaultVersion {
    V1DnClassic,
    V1Alpha,
}

impl Default for VaultVersion {
    fn default() -> Self {
        VaultVersion::V1DnClassic
    }
}

impl TryFrom<u8> for VaultVersion {
    type Error = ErrorCode;

    fn try_from(value: u8) -> VaultResult<Self> {
        match value {
            0 => Ok(VaultVersion::V1DnClassic),
            1 => Ok(VaultVersion::V1Alpha),
            _ => Err(ErrorCode::InvalidParameter),
        }
    }
}

#[assert_no_slop]
#[account(zero_copy(unsafe))]
#[derive(Default, Eq, PartialEq, Debug)]
#[repr(C)]
pub struct Vault {
    /// Shares outstanding across all depositors
    pub total_shares: u128,
    /// Liquidity of the pool position at [`lower_tick`, `upper_tick`)
    pub liquidity: u128,
    /// Highest share price the performance fee has been charged at: SHARE_PRICE_PRECISION
    pub high_water_mark: u128,
    /// Custodied token0 (stable). Includes `accrued_performance_fee`.
    pub idle0: u128,
    /// Custodied token1 (volatile)
    pub idle1: u128,
    /// Stable supplied to the lending market as of the last sync
    pub hedge_collateral: u128,
    /// Volatile borrowed from the lending market as of the last sync
    pub hedge_debt: u128,
    /// Performance fee owed to the fee recipient, held in `idle0`
    pub accrued_performance_fee: u128,
    pub total_deposits: u128,
    pub total_withdraws: u128,
    pub total_fees_paid: u128,
    pub last_rebalance_ts: i64,
    pub last_fee_collect_ts: i64,
    pub created_ts: i64,
    /// Factory nonce the vault pubkey is derived from
    pub nonce: u64,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub name: [u8; 32],
    /// The vault's pubkey. It is a pda of the factory and nonce.
    pub pubkey: Pubkey,
    pub factory: Pubkey,
    /// The deposit and accounting token
    pub token0: Pubkey,
    /// The hedged volatile token
    pub token1: Pubkey,
    pub liquidity_manager: Pubkey,
    pub lending_manager: Pubkey,
    pub version: u8,
    pub status: u8,
    pub reentrancy_lock: u8,
    pub bump: u8,
    pub padding: [u8; 20],
}

impl Size for Vault {
    const SIZE: usize = 464 + 8;
}
const_assert_eq!(Vault::SIZE, std::mem::size_of::<Vault>() + 8);

impl Vault {
    pub fn get_vault_signer_seeds<'a>(
        factory: &'a [u8],
        nonce: &'a [u8; 8],
        bump: &'a u8,
    ) -> [&'a [u8]; 4] {
        [VAULT_SEED, factory, nonce, bytemuck::bytes_of(bump)]
    }

    pub fn status(&self) -> VaultResult<VaultStatus> {
        VaultStatus::try_from(self.status)
    }

    pub fn set_status(&mut self, status: VaultStatus) {
        self.status = status as u8;
    }

    pub fn version(&self) -> VaultResult<VaultVersion> {
        VaultVersion::try_from(self.version)
    }

    pub fn has_position(&self) -> bool {
        self.liquidity > 0 || self.hedge_collateral > 0 || self.hedge_debt > 0
    }
}
