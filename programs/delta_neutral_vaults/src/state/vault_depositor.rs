use crate::constants::VAULT_DEPOSITOR_SEED;
use crate::error::{ErrorCode, VaultResult};
use crate::math::safe_math::SafeMath;
use crate::validate;
use crate::Size;
use anchor_lang::prelude::*;
use static_assertions::const_assert_eq;
use vault_macros::assert_no_slop;

#[assert_no_slop]
#[account(zero_copy(unsafe))]
#[derive(Default, Eq, PartialEq, Debug)]
#[repr(C)]
pub struct VaultDepositor {
    pub shares: u128,
    /// Lifetime token0 deposited
    pub total_deposits: u128,
    /// Lifetime token0 withdrawn, excluding token1 paid out
    pub total_withdraws: u128,
    /// Lockup anchor
    pub last_deposit_ts: i64,
    pub last_withdraw_ts: i64,
    /// The vault deposited into
    pub vault: Pubkey,
    /// The vault depositor account's pubkey. It is a pda of vault and authority
    pub pubkey: Pubkey,
    /// The authority is the address w permission to deposit/withdraw
    pub authority: Pubkey,
}

impl Size for VaultDepositor {
    const SIZE: usize = 160 + 8;
}
const_assert_eq!(
    VaultDepositor::SIZE,
    std::mem::size_of::<VaultDepositor>() + 8
);

impl VaultDepositor {
    pub fn new(vault: Pubkey, authority: Pubkey) -> Self {
        let (pubkey, _) = Pubkey::find_program_address(
            &[VAULT_DEPOSITOR_SEED, vault.as_ref(), authority.as_ref()],
            &crate::id(),
        );

        Self {
            vault,
            pubkey,
            authority,
            ..VaultDepositor::default()
        }
    }

    pub fn validate_lockup(&self, lockup_period: i64, now: i64) -> VaultResult {
        let unlock_ts = self.last_deposit_ts.safe_add(lockup_period)?;
        validate!(
            now >= unlock_ts,
            ErrorCode::LockupActive,
            "shares locked until {} (now {})",
            unlock_ts,
            now
        )
    }

    pub fn apply_deposit(&mut self, amount: u128, shares: u128, now: i64) -> VaultResult {
        self.shares = self.shares.safe_add(shares)?;
        self.total_deposits = self.total_deposits.safe_add(amount)?;
        self.last_deposit_ts = now;
        Ok(())
    }

    pub fn apply_withdraw(&mut self, amount: u128, shares: u128, now: i64) -> VaultResult {
        validate!(
            shares <= self.shares,
            ErrorCode::InsufficientShares,
            "withdraw {} shares > {} owned",
            shares,
            self.shares
        )?;
        self.shares = self.shares.safe_sub(shares)?;
        self.total_withdraws = self.total_withdraws.safe_add(amount)?;
        self.last_withdraw_ts = now;
        Ok(())
    }
}
