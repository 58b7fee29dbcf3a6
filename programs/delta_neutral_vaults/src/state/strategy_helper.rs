use crate::constants::{MAX_STRATEGISTS, STRATEGY_HELPER_SEED};
use crate::error::{ErrorCode, VaultResult};
use crate::validate;
use crate::Size;
use anchor_lang::prelude::*;

/// Strategists allowed to rebalance a vault.
#[account]
#[derive(Default, Debug, PartialEq, Eq)]
pub struct StrategyHelper {
    pub pubkey: Pubkey,
    pub vault: Pubkey,
    pub owner: Pubkey,
    pub strategists: Vec<Pubkey>,
}

impl Size for StrategyHelper {
    const SIZE: usize = 96 + 4 + 32 * MAX_STRATEGISTS + 8;
}

impl StrategyHelper {
    pub fn new(vault: Pubkey, owner: Pubkey) -> Self {
        let (pubkey, _) =
            Pubkey::find_program_address(&[STRATEGY_HELPER_SEED, vault.as_ref()], &crate::id());

        Self {
            pubkey,
            vault,
            owner,
            strategists: vec![],
        }
    }

    pub fn is_strategist(&self, key: &Pubkey) -> bool {
        self.strategists.contains(key)
    }

    pub fn set_strategist(&mut self, caller: &Pubkey, key: Pubkey, enabled: bool) -> VaultResult {
        self.validate_owner(caller)?;

        match (enabled, self.is_strategist(&key)) {
            (true, false) => {
                validate!(
                    self.strategists.len() < MAX_STRATEGISTS,
                    ErrorCode::TooManyStrategists,
                    "vault {} already has {} strategists",
                    self.vault,
                    self.strategists.len()
                )?;
                self.strategists.push(key);
            }
            (false, true) => self.strategists.retain(|strategist| strategist != &key),
            _ => {}
        }

        msg!("strategist {} enabled={} for vault {}", key, enabled, self.vault);
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &Pubkey, new_owner: Pubkey) -> VaultResult {
        self.validate_owner(caller)?;
        self.owner = new_owner;
        Ok(())
    }

    pub fn validate_strategist(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            self.is_strategist(caller),
            ErrorCode::Unauthorized,
            "{} is not a strategist for vault {}",
            caller,
            self.vault
        )
    }

    fn validate_owner(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            caller.eq(&self.owner),
            ErrorCode::Unauthorized,
            "{} is not the owner of strategy helper {}",
            caller,
            self.pubkey
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategist_set() {
        let owner = Pubkey::new_unique();
        let mut helper = StrategyHelper::new(Pubkey::new_unique(), owner);
        let strategist = Pubkey::new_unique();

        assert_eq!(
            helper.set_strategist(&strategist, strategist, true),
            Err(ErrorCode::Unauthorized)
        );

        helper.set_strategist(&owner, strategist, true).unwrap();
        helper.set_strategist(&owner, strategist, true).unwrap();
        assert_eq!(helper.strategists, vec![strategist]);
        assert!(helper.validate_strategist(&strategist).is_ok());

        helper.set_strategist(&owner, strategist, false).unwrap();
        assert_eq!(
            helper.validate_strategist(&strategist),
            Err(ErrorCode::Unauthorized)
        );
    }

    #[test]
    fn strategist_limit() {
        let owner = Pubkey::new_unique();
        let mut helper = StrategyHelper::new(Pubkey::new_unique(), owner);
        for _ in 0..MAX_STRATEGISTS {
            helper
                .set_strategist(&owner, Pubkey::new_unique(), true)
                .unwrap();
        }
        assert_eq!(
            helper.set_strategist(&owner, Pubkey::new_unique(), true),
            Err(ErrorCode::TooManyStrategists)
        );

        // a full helper fills the account exactly
        assert_eq!(helper.try_to_vec().unwrap().len() + 8, StrategyHelper::SIZE);
    }

    #[test]
    fn ownership_transfer() {
        let owner = Pubkey::new_unique();
        let new_owner = Pubkey::new_unique();
        let mut helper = StrategyHelper::new(Pubkey::new_unique(), owner);
        helper.transfer_ownership(&owner, new_owner).unwrap();
        assert_eq!(
            helper.set_strategist(&owner, owner, true),
            Err(ErrorCode::Unauthorized)
        );
        helper.set_strategist(&new_owner, owner, true).unwrap();
    }
}
