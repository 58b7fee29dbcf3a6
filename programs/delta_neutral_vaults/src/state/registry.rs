use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ErrorCode, VaultResult};
use crate::state::VaultCore;
use crate::validate;
use anchor_lang::prelude::*;

/// Every vault the protocol knows about, and who may deploy new ones.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    pub admin: Pubkey,
    deployers: BTreeSet<Pubkey>,
    vaults: BTreeMap<Pubkey, VaultCore>,
}

impl Registry {
    pub fn new(admin: Pubkey) -> Self {
        Self {
            admin,
            deployers: BTreeSet::new(),
            vaults: BTreeMap::new(),
        }
    }

    fn validate_admin(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            caller.eq(&self.admin),
            ErrorCode::Unauthorized,
            "{} is not the registry admin",
            caller
        )
    }

    pub fn grant_deployer(&mut self, caller: &Pubkey, deployer: Pubkey) -> VaultResult {
        self.validate_admin(caller)?;
        self.deployers.insert(deployer);
        msg!("deployer role granted to {}", deployer);
        Ok(())
    }

    pub fn revoke_deployer(&mut self, caller: &Pubkey, deployer: &Pubkey) -> VaultResult {
        self.validate_admin(caller)?;
        self.deployers.remove(deployer);
        msg!("deployer role revoked from {}", deployer);
        Ok(())
    }

    pub fn is_deployer(&self, key: &Pubkey) -> bool {
        self.deployers.contains(key)
    }

    pub fn validate_deployer(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            self.is_deployer(caller),
            ErrorCode::Unauthorized,
            "{} lacks the deployer role",
            caller
        )
    }

    pub fn validate_unregistered(&self, vault: &Pubkey) -> VaultResult {
        validate!(
            !self.vaults.contains_key(vault),
            ErrorCode::VaultAlreadyRegistered,
            "vault {} already registered",
            vault
        )
    }

    pub fn register_vault(&mut self, caller: &Pubkey, core: VaultCore) -> VaultResult {
        self.validate_deployer(caller)?;
        self.validate_unregistered(&core.pubkey())?;

        self.vaults.insert(core.pubkey(), core);
        Ok(())
    }

    pub fn vault(&self, key: &Pubkey) -> VaultResult<&VaultCore> {
        self.vaults.get(key).ok_or_else(|| {
            msg!("vault {} not registered", key);
            ErrorCode::VaultNotRegistered
        })
    }

    pub fn vault_mut(&mut self, key: &Pubkey) -> VaultResult<&mut VaultCore> {
        self.vaults.get_mut(key).ok_or_else(|| {
            msg!("vault {} not registered", key);
            ErrorCode::VaultNotRegistered
        })
    }

    pub fn vault_keys(&self) -> Vec<Pubkey> {
        self.vaults.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployer_role() {
        let admin = Pubkey::new_unique();
        let deployer = Pubkey::new_unique();
        let mut registry = Registry::new(admin);

        assert_eq!(
            registry.grant_deployer(&deployer, deployer),
            Err(ErrorCode::Unauthorized)
        );
        registry.grant_deployer(&admin, deployer).unwrap();
        assert!(registry.validate_deployer(&deployer).is_ok());

        registry.revoke_deployer(&admin, &deployer).unwrap();
        assert_eq!(
            registry.validate_deployer(&deployer),
            Err(ErrorCode::Unauthorized)
        );
    }

    #[test]
    fn unknown_vault() {
        let mut registry = Registry::new(Pubkey::new_unique());
        let key = Pubkey::new_unique();
        assert_eq!(registry.vault(&key).err(), Some(ErrorCode::VaultNotRegistered));
        assert_eq!(
            registry.vault_mut(&key).err(),
            Some(ErrorCode::VaultNotRegistered)
        );
        assert!(registry.vault_keys().is_empty());
    }
}
