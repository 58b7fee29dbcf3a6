use crate::error::{ErrorCode, VaultResult};
use crate::state::{Registry, VaultCore};
use crate::validate;
use anchor_lang::prelude::*;

/// Watches registered vaults for price moves outside their stoploss band and
/// unwinds them on behalf of the keeper.
///
/// The checker is the identity vaults know as their keeper; the keeper bot only
/// holds the right to call `trigger`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoplossChecker {
    pub pubkey: Pubkey,
    pub owner: Pubkey,
    pub keeper: Pubkey,
    /// (vault, strategy helper)
    vaults: Vec<(Pubkey, Pubkey)>,
}

impl StoplossChecker {
    pub fn new(pubkey: Pubkey, owner: Pubkey, keeper: Pubkey) -> Self {
        Self {
            pubkey,
            owner,
            keeper,
            vaults: vec![],
        }
    }

    fn validate_owner(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            caller.eq(&self.owner),
            ErrorCode::Unauthorized,
            "{} is not the owner of stoploss checker {}",
            caller,
            self.pubkey
        )
    }

    pub fn set_keeper(&mut self, caller: &Pubkey, keeper: Pubkey) -> VaultResult {
        self.validate_owner(caller)?;
        msg!("stoploss keeper: {} -> {}", self.keeper, keeper);
        self.keeper = keeper;
        Ok(())
    }

    pub fn vaults(&self) -> &[(Pubkey, Pubkey)] {
        &self.vaults
    }

    pub fn is_watched(&self, vault: &Pubkey) -> bool {
        self.vaults.iter().any(|(key, _)| key == vault)
    }

    /// Watches `vault`. `helper` must be the strategy helper the vault was created with.
    pub fn add_vault(
        &mut self,
        caller: &Pubkey,
        registry: &Registry,
        vault: Pubkey,
        helper: Pubkey,
    ) -> VaultResult {
        self.validate_owner(caller)?;
        Self::validate_helper(registry.vault(&vault)?, &helper)?;
        if !self.is_watched(&vault) {
            self.vaults.push((vault, helper));
        }
        Ok(())
    }

    pub fn remove_vault(&mut self, caller: &Pubkey, vault: &Pubkey) -> VaultResult {
        self.validate_owner(caller)?;
        self.vaults.retain(|(key, _)| key != vault);
        Ok(())
    }

    fn validate_helper(core: &VaultCore, helper: &Pubkey) -> VaultResult {
        validate!(
            core.strategy_helper().pubkey.eq(helper),
            ErrorCode::InvalidParameter,
            "helper {} does not belong to vault {}",
            helper,
            core.pubkey()
        )
    }

    fn watched_helper(&self, vault: &Pubkey) -> VaultResult<Pubkey> {
        self.vaults
            .iter()
            .find(|(key, _)| key == vault)
            .map(|(_, helper)| *helper)
            .ok_or_else(|| {
                msg!("vault {} is not watched by {}", vault, self.pubkey);
                ErrorCode::VaultNotRegistered
            })
    }

    /// Judged on the pool TWAP, so a single swap moving the spot price cannot trip it.
    pub fn is_breached(&self, core: &VaultCore, now: i64) -> VaultResult<bool> {
        core.is_stoploss_breached(now)
    }

    /// Watched vaults that are breached and still hold a position.
    pub fn check(&self, registry: &Registry, now: i64) -> VaultResult<Vec<Pubkey>> {
        let mut breached = vec![];
        for (vault, _) in self.vaults.iter() {
            let core = registry.vault(vault)?;
            if self.is_breached(core, now)? && !core.is_fully_unwound(now)? {
                breached.push(*vault);
            }
        }
        Ok(breached)
    }

    /// Unwinds `vault` if its stoploss band is breached. Returns false when there
    /// was nothing left to unwind.
    pub fn trigger(
        &self,
        caller: &Pubkey,
        registry: &mut Registry,
        vault: &Pubkey,
        now: i64,
    ) -> VaultResult<bool> {
        validate!(
            caller.eq(&self.keeper),
            ErrorCode::Unauthorized,
            "{} is not the stoploss keeper",
            caller
        )?;

        let helper = self.watched_helper(vault)?;
        let core = registry.vault_mut(vault)?;
        Self::validate_helper(core, &helper)?;

        if core.is_fully_unwound(now)? {
            msg!("vault {} already unwound", vault);
            return Ok(false);
        }

        validate!(
            self.is_breached(core, now)?,
            ErrorCode::StoplossNotBreached,
            "vault {} twap tick {} inside stoploss band [{}, {}]",
            vault,
            core.twap_tick(now)?,
            core.parameters().stoploss_lower_tick,
            core.parameters().stoploss_upper_tick
        )?;

        core.force_unwind(&self.pubkey, now)
    }
}
