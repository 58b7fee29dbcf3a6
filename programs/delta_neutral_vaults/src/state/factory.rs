use crate::adapters::{
    AaveLendingPoolManager, CamelotV3LiquidityPoolManager, LendingPoolManager,
    LiquidityPoolManager, PoolProtocol, UniswapV3LiquidityPoolManager,
};
use crate::constants::{LENDING_MANAGER_SEED, LIQUIDITY_MANAGER_SEED, VAULT_SEED};
use crate::error::{ErrorCode, VaultResult};
use crate::events::{VaultCreatedRecord, VaultEvent};
use crate::math::merkle::MerkleNode;
use crate::math::safe_math::SafeMath;
use crate::state::{
    Emitter, Parameters, ParametersUpdate, Registry, StrategyHelper, Vault, VaultCore,
    VaultStatus, VaultVersion,
};
use crate::validate;
use crate::venues::{ConcentratedPool, LendingMarket};
use anchor_lang::prelude::*;

#[derive(Debug, Clone, Default, AnchorSerialize, AnchorDeserialize, PartialEq, Eq)]
pub struct VaultConfig {
    pub name: [u8; 32],
    /// Deposit and accounting token
    pub stable_mint: Pubkey,
    /// Token hedged through the lending market
    pub volatile_mint: Pubkey,
    pub version: VaultVersion,
    pub deposit_cap: u128,
    pub user_deposit_cap: u128,
    pub min_deposit_amount: u128,
    pub lockup_period: i64,
    pub allowlist_enabled: bool,
    pub merkle_root: MerkleNode,
}

#[derive(Debug, Clone)]
pub struct LiquidityManagerConfig {
    pub protocol: PoolProtocol,
    pub pool: ConcentratedPool,
    pub performance_fee_recipient: Pubkey,
    pub performance_fee_divisor: u64,
}

#[derive(Debug, Clone)]
pub struct LendingManagerConfig {
    pub market: LendingMarket,
}

#[derive(Debug, Clone, Copy, Default, AnchorSerialize, AnchorDeserialize, PartialEq, Eq)]
pub struct StrategyConfig {
    pub strategist: Pubkey,
    pub keeper: Pubkey,
    pub target_ltv_bps: u16,
    pub hedge_ratio_bps: u16,
}

/// Deterministic vault instantiation. Vault keys derive from the factory key and
/// a nonce that only moves forward, so identical configs yield distinct vaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Factory {
    pub pubkey: Pubkey,
    pub nonce: u64,
}

impl Factory {
    pub fn new(pubkey: Pubkey) -> Self {
        Self { pubkey, nonce: 0 }
    }

    pub fn vault_address(&self, nonce: u64) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[VAULT_SEED, self.pubkey.as_ref(), &nonce.to_le_bytes()],
            &crate::id(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_vault(
        &mut self,
        registry: &mut Registry,
        emitter: &mut Emitter,
        caller: &Pubkey,
        vault_config: VaultConfig,
        liquidity_config: LiquidityManagerConfig,
        lending_config: LendingManagerConfig,
        strategy_config: StrategyConfig,
        now: i64,
    ) -> VaultResult<Pubkey> {
        registry.validate_deployer(caller)?;
        emitter.validate_owner(&self.pubkey)?;
        validate!(
            vault_config.stable_mint != vault_config.volatile_mint,
            ErrorCode::InvalidPoolTokens,
            "vault cannot hedge {} against itself",
            vault_config.stable_mint
        )?;

        let nonce = self.nonce;
        let (vault_key, bump) = self.vault_address(nonce);
        registry.validate_unregistered(&vault_key)?;
        validate!(
            emitter.version_of(&vault_key).is_none(),
            ErrorCode::VaultAlreadyRegistered,
            "vault {} already known to emitter {}",
            vault_key,
            emitter.pubkey
        )?;

        let pool_key = liquidity_config.pool.pubkey;
        let market_key = lending_config.market.pubkey;

        let (liquidity_manager_key, _) = Pubkey::find_program_address(
            &[LIQUIDITY_MANAGER_SEED, vault_key.as_ref()],
            &crate::id(),
        );
        let mut liquidity_manager: Box<dyn LiquidityPoolManager> =
            match liquidity_config.protocol {
                PoolProtocol::UniswapV3 => Box::new(UniswapV3LiquidityPoolManager::new(
                    liquidity_manager_key,
                    self.pubkey,
                    liquidity_config.pool,
                    vault_config.stable_mint,
                    vault_config.volatile_mint,
                )?),
                PoolProtocol::CamelotV3 => Box::new(CamelotV3LiquidityPoolManager::new(
                    liquidity_manager_key,
                    self.pubkey,
                    liquidity_config.pool,
                    vault_config.stable_mint,
                    vault_config.volatile_mint,
                )?),
            };
        liquidity_manager.set_vault(&self.pubkey, vault_key)?;

        let (lending_manager_key, _) = Pubkey::find_program_address(
            &[LENDING_MANAGER_SEED, vault_key.as_ref()],
            &crate::id(),
        );
        let mut lending_manager: Box<dyn LendingPoolManager> =
            Box::new(AaveLendingPoolManager::new(
                lending_manager_key,
                self.pubkey,
                lending_config.market,
                vault_config.stable_mint,
                vault_config.volatile_mint,
            )?);
        lending_manager.set_vault(&self.pubkey, vault_key)?;

        let mut strategy_helper = StrategyHelper::new(vault_key, *caller);
        if strategy_config.strategist != Pubkey::default() {
            strategy_helper.set_strategist(caller, strategy_config.strategist, true)?;
        }

        let mut parameters = Parameters::new(vault_key, *caller);
        parameters.update(
            caller,
            ParametersUpdate {
                deposit_cap: Some(vault_config.deposit_cap),
                user_deposit_cap: Some(vault_config.user_deposit_cap),
                allowlist_enabled: Some(vault_config.allowlist_enabled),
                merkle_root: Some(vault_config.merkle_root),
                min_deposit_amount: Some(vault_config.min_deposit_amount),
                lockup_period: Some(vault_config.lockup_period),
                helper: Some(strategy_helper.pubkey),
                keeper: Some(strategy_config.keeper),
                performance_fee_recipient: Some(liquidity_config.performance_fee_recipient),
                performance_fee_divisor: Some(liquidity_config.performance_fee_divisor),
                target_ltv_bps: Some(strategy_config.target_ltv_bps),
                hedge_ratio_bps: Some(strategy_config.hedge_ratio_bps),
                ..ParametersUpdate::default()
            },
            now,
        )?;

        let reversed = liquidity_manager.reversed();
        let vault = Vault {
            name: vault_config.name,
            pubkey: vault_key,
            factory: self.pubkey,
            token0: vault_config.stable_mint,
            token1: vault_config.volatile_mint,
            liquidity_manager: liquidity_manager_key,
            lending_manager: lending_manager_key,
            version: vault_config.version as u8,
            status: VaultStatus::Active as u8,
            nonce,
            bump,
            created_ts: now,
            ..Vault::default()
        };

        let mut core = VaultCore::new(
            vault,
            parameters,
            strategy_helper,
            liquidity_manager,
            lending_manager,
        )?;
        core.record(VaultEvent::Created(VaultCreatedRecord {
            ts: now,
            vault: vault_key,
            factory: self.pubkey,
            creator: *caller,
            version: vault_config.version,
            nonce,
            pool: pool_key,
            lending_market: market_key,
            reversed,
        }));

        registry.register_vault(caller, core)?;
        emitter.register_vault(&self.pubkey, vault_key, vault_config.version)?;
        self.nonce = nonce.safe_add(1)?;

        msg!(
            "created vault {} (nonce {}) on pool {} hedged in market {}",
            vault_key,
            nonce,
            pool_key,
            market_key
        );

        Ok(vault_key)
    }
}
