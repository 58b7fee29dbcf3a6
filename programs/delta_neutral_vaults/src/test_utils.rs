use anchor_lang::prelude::Pubkey;

use crate::adapters::PoolProtocol;
use crate::math::oracle::one_dollar;
use crate::venues::{ConcentratedPool, FeeModel, LendingMarket, Reserve};
use crate::{
    Emitter, Factory, LendingManagerConfig, LiquidityManagerConfig, Registry, StoplossChecker,
    StrategyConfig, VaultConfig, VaultCore, VaultVersion,
};

/// ~1285 USDC per WETH with WETH as pool token0
pub const POOL_TICK: i32 = -204_720;
pub const LOWER_TICK: i32 = -205_680;
pub const UPPER_TICK: i32 = -203_760;
pub const STOPLOSS_LOWER_TICK: i32 = -206_280;
pub const STOPLOSS_UPPER_TICK: i32 = -203_160;

pub const ONE_USDC: u128 = 1_000_000;

pub struct TestEnv {
    pub admin: Pubkey,
    pub deployer: Pubkey,
    pub strategist: Pubkey,
    pub keeper_bot: Pubkey,
    pub fee_recipient: Pubkey,
    pub usdc: Pubkey,
    pub weth: Pubkey,
    pub registry: Registry,
    pub emitter: Emitter,
    pub factory: Factory,
    pub stoploss_checker: StoplossChecker,
}

impl TestEnv {
    pub fn new() -> Self {
        let admin = Pubkey::new_unique();
        let deployer = Pubkey::new_unique();
        let keeper_bot = Pubkey::new_unique();

        let factory = Factory::new(Pubkey::new_unique());
        let emitter = Emitter::new(Pubkey::new_unique(), factory.pubkey);
        let mut registry = Registry::new(admin);
        registry.grant_deployer(&admin, deployer).unwrap();
        registry.grant_deployer(&admin, factory.pubkey).unwrap();

        Self {
            admin,
            deployer,
            strategist: Pubkey::new_unique(),
            keeper_bot,
            fee_recipient: Pubkey::new_unique(),
            usdc: Pubkey::new_unique(),
            weth: Pubkey::new_unique(),
            registry,
            emitter,
            factory,
            stoploss_checker: StoplossChecker::new(Pubkey::new_unique(), admin, keeper_bot),
        }
    }

    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            name: *b"usdc weth delta neutral         ",
            stable_mint: self.usdc,
            volatile_mint: self.weth,
            version: VaultVersion::V1DnClassic,
            min_deposit_amount: 10_000,
            ..VaultConfig::default()
        }
    }

    pub fn liquidity_config(&self) -> LiquidityManagerConfig {
        LiquidityManagerConfig {
            protocol: PoolProtocol::UniswapV3,
            pool: ConcentratedPool::new(
                Pubkey::new_unique(),
                self.weth,
                self.usdc,
                60,
                FeeModel::Static { fee_pips: 3_000 },
                POOL_TICK,
                0,
            )
            .unwrap(),
            performance_fee_recipient: self.fee_recipient,
            performance_fee_divisor: 10,
        }
    }

    pub fn camelot_liquidity_config(&self) -> LiquidityManagerConfig {
        LiquidityManagerConfig {
            protocol: PoolProtocol::CamelotV3,
            pool: ConcentratedPool::new(
                Pubkey::new_unique(),
                self.weth,
                self.usdc,
                60,
                FeeModel::Adaptive {
                    base_fee_pips: 100,
                    max_fee_pips: 3_000,
                    fee_pips_per_tick: 1,
                },
                POOL_TICK,
                0,
            )
            .unwrap(),
            performance_fee_recipient: self.fee_recipient,
            performance_fee_divisor: 10,
        }
    }

    pub fn lending_config(&self) -> LendingManagerConfig {
        let mut market = LendingMarket::new(Pubkey::new_unique());
        market
            .add_reserve(Reserve::new(self.usdc, 6, one_dollar(), 7_500, 0))
            .unwrap();
        market
            .add_reserve(Reserve::new(self.weth, 18, 1_285 * one_dollar(), 8_000, 0))
            .unwrap();
        LendingManagerConfig { market }
    }

    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            strategist: self.strategist,
            keeper: self.stoploss_checker.pubkey,
            target_ltv_bps: 6_000,
            hedge_ratio_bps: 10_000,
        }
    }

    pub fn create_vault_with(
        &mut self,
        vault_config: VaultConfig,
        liquidity_config: LiquidityManagerConfig,
    ) -> Pubkey {
        let lending_config = self.lending_config();
        let strategy_config = self.strategy_config();
        let vault = self
            .factory
            .create_vault(
                &mut self.registry,
                &mut self.emitter,
                &self.deployer,
                vault_config,
                liquidity_config,
                lending_config,
                strategy_config,
                0,
            )
            .unwrap();

        let helper = self.registry.vault(&vault).unwrap().strategy_helper().pubkey;
        self.stoploss_checker
            .add_vault(&self.admin, &self.registry, vault, helper)
            .unwrap();
        vault
    }

    pub fn create_vault(&mut self) -> Pubkey {
        let vault_config = self.vault_config();
        let liquidity_config = self.liquidity_config();
        self.create_vault_with(vault_config, liquidity_config)
    }

    pub fn core(&mut self, vault: &Pubkey) -> &mut VaultCore {
        self.registry.vault_mut(vault).unwrap()
    }

    pub fn rebalance(&mut self, vault: &Pubkey, now: i64) {
        let strategist = self.strategist;
        self.core(vault)
            .rebalance(
                &strategist,
                LOWER_TICK,
                UPPER_TICK,
                STOPLOSS_LOWER_TICK,
                STOPLOSS_UPPER_TICK,
                0,
                0,
                now,
            )
            .unwrap();
    }
}
