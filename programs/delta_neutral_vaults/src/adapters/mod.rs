use std::fmt::Debug;

use crate::error::{ErrorCode, VaultResult};
use crate::math::price::volatile_to_stable;
use crate::math::rebalance::to_vault_order;
use crate::math::safe_math::SafeMath;
use crate::math::shares::Rounding;
use crate::validate;
use crate::venues::{ConcentratedPool, LendingMarket};
use anchor_lang::prelude::*;

pub use aave::*;
pub use camelot_v3::*;
pub use uniswap_v3::*;

pub mod aave;
pub mod camelot_v3;
pub mod uniswap_v3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub enum PoolProtocol {
    UniswapV3,
    CamelotV3,
}

impl Default for PoolProtocol {
    fn default() -> Self {
        PoolProtocol::UniswapV3
    }
}

/// Single-tenant binding shared by every adapter: the deployer binds it to one
/// vault, after which only that vault may move funds through it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdapterBinding {
    pub pubkey: Pubkey,
    pub owner: Pubkey,
    pub vault: Option<Pubkey>,
}

impl AdapterBinding {
    pub fn new(pubkey: Pubkey, owner: Pubkey) -> Self {
        Self {
            pubkey,
            owner,
            vault: None,
        }
    }

    pub fn bind(&mut self, caller: &Pubkey, vault: Pubkey) -> VaultResult {
        validate!(
            caller.eq(&self.owner),
            ErrorCode::Unauthorized,
            "{} is not the owner of adapter {}",
            caller,
            self.pubkey
        )?;
        validate!(
            self.vault.is_none(),
            ErrorCode::AdapterAlreadyBound,
            "adapter {} already bound to {:?}",
            self.pubkey,
            self.vault
        )?;

        self.vault = Some(vault);
        msg!("adapter {} bound to vault {}", self.pubkey, vault);
        Ok(())
    }

    pub fn validate_caller(&self, caller: &Pubkey) -> VaultResult {
        match self.vault {
            None => {
                msg!("adapter {} has no vault", self.pubkey);
                Err(ErrorCode::AdapterNotBound)
            }
            Some(vault) => validate!(
                caller.eq(&vault),
                ErrorCode::Unauthorized,
                "{} is not the vault bound to adapter {}",
                caller,
                self.pubkey
            ),
        }
    }
}

/// Pool handle plus the vault's view of its token ordering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundPool {
    pub binding: AdapterBinding,
    pub pool: ConcentratedPool,
    pub stable_mint: Pubkey,
    pub volatile_mint: Pubkey,
    /// Pool token0 is the volatile asset.
    pub reversed: bool,
}

impl BoundPool {
    pub fn new(
        binding: AdapterBinding,
        pool: ConcentratedPool,
        stable_mint: Pubkey,
        volatile_mint: Pubkey,
    ) -> VaultResult<Self> {
        let reversed = if pool.token0 == stable_mint && pool.token1 == volatile_mint {
            false
        } else if pool.token0 == volatile_mint && pool.token1 == stable_mint {
            true
        } else {
            msg!(
                "pool {} does not trade {} against {}",
                pool.pubkey,
                stable_mint,
                volatile_mint
            );
            return Err(ErrorCode::InvalidPoolTokens);
        };

        Ok(Self {
            binding,
            pool,
            stable_mint,
            volatile_mint,
            reversed,
        })
    }

    fn zero_for_one(&self, sell_volatile: bool) -> bool {
        sell_volatile == self.reversed
    }
}

/// The AMM leg. Amounts in and out are (stable, volatile); ticks are the pool's.
pub trait LiquidityPoolManager: Debug {
    fn protocol(&self) -> PoolProtocol;

    fn bound_pool(&self) -> &BoundPool;

    fn bound_pool_mut(&mut self) -> &mut BoundPool;

    fn box_clone(&self) -> Box<dyn LiquidityPoolManager>;

    fn pubkey(&self) -> Pubkey {
        self.bound_pool().binding.pubkey
    }

    fn vault(&self) -> Option<Pubkey> {
        self.bound_pool().binding.vault
    }

    fn set_vault(&mut self, caller: &Pubkey, vault: Pubkey) -> VaultResult {
        self.bound_pool_mut().binding.bind(caller, vault)
    }

    fn pool(&self) -> &ConcentratedPool {
        &self.bound_pool().pool
    }

    /// Direct access to the venue, for price moves and third-party flow.
    fn pool_mut(&mut self) -> &mut ConcentratedPool {
        &mut self.bound_pool_mut().pool
    }

    fn reversed(&self) -> bool {
        self.bound_pool().reversed
    }

    fn stable_mint(&self) -> Pubkey {
        self.bound_pool().stable_mint
    }

    fn volatile_mint(&self) -> Pubkey {
        self.bound_pool().volatile_mint
    }

    fn tick_spacing(&self) -> i32 {
        self.pool().tick_spacing
    }

    fn current_tick(&self) -> i32 {
        self.pool().tick()
    }

    fn sqrt_price_x96(&self) -> crate::math::bn::U256 {
        self.pool().sqrt_price_x96()
    }

    fn fee_pips(&self) -> VaultResult<u32> {
        self.pool().fee_pips()
    }

    /// Time weighted average pool tick over the last `window` seconds.
    fn twap_tick(&self, now: i64, window: u32) -> VaultResult<i32> {
        self.pool().twap_tick(now, window)
    }

    fn position_liquidity(&self, lower_tick: i32, upper_tick: i32) -> u128 {
        self.pool()
            .position(&self.pubkey(), lower_tick, upper_tick)
            .map_or(0, |position| position.liquidity)
    }

    /// Principal withdrawable from the position, rounded down.
    fn position_amounts(&self, lower_tick: i32, upper_tick: i32) -> VaultResult<(u128, u128)> {
        let liquidity = self.position_liquidity(lower_tick, upper_tick);
        if liquidity == 0 {
            return Ok((0, 0));
        }

        let (amount0, amount1) =
            self.pool()
                .amounts_for_liquidity(lower_tick, upper_tick, liquidity, Rounding::Floor)?;
        Ok(to_vault_order(amount0, amount1, self.reversed()))
    }

    fn fees_owed(&self, lower_tick: i32, upper_tick: i32) -> (u128, u128) {
        self.pool()
            .position(&self.pubkey(), lower_tick, upper_tick)
            .map_or((0, 0), |position| {
                to_vault_order(position.tokens_owed0, position.tokens_owed1, self.reversed())
            })
    }

    /// Principal plus uncollected fees in stable terms, rounded down.
    fn current_value(&self, lower_tick: i32, upper_tick: i32) -> VaultResult<u128> {
        let (stable, volatile) = self.position_amounts(lower_tick, upper_tick)?;
        let (fee_stable, fee_volatile) = self.fees_owed(lower_tick, upper_tick);

        stable.safe_add(fee_stable)?.safe_add(volatile_to_stable(
            volatile.safe_add(fee_volatile)?,
            self.sqrt_price_x96(),
            self.reversed(),
            Rounding::Floor,
        )?)
    }

    /// Adds liquidity, returning the (stable, volatile) paid in.
    fn add_liquidity(
        &mut self,
        caller: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> VaultResult<(u128, u128)> {
        self.bound_pool().binding.validate_caller(caller)?;
        let owner = self.pubkey();
        let reversed = self.reversed();

        let (amount0, amount1) = self.pool_mut().mint(owner, lower_tick, upper_tick, liquidity)?;
        Ok(to_vault_order(amount0, amount1, reversed))
    }

    /// Removes liquidity, returning the (stable, volatile) paid out.
    fn remove_liquidity(
        &mut self,
        caller: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> VaultResult<(u128, u128)> {
        self.bound_pool().binding.validate_caller(caller)?;
        let owner = self.pubkey();
        let reversed = self.reversed();

        let (amount0, amount1) = self.pool_mut().burn(&owner, lower_tick, upper_tick, liquidity)?;
        Ok(to_vault_order(amount0, amount1, reversed))
    }

    fn collect(
        &mut self,
        caller: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
    ) -> VaultResult<(u128, u128)> {
        self.bound_pool().binding.validate_caller(caller)?;
        let owner = self.pubkey();
        let reversed = self.reversed();

        let (amount0, amount1) = self.pool_mut().collect(&owner, lower_tick, upper_tick)?;
        Ok(to_vault_order(amount0, amount1, reversed))
    }

    fn quote_swap(&self, sell_volatile: bool, amount_in: u128) -> VaultResult<u128> {
        let bound_pool = self.bound_pool();
        bound_pool
            .pool
            .quote(bound_pool.zero_for_one(sell_volatile), amount_in)
    }

    /// Input needed to receive at least `amount_out` of the other token.
    fn quote_exact_output(&self, sell_volatile: bool, amount_out: u128) -> VaultResult<u128> {
        let bound_pool = self.bound_pool();
        bound_pool
            .pool
            .quote_exact_output(bound_pool.zero_for_one(sell_volatile), amount_out)
    }

    fn swap(
        &mut self,
        caller: &Pubkey,
        sell_volatile: bool,
        amount_in: u128,
        min_amount_out: u128,
    ) -> VaultResult<u128> {
        self.bound_pool().binding.validate_caller(caller)?;

        let bound_pool = self.bound_pool_mut();
        let zero_for_one = bound_pool.zero_for_one(sell_volatile);
        let amount_out = bound_pool.pool.swap(zero_for_one, amount_in)?;

        validate!(
            amount_out >= min_amount_out,
            ErrorCode::SlippageExceeded,
            "swap out {} below minimum {}",
            amount_out,
            min_amount_out
        )?;

        Ok(amount_out)
    }
}

impl Clone for Box<dyn LiquidityPoolManager> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Collateral and debt held on the lending market.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HedgePosition {
    /// Stable asset supplied
    pub collateral: u128,
    /// Volatile asset borrowed
    pub debt: u128,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundMarket {
    pub binding: AdapterBinding,
    pub market: LendingMarket,
    pub collateral_mint: Pubkey,
    pub debt_mint: Pubkey,
}

/// The hedge leg: stable collateral supplied, volatile asset borrowed.
pub trait LendingPoolManager: Debug {
    fn bound_market(&self) -> &BoundMarket;

    fn bound_market_mut(&mut self) -> &mut BoundMarket;

    fn box_clone(&self) -> Box<dyn LendingPoolManager>;

    fn pubkey(&self) -> Pubkey {
        self.bound_market().binding.pubkey
    }

    fn vault(&self) -> Option<Pubkey> {
        self.bound_market().binding.vault
    }

    fn set_vault(&mut self, caller: &Pubkey, vault: Pubkey) -> VaultResult {
        self.bound_market_mut().binding.bind(caller, vault)
    }

    fn market(&self) -> &LendingMarket {
        &self.bound_market().market
    }

    fn market_mut(&mut self) -> &mut LendingMarket {
        &mut self.bound_market_mut().market
    }

    fn collateral_mint(&self) -> Pubkey {
        self.bound_market().collateral_mint
    }

    fn debt_mint(&self) -> Pubkey {
        self.bound_market().debt_mint
    }

    fn supply(&mut self, caller: &Pubkey, amount: u128, now: i64) -> VaultResult {
        self.bound_market().binding.validate_caller(caller)?;
        let BoundMarket {
            binding,
            market,
            collateral_mint,
            ..
        } = self.bound_market_mut();
        market.supply(&binding.pubkey, collateral_mint, amount, now)
    }

    fn withdraw(&mut self, caller: &Pubkey, amount: u128, now: i64) -> VaultResult {
        self.bound_market().binding.validate_caller(caller)?;
        let BoundMarket {
            binding,
            market,
            collateral_mint,
            ..
        } = self.bound_market_mut();
        market.withdraw(&binding.pubkey, collateral_mint, amount, now)
    }

    fn borrow(&mut self, caller: &Pubkey, amount: u128, now: i64) -> VaultResult {
        self.bound_market().binding.validate_caller(caller)?;
        let BoundMarket {
            binding,
            market,
            debt_mint,
            ..
        } = self.bound_market_mut();
        market.borrow(&binding.pubkey, debt_mint, amount, now)
    }

    /// Repays up to `amount`, returning what the market accepted.
    fn repay(&mut self, caller: &Pubkey, amount: u128, now: i64) -> VaultResult<u128> {
        self.bound_market().binding.validate_caller(caller)?;
        let BoundMarket {
            binding,
            market,
            debt_mint,
            ..
        } = self.bound_market_mut();
        market.repay(&binding.pubkey, debt_mint, amount, now)
    }

    fn current_net(&self, now: i64) -> VaultResult<HedgePosition> {
        let bound_market = self.bound_market();
        let owner = bound_market.binding.pubkey;
        Ok(HedgePosition {
            collateral: bound_market.market.supplied_balance(
                &owner,
                &bound_market.collateral_mint,
                now,
            )?,
            debt: bound_market
                .market
                .debt_balance(&owner, &bound_market.debt_mint, now)?,
        })
    }

    fn health_factor(&self, now: i64) -> VaultResult<u128> {
        self.market().health_factor(&self.pubkey(), now)
    }
}

impl Clone for Box<dyn LendingPoolManager> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
