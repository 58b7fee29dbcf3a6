use crate::adapters::{AdapterBinding, BoundPool, LiquidityPoolManager, PoolProtocol};
use crate::constants::CAMELOT_V3_TICK_SPACING;
use crate::error::{ErrorCode, VaultResult};
use crate::validate;
use crate::venues::{ConcentratedPool, FeeModel};
use anchor_lang::prelude::*;

/// Position manager for Algebra-style pools, whose fee adapts to recent price movement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CamelotV3LiquidityPoolManager {
    bound_pool: BoundPool,
}

impl CamelotV3LiquidityPoolManager {
    pub fn new(
        pubkey: Pubkey,
        owner: Pubkey,
        pool: ConcentratedPool,
        stable_mint: Pubkey,
        volatile_mint: Pubkey,
    ) -> VaultResult<Self> {
        validate!(
            matches!(pool.fee_model, FeeModel::Adaptive { .. }),
            ErrorCode::InvalidParameter,
            "pool {} has a static fee",
            pool.pubkey
        )?;
        validate!(
            pool.tick_spacing == CAMELOT_V3_TICK_SPACING,
            ErrorCode::InvalidParameter,
            "tick spacing {} != {}",
            pool.tick_spacing,
            CAMELOT_V3_TICK_SPACING
        )?;

        Ok(Self {
            bound_pool: BoundPool::new(
                AdapterBinding::new(pubkey, owner),
                pool,
                stable_mint,
                volatile_mint,
            )?,
        })
    }
}

impl LiquidityPoolManager for CamelotV3LiquidityPoolManager {
    fn protocol(&self) -> PoolProtocol {
        PoolProtocol::CamelotV3
    }

    fn bound_pool(&self) -> &BoundPool {
        &self.bound_pool
    }

    fn bound_pool_mut(&mut self) -> &mut BoundPool {
        &mut self.bound_pool
    }

    fn box_clone(&self) -> Box<dyn LiquidityPoolManager> {
        Box::new(self.clone())
    }

    fn swap(
        &mut self,
        caller: &Pubkey,
        sell_volatile: bool,
        amount_in: u128,
        min_amount_out: u128,
    ) -> VaultResult<u128> {
        self.bound_pool.binding.validate_caller(caller)?;

        let zero_for_one = sell_volatile == self.bound_pool.reversed;
        let fee_pips = self.bound_pool.pool.fee_pips()?;
        let amount_out = self.bound_pool.pool.swap(zero_for_one, amount_in)?;

        validate!(
            amount_out >= min_amount_out,
            ErrorCode::SlippageExceeded,
            "swap out {} below minimum {} at fee {} pips",
            amount_out,
            min_amount_out,
            fee_pips
        )?;

        // the fee resets once a swap has settled at the new price
        self.bound_pool.pool.checkpoint_fee();

        Ok(amount_out)
    }
}
