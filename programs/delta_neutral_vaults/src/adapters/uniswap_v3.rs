use crate::adapters::{AdapterBinding, BoundPool, LiquidityPoolManager, PoolProtocol};
use crate::constants::UNISWAP_V3_FEE_TIERS;
use crate::error::{ErrorCode, VaultResult};
use crate::validate;
use crate::venues::{ConcentratedPool, FeeModel};
use anchor_lang::prelude::*;

/// Position manager for pools with a static fee tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniswapV3LiquidityPoolManager {
    bound_pool: BoundPool,
}

impl UniswapV3LiquidityPoolManager {
    pub fn new(
        pubkey: Pubkey,
        owner: Pubkey,
        pool: ConcentratedPool,
        stable_mint: Pubkey,
        volatile_mint: Pubkey,
    ) -> VaultResult<Self> {
        let fee_pips = match pool.fee_model {
            FeeModel::Static { fee_pips } => fee_pips,
            FeeModel::Adaptive { .. } => {
                msg!("pool {} has a dynamic fee", pool.pubkey);
                return Err(ErrorCode::InvalidParameter);
            }
        };

        validate!(
            UNISWAP_V3_FEE_TIERS.contains(&(fee_pips, pool.tick_spacing)),
            ErrorCode::InvalidParameter,
            "fee tier {} with tick spacing {} is not enabled",
            fee_pips,
            pool.tick_spacing
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

impl LiquidityPoolManager for UniswapV3LiquidityPoolManager {
    fn protocol(&self) -> PoolProtocol {
        PoolProtocol::UniswapV3
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(token0: Pubkey, token1: Pubkey, fee_pips: u32, tick_spacing: i32) -> ConcentratedPool {
        ConcentratedPool::new(
            Pubkey::new_unique(),
            token0,
            token1,
            tick_spacing,
            FeeModel::Static { fee_pips },
            -204_720,
            0,
        )
        .unwrap()
    }

    #[test]
    fn fee_tier_must_match_spacing() {
        let weth = Pubkey::new_unique();
        let usdc = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        assert!(UniswapV3LiquidityPoolManager::new(
            Pubkey::new_unique(),
            owner,
            pool(weth, usdc, 3_000, 60),
            usdc,
            weth
        )
        .unwrap()
        .reversed());

        assert_eq!(
            UniswapV3LiquidityPoolManager::new(
                Pubkey::new_unique(),
                owner,
                pool(weth, usdc, 3_000, 10),
                usdc,
                weth
            ),
            Err(ErrorCode::InvalidParameter)
        );

        assert_eq!(
            UniswapV3LiquidityPoolManager::new(
                Pubkey::new_unique(),
                owner,
                pool(weth, usdc, 500, 10),
                usdc,
                Pubkey::new_unique()
            ),
            Err(ErrorCode::InvalidPoolTokens)
        );
    }

    #[test]
    fn binding_is_single_use() {
        let weth = Pubkey::new_unique();
        let usdc = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let vault = Pubkey::new_unique();
        let mut manager = UniswapV3LiquidityPoolManager::new(
            Pubkey::new_unique(),
            owner,
            pool(weth, usdc, 500, 10),
            usdc,
            weth,
        )
        .unwrap();

        assert_eq!(
            manager.add_liquidity(&vault, -205_680, -203_760, 1_000),
            Err(ErrorCode::AdapterNotBound)
        );
        assert_eq!(
            manager.set_vault(&vault, vault),
            Err(ErrorCode::Unauthorized)
        );

        manager.set_vault(&owner, vault).unwrap();
        assert_eq!(
            manager.set_vault(&owner, Pubkey::new_unique()),
            Err(ErrorCode::AdapterAlreadyBound)
        );
        assert_eq!(manager.vault(), Some(vault));

        assert_eq!(
            manager.add_liquidity(&owner, -205_680, -203_760, 1_000),
            Err(ErrorCode::Unauthorized)
        );
        let (stable, volatile) = manager
            .add_liquidity(&vault, -205_680, -203_760, 1_000_000_000_000)
            .unwrap();
        // WETH is pool token0, the adapter reports (USDC, WETH)
        assert!(stable < 1_000_000_000 && volatile > 1_000_000_000);
        assert_eq!(manager.position_liquidity(-205_680, -203_760), 1_000_000_000_000);
    }

    #[test]
    fn swap_floor() {
        let weth = Pubkey::new_unique();
        let usdc = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let vault = Pubkey::new_unique();
        let mut manager = UniswapV3LiquidityPoolManager::new(
            Pubkey::new_unique(),
            owner,
            pool(usdc, weth, 500, 10),
            usdc,
            weth,
        )
        .unwrap();
        manager.set_vault(&owner, vault).unwrap();
        assert!(!manager.reversed());

        let one_weth = 1_000_000_000_000_000_000;
        let quoted = manager.quote_swap(true, one_weth).unwrap();
        assert_eq!(
            manager.swap(&vault, true, one_weth, quoted + 1),
            Err(ErrorCode::SlippageExceeded)
        );
        assert_eq!(manager.swap(&vault, true, one_weth, quoted).unwrap(), quoted);
    }
}
