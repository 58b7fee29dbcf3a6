use crate::adapters::{AdapterBinding, BoundMarket, LendingPoolManager};
use crate::error::{ErrorCode, VaultResult};
use crate::validate;
use crate::venues::LendingMarket;
use anchor_lang::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AaveLendingPoolManager {
    bound_market: BoundMarket,
}

impl AaveLendingPoolManager {
    pub fn new(
        pubkey: Pubkey,
        owner: Pubkey,
        market: LendingMarket,
        collateral_mint: Pubkey,
        debt_mint: Pubkey,
    ) -> VaultResult<Self> {
        let collateral_reserve = market.reserve(&collateral_mint)?;
        market.reserve(&debt_mint)?;
        validate!(
            collateral_reserve.ltv_bps > 0,
            ErrorCode::InvalidParameter,
            "{} cannot be borrowed against",
            collateral_mint
        )?;

        Ok(Self {
            bound_market: BoundMarket {
                binding: AdapterBinding::new(pubkey, owner),
                market,
                collateral_mint,
                debt_mint,
            },
        })
    }
}

impl LendingPoolManager for AaveLendingPoolManager {
    fn bound_market(&self) -> &BoundMarket {
        &self.bound_market
    }

    fn bound_market_mut(&mut self) -> &mut BoundMarket {
        &mut self.bound_market
    }

    fn box_clone(&self) -> Box<dyn LendingPoolManager> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::HedgePosition;
    use crate::math::oracle::one_dollar;
    use crate::venues::Reserve;

    #[test]
    fn hedge_leg() {
        let usdc = Pubkey::new_unique();
        let weth = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let vault = Pubkey::new_unique();

        let mut market = LendingMarket::new(Pubkey::new_unique());
        market
            .add_reserve(Reserve::new(usdc, 6, one_dollar(), 7_500, 0))
            .unwrap();
        market
            .add_reserve(Reserve::new(weth, 18, 1_285 * one_dollar(), 8_000, 0))
            .unwrap();

        let mut manager =
            AaveLendingPoolManager::new(Pubkey::new_unique(), owner, market, usdc, weth).unwrap();
        assert_eq!(
            manager.supply(&vault, 1_000_000, 0),
            Err(ErrorCode::AdapterNotBound)
        );
        manager.set_vault(&owner, vault).unwrap();

        manager.supply(&vault, 2_000_000_000, 0).unwrap();
        manager.borrow(&vault, 1_000_000_000_000_000_000, 0).unwrap();
        assert_eq!(
            manager.current_net(0).unwrap(),
            HedgePosition {
                collateral: 2_000_000_000,
                debt: 1_000_000_000_000_000_000,
            }
        );
        // $1500 of borrowing power against $1285 of debt
        assert_eq!(manager.health_factor(0).unwrap(), 11_673);

        assert_eq!(
            manager.repay(&vault, 2_000_000_000_000_000_000, 0).unwrap(),
            1_000_000_000_000_000_000
        );
        manager.withdraw(&vault, 2_000_000_000, 0).unwrap();
        assert_eq!(manager.current_net(0).unwrap(), HedgePosition::default());
    }
}
