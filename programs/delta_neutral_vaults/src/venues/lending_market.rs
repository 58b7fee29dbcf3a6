use crate::constants::{BPS_PRECISION, ONE_YEAR, RAY};
use crate::error::{ErrorCode, VaultResult};
use crate::math::casting::Cast;
use crate::math::oracle::token_value;
use crate::math::safe_math::SafeMath;
use crate::math::shares::{mul_div, Rounding};
use crate::validate;
use anchor_lang::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reserve {
    pub mint: Pubkey,
    pub decimals: u32,
    /// USD price, expo -8
    pub oracle_price: u128,
    /// Share of the collateral value that may be borrowed against
    pub ltv_bps: u16,
    /// Annual simple rates, expo -27
    pub supply_rate: u128,
    pub borrow_rate: u128,
    pub liquidity_index: u128,
    pub borrow_index: u128,
    pub last_update_ts: i64,
}

impl Reserve {
    pub fn new(mint: Pubkey, decimals: u32, oracle_price: u128, ltv_bps: u16, now: i64) -> Self {
        Self {
            mint,
            decimals,
            oracle_price,
            ltv_bps,
            supply_rate: 0,
            borrow_rate: 0,
            liquidity_index: RAY,
            borrow_index: RAY,
            last_update_ts: now,
        }
    }

    fn grow(index: u128, rate: u128, elapsed: i64) -> VaultResult<u128> {
        if rate == 0 || elapsed <= 0 {
            return Ok(index);
        }

        let interest = mul_div(rate, elapsed.cast()?, ONE_YEAR.cast()?, Rounding::Floor)?;
        mul_div(index, RAY.safe_add(interest)?, RAY, Rounding::Floor)
    }

    /// (liquidity_index, borrow_index) as of `now`.
    pub fn indexes_at(&self, now: i64) -> VaultResult<(u128, u128)> {
        let elapsed = now.saturating_sub(self.last_update_ts);
        Ok((
            Self::grow(self.liquidity_index, self.supply_rate, elapsed)?,
            Self::grow(self.borrow_index, self.borrow_rate, elapsed)?,
        ))
    }

    pub fn accrue(&mut self, now: i64) -> VaultResult {
        if now <= self.last_update_ts {
            return Ok(());
        }

        let (liquidity_index, borrow_index) = self.indexes_at(now)?;
        self.liquidity_index = liquidity_index;
        self.borrow_index = borrow_index;
        self.last_update_ts = now;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LendingAccount {
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub scaled_supply: u128,
    pub scaled_debt: u128,
}

/// Pooled lending market with per-reserve interest indexes.
///
/// Balances are stored scaled by the reserve index at the time of the last change,
/// so supplied balances and debts grow with interest without touching accounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LendingMarket {
    pub pubkey: Pubkey,
    reserves: Vec<Reserve>,
    accounts: Vec<LendingAccount>,
}

impl LendingMarket {
    pub fn new(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            reserves: vec![],
            accounts: vec![],
        }
    }

    pub fn add_reserve(&mut self, reserve: Reserve) -> VaultResult {
        validate!(
            self.reserve(&reserve.mint).is_err(),
            ErrorCode::InvalidParameter,
            "reserve {} already listed",
            reserve.mint
        )?;
        validate!(
            reserve.ltv_bps.cast::<u128>()? < BPS_PRECISION && reserve.oracle_price > 0,
            ErrorCode::InvalidParameter,
            "invalid reserve config for {}",
            reserve.mint
        )?;
        self.reserves.push(reserve);
        Ok(())
    }

    pub fn reserve(&self, mint: &Pubkey) -> VaultResult<&Reserve> {
        self.reserves
            .iter()
            .find(|reserve| reserve.mint.eq(mint))
            .ok_or(ErrorCode::ReserveNotFound)
    }

    pub fn reserve_mut(&mut self, mint: &Pubkey) -> VaultResult<&mut Reserve> {
        self.reserves
            .iter_mut()
            .find(|reserve| reserve.mint.eq(mint))
            .ok_or(ErrorCode::ReserveNotFound)
    }

    pub fn set_oracle_price(&mut self, mint: &Pubkey, oracle_price: u128) -> VaultResult {
        validate!(oracle_price > 0, ErrorCode::InvalidParameter)?;
        self.reserve_mut(mint)?.oracle_price = oracle_price;
        Ok(())
    }

    pub fn set_rates(
        &mut self,
        mint: &Pubkey,
        supply_rate: u128,
        borrow_rate: u128,
        now: i64,
    ) -> VaultResult {
        let reserve = self.reserve_mut(mint)?;
        reserve.accrue(now)?;
        reserve.supply_rate = supply_rate;
        reserve.borrow_rate = borrow_rate;
        Ok(())
    }

    pub fn accrue(&mut self, now: i64) -> VaultResult {
        for reserve in self.reserves.iter_mut() {
            reserve.accrue(now)?;
        }
        Ok(())
    }

    pub fn account(&self, owner: &Pubkey, mint: &Pubkey) -> Option<&LendingAccount> {
        self.accounts
            .iter()
            .find(|account| account.owner.eq(owner) && account.mint.eq(mint))
    }

    fn account_mut(&mut self, owner: &Pubkey, mint: &Pubkey) -> &mut LendingAccount {
        let position = self
            .accounts
            .iter()
            .position(|account| account.owner.eq(owner) && account.mint.eq(mint));

        match position {
            Some(index) => &mut self.accounts[index],
            None => {
                self.accounts.push(LendingAccount {
                    owner: *owner,
                    mint: *mint,
                    ..LendingAccount::default()
                });
                let last = self.accounts.len() - 1;
                &mut self.accounts[last]
            }
        }
    }

    pub fn supplied_balance(&self, owner: &Pubkey, mint: &Pubkey, now: i64) -> VaultResult<u128> {
        let scaled_supply = match self.account(owner, mint) {
            Some(account) => account.scaled_supply,
            None => return Ok(0),
        };
        let (liquidity_index, _) = self.reserve(mint)?.indexes_at(now)?;
        mul_div(scaled_supply, liquidity_index, RAY, Rounding::Floor)
    }

    pub fn debt_balance(&self, owner: &Pubkey, mint: &Pubkey, now: i64) -> VaultResult<u128> {
        let scaled_debt = match self.account(owner, mint) {
            Some(account) => account.scaled_debt,
            None => return Ok(0),
        };
        let (_, borrow_index) = self.reserve(mint)?.indexes_at(now)?;
        mul_div(scaled_debt, borrow_index, RAY, Rounding::Ceiling)
    }

    pub fn supply(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u128, now: i64) -> VaultResult {
        validate!(amount > 0, ErrorCode::ZeroAmount)?;

        let reserve = self.reserve_mut(mint)?;
        reserve.accrue(now)?;
        let scaled = mul_div(amount, RAY, reserve.liquidity_index, Rounding::Floor)?;

        let account = self.account_mut(owner, mint);
        account.scaled_supply = account.scaled_supply.safe_add(scaled)?;
        Ok(())
    }

    pub fn withdraw(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u128, now: i64) -> VaultResult {
        validate!(amount > 0, ErrorCode::ZeroAmount)?;

        let reserve = self.reserve_mut(mint)?;
        reserve.accrue(now)?;
        let liquidity_index = reserve.liquidity_index;

        let supplied = self.supplied_balance(owner, mint, now)?;
        validate!(
            amount <= supplied,
            ErrorCode::InsufficientCollateral,
            "withdraw {} exceeds supplied {}",
            amount,
            supplied
        )?;

        let before = self.account(owner, mint).copied();
        let account = self.account_mut(owner, mint);
        account.scaled_supply = if amount == supplied {
            0
        } else {
            account
                .scaled_supply
                .safe_sub(mul_div(amount, RAY, liquidity_index, Rounding::Ceiling)?)?
        };

        self.validate_health_or_restore(owner, mint, before, now)
    }

    pub fn borrow(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u128, now: i64) -> VaultResult {
        validate!(amount > 0, ErrorCode::ZeroAmount)?;

        let reserve = self.reserve_mut(mint)?;
        reserve.accrue(now)?;
        let scaled = mul_div(amount, RAY, reserve.borrow_index, Rounding::Ceiling)?;

        let before = self.account(owner, mint).copied();
        let account = self.account_mut(owner, mint);
        account.scaled_debt = account.scaled_debt.safe_add(scaled)?;

        self.validate_health_or_restore(owner, mint, before, now)
    }

    /// Repays up to `amount` of debt, returning what was actually repaid.
    pub fn repay(&mut self, owner: &Pubkey, mint: &Pubkey, amount: u128, now: i64) -> VaultResult<u128> {
        let reserve = self.reserve_mut(mint)?;
        reserve.accrue(now)?;
        let borrow_index = reserve.borrow_index;

        let debt = self.debt_balance(owner, mint, now)?;
        let repaid = amount.min(debt);
        if repaid == 0 {
            return Ok(0);
        }

        let account = self.account_mut(owner, mint);
        account.scaled_debt = if repaid == debt {
            0
        } else {
            account
                .scaled_debt
                .safe_sub(mul_div(repaid, RAY, borrow_index, Rounding::Floor)?)?
        };

        Ok(repaid)
    }

    /// (collateral value, borrowing power, debt value) in USD, expo -8.
    pub fn account_values(&self, owner: &Pubkey, now: i64) -> VaultResult<(u128, u128, u128)> {
        let mut collateral_value = 0_u128;
        let mut borrowing_power = 0_u128;
        let mut debt_value = 0_u128;

        for reserve in self.reserves.iter() {
            let supplied = self.supplied_balance(owner, &reserve.mint, now)?;
            let debt = self.debt_balance(owner, &reserve.mint, now)?;

            let supplied_value =
                token_value(supplied, reserve.oracle_price, reserve.decimals, Rounding::Floor)?;
            collateral_value = collateral_value.safe_add(supplied_value)?;
            borrowing_power = borrowing_power.safe_add(mul_div(
                supplied_value,
                reserve.ltv_bps.cast()?,
                BPS_PRECISION,
                Rounding::Floor,
            )?)?;
            debt_value = debt_value.safe_add(token_value(
                debt,
                reserve.oracle_price,
                reserve.decimals,
                Rounding::Ceiling,
            )?)?;
        }

        Ok((collateral_value, borrowing_power, debt_value))
    }

    /// Borrowing power over debt value, expo -4. u128::MAX without debt.
    pub fn health_factor(&self, owner: &Pubkey, now: i64) -> VaultResult<u128> {
        let (_, borrowing_power, debt_value) = self.account_values(owner, now)?;
        if debt_value == 0 {
            return Ok(u128::MAX);
        }

        mul_div(borrowing_power, BPS_PRECISION, debt_value, Rounding::Floor)
    }

    /// Rejects a change that leaves the account undercollateralized, restoring
    /// the account to `before`.
    fn validate_health_or_restore(
        &mut self,
        owner: &Pubkey,
        mint: &Pubkey,
        before: Option<LendingAccount>,
        now: i64,
    ) -> VaultResult {
        let (_, borrowing_power, debt_value) = self.account_values(owner, now)?;
        if debt_value <= borrowing_power {
            return Ok(());
        }

        *self.account_mut(owner, mint) = before.unwrap_or(LendingAccount {
            owner: *owner,
            mint: *mint,
            ..LendingAccount::default()
        });

        msg!(
            "debt {} exceeds borrowing power {}",
            debt_value,
            borrowing_power
        );
        Err(ErrorCode::HealthFactorTooLow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::oracle::one_dollar;

    const WETH: u128 = 1_000_000_000_000_000_000;
    const USDC: u128 = 1_000_000;

    fn market() -> (LendingMarket, Pubkey, Pubkey) {
        let usdc = Pubkey::new_unique();
        let weth = Pubkey::new_unique();
        let mut market = LendingMarket::new(Pubkey::new_unique());
        market
            .add_reserve(Reserve::new(usdc, 6, one_dollar(), 7_500, 0))
            .unwrap();
        market
            .add_reserve(Reserve::new(weth, 18, 1_285 * one_dollar(), 8_000, 0))
            .unwrap();
        (market, usdc, weth)
    }

    #[test]
    fn borrow_against_collateral() {
        let (mut market, usdc, weth) = market();
        let owner = Pubkey::new_unique();

        market.supply(&owner, &usdc, 2_570 * USDC, 0).unwrap();
        // 75% of $2570 is $1927.5
        market.borrow(&owner, &weth, WETH, 0).unwrap();
        assert_eq!(
            market.borrow(&owner, &weth, WETH, 0),
            Err(ErrorCode::HealthFactorTooLow)
        );
        assert_eq!(market.health_factor(&owner, 0).unwrap(), 15_000);

        assert_eq!(
            market.withdraw(&owner, &usdc, 1_000 * USDC, 0),
            Err(ErrorCode::HealthFactorTooLow)
        );

        assert_eq!(market.repay(&owner, &weth, 2 * WETH, 0).unwrap(), WETH);
        assert_eq!(market.debt_balance(&owner, &weth, 0).unwrap(), 0);
        market.withdraw(&owner, &usdc, 2_570 * USDC, 0).unwrap();
        assert_eq!(market.supplied_balance(&owner, &usdc, 0).unwrap(), 0);
        assert_eq!(market.health_factor(&owner, 0).unwrap(), u128::MAX);
    }

    #[test]
    fn interest_accrues_on_both_sides() {
        let (mut market, usdc, weth) = market();
        let owner = Pubkey::new_unique();

        // 5% supply APR on USDC, 10% borrow APR on WETH
        market.set_rates(&usdc, RAY / 20, 0, 0).unwrap();
        market.set_rates(&weth, 0, RAY / 10, 0).unwrap();

        market.supply(&owner, &usdc, 10_000 * USDC, 0).unwrap();
        market.borrow(&owner, &weth, WETH, 0).unwrap();

        assert_eq!(
            market.supplied_balance(&owner, &usdc, ONE_YEAR).unwrap(),
            10_500 * USDC
        );
        assert_eq!(
            market.debt_balance(&owner, &weth, ONE_YEAR).unwrap(),
            1_100_000_000_000_000_000
        );

        // views project interest without mutating the reserve
        assert_eq!(market.reserve(&usdc).unwrap().liquidity_index, RAY);
        market.accrue(ONE_YEAR).unwrap();
        assert_eq!(
            market.reserve(&usdc).unwrap().liquidity_index,
            RAY + RAY / 20
        );

        let repaid = market.repay(&owner, &weth, u128::MAX, ONE_YEAR).unwrap();
        assert_eq!(repaid, 1_100_000_000_000_000_000);
        assert_eq!(market.account(&owner, &weth).unwrap().scaled_debt, 0);
    }

    #[test]
    fn unknown_reserve() {
        let (mut market, _, _) = market();
        let owner = Pubkey::new_unique();
        assert_eq!(
            market.supply(&owner, &Pubkey::new_unique(), 1, 0),
            Err(ErrorCode::ReserveNotFound)
        );
        assert_eq!(
            market.withdraw(&owner, &Pubkey::new_unique(), 1, 0),
            Err(ErrorCode::ReserveNotFound)
        );
    }
}
