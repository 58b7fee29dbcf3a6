use std::collections::BTreeMap;

use crate::adapters::{LendingPoolManager, LiquidityPoolManager};
use crate::constants::{BPS_PRECISION, SHARE_PRICE_PRECISION};
use crate::error::{ErrorCode, VaultResult};
use crate::state::events::{
    FeeCollectRecord, ForcedUnwindRecord, ParametersUpdateRecord, PerformanceFeeClaimRecord,
    RebalanceRecord, VaultDepositorAction, VaultDepositorRecord, VaultEvent,
};
use crate::math::liquidity_amounts::get_liquidity_for_amounts;
use crate::math::merkle::MerkleNode;
use crate::math::price::volatile_to_stable;
use crate::math::rebalance::{
    compute_rebalance, to_pool_order, validate_range, validate_stoploss_range, RebalanceInput,
};
use crate::math::safe_math::SafeMath;
use crate::math::shares::{amount_to_shares, mul_div, share_price, shares_to_amount, Rounding};
use crate::math::tick_math::get_sqrt_ratio_at_tick;
use crate::state::emitter::EmitsLifecycleEvents;
use crate::state::{Parameters, StrategyHelper, Vault, VaultDepositor, VaultStatus, VaultVersion};
use crate::validate;
use anchor_lang::prelude::*;

/// A vault together with everything an operation on it may touch.
///
/// Every mutating operation runs against a snapshot of the whole aggregate and
/// restores it on error, so failures leave no partial effects.
#[derive(Clone, Debug)]
pub struct VaultCore {
    vault: Vault,
    parameters: Parameters,
    strategy_helper: StrategyHelper,
    depositors: BTreeMap<Pubkey, VaultDepositor>,
    liquidity_manager: Box<dyn LiquidityPoolManager>,
    lending_manager: Box<dyn LendingPoolManager>,
    outbox: Vec<VaultEvent>,
}

impl VaultCore {
    pub fn new(
        vault: Vault,
        parameters: Parameters,
        strategy_helper: StrategyHelper,
        liquidity_manager: Box<dyn LiquidityPoolManager>,
        lending_manager: Box<dyn LendingPoolManager>,
    ) -> VaultResult<Self> {
        validate!(
            liquidity_manager.vault() == Some(vault.pubkey)
                && lending_manager.vault() == Some(vault.pubkey),
            ErrorCode::AdapterNotBound,
            "adapters not bound to vault {}",
            vault.pubkey
        )?;
        validate!(
            liquidity_manager.stable_mint() == vault.token0
                && liquidity_manager.volatile_mint() == vault.token1
                && lending_manager.collateral_mint() == vault.token0
                && lending_manager.debt_mint() == vault.token1,
            ErrorCode::InvalidPoolTokens,
            "adapter tokens do not match vault {}",
            vault.pubkey
        )?;
        validate!(
            parameters.vault == vault.pubkey && strategy_helper.vault == vault.pubkey,
            ErrorCode::InvalidParameter,
            "parameters or strategy helper belong to another vault"
        )?;

        Ok(Self {
            vault,
            parameters,
            strategy_helper,
            depositors: BTreeMap::new(),
            liquidity_manager,
            lending_manager,
            outbox: vec![],
        })
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn pubkey(&self) -> Pubkey {
        self.vault.pubkey
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn strategy_helper(&self) -> &StrategyHelper {
        &self.strategy_helper
    }

    pub fn strategy_helper_mut(&mut self) -> &mut StrategyHelper {
        &mut self.strategy_helper
    }

    pub fn depositor(&self, authority: &Pubkey) -> Option<&VaultDepositor> {
        self.depositors.get(authority)
    }

    pub fn liquidity_manager(&self) -> &dyn LiquidityPoolManager {
        self.liquidity_manager.as_ref()
    }

    pub fn liquidity_manager_mut(&mut self) -> &mut dyn LiquidityPoolManager {
        self.liquidity_manager.as_mut()
    }

    pub fn lending_manager(&self) -> &dyn LendingPoolManager {
        self.lending_manager.as_ref()
    }

    pub fn lending_manager_mut(&mut self) -> &mut dyn LendingPoolManager {
        self.lending_manager.as_mut()
    }

    pub fn version(&self) -> VaultResult<VaultVersion> {
        self.vault.version()
    }

    pub fn pending_events(&self) -> &[VaultEvent] {
        &self.outbox
    }

    pub(crate) fn record(&mut self, event: VaultEvent) {
        event.emit();
        self.outbox.push(event);
    }

    fn atomically<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let snapshot = self.clone();
        let result = operation(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn with_lock<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> VaultResult<T>,
    ) -> VaultResult<T> {
        validate!(
            self.vault.reentrancy_lock == 0,
            ErrorCode::Reentrancy,
            "vault {} is locked",
            self.vault.pubkey
        )?;

        self.atomically(|core| {
            core.vault.reentrancy_lock = 1;
            let result = operation(core)?;
            core.vault.reentrancy_lock = 0;
            Ok(result)
        })
    }

    /// Net asset value backing all shares, in token0.
    ///
    /// `Rounding::Floor` rounds assets down and liabilities up; `Rounding::Ceiling`
    /// the reverse. Pool principal is always valued at what a burn would pay out.
    pub fn equity(&self, now: i64, rounding: Rounding) -> VaultResult<u128> {
        let vault = &self.vault;
        let liquidity_manager = self.liquidity_manager.as_ref();

        let (position_stable, position_volatile) =
            liquidity_manager.position_amounts(vault.lower_tick, vault.upper_tick)?;
        let (fee_stable, fee_volatile) =
            liquidity_manager.fees_owed(vault.lower_tick, vault.upper_tick);
        let hedge = self.lending_manager.current_net(now)?;

        let stable = vault
            .idle0
            .safe_add(position_stable)?
            .safe_add(fee_stable)?
            .safe_add(hedge.collateral)?;
        let volatile = vault
            .idle1
            .safe_add(position_volatile)?
            .safe_add(fee_volatile)?;

        let sqrt_price_x96 = liquidity_manager.sqrt_price_x96();
        let reversed = liquidity_manager.reversed();

        let gross = if volatile >= hedge.debt {
            stable.safe_add(volatile_to_stable(
                volatile.safe_sub(hedge.debt)?,
                sqrt_price_x96,
                reversed,
                rounding,
            )?)?
        } else {
            let liability_rounding = match rounding {
                Rounding::Floor => Rounding::Ceiling,
                Rounding::Ceiling => Rounding::Floor,
            };
            stable.saturating_sub(volatile_to_stable(
                hedge.debt.safe_sub(volatile)?,
                sqrt_price_x96,
                reversed,
                liability_rounding,
            )?)
        };

        Ok(gross.saturating_sub(vault.accrued_performance_fee))
    }

    pub fn total_equity(&self, now: i64) -> VaultResult<u128> {
        self.equity(now, Rounding::Floor)
    }

    pub fn share_price(&self, now: i64) -> VaultResult<u128> {
        share_price(self.vault.total_shares, self.total_equity(now)?)
    }

    /// token0 value of a depositor's shares, rounded down.
    pub fn depositor_equity(&self, authority: &Pubkey, now: i64) -> VaultResult<u128> {
        let shares = self.depositors.get(authority).map_or(0, |depositor| depositor.shares);
        shares_to_amount(
            shares,
            self.vault.total_shares,
            self.total_equity(now)?,
            Rounding::Floor,
        )
    }

    /// True when nothing is left in the pool or the lending market and no volatile
    /// asset is custodied.
    pub fn is_fully_unwound(&self, now: i64) -> VaultResult<bool> {
        let hedge = self.lending_manager.current_net(now)?;
        Ok(self.vault.liquidity == 0
            && hedge.collateral == 0
            && hedge.debt == 0
            && self.vault.idle1 == 0)
    }

    /// Pool TWAP over the configured window.
    pub fn twap_tick(&self, now: i64) -> VaultResult<i32> {
        self.liquidity_manager
            .twap_tick(now, self.parameters.twap_window)
    }

    /// Checks the stoploss band against the TWAP rather than the spot tick.
    pub fn is_stoploss_breached(&self, now: i64) -> VaultResult<bool> {
        Ok(self.parameters.is_stoploss_breached(self.twap_tick(now)?))
    }

    /// Applies an owner-gated parameters change and queues its record.
    pub fn update_parameters(
        &mut self,
        operation: impl FnOnce(&mut Parameters) -> VaultResult<ParametersUpdateRecord>,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.atomically(|core| {
            let record = operation(&mut core.parameters)?;
            core.outbox.push(VaultEvent::ParametersUpdate(record.clone()));
            Ok(record)
        })
    }

    pub fn deposit(
        &mut self,
        caller: &Pubkey,
        amount: u128,
        proof: &[MerkleNode],
        now: i64,
    ) -> VaultResult<u128> {
        self.with_lock(|core| core.apply_deposit(caller, amount, proof, now))
    }

    fn apply_deposit(
        &mut self,
        caller: &Pubkey,
        amount: u128,
        proof: &[MerkleNode],
        now: i64,
    ) -> VaultResult<u128> {
        let parameters = &self.parameters;
        validate!(
            amount >= parameters.min_deposit_amount,
            ErrorCode::BelowMinDeposit,
            "deposit {} below minimum {}",
            amount,
            parameters.min_deposit_amount
        )?;
        validate!(
            parameters.is_allowlisted(caller, proof),
            ErrorCode::NotAllowlisted,
            "{} not in allowlist",
            caller
        )?;

        self.settle_fees(now)?;

        let parameters = &self.parameters;
        let vault_equity = self.equity(now, Rounding::Ceiling)?;
        if parameters.deposit_cap > 0 {
            validate!(
                vault_equity.safe_add(amount)? <= parameters.deposit_cap,
                ErrorCode::CapExceeded,
                "deposit {} on top of equity {} exceeds cap {}",
                amount,
                vault_equity,
                parameters.deposit_cap
            )?;
        }

        let total_shares = self.vault.total_shares;
        if parameters.user_deposit_cap > 0 {
            let user_shares = self.depositors.get(caller).map_or(0, |d| d.shares);
            let user_equity =
                shares_to_amount(user_shares, total_shares, vault_equity, Rounding::Ceiling)?;
            validate!(
                user_equity.safe_add(amount)? <= parameters.user_deposit_cap,
                ErrorCode::UserCapExceeded,
                "deposit {} on top of {} exceeds user cap {}",
                amount,
                user_equity,
                parameters.user_deposit_cap
            )?;
        }

        let shares = amount_to_shares(amount, total_shares, vault_equity, Rounding::Floor)?;
        validate!(
            shares > 0,
            ErrorCode::ZeroAmount,
            "deposit {} mints no shares",
            amount
        )?;

        let vault_key = self.vault.pubkey;
        self.vault.idle0 = self.vault.idle0.safe_add(amount)?;
        self.vault.total_shares = total_shares.safe_add(shares)?;
        self.vault.total_deposits = self.vault.total_deposits.safe_add(amount)?;
        self.depositors
            .entry(*caller)
            .or_insert_with(|| VaultDepositor::new(vault_key, *caller))
            .apply_deposit(amount, shares, now)?;

        if total_shares == 0 {
            self.vault.high_water_mark =
                share_price(self.vault.total_shares, self.equity(now, Rounding::Floor)?)?;
        }

        msg!(
            "deposit {} by {}: {} shares minted, {} outstanding",
            amount,
            caller,
            shares,
            self.vault.total_shares
        );

        self.record(VaultEvent::Depositor(VaultDepositorRecord {
            ts: now,
            vault: vault_key,
            user_authority: *caller,
            action: VaultDepositorAction::Deposit,
            amount,
            amount_volatile: 0,
            shares,
            vault_shares_before: total_shares,
            vault_equity_before: vault_equity,
        }));

        Ok(shares)
    }

    /// Burns `shares` for a pro-rata slice of every leg, returning the (token0, token1) paid out.
    pub fn withdraw(&mut self, caller: &Pubkey, shares: u128, now: i64) -> VaultResult<(u128, u128)> {
        self.with_lock(|core| core.apply_withdraw(caller, shares, now))
    }

    fn apply_withdraw(
        &mut self,
        caller: &Pubkey,
        shares: u128,
        now: i64,
    ) -> VaultResult<(u128, u128)> {
        validate!(shares > 0, ErrorCode::ZeroAmount)?;

        let depositor = self.depositors.get(caller).copied().ok_or_else(|| {
            msg!("{} has no shares in vault {}", caller, self.vault.pubkey);
            ErrorCode::InsufficientShares
        })?;
        validate!(
            depositor.shares >= shares,
            ErrorCode::InsufficientShares,
            "withdraw {} shares > {} owned",
            shares,
            depositor.shares
        )?;
        depositor.validate_lockup(self.parameters.lockup_period, now)?;

        self.settle_fees(now)?;

        let vault_equity_before = self.equity(now, Rounding::Floor)?;
        let vault_key = self.vault.pubkey;
        let (lower_tick, upper_tick) = (self.vault.lower_tick, self.vault.upper_tick);

        let total_shares = self.vault.total_shares;
        let free_stable = self
            .vault
            .idle0
            .saturating_sub(self.vault.accrued_performance_fee);
        // accrued fee the idle token0 does not cover is still inside the other legs
        let unbacked_fee = self
            .vault
            .accrued_performance_fee
            .saturating_sub(self.vault.idle0);
        let withheld_fee = mul_div(unbacked_fee, shares, total_shares, Rounding::Ceiling)?;

        let stable_slice = mul_div(free_stable, shares, total_shares, Rounding::Floor)?;
        let volatile_slice = mul_div(self.vault.idle1, shares, total_shares, Rounding::Floor)?;
        let liquidity_slice = mul_div(self.vault.liquidity, shares, total_shares, Rounding::Floor)?;
        let collateral_slice = mul_div(
            self.vault.hedge_collateral,
            shares,
            total_shares,
            Rounding::Floor,
        )?;
        let debt_slice = mul_div(self.vault.hedge_debt, shares, total_shares, Rounding::Ceiling)?;

        self.vault.idle0 = self.vault.idle0.safe_sub(stable_slice)?;
        self.vault.idle1 = self.vault.idle1.safe_sub(volatile_slice)?;
        let mut amount_stable = stable_slice;
        let mut amount_volatile = volatile_slice;

        if liquidity_slice > 0 {
            let (stable, volatile) = self.liquidity_manager.remove_liquidity(
                &vault_key,
                lower_tick,
                upper_tick,
                liquidity_slice,
            )?;
            self.vault.liquidity = self.vault.liquidity.safe_sub(liquidity_slice)?;
            amount_stable = amount_stable.safe_add(stable)?;
            amount_volatile = amount_volatile.safe_add(volatile)?;
        }

        if debt_slice > 0 {
            if amount_volatile < debt_slice {
                let shortfall = debt_slice.safe_sub(amount_volatile)?;
                let cost = self.liquidity_manager.quote_exact_output(false, shortfall)?;
                validate!(
                    cost <= amount_stable,
                    ErrorCode::InsufficientLiquidity,
                    "slice cannot repay its debt: needs {} token0 to buy {}, has {}",
                    cost,
                    shortfall,
                    amount_stable
                )?;
                let bought = self
                    .liquidity_manager
                    .swap(&vault_key, false, cost, shortfall)?;
                amount_stable = amount_stable.safe_sub(cost)?;
                amount_volatile = amount_volatile.safe_add(bought)?;
            }

            let repaid = self.lending_manager.repay(&vault_key, debt_slice, now)?;
            amount_volatile = amount_volatile.safe_sub(repaid)?;
        }

        if collateral_slice > 0 {
            self.lending_manager
                .withdraw(&vault_key, collateral_slice, now)?;
            amount_stable = amount_stable.safe_add(collateral_slice)?;
        }

        if withheld_fee > 0 {
            validate!(
                amount_stable >= withheld_fee,
                ErrorCode::InsufficientLiquidity,
                "slice pays {} token0, owes {} of accrued fee",
                amount_stable,
                withheld_fee
            )?;
            amount_stable = amount_stable.safe_sub(withheld_fee)?;
            self.vault.idle0 = self.vault.idle0.safe_add(withheld_fee)?;
        }

        self.sync_hedge(now)?;
        self.vault.total_shares = total_shares.safe_sub(shares)?;
        self.vault.total_withdraws = self.vault.total_withdraws.safe_add(amount_stable)?;
        if let Some(depositor) = self.depositors.get_mut(caller) {
            depositor.apply_withdraw(amount_stable, shares, now)?;
        }

        msg!(
            "withdraw {} shares by {}: {} token0, {} token1",
            shares,
            caller,
            amount_stable,
            amount_volatile
        );

        self.record(VaultEvent::Depositor(VaultDepositorRecord {
            ts: now,
            vault: vault_key,
            user_authority: *caller,
            action: VaultDepositorAction::Withdraw,
            amount: amount_stable,
            amount_volatile,
            shares,
            vault_shares_before: total_shares,
            vault_equity_before,
        }));

        Ok((amount_stable, amount_volatile))
    }

    /// Moves both legs to a new range.
    ///
    /// `min_out0` floors token0 received by the ratio swap, `min_out1` floors token1
    /// received. The floor of a direction that does not swap is not checked.
    #[allow(clippy::too_many_arguments)]
    pub fn rebalance(
        &mut self,
        caller: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
        stoploss_lower_tick: i32,
        stoploss_upper_tick: i32,
        min_out0: u128,
        min_out1: u128,
        now: i64,
    ) -> VaultResult {
        self.strategy_helper.validate_strategist(caller)?;
        validate_range(lower_tick, upper_tick, self.liquidity_manager.tick_spacing())?;
        validate_stoploss_range(
            lower_tick,
            upper_tick,
            stoploss_lower_tick,
            stoploss_upper_tick,
        )?;

        self.with_lock(|core| {
            core.vault.set_status(VaultStatus::Rebalancing);
            let vault_equity_before = core.equity(now, Rounding::Floor)?;

            core.unwind_all(now)?;
            core.open_position(lower_tick, upper_tick, min_out0, min_out1, now)?;

            core.parameters
                .set_stoploss_range(stoploss_lower_tick, stoploss_upper_tick);
            core.vault.last_rebalance_ts = now;
            core.vault.set_status(VaultStatus::Active);

            let vault_equity_after = core.equity(now, Rounding::Floor)?;
            msg!(
                "rebalanced to [{}, {}] at tick {}: liquidity {} debt {} collateral {}",
                lower_tick,
                upper_tick,
                core.liquidity_manager.current_tick(),
                core.vault.liquidity,
                core.vault.hedge_debt,
                core.vault.hedge_collateral
            );

            core.record(VaultEvent::Rebalance(RebalanceRecord {
                ts: now,
                vault: core.vault.pubkey,
                strategist: *caller,
                tick: core.liquidity_manager.current_tick(),
                lower_tick,
                upper_tick,
                stoploss_lower_tick,
                stoploss_upper_tick,
                liquidity: core.vault.liquidity,
                hedge_collateral: core.vault.hedge_collateral,
                hedge_debt: core.vault.hedge_debt,
                vault_equity_before,
                vault_equity_after,
            }));

            Ok(())
        })
    }

    fn open_position(
        &mut self,
        lower_tick: i32,
        upper_tick: i32,
        min_out0: u128,
        min_out1: u128,
        now: i64,
    ) -> VaultResult {
        let vault_key = self.vault.pubkey;
        let accrued_fee = self.vault.accrued_performance_fee;
        let sqrt_price_x96 = self.liquidity_manager.sqrt_price_x96();
        let reversed = self.liquidity_manager.reversed();

        let target = compute_rebalance(&RebalanceInput {
            sqrt_price_x96,
            lower_tick,
            upper_tick,
            reversed,
            stable_balance: self.vault.idle0.saturating_sub(accrued_fee),
            volatile_balance: self.vault.idle1,
            target_ltv_bps: self.parameters.target_ltv_bps,
            hedge_ratio_bps: self.parameters.hedge_ratio_bps,
        })?;

        // the borrow supplies the hedged part of the position's token1
        let volatile_needed = target.position_volatile.saturating_sub(target.hedge_debt);
        if self.vault.idle1 > volatile_needed {
            let amount_in = self.vault.idle1.safe_sub(volatile_needed)?;
            let amount_out = self
                .liquidity_manager
                .swap(&vault_key, true, amount_in, min_out0)?;
            self.vault.idle1 = self.vault.idle1.safe_sub(amount_in)?;
            self.vault.idle0 = self.vault.idle0.safe_add(amount_out)?;
        } else if self.vault.idle1 < volatile_needed {
            let wanted = volatile_needed.safe_sub(self.vault.idle1)?;
            let spendable = self
                .vault
                .idle0
                .saturating_sub(accrued_fee)
                .saturating_sub(target.collateral);
            let amount_in = self
                .liquidity_manager
                .quote_exact_output(false, wanted)?
                .min(spendable);
            if amount_in > 0 {
                let amount_out = self
                    .liquidity_manager
                    .swap(&vault_key, false, amount_in, min_out1)?;
                self.vault.idle0 = self.vault.idle0.safe_sub(amount_in)?;
                self.vault.idle1 = self.vault.idle1.safe_add(amount_out)?;
            }
        }

        let collateral = target
            .collateral
            .min(self.vault.idle0.saturating_sub(accrued_fee));
        if collateral > 0 {
            self.lending_manager.supply(&vault_key, collateral, now)?;
            self.vault.idle0 = self.vault.idle0.safe_sub(collateral)?;
        }

        if target.hedge_debt > 0 {
            self.lending_manager
                .borrow(&vault_key, target.hedge_debt, now)?;
            self.vault.idle1 = self.vault.idle1.safe_add(target.hedge_debt)?;
        }

        let (amount0, amount1) = to_pool_order(
            self.vault.idle0.saturating_sub(accrued_fee),
            self.vault.idle1,
            reversed,
        );
        let liquidity = get_liquidity_for_amounts(
            sqrt_price_x96,
            get_sqrt_ratio_at_tick(lower_tick)?,
            get_sqrt_ratio_at_tick(upper_tick)?,
            amount0,
            amount1,
        )?
        .min(target.liquidity);

        self.vault.lower_tick = lower_tick;
        self.vault.upper_tick = upper_tick;

        if liquidity > 0 {
            let (stable, volatile) = self.liquidity_manager.add_liquidity(
                &vault_key,
                lower_tick,
                upper_tick,
                liquidity,
            )?;
            self.vault.idle0 = self.vault.idle0.safe_sub(stable)?;
            self.vault.idle1 = self.vault.idle1.safe_sub(volatile)?;
            self.vault.liquidity = liquidity;
        }

        self.sync_hedge(now)
    }

    /// Removes all liquidity, repays all debt and withdraws all collateral into idle balances.
    fn unwind_all(&mut self, now: i64) -> VaultResult {
        let vault_key = self.vault.pubkey;

        self.collect_pool_fees()?;

        if self.vault.liquidity > 0 {
            let (stable, volatile) = self.liquidity_manager.remove_liquidity(
                &vault_key,
                self.vault.lower_tick,
                self.vault.upper_tick,
                self.vault.liquidity,
            )?;
            self.vault.idle0 = self.vault.idle0.safe_add(stable)?;
            self.vault.idle1 = self.vault.idle1.safe_add(volatile)?;
            self.vault.liquidity = 0;
        }

        let hedge = self.lending_manager.current_net(now)?;
        if hedge.debt > 0 {
            if self.vault.idle1 < hedge.debt {
                let shortfall = hedge.debt.safe_sub(self.vault.idle1)?;
                let cost = self.liquidity_manager.quote_exact_output(false, shortfall)?;
                validate!(
                    cost <= self.vault.idle0,
                    ErrorCode::InsufficientLiquidity,
                    "cannot buy {} token1 to repay debt: needs {} token0, has {}",
                    shortfall,
                    cost,
                    self.vault.idle0
                )?;
                let bought = self
                    .liquidity_manager
                    .swap(&vault_key, false, cost, shortfall)?;
                self.vault.idle0 = self.vault.idle0.safe_sub(cost)?;
                self.vault.idle1 = self.vault.idle1.safe_add(bought)?;
            }

            let repaid = self.lending_manager.repay(&vault_key, hedge.debt, now)?;
            self.vault.idle1 = self.vault.idle1.safe_sub(repaid)?;
        }

        if hedge.collateral > 0 {
            self.lending_manager
                .withdraw(&vault_key, hedge.collateral, now)?;
            self.vault.idle0 = self.vault.idle0.safe_add(hedge.collateral)?;
        }

        self.sync_hedge(now)
    }

    fn collect_pool_fees(&mut self) -> VaultResult<(u128, u128)> {
        let (fee_stable, fee_volatile) = self.liquidity_manager.collect(
            &self.vault.pubkey,
            self.vault.lower_tick,
            self.vault.upper_tick,
        )?;
        self.vault.idle0 = self.vault.idle0.safe_add(fee_stable)?;
        self.vault.idle1 = self.vault.idle1.safe_add(fee_volatile)?;
        Ok((fee_stable, fee_volatile))
    }

    fn sync_hedge(&mut self, now: i64) -> VaultResult {
        let hedge = self.lending_manager.current_net(now)?;
        self.vault.hedge_collateral = hedge.collateral;
        self.vault.hedge_debt = hedge.debt;
        Ok(())
    }

    /// Moves pool fees into idle balances and charges the performance fee on the
    /// share price gain above the high-water mark.
    fn crystallize_fees(&mut self, now: i64) -> VaultResult<FeeCollectRecord> {
        let (pool_fee0, pool_fee1) = self.collect_pool_fees()?;
        self.sync_hedge(now)?;

        let total_shares = self.vault.total_shares;
        let vault_equity = self.equity(now, Rounding::Floor)?;
        let price = share_price(total_shares, vault_equity)?;

        let mut performance_fee = 0;
        if total_shares > 0
            && price > self.vault.high_water_mark
            && self.parameters.is_performance_fee_enabled()
        {
            let profit = mul_div(
                price.safe_sub(self.vault.high_water_mark)?,
                total_shares,
                SHARE_PRICE_PRECISION,
                Rounding::Floor,
            )?;
            performance_fee = profit.safe_div(self.parameters.performance_fee_divisor.into())?;
            self.vault.accrued_performance_fee =
                self.vault.accrued_performance_fee.safe_add(performance_fee)?;
        }

        let share_price_after = share_price(total_shares, vault_equity.safe_sub(performance_fee)?)?;
        if total_shares > 0 {
            self.vault.high_water_mark = self.vault.high_water_mark.max(share_price_after);
        }
        self.vault.last_fee_collect_ts = now;

        Ok(FeeCollectRecord {
            ts: now,
            vault: self.vault.pubkey,
            pool_fee0,
            pool_fee1,
            performance_fee,
            share_price: share_price_after,
            high_water_mark: self.vault.high_water_mark,
        })
    }

    /// Crystallizes fees before shares are minted or burned, so that shares change
    /// hands at a post-fee price. Recorded only when something was collected.
    fn settle_fees(&mut self, now: i64) -> VaultResult {
        let record = self.crystallize_fees(now)?;
        if record.performance_fee > 0 || record.pool_fee0 > 0 || record.pool_fee1 > 0 {
            msg!(
                "settled pool fees ({}, {}), performance fee {}",
                record.pool_fee0,
                record.pool_fee1,
                record.performance_fee
            );
            self.record(VaultEvent::FeeCollect(record));
        }
        Ok(())
    }

    /// Collects pool fees and charges the performance fee. Returns the fee accrued.
    pub fn collect_fees(&mut self, now: i64) -> VaultResult<u128> {
        self.with_lock(|core| {
            let record = core.crystallize_fees(now)?;
            let performance_fee = record.performance_fee;

            msg!(
                "collected pool fees ({}, {}), performance fee {}, share price {}",
                record.pool_fee0,
                record.pool_fee1,
                performance_fee,
                record.share_price
            );

            core.record(VaultEvent::FeeCollect(record));
            Ok(performance_fee)
        })
    }

    pub fn claim_performance_fee(&mut self, caller: &Pubkey, now: i64) -> VaultResult<u128> {
        validate!(
            caller.eq(&self.parameters.performance_fee_recipient),
            ErrorCode::Unauthorized,
            "{} is not the performance fee recipient",
            caller
        )?;

        self.with_lock(|core| {
            let amount = core.vault.accrued_performance_fee;
            validate!(
                core.vault.idle0 >= amount,
                ErrorCode::InsufficientLiquidity,
                "idle token0 {} below accrued fee {}",
                core.vault.idle0,
                amount
            )?;

            core.vault.idle0 = core.vault.idle0.safe_sub(amount)?;
            core.vault.accrued_performance_fee = 0;
            core.vault.total_fees_paid = core.vault.total_fees_paid.safe_add(amount)?;

            core.record(VaultEvent::PerformanceFeeClaim(PerformanceFeeClaimRecord {
                ts: now,
                vault: core.vault.pubkey,
                recipient: *caller,
                amount,
            }));

            Ok(amount)
        })
    }

    /// Closes both legs and converts all token1 to token0. Returns false when there
    /// was nothing to unwind.
    pub fn force_unwind(&mut self, caller: &Pubkey, now: i64) -> VaultResult<bool> {
        validate!(
            caller.eq(&self.parameters.keeper),
            ErrorCode::Unauthorized,
            "{} is not the keeper of vault {}",
            caller,
            self.vault.pubkey
        )?;

        if self.is_fully_unwound(now)? {
            msg!("vault {} already unwound", self.vault.pubkey);
            return Ok(false);
        }

        self.with_lock(|core| {
            let vault_key = core.vault.pubkey;
            let vault_equity_before = core.equity(now, Rounding::Floor)?;
            let twap_tick = core.twap_tick(now)?;

            core.unwind_all(now)?;

            if core.vault.idle1 > 0 {
                let amount_in = core.vault.idle1;
                let min_amount_out = core.unwind_min_out(amount_in, twap_tick)?;
                let amount_out =
                    core.liquidity_manager
                        .swap(&vault_key, true, amount_in, min_amount_out)?;
                core.vault.idle1 = 0;
                core.vault.idle0 = core.vault.idle0.safe_add(amount_out)?;
            }

            core.vault.set_status(VaultStatus::Stopped);
            let vault_equity_after = core.equity(now, Rounding::Floor)?;
            let tick = core.liquidity_manager.current_tick();

            msg!(
                "vault {} unwound at tick {}: equity {} -> {}",
                vault_key,
                tick,
                vault_equity_before,
                vault_equity_after
            );

            core.record(VaultEvent::ForcedUnwind(ForcedUnwindRecord {
                ts: now,
                vault: vault_key,
                keeper: *caller,
                tick,
                twap_tick,
                stoploss_lower_tick: core.parameters.stoploss_lower_tick,
                stoploss_upper_tick: core.parameters.stoploss_upper_tick,
                vault_equity_before,
                vault_equity_after,
            }));

            Ok(true)
        })
    }
}

impl VaultCore {
    /// Floor for selling `amount_in` token1: its value at the TWAP less the
    /// configured unwind slippage.
    fn unwind_min_out(&self, amount_in: u128, twap_tick: i32) -> VaultResult<u128> {
        let fair_value = volatile_to_stable(
            amount_in,
            get_sqrt_ratio_at_tick(twap_tick)?,
            self.liquidity_manager.reversed(),
            Rounding::Floor,
        )?;
        mul_div(
            fair_value,
            BPS_PRECISION.safe_sub(self.parameters.max_unwind_slippage_bps.into())?,
            BPS_PRECISION,
            Rounding::Floor,
        )
    }
}

impl EmitsLifecycleEvents for VaultCore {
    fn vault_key(&self) -> Pubkey {
        self.vault.pubkey
    }

    fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
impl VaultCore {
    pub(crate) fn vault_mut(&mut self) -> &mut Vault {
        &mut self.vault
    }
}
