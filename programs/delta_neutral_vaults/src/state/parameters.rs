use crate::constants::{
    BPS_PRECISION, DEFAULT_HEDGE_RATIO_BPS, DEFAULT_MAX_UNWIND_SLIPPAGE_BPS,
    DEFAULT_MIN_DEPOSIT_AMOUNT, DEFAULT_PERFORMANCE_FEE_DIVISOR, DEFAULT_TARGET_LTV_BPS,
    DEFAULT_TWAP_WINDOW, PARAMETERS_SEED,
};
use crate::error::{ErrorCode, VaultResult};
use crate::events::ParametersUpdateRecord;
use crate::math::casting::Cast;
use crate::math::merkle::{verify, MerkleNode};
use crate::validate;
use crate::Size;
use anchor_lang::prelude::*;

/// Governance-controlled policy of a single vault.
#[account]
#[derive(Default, Debug, PartialEq, Eq)]
pub struct Parameters {
    pub pubkey: Pubkey,
    pub vault: Pubkey,
    pub owner: Pubkey,
    pub allowlist_enabled: bool,
    pub merkle_root: MerkleNode,
    /// Max vault equity after a deposit. 0 is unlimited.
    pub deposit_cap: u128,
    /// Max value of a single depositor's shares after a deposit. 0 is unlimited.
    pub user_deposit_cap: u128,
    pub min_deposit_amount: u128,
    pub lockup_period: i64,
    pub helper: Pubkey,
    pub strategy_impl: Pubkey,
    /// Identity allowed to force an unwind, usually the stoploss checker
    pub keeper: Pubkey,
    pub performance_fee_recipient: Pubkey,
    /// Fee is profit / divisor. 0 disables the fee.
    pub performance_fee_divisor: u64,
    pub target_ltv_bps: u16,
    pub hedge_ratio_bps: u16,
    pub stoploss_lower_tick: i32,
    pub stoploss_upper_tick: i32,
    /// Seconds of pool history the stoploss price averages over
    pub twap_window: u32,
    /// Max shortfall of the unwind sale against the TWAP price
    pub max_unwind_slippage_bps: u16,
}

impl Size for Parameters {
    const SIZE: usize = 339 + 8;
}

#[derive(Debug, Clone, Copy, Default, AnchorSerialize, AnchorDeserialize, PartialEq, Eq)]
pub struct ParametersUpdate {
    pub owner: Option<Pubkey>,
    pub deposit_cap: Option<u128>,
    pub user_deposit_cap: Option<u128>,
    pub allowlist_enabled: Option<bool>,
    pub merkle_root: Option<MerkleNode>,
    pub min_deposit_amount: Option<u128>,
    pub lockup_period: Option<i64>,
    pub helper: Option<Pubkey>,
    pub strategy_impl: Option<Pubkey>,
    pub keeper: Option<Pubkey>,
    pub performance_fee_recipient: Option<Pubkey>,
    pub performance_fee_divisor: Option<u64>,
    pub target_ltv_bps: Option<u16>,
    pub hedge_ratio_bps: Option<u16>,
    pub twap_window: Option<u32>,
    pub max_unwind_slippage_bps: Option<u16>,
}

impl Parameters {
    pub fn new(vault: Pubkey, owner: Pubkey) -> Self {
        let (pubkey, _) =
            Pubkey::find_program_address(&[PARAMETERS_SEED, vault.as_ref()], &crate::id());

        Self {
            pubkey,
            vault,
            owner,
            min_deposit_amount: DEFAULT_MIN_DEPOSIT_AMOUNT,
            performance_fee_divisor: DEFAULT_PERFORMANCE_FEE_DIVISOR,
            target_ltv_bps: DEFAULT_TARGET_LTV_BPS,
            hedge_ratio_bps: DEFAULT_HEDGE_RATIO_BPS,
            twap_window: DEFAULT_TWAP_WINDOW,
            max_unwind_slippage_bps: DEFAULT_MAX_UNWIND_SLIPPAGE_BPS,
            ..Parameters::default()
        }
    }

    pub fn validate_owner(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            caller.eq(&self.owner),
            ErrorCode::Unauthorized,
            "{} is not the owner of parameters {}",
            caller,
            self.pubkey
        )
    }

    pub fn is_allowlisted(&self, account: &Pubkey, proof: &[MerkleNode]) -> bool {
        !self.allowlist_enabled || verify(account, proof, &self.merkle_root)
    }

    pub fn is_performance_fee_enabled(&self) -> bool {
        self.performance_fee_divisor > 0 && self.performance_fee_recipient != Pubkey::default()
    }

    /// Applies every field set in `update` or none of them.
    pub fn update(
        &mut self,
        caller: &Pubkey,
        update: ParametersUpdate,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.validate_owner(caller)?;

        let deposit_cap = update.deposit_cap.unwrap_or(self.deposit_cap);
        let user_deposit_cap = update.user_deposit_cap.unwrap_or(self.user_deposit_cap);
        validate!(
            deposit_cap == 0 || user_deposit_cap <= deposit_cap,
            ErrorCode::InvalidParameter,
            "user deposit cap {} above deposit cap {}",
            user_deposit_cap,
            deposit_cap
        )?;

        if let Some(lockup_period) = update.lockup_period {
            validate!(
                lockup_period >= 0,
                ErrorCode::InvalidParameter,
                "negative lockup period {}",
                lockup_period
            )?;
        }

        if let Some(target_ltv_bps) = update.target_ltv_bps {
            validate!(
                target_ltv_bps > 0 && target_ltv_bps.cast::<u128>()? < BPS_PRECISION,
                ErrorCode::InvalidParameter,
                "target ltv {} bps out of range",
                target_ltv_bps
            )?;
        }

        if let Some(hedge_ratio_bps) = update.hedge_ratio_bps {
            validate!(
                hedge_ratio_bps.cast::<u128>()? <= BPS_PRECISION,
                ErrorCode::InvalidParameter,
                "hedge ratio {} bps out of range",
                hedge_ratio_bps
            )?;
        }

        if let Some(twap_window) = update.twap_window {
            validate!(
                twap_window > 0,
                ErrorCode::InvalidParameter,
                "empty twap window"
            )?;
        }

        if let Some(max_unwind_slippage_bps) = update.max_unwind_slippage_bps {
            validate!(
                max_unwind_slippage_bps.cast::<u128>()? < BPS_PRECISION,
                ErrorCode::InvalidParameter,
                "unwind slippage {} bps out of range",
                max_unwind_slippage_bps
            )?;
        }

        self.deposit_cap = deposit_cap;
        self.user_deposit_cap = user_deposit_cap;

        if let Some(owner) = update.owner {
            msg!("parameters owner: {} -> {}", self.owner, owner);
            self.owner = owner;
        }

        if let Some(allowlist_enabled) = update.allowlist_enabled {
            self.allowlist_enabled = allowlist_enabled;
        }

        if let Some(merkle_root) = update.merkle_root {
            self.merkle_root = merkle_root;
        }

        if let Some(min_deposit_amount) = update.min_deposit_amount {
            self.min_deposit_amount = min_deposit_amount;
        }

        if let Some(lockup_period) = update.lockup_period {
            self.lockup_period = lockup_period;
        }

        if let Some(helper) = update.helper {
            self.helper = helper;
        }

        if let Some(strategy_impl) = update.strategy_impl {
            self.strategy_impl = strategy_impl;
        }

        if let Some(keeper) = update.keeper {
            msg!("keeper: {} -> {}", self.keeper, keeper);
            self.keeper = keeper;
        }

        if let Some(performance_fee_recipient) = update.performance_fee_recipient {
            self.performance_fee_recipient = performance_fee_recipient;
        }

        if let Some(performance_fee_divisor) = update.performance_fee_divisor {
            self.performance_fee_divisor = performance_fee_divisor;
        }

        if let Some(target_ltv_bps) = update.target_ltv_bps {
            self.target_ltv_bps = target_ltv_bps;
        }

        if let Some(hedge_ratio_bps) = update.hedge_ratio_bps {
            self.hedge_ratio_bps = hedge_ratio_bps;
        }

        if let Some(twap_window) = update.twap_window {
            self.twap_window = twap_window;
        }

        if let Some(max_unwind_slippage_bps) = update.max_unwind_slippage_bps {
            self.max_unwind_slippage_bps = max_unwind_slippage_bps;
        }

        let record = ParametersUpdateRecord {
            ts: now,
            vault: self.vault,
            owner: *caller,
            update,
        };
        emit!(record.clone());

        Ok(record)
    }

    pub fn set_deposit_cap(
        &mut self,
        caller: &Pubkey,
        deposit_cap: u128,
        user_deposit_cap: u128,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                deposit_cap: Some(deposit_cap),
                user_deposit_cap: Some(user_deposit_cap),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_allowlist_enabled(
        &mut self,
        caller: &Pubkey,
        allowlist_enabled: bool,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                allowlist_enabled: Some(allowlist_enabled),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_lockup_period(
        &mut self,
        caller: &Pubkey,
        lockup_period: i64,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                lockup_period: Some(lockup_period),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_merkle_root(
        &mut self,
        caller: &Pubkey,
        merkle_root: MerkleNode,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                merkle_root: Some(merkle_root),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_min_deposit_amount(
        &mut self,
        caller: &Pubkey,
        min_deposit_amount: u128,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                min_deposit_amount: Some(min_deposit_amount),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_helper(
        &mut self,
        caller: &Pubkey,
        helper: Pubkey,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                helper: Some(helper),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_strategy_impl(
        &mut self,
        caller: &Pubkey,
        strategy_impl: Pubkey,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                strategy_impl: Some(strategy_impl),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_keeper(
        &mut self,
        caller: &Pubkey,
        keeper: Pubkey,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                keeper: Some(keeper),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_performance_fee(
        &mut self,
        caller: &Pubkey,
        recipient: Pubkey,
        divisor: u64,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                performance_fee_recipient: Some(recipient),
                performance_fee_divisor: Some(divisor),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_max_ltv(
        &mut self,
        caller: &Pubkey,
        target_ltv_bps: u16,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                target_ltv_bps: Some(target_ltv_bps),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_hedge_ratio(
        &mut self,
        caller: &Pubkey,
        hedge_ratio_bps: u16,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                hedge_ratio_bps: Some(hedge_ratio_bps),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn set_stoploss_oracle(
        &mut self,
        caller: &Pubkey,
        twap_window: u32,
        max_unwind_slippage_bps: u16,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                twap_window: Some(twap_window),
                max_unwind_slippage_bps: Some(max_unwind_slippage_bps),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Pubkey,
        new_owner: Pubkey,
        now: i64,
    ) -> VaultResult<ParametersUpdateRecord> {
        self.update(
            caller,
            ParametersUpdate {
                owner: Some(new_owner),
                ..ParametersUpdate::default()
            },
            now,
        )
    }

    /// Written by rebalance only.
    pub(crate) fn set_stoploss_range(&mut self, stoploss_lower_tick: i32, stoploss_upper_tick: i32) {
        self.stoploss_lower_tick = stoploss_lower_tick;
        self.stoploss_upper_tick = stoploss_upper_tick;
    }

    pub fn has_stoploss_range(&self) -> bool {
        self.stoploss_lower_tick < self.stoploss_upper_tick
    }

    pub fn is_stoploss_breached(&self, tick: i32) -> bool {
        self.has_stoploss_range()
            && (tick < self.stoploss_lower_tick || tick > self.stoploss_upper_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_size() {
        let parameters = Parameters::new(Pubkey::new_unique(), Pubkey::new_unique());
        assert_eq!(
            parameters.try_to_vec().unwrap().len() + 8,
            Parameters::SIZE
        );
    }

    #[test]
    fn owner_gated_batch_update() {
        let owner = Pubkey::new_unique();
        let mut parameters = Parameters::new(Pubkey::new_unique(), owner);
        let keeper = Pubkey::new_unique();

        assert_eq!(
            parameters.set_keeper(&keeper, keeper, 0),
            Err(ErrorCode::Unauthorized)
        );

        let record = parameters
            .update(
                &owner,
                ParametersUpdate {
                    keeper: Some(keeper),
                    lockup_period: Some(3_600),
                    hedge_ratio_bps: Some(8_000),
                    ..ParametersUpdate::default()
                },
                7,
            )
            .unwrap();
        assert_eq!(record.ts, 7);
        assert_eq!(parameters.keeper, keeper);
        assert_eq!(parameters.lockup_period, 3_600);
        assert_eq!(parameters.hedge_ratio_bps, 8_000);
        assert_eq!(parameters.min_deposit_amount, DEFAULT_MIN_DEPOSIT_AMOUNT);

        // one bad field rejects the whole batch
        let before = parameters.clone();
        assert_eq!(
            parameters.update(
                &owner,
                ParametersUpdate {
                    lockup_period: Some(0),
                    target_ltv_bps: Some(10_000),
                    ..ParametersUpdate::default()
                },
                8,
            ),
            Err(ErrorCode::InvalidParameter)
        );
        assert_eq!(parameters, before);
    }

    #[test]
    fn deposit_caps() {
        let owner = Pubkey::new_unique();
        let mut parameters = Parameters::new(Pubkey::new_unique(), owner);

        parameters.set_deposit_cap(&owner, 2_000, 500, 0).unwrap();
        assert_eq!(
            parameters.set_deposit_cap(&owner, 400, 500, 0),
            Err(ErrorCode::InvalidParameter)
        );
        // per user cap without a total cap
        parameters.set_deposit_cap(&owner, 0, 500, 0).unwrap();
        assert_eq!((parameters.deposit_cap, parameters.user_deposit_cap), (0, 500));
    }

    #[test]
    fn ownership_transfer() {
        let owner = Pubkey::new_unique();
        let new_owner = Pubkey::new_unique();
        let mut parameters = Parameters::new(Pubkey::new_unique(), owner);

        parameters.transfer_ownership(&owner, new_owner, 0).unwrap();
        assert_eq!(
            parameters.set_lockup_period(&owner, 1, 0),
            Err(ErrorCode::Unauthorized)
        );
        parameters.set_lockup_period(&new_owner, 1, 0).unwrap();
    }

    #[test]
    fn stoploss_band() {
        let mut parameters = Parameters::new(Pubkey::new_unique(), Pubkey::new_unique());
        assert!(!parameters.is_stoploss_breached(-1_000_000));

        parameters.set_stoploss_range(-206_280, -203_160);
        assert!(!parameters.is_stoploss_breached(-206_280));
        assert!(!parameters.is_stoploss_breached(-203_160));
        assert!(parameters.is_stoploss_breached(-206_281));
        assert!(parameters.is_stoploss_breached(-203_159));
    }

    #[test]
    fn stoploss_oracle() {
        let owner = Pubkey::new_unique();
        let mut parameters = Parameters::new(Pubkey::new_unique(), owner);
        assert_eq!(parameters.twap_window, DEFAULT_TWAP_WINDOW);

        parameters.set_stoploss_oracle(&owner, 600, 50, 0).unwrap();
        assert_eq!(
            (parameters.twap_window, parameters.max_unwind_slippage_bps),
            (600, 50)
        );
        assert_eq!(
            parameters.set_stoploss_oracle(&owner, 0, 50, 0),
            Err(ErrorCode::InvalidParameter)
        );
        assert_eq!(
            parameters.set_stoploss_oracle(&owner, 600, 10_000, 0),
            Err(ErrorCode::InvalidParameter)
        );
    }
}
