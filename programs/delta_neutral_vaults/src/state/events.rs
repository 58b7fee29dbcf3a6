use crate::state::{ParametersUpdate, VaultVersion};
use anchor_lang::prelude::*;

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct VaultCreatedRecord {
    pub ts: i64,
    pub vault: Pubkey,
    pub factory: Pubkey,
    pub creator: Pubkey,
    pub version: VaultVersion,
    pub nonce: u64,
    pub pool: Pubkey,
    pub lending_market: Pubkey,
    pub reversed: bool,
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct VaultDepositorRecord {
    pub ts: i64,
    pub vault: Pubkey,
    pub user_authority: Pubkey,
    pub action: VaultDepositorAction,
    /// token0 deposited or paid out
    pub amount: u128,
    /// token1 paid out
    pub amount_volatile: u128,
    pub shares: u128,
    pub vault_shares_before: u128,
    pub vault_equity_before: u128,
}

#[derive(Clone, Copy, Debug, AnchorSerialize, AnchorDeserialize, PartialEq, Eq)]
pub enum VaultDepositorAction {
    Deposit,
    Withdraw,
}

impl Default for VaultDepositorAction {
    fn default() -> Self {
        VaultDepositorAction::Deposit
    }
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct RebalanceRecord {
    pub ts: i64,
    pub vault: Pubkey,
    pub strategist: Pubkey,
    pub tick: i32,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub stoploss_lower_tick: i32,
    pub stoploss_upper_tick: i32,
    pub liquidity: u128,
    pub hedge_collateral: u128,
    pub hedge_debt: u128,
    pub vault_equity_before: u128,
    pub vault_equity_after: u128,
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct FeeCollectRecord {
    pub ts: i64,
    pub vault: Pubkey,
    /// Pool fees moved into idle balances
    pub pool_fee0: u128,
    pub pool_fee1: u128,
    /// Performance fee accrued to the recipient
    pub performance_fee: u128,
    pub share_price: u128,
    pub high_water_mark: u128,
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct PerformanceFeeClaimRecord {
    pub ts: i64,
    pub vault: Pubkey,
    pub recipient: Pubkey,
    pub amount: u128,
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ForcedUnwindRecord {
    pub ts: i64,
    pub vault: Pubkey,
    pub keeper: Pubkey,
    pub tick: i32,
    /// Price the unwind sale was floored against
    pub twap_tick: i32,
    pub stoploss_lower_tick: i32,
    pub stoploss_upper_tick: i32,
    pub vault_equity_before: u128,
    pub vault_equity_after: u128,
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ParametersUpdateRecord {
    pub ts: i64,
    pub vault: Pubkey,
    pub owner: Pubkey,
    pub update: ParametersUpdate,
}

#[event]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct LifecycleEventRelayed {
    pub ts: i64,
    pub vault: Pubkey,
    pub version: VaultVersion,
    pub sequence: u64,
    pub kind: VaultEventKind,
}

#[derive(Clone, Copy, Debug, AnchorSerialize, AnchorDeserialize, PartialEq, Eq)]
pub enum VaultEventKind {
    Created,
    Deposit,
    Withdraw,
    Rebalance,
    FeeCollect,
    PerformanceFeeClaim,
    ForcedUnwind,
    ParametersUpdate,
}

impl Default for VaultEventKind {
    fn default() -> Self {
        VaultEventKind::Created
    }
}

/// Lifecycle events a vault queues for the emitter.
#[derive(Clone, Debug, PartialEq)]
pub enum VaultEvent {
    Created(VaultCreatedRecord),
    Depositor(VaultDepositorRecord),
    Rebalance(RebalanceRecord),
    FeeCollect(FeeCollectRecord),
    PerformanceFeeClaim(PerformanceFeeClaimRecord),
    ForcedUnwind(ForcedUnwindRecord),
    ParametersUpdate(ParametersUpdateRecord),
}

impl VaultEvent {
    pub fn kind(&self) -> VaultEventKind {
        match self {
            VaultEvent::Created(_) => VaultEventKind::Created,
            VaultEvent::Depositor(record) => match record.action {
                VaultDepositorAction::Deposit => VaultEventKind::Deposit,
                VaultDepositorAction::Withdraw => VaultEventKind::Withdraw,
            },
            VaultEvent::Rebalance(_) => VaultEventKind::Rebalance,
            VaultEvent::FeeCollect(_) => VaultEventKind::FeeCollect,
            VaultEvent::PerformanceFeeClaim(_) => VaultEventKind::PerformanceFeeClaim,
            VaultEvent::ForcedUnwind(_) => VaultEventKind::ForcedUnwind,
            VaultEvent::ParametersUpdate(_) => VaultEventKind::ParametersUpdate,
        }
    }

    pub fn emit(&self) {
        match self {
            VaultEvent::Created(record) => emit!(record.clone()),
            VaultEvent::Depositor(record) => emit!(record.clone()),
            VaultEvent::Rebalance(record) => emit!(record.clone()),
            VaultEvent::FeeCollect(record) => emit!(record.clone()),
            VaultEvent::PerformanceFeeClaim(record) => emit!(record.clone()),
            VaultEvent::ForcedUnwind(record) => emit!(record.clone()),
            VaultEvent::ParametersUpdate(record) => emit!(record.clone()),
        }
    }
}

/// Version-tagged event as handed to indexers.
#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    pub version: VaultVersion,
    pub vault: Pubkey,
    pub sequence: u64,
    pub payload: VaultEvent,
}
