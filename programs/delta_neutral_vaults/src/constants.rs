// TICKS
pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

// SQRT PRICE (Q64.96) bounds returned by get_sqrt_ratio_at_tick(MIN_TICK / MAX_TICK)
pub const MIN_SQRT_RATIO: u128 = 4295128739;
pub const MAX_SQRT_RATIO_STR: &str = "1461446703485210103287273052203988822378723970342";

pub const Q96_RESOLUTION: u32 = 96;

// PRECISIONS
pub const BPS_PRECISION: u128 = 10_000;
pub const FEE_PIPS_PRECISION: u128 = 1_000_000; // expo -6
pub const SHARE_PRICE_PRECISION: u128 = 1_000_000_000_000_000_000; // expo -18
pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000; // expo -27
pub const ORACLE_PRICE_PRECISION: u128 = 100_000_000; // expo -8

/// Liquidity unit the rebalance sizing is computed against before scaling to vault equity.
pub const REFERENCE_LIQUIDITY: u128 = 1_000_000_000_000_000_000;

// TIME
pub const ONE_HOUR: i64 = 60 * 60;
pub const ONE_DAY: i64 = ONE_HOUR * 24;
pub const ONE_YEAR: i64 = ONE_DAY * 365;

// SEEDS
pub const VAULT_SEED: &[u8] = b"vault";
pub const VAULT_DEPOSITOR_SEED: &[u8] = b"vault_depositor";
pub const PARAMETERS_SEED: &[u8] = b"parameters";
pub const STRATEGY_HELPER_SEED: &[u8] = b"strategy_helper";
pub const LIQUIDITY_MANAGER_SEED: &[u8] = b"liquidity_manager";
pub const LENDING_MANAGER_SEED: &[u8] = b"lending_manager";

// DEFAULT POLICY
pub const DEFAULT_MIN_DEPOSIT_AMOUNT: u128 = 10_000;
pub const DEFAULT_PERFORMANCE_FEE_DIVISOR: u64 = 10;
pub const DEFAULT_TARGET_LTV_BPS: u16 = 6_000;
pub const DEFAULT_HEDGE_RATIO_BPS: u16 = 10_000;
pub const DEFAULT_TWAP_WINDOW: u32 = 5 * 60;
pub const DEFAULT_MAX_UNWIND_SLIPPAGE_BPS: u16 = 100;

pub const MAX_STRATEGISTS: usize = 16;

// POOLS
pub const UNISWAP_V3_FEE_TIERS: [(u32, i32); 4] = [(100, 1), (500, 10), (3_000, 60), (10_000, 200)];
pub const CAMELOT_V3_TICK_SPACING: i32 = 60;
/// Tick observations a pool keeps for TWAP reads
pub const OBSERVATION_CARDINALITY: usize = 64;
