pub mod bn;
pub mod casting;
pub mod liquidity_amounts;
pub mod merkle;
pub mod oracle;
pub mod price;
pub mod rebalance;
pub mod safe_math;
pub mod shares;
pub mod tick_math;
