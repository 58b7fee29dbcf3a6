//! In-process models of the external venues the adapters drive: a concentrated
//! liquidity pool and a pooled lending market.

pub mod concentrated_pool;
pub mod lending_market;

pub use concentrated_pool::*;
pub use lending_market::*;
