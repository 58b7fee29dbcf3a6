pub use emitter::*;
pub use events::*;
pub use factory::*;
pub use parameters::*;
pub use registry::*;
pub use stoploss_checker::*;
pub use strategy_helper::*;
pub use traits::*;
pub use vault::*;
pub use vault_core::*;
pub use vault_depositor::*;

mod emitter;
pub mod events;
mod factory;
mod parameters;
mod registry;
mod stoploss_checker;
mod strategy_helper;
mod traits;
mod vault;
mod vault_core;
mod vault_depositor;
