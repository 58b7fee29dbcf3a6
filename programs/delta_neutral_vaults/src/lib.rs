use anchor_lang::prelude::*;

pub use adapters::*;
pub use state::*;

pub mod adapters;
pub mod constants;
pub mod error;
pub mod macros;
pub mod math;
pub mod state;
#[cfg(test)]
mod test_utils;
pub mod venues;

declare_id!("DNVau1tsXc4gB9L3oqfE5m2FJ8r7hYkWQpSv6NtZxCjA");
