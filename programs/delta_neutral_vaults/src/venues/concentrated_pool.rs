use crate::constants::{FEE_PIPS_PRECISION, OBSERVATION_CARDINALITY};
use crate::error::{ErrorCode, VaultResult};
use crate::math::bn::U256;
use crate::math::casting::Cast;
use crate::math::liquidity_amounts::get_amounts_for_liquidity;
use crate::math::price::{token0_to_token1, token1_to_token0};
use crate::math::safe_math::{SafeDivCeil, SafeMath};
use crate::math::shares::{mul_div, Rounding};
use crate::math::tick_math::{get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, is_aligned};
use crate::validate;
use anchor_lang::prelude::*;

/// Upper bound on the unit adjustments `quote_exact_output` makes after its closed form estimate.
const EXACT_OUTPUT_SEARCH_STEPS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeModel {
    /// Fixed fee tier, e.g. 3000 pips for 0.3%.
    Static { fee_pips: u32 },
    /// Fee grows with the distance the price moved since the last swap checkpoint.
    Adaptive {
        base_fee_pips: u32,
        max_fee_pips: u32,
        fee_pips_per_tick: u32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolPosition {
    pub owner: Pubkey,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub liquidity: u128,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

impl PoolPosition {
    fn is_for(&self, owner: &Pubkey, lower_tick: i32, upper_tick: i32) -> bool {
        self.owner.eq(owner) && self.lower_tick == lower_tick && self.upper_tick == upper_tick
    }

    fn in_range(&self, tick: i32) -> bool {
        self.liquidity > 0 && self.lower_tick <= tick && tick < self.upper_tick
    }
}

/// Running sum of tick × seconds as of `timestamp`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: i64,
    pub tick_cumulative: i64,
}

/// A concentrated liquidity pool quoting at its current price.
///
/// Swaps settle at the current price less the pool fee, and the fee is credited to
/// in-range positions pro rata to their liquidity. The price itself is moved by the
/// rest of the market through `set_tick`/`set_sqrt_price`, each of which writes an
/// observation of the outgoing tick so that `twap_tick` can average over time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcentratedPool {
    pub pubkey: Pubkey,
    pub token0: Pubkey,
    pub token1: Pubkey,
    pub tick_spacing: i32,
    pub fee_model: FeeModel,
    sqrt_price_x96: U256,
    tick: i32,
    fee_checkpoint_tick: i32,
    positions: Vec<PoolPosition>,
    /// Oldest first, at most `OBSERVATION_CARDINALITY`
    observations: Vec<Observation>,
}

impl ConcentratedPool {
    pub fn new(
        pubkey: Pubkey,
        token0: Pubkey,
        token1: Pubkey,
        tick_spacing: i32,
        fee_model: FeeModel,
        initial_tick: i32,
        now: i64,
    ) -> VaultResult<Self> {
        validate!(
            tick_spacing > 0 && token0 != token1,
            ErrorCode::InvalidParameter,
            "invalid pool config"
        )?;

        Ok(Self {
            pubkey,
            token0,
            token1,
            tick_spacing,
            fee_model,
            sqrt_price_x96: get_sqrt_ratio_at_tick(initial_tick)?,
            tick: initial_tick,
            fee_checkpoint_tick: initial_tick,
            positions: vec![],
            observations: vec![Observation {
                timestamp: now,
                tick_cumulative: 0,
            }],
        })
    }

    pub fn sqrt_price_x96(&self) -> U256 {
        self.sqrt_price_x96
    }

    pub fn tick(&self) -> i32 {
        self.tick
    }

    pub fn set_tick(&mut self, tick: i32, now: i64) -> VaultResult {
        let sqrt_price_x96 = get_sqrt_ratio_at_tick(tick)?;
        self.write_observation(now)?;
        self.sqrt_price_x96 = sqrt_price_x96;
        self.tick = tick;
        Ok(())
    }

    pub fn set_sqrt_price(&mut self, sqrt_price_x96: U256, now: i64) -> VaultResult {
        let tick = get_tick_at_sqrt_ratio(sqrt_price_x96)?;
        self.write_observation(now)?;
        self.tick = tick;
        self.sqrt_price_x96 = sqrt_price_x96;
        Ok(())
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    fn latest_observation(&self) -> VaultResult<Observation> {
        self.observations.last().copied().ok_or_else(|| {
            msg!("pool {} has no observations", self.pubkey);
            ErrorCode::TwapUnavailable
        })
    }

    /// Closes the current tick's interval at `now`. At most one observation per second.
    fn write_observation(&mut self, now: i64) -> VaultResult {
        let last = self.latest_observation()?;
        validate!(
            now >= last.timestamp,
            ErrorCode::InvalidParameter,
            "observation at {} before {}",
            now,
            last.timestamp
        )?;
        if now == last.timestamp {
            return Ok(());
        }

        let elapsed = now.safe_sub(last.timestamp)?;
        self.observations.push(Observation {
            timestamp: now,
            tick_cumulative: last
                .tick_cumulative
                .safe_add(i64::from(self.tick).safe_mul(elapsed)?)?,
        });
        if self.observations.len() > OBSERVATION_CARDINALITY {
            self.observations.remove(0);
        }

        Ok(())
    }

    /// Tick cumulative at `now - seconds_ago`.
    pub fn observe(&self, now: i64, seconds_ago: u32) -> VaultResult<i64> {
        let last = self.latest_observation()?;
        let target = now.safe_sub(i64::from(seconds_ago))?;
        let oldest = self.observations[0];
        validate!(
            now >= last.timestamp && target >= oldest.timestamp,
            ErrorCode::TwapUnavailable,
            "pool {} history [{}, {}] does not cover {}",
            self.pubkey,
            oldest.timestamp,
            now,
            target
        )?;

        if target >= last.timestamp {
            return last
                .tick_cumulative
                .safe_add(i64::from(self.tick).safe_mul(target.safe_sub(last.timestamp)?)?);
        }

        // the tick is constant between two observations
        let after = self
            .observations
            .iter()
            .position(|observation| observation.timestamp > target)
            .ok_or(ErrorCode::TwapUnavailable)?;
        let (before, after) = (self.observations[after - 1], self.observations[after]);
        let interval = after.timestamp.safe_sub(before.timestamp)?;
        let tick = after
            .tick_cumulative
            .safe_sub(before.tick_cumulative)?
            .safe_div(interval)?;

        before
            .tick_cumulative
            .safe_add(tick.safe_mul(target.safe_sub(before.timestamp)?)?)
    }

    /// Time weighted average tick over the last `window` seconds, rounded toward negative infinity.
    pub fn twap_tick(&self, now: i64, window: u32) -> VaultResult<i32> {
        validate!(window > 0, ErrorCode::InvalidParameter, "empty twap window")?;

        let delta = self.observe(now, 0)?.safe_sub(self.observe(now, window)?)?;
        delta.div_euclid(i64::from(window)).cast()
    }

    pub fn fee_pips(&self) -> VaultResult<u32> {
        match self.fee_model {
            FeeModel::Static { fee_pips } => Ok(fee_pips),
            FeeModel::Adaptive {
                base_fee_pips,
                max_fee_pips,
                fee_pips_per_tick,
            } => {
                let moved = self.tick.abs_diff(self.fee_checkpoint_tick).cast::<u128>()?;
                let fee = (base_fee_pips.cast::<u128>()?)
                    .safe_add(moved.safe_mul(fee_pips_per_tick.cast()?)?)?
                    .min(max_fee_pips.cast()?);
                fee.cast()
            }
        }
    }

    /// Records the current tick as the reference for the adaptive fee.
    pub fn checkpoint_fee(&mut self) {
        self.fee_checkpoint_tick = self.tick;
    }

    pub fn positions(&self) -> &[PoolPosition] {
        &self.positions
    }

    pub fn position(&self, owner: &Pubkey, lower_tick: i32, upper_tick: i32) -> Option<&PoolPosition> {
        self.positions
            .iter()
            .find(|position| position.is_for(owner, lower_tick, upper_tick))
    }

    fn position_mut(
        &mut self,
        owner: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
    ) -> VaultResult<&mut PoolPosition> {
        self.positions
            .iter_mut()
            .find(|position| position.is_for(owner, lower_tick, upper_tick))
            .ok_or(ErrorCode::PositionNotFound)
    }

    pub fn amounts_for_liquidity(
        &self,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
        rounding: Rounding,
    ) -> VaultResult<(u128, u128)> {
        get_amounts_for_liquidity(
            self.sqrt_price_x96,
            get_sqrt_ratio_at_tick(lower_tick)?,
            get_sqrt_ratio_at_tick(upper_tick)?,
            liquidity,
            rounding,
        )
    }

    /// Adds liquidity and returns the (token0, token1) the owner pays in, rounded up.
    pub fn mint(
        &mut self,
        owner: Pubkey,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> VaultResult<(u128, u128)> {
        validate!(
            lower_tick < upper_tick
                && is_aligned(lower_tick, self.tick_spacing)
                && is_aligned(upper_tick, self.tick_spacing),
            ErrorCode::InvalidTickRange,
            "range [{}, {}] not aligned to spacing {}",
            lower_tick,
            upper_tick,
            self.tick_spacing
        )?;
        validate!(liquidity > 0, ErrorCode::ZeroAmount)?;

        let amounts =
            self.amounts_for_liquidity(lower_tick, upper_tick, liquidity, Rounding::Ceiling)?;

        match self.position_mut(&owner, lower_tick, upper_tick) {
            Ok(position) => {
                position.liquidity = position.liquidity.safe_add(liquidity)?;
            }
            Err(_) => self.positions.push(PoolPosition {
                owner,
                lower_tick,
                upper_tick,
                liquidity,
                ..PoolPosition::default()
            }),
        }

        Ok(amounts)
    }

    /// Removes liquidity and returns the (token0, token1) paid out, rounded down.
    pub fn burn(
        &mut self,
        owner: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> VaultResult<(u128, u128)> {
        let amounts =
            self.amounts_for_liquidity(lower_tick, upper_tick, liquidity, Rounding::Floor)?;

        let position = self.position_mut(owner, lower_tick, upper_tick)?;
        validate!(
            position.liquidity >= liquidity,
            ErrorCode::InsufficientPositionLiquidity,
            "burn {} exceeds position liquidity {}",
            liquidity,
            position.liquidity
        )?;
        position.liquidity = position.liquidity.safe_sub(liquidity)?;

        Ok(amounts)
    }

    /// Pays out and clears the fees owed to a position.
    pub fn collect(
        &mut self,
        owner: &Pubkey,
        lower_tick: i32,
        upper_tick: i32,
    ) -> VaultResult<(u128, u128)> {
        let position = match self.position_mut(owner, lower_tick, upper_tick) {
            Ok(position) => position,
            Err(_) => return Ok((0, 0)),
        };

        let collected = (position.tokens_owed0, position.tokens_owed1);
        position.tokens_owed0 = 0;
        position.tokens_owed1 = 0;

        Ok(collected)
    }

    pub fn in_range_liquidity(&self) -> VaultResult<u128> {
        self.positions
            .iter()
            .filter(|position| position.in_range(self.tick))
            .try_fold(0_u128, |total, position| total.safe_add(position.liquidity))
    }

    /// Credits swap fees to in-range positions pro rata. Dust stays with the pool.
    pub fn accrue_fees(&mut self, fee0: u128, fee1: u128) -> VaultResult {
        let active_liquidity = self.in_range_liquidity()?;
        if active_liquidity == 0 {
            return Ok(());
        }

        let tick = self.tick;
        for position in self.positions.iter_mut().filter(|p| p.in_range(tick)) {
            position.tokens_owed0 = position.tokens_owed0.safe_add(mul_div(
                fee0,
                position.liquidity,
                active_liquidity,
                Rounding::Floor,
            )?)?;
            position.tokens_owed1 = position.tokens_owed1.safe_add(mul_div(
                fee1,
                position.liquidity,
                active_liquidity,
                Rounding::Floor,
            )?)?;
        }

        Ok(())
    }

    fn swap_fee(&self, amount_in: u128) -> VaultResult<u128> {
        mul_div(
            amount_in,
            self.fee_pips()?.cast()?,
            FEE_PIPS_PRECISION,
            Rounding::Ceiling,
        )
    }

    /// Output of selling `amount_in` of token0 (`zero_for_one`) or token1.
    pub fn quote(&self, zero_for_one: bool, amount_in: u128) -> VaultResult<u128> {
        let amount_after_fee = amount_in.safe_sub(self.swap_fee(amount_in)?)?;
        if zero_for_one {
            token0_to_token1(amount_after_fee, self.sqrt_price_x96, Rounding::Floor)
        } else {
            token1_to_token0(amount_after_fee, self.sqrt_price_x96, Rounding::Floor)
        }
    }

    /// Smallest input whose quote is at least `amount_out`.
    pub fn quote_exact_output(&self, zero_for_one: bool, amount_out: u128) -> VaultResult<u128> {
        if amount_out == 0 {
            return Ok(0);
        }

        let amount_after_fee = if zero_for_one {
            token1_to_token0(amount_out, self.sqrt_price_x96, Rounding::Ceiling)?
        } else {
            token0_to_token1(amount_out, self.sqrt_price_x96, Rounding::Ceiling)?
        };

        let fee_pips = self.fee_pips()?.cast::<u128>()?;
        validate!(
            fee_pips < FEE_PIPS_PRECISION,
            ErrorCode::InvalidParameter,
            "fee {} pips leaves no output",
            fee_pips
        )?;

        let mut amount_in = amount_after_fee
            .safe_mul(FEE_PIPS_PRECISION)?
            .safe_div_ceil(FEE_PIPS_PRECISION.safe_sub(fee_pips)?)?;

        for _ in 0..EXACT_OUTPUT_SEARCH_STEPS {
            if self.quote(zero_for_one, amount_in)? >= amount_out {
                return Ok(amount_in);
            }
            amount_in = amount_in.safe_add(1)?;
        }

        msg!("no exact input found for output {}", amount_out);
        Err(ErrorCode::MathError)
    }

    /// Executes a swap at the current price, returning the output amount.
    pub fn swap(&mut self, zero_for_one: bool, amount_in: u128) -> VaultResult<u128> {
        validate!(amount_in > 0, ErrorCode::ZeroAmount)?;

        let amount_out = self.quote(zero_for_one, amount_in)?;
        let fee = self.swap_fee(amount_in)?;
        if zero_for_one {
            self.accrue_fees(fee, 0)?;
        } else {
            self.accrue_fees(0, fee)?;
        }

        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_eq_within;

    fn weth_usdc_pool(fee_model: FeeModel) -> ConcentratedPool {
        ConcentratedPool::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            60,
            fee_model,
            -204_720,
            0,
        )
        .unwrap()
    }

    #[test]
    fn mint_burn_collect() {
        let mut pool = weth_usdc_pool(FeeModel::Static { fee_pips: 3_000 });
        let owner = Pubkey::new_unique();

        let (paid0, paid1) = pool.mint(owner, -205_680, -203_760, 1_000_000_000_000).unwrap();
        assert!(paid0 > 0 && paid1 > 0);

        let (out0, out1) = pool.burn(&owner, -205_680, -203_760, 1_000_000_000_000).unwrap();
        // burning rounds down, minting rounds up
        assert!(out0 <= paid0 && paid0 - out0 <= 1);
        assert!(out1 <= paid1 && paid1 - out1 <= 1);

        assert_eq!(
            pool.burn(&owner, -205_680, -203_760, 1),
            Err(ErrorCode::InsufficientPositionLiquidity)
        );
        assert_eq!(
            pool.mint(owner, -205_670, -203_760, 1),
            Err(ErrorCode::InvalidTickRange)
        );
        assert_eq!(pool.collect(&owner, -205_680, -203_760).unwrap(), (0, 0));
    }

    #[test]
    fn swap_fees_go_to_in_range_positions() {
        let mut pool = weth_usdc_pool(FeeModel::Static { fee_pips: 3_000 });
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let carol = Pubkey::new_unique();
        pool.mint(alice, -205_680, -203_760, 3_000_000).unwrap();
        pool.mint(bob, -205_680, -203_760, 1_000_000).unwrap();
        pool.mint(carol, -203_700, -203_100, 1_000_000).unwrap();

        // sell 1000 USDC for WETH
        let amount_out = pool.swap(false, 1_000_000_000).unwrap();
        let expected = token1_to_token0(997_000_000, pool.sqrt_price_x96(), Rounding::Floor).unwrap();
        assert_eq!(amount_out, expected);

        assert_eq!(pool.collect(&alice, -205_680, -203_760).unwrap(), (0, 2_250_000));
        assert_eq!(pool.collect(&bob, -205_680, -203_760).unwrap(), (0, 750_000));
        assert_eq!(pool.collect(&carol, -203_700, -203_100).unwrap(), (0, 0));
    }

    #[test]
    fn exact_output_quote() {
        let pool = weth_usdc_pool(FeeModel::Static { fee_pips: 3_000 });
        let wanted = 123_456_789_000_000_000u128;
        let amount_in = pool.quote_exact_output(false, wanted).unwrap();
        assert!(pool.quote(false, amount_in).unwrap() >= wanted);
        assert!(pool.quote(false, amount_in - 1).unwrap() < wanted);
    }

    #[test]
    fn adaptive_fee_tracks_price_moves() {
        let mut pool = weth_usdc_pool(FeeModel::Adaptive {
            base_fee_pips: 100,
            max_fee_pips: 3_000,
            fee_pips_per_tick: 2,
        });
        assert_eq!(pool.fee_pips().unwrap(), 100);

        pool.set_tick(-204_220, 0).unwrap();
        assert_eq!(pool.fee_pips().unwrap(), 1_100);

        pool.set_tick(-200_000, 0).unwrap();
        assert_eq!(pool.fee_pips().unwrap(), 3_000);

        pool.checkpoint_fee();
        assert_eq!(pool.fee_pips().unwrap(), 100);
    }

    #[test]
    fn price_moves() {
        let mut pool = weth_usdc_pool(FeeModel::Static { fee_pips: 500 });
        pool.set_tick(-206_500, 0).unwrap();
        assert_eq!(pool.tick(), -206_500);

        let sqrt_price = get_sqrt_ratio_at_tick(-204_000).unwrap();
        pool.set_sqrt_price(sqrt_price + U256::one(), 0).unwrap();
        assert_eq!(pool.tick(), -204_000);
        assert_eq_within!(pool.sqrt_price_x96(), sqrt_price, U256::one());
    }

    #[test]
    fn twap_follows_price_history() {
        let mut pool = weth_usdc_pool(FeeModel::Static { fee_pips: 3_000 });
        assert_eq!(pool.twap_tick(300, 300).unwrap(), -204_720);
        // history starts at pool creation
        assert_eq!(pool.twap_tick(299, 300), Err(ErrorCode::TwapUnavailable));

        pool.set_tick(-206_520, 1_000).unwrap();
        // a fresh move barely shifts the average
        assert_eq!(pool.twap_tick(1_010, 300).unwrap(), -204_780);
        assert_eq!(pool.twap_tick(1_150, 300).unwrap(), -205_620);
        assert_eq!(pool.twap_tick(1_300, 300).unwrap(), -206_520);

        // a move that reverts within the window
        pool.set_tick(-204_720, 1_310).unwrap();
        assert_eq!(pool.twap_tick(1_310, 60).unwrap(), -206_520);
        assert_eq!(pool.twap_tick(1_340, 60).unwrap(), -205_620);
        assert_eq!(pool.observations().len(), 3);

        assert_eq!(
            pool.set_tick(-204_000, 1_309),
            Err(ErrorCode::InvalidParameter)
        );
    }

    #[test]
    fn observation_history_is_bounded() {
        let mut pool = weth_usdc_pool(FeeModel::Static { fee_pips: 500 });
        for i in 1..=(OBSERVATION_CARDINALITY as i64 + 10) {
            pool.set_tick(-204_720 + (i as i32 % 2) * 60, i * 10).unwrap();
        }
        assert_eq!(pool.observations().len(), OBSERVATION_CARDINALITY);
        assert_eq!(pool.observations()[0].timestamp, 110);
        assert_eq!(pool.twap_tick(800, 700), Err(ErrorCode::TwapUnavailable));
        assert!(pool.twap_tick(800, 20).is_ok());
    }
}
