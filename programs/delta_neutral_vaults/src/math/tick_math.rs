use crate::constants::{MAX_SQRT_RATIO_STR, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK};
use crate::error::{ErrorCode, VaultResult};
use crate::math::bn::U256;
use crate::validate;
use anchor_lang::prelude::*;

// sqrt(1.0001^-(2^i)) in Q128.128 for i in 1..=19
const TICK_FACTORS: [u128; 19] = [
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

pub fn min_sqrt_ratio() -> U256 {
    U256::from(MIN_SQRT_RATIO)
}

pub fn max_sqrt_ratio() -> U256 {
    // constant string is a valid decimal literal
    U256::from_dec_str(MAX_SQRT_RATIO_STR).unwrap_or(U256::MAX)
}

/// sqrt(1.0001^tick) as a Q64.96 fixed point number, rounded up.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> VaultResult<U256> {
    validate!(
        (MIN_TICK..=MAX_TICK).contains(&tick),
        ErrorCode::TickOutOfBounds,
        "tick {} outside [{}, {}]",
        tick,
        MIN_TICK,
        MAX_TICK
    )?;

    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001_u128)
    } else {
        U256::one() << 128
    };

    for (i, factor) in TICK_FACTORS.iter().enumerate() {
        if abs_tick & (0x2 << i) != 0 {
            ratio = (ratio * U256::from(*factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    let rounded_up = if ratio & U256::from(u32::MAX) == U256::zero() {
        U256::zero()
    } else {
        U256::one()
    };

    Ok((ratio >> 32) + rounded_up)
}

/// Greatest tick whose sqrt ratio is less than or equal to `sqrt_price_x96`.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> VaultResult<i32> {
    validate!(
        sqrt_price_x96 >= min_sqrt_ratio() && sqrt_price_x96 < max_sqrt_ratio(),
        ErrorCode::SqrtPriceOutOfBounds,
        "sqrt price {} outside bounds",
        sqrt_price_x96
    )?;

    let mut low = MIN_TICK;
    let mut high = MAX_TICK;
    while low < high {
        // upper mid so the loop always shrinks
        let mid = low + (high - low + 1) / 2;
        if get_sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    Ok(low)
}

pub fn is_aligned(tick: i32, tick_spacing: i32) -> bool {
    tick_spacing > 0 && tick % tick_spacing == 0
}

/// Rounds `tick` down to the nearest multiple of `tick_spacing`.
pub fn floor_to_spacing(tick: i32, tick_spacing: i32) -> i32 {
    tick.div_euclid(tick_spacing) * tick_spacing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_ratio_bounds() {
        assert_eq!(get_sqrt_ratio_at_tick(MIN_TICK).unwrap(), min_sqrt_ratio());
        assert_eq!(get_sqrt_ratio_at_tick(MAX_TICK).unwrap(), max_sqrt_ratio());
        assert_eq!(get_sqrt_ratio_at_tick(0).unwrap(), U256::one() << 96);

        assert_eq!(
            get_sqrt_ratio_at_tick(MIN_TICK - 1),
            Err(ErrorCode::TickOutOfBounds)
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(MAX_TICK + 1),
            Err(ErrorCode::TickOutOfBounds)
        );
    }

    #[test]
    fn sqrt_ratio_is_monotonic() {
        let mut previous = get_sqrt_ratio_at_tick(-205_680).unwrap();
        for tick in (-205_620..=-203_760).step_by(60) {
            let current = get_sqrt_ratio_at_tick(tick).unwrap();
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn tick_at_sqrt_ratio_round_trips() {
        for tick in [MIN_TICK, -204_720, -60, -1, 0, 1, 60, 204_720, MAX_TICK - 1] {
            let sqrt_price = get_sqrt_ratio_at_tick(tick).unwrap();
            assert_eq!(get_tick_at_sqrt_ratio(sqrt_price).unwrap(), tick);
            assert_eq!(
                get_tick_at_sqrt_ratio(sqrt_price + U256::one()).unwrap(),
                tick
            );
        }

        let just_below = get_sqrt_ratio_at_tick(-204_720).unwrap() - U256::one();
        assert_eq!(get_tick_at_sqrt_ratio(just_below).unwrap(), -204_721);

        assert_eq!(
            get_tick_at_sqrt_ratio(max_sqrt_ratio()),
            Err(ErrorCode::SqrtPriceOutOfBounds)
        );
    }

    #[test]
    fn spacing_helpers() {
        assert!(is_aligned(-205_680, 60));
        assert!(!is_aligned(-205_681, 60));
        assert_eq!(floor_to_spacing(-204_750, 60), -204_780);
        assert_eq!(floor_to_spacing(125, 60), 120);
        assert_eq!(floor_to_spacing(-60, 60), -60);
    }
}
