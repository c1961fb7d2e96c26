use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::ClientError;

pub type Tick = i32;
pub type SqrtPriceX96 = BigUint;

pub const MIN_TICK: Tick = -887272;
pub const MAX_TICK: Tick = -MIN_TICK;

const MIN_SQRT_RATIO: u64 = 4295128739;
const MAX_SQRT_RATIO_HIGH: u32 = 0xfffd8963;
const MAX_SQRT_RATIO_LOW: u128 = 0xefd1fc6a506488495d951d5263988d26;

// sqrt(1.0001^-1) in Q128.
const SQRT_RATIO_BIT0: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

// sqrt(1.0001^-(2^i)) in Q128 for i = 1..=19.
const SQRT_RATIO_MULTIPLIERS: [u128; 19] = [
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

/// Smallest sqrt price the pool accepts, the value at `MIN_TICK`.
pub fn min_sqrt_ratio() -> SqrtPriceX96 {
    BigUint::from(MIN_SQRT_RATIO)
}

/// Sqrt price at `MAX_TICK`. Valid as a range bound but not as a pool price.
pub fn max_sqrt_ratio() -> SqrtPriceX96 {
    (BigUint::from(MAX_SQRT_RATIO_HIGH) << 128u32) + BigUint::from(MAX_SQRT_RATIO_LOW)
}

pub fn q96() -> BigUint {
    BigUint::one() << 96u32
}

/// Returns `sqrt(1.0001^tick) * 2^96`, rounded up, bit-for-bit with the
/// on-chain tick math.
pub fn get_sqrt_ratio_at_tick(tick: Tick) -> Result<SqrtPriceX96, ClientError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(ClientError::OutOfRange(format!(
            "tick {tick} outside [{MIN_TICK}, {MAX_TICK}]"
        )));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 1 != 0 {
        BigUint::from(SQRT_RATIO_BIT0)
    } else {
        BigUint::one() << 128u32
    };
    for (bit, multiplier) in SQRT_RATIO_MULTIPLIERS.iter().enumerate() {
        if abs_tick & (2u32 << bit) != 0 {
            ratio = (ratio * BigUint::from(*multiplier)) >> 128u32;
        }
    }

    if tick > 0 {
        let u256_max = (BigUint::one() << 256u32) - BigUint::one();
        ratio = u256_max / ratio;
    }

    let remainder = &ratio & BigUint::from(u32::MAX);
    let mut sqrt_price = ratio >> 32u32;
    if !remainder.is_zero() {
        sqrt_price += 1u32;
    }
    Ok(sqrt_price)
}

/// Greatest tick whose sqrt ratio does not exceed `sqrt_price`.
///
/// Binary search over the forward mapping, so the result agrees with
/// `get_sqrt_ratio_at_tick` on every boundary.
pub fn get_tick_at_sqrt_ratio(sqrt_price: &SqrtPriceX96) -> Result<Tick, ClientError> {
    if *sqrt_price < min_sqrt_ratio() || *sqrt_price >= max_sqrt_ratio() {
        return Err(ClientError::OutOfRange(format!(
            "sqrt price {sqrt_price} outside the valid tick domain"
        )));
    }

    let mut low = MIN_TICK;
    let mut high = MAX_TICK;
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if get_sqrt_ratio_at_tick(mid)? <= *sqrt_price {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}
