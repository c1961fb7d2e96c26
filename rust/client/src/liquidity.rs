use std::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::ratio::tick_at_price;
use crate::tick_math::{
    get_sqrt_ratio_at_tick, max_sqrt_ratio, min_sqrt_ratio, q96, SqrtPriceX96, Tick, MAX_TICK,
    MIN_TICK,
};

/// Snapshot of a pool as read from chain by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub sqrt_price_x96: SqrtPriceX96,
    pub tick: Tick,
    pub liquidity: u128,
    pub tick_spacing: i32,
    pub fee: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    pub tick_lower: Tick,
    pub tick_upper: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionAmounts {
    pub liquidity: u128,
    pub amount0: u128,
    pub amount1: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Closed,
    OutOfRange,
    Active,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Closed => "CLOSED",
            PositionStatus::OutOfRange => "OUT_OF_RANGE",
            PositionStatus::Active => "ACTIVE",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    #[default]
    Token0,
    Token1,
}

/// What an existing position is worth at the pool's current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSummary {
    pub status: PositionStatus,
    pub amount0: u128,
    pub amount1: u128,
}

/// Rounds `tick` to the nearest multiple of `spacing`, ties toward positive
/// infinity. A tick near the domain edge whose nearest multiple falls
/// outside the domain moves one step inward. Ticks outside
/// `[MIN_TICK, MAX_TICK]` are rejected.
pub fn align_to_spacing(tick: Tick, spacing: i32) -> Result<Tick, ClientError> {
    if spacing <= 0 {
        return Err(ClientError::InvalidSpacing(spacing));
    }
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(ClientError::OutOfRange(format!(
            "tick {tick} outside [{MIN_TICK}, {MAX_TICK}]"
        )));
    }
    let tick = i64::from(tick);
    let spacing = i64::from(spacing);
    let rounded = (2 * tick + spacing).div_euclid(2 * spacing) * spacing;
    let max_usable = i64::from(MAX_TICK).div_euclid(spacing) * spacing;
    let min_usable = -max_usable;
    let aligned = rounded.clamp(min_usable, max_usable);
    Tick::try_from(aligned)
        .map_err(|_| ClientError::OutOfRange(format!("aligned tick {aligned} exceeds i32")))
}

pub fn compute_range(
    price_lower: &str,
    price_upper: &str,
    pool: &PoolState,
) -> Result<PositionRange, ClientError> {
    let tick_lower = align_to_spacing(tick_at_price(price_lower)?, pool.tick_spacing)?;
    let tick_upper = align_to_spacing(tick_at_price(price_upper)?, pool.tick_spacing)?;
    if tick_lower >= tick_upper {
        return Err(ClientError::InvalidRange(format!(
            "aligned range [{tick_lower}, {tick_upper}) is empty"
        )));
    }
    Ok(PositionRange {
        tick_lower,
        tick_upper,
    })
}

/// Maximum liquidity a one-sided commitment buys in `range`, and the exact
/// (rounded up) token amounts minting that liquidity requires.
pub fn size_from_single_sided_amount(
    pool: &PoolState,
    range: &PositionRange,
    committed_amount: u128,
    committed: Token,
) -> Result<PositionAmounts, ClientError> {
    validate_pool(pool)?;
    validate_range(range, pool.tick_spacing)?;
    let sqrt_price = &pool.sqrt_price_x96;
    let sqrt_lower = get_sqrt_ratio_at_tick(range.tick_lower)?;
    let sqrt_upper = get_sqrt_ratio_at_tick(range.tick_upper)?;

    let liquidity = match committed {
        Token::Token0 => {
            if *sqrt_price >= sqrt_upper {
                return Err(ClientError::InvalidRange(
                    "price is above the range, token0 cannot fund it".to_string(),
                ));
            }
            let effective_lower = if *sqrt_price <= sqrt_lower {
                &sqrt_lower
            } else {
                sqrt_price
            };
            liquidity_for_amount0(effective_lower, &sqrt_upper, committed_amount)
        }
        Token::Token1 => {
            if *sqrt_price <= sqrt_lower {
                return Err(ClientError::InvalidRange(
                    "price is below the range, token1 cannot fund it".to_string(),
                ));
            }
            let effective_upper = if *sqrt_price >= sqrt_upper {
                &sqrt_upper
            } else {
                sqrt_price
            };
            liquidity_for_amount1(&sqrt_lower, effective_upper, committed_amount)
        }
    };
    let liquidity = to_u128(&liquidity, "liquidity")?;

    let (amount0, amount1) =
        compute_amounts(sqrt_price, &sqrt_lower, &sqrt_upper, liquidity, true)?;
    Ok(PositionAmounts {
        liquidity,
        amount0,
        amount1,
    })
}

pub fn classify_status(pool: &PoolState, range: &PositionRange, liquidity: u128) -> PositionStatus {
    if liquidity == 0 {
        PositionStatus::Closed
    } else if pool.tick < range.tick_lower || pool.tick >= range.tick_upper {
        PositionStatus::OutOfRange
    } else {
        PositionStatus::Active
    }
}

/// Token amounts represented by `liquidity` in `range` at the pool price.
pub fn amounts_for_liquidity(
    pool: &PoolState,
    range: &PositionRange,
    liquidity: u128,
    round_up: bool,
) -> Result<(u128, u128), ClientError> {
    validate_pool(pool)?;
    if range.tick_lower >= range.tick_upper {
        return Err(ClientError::InvalidRange(format!(
            "tick_lower {} must be below tick_upper {}",
            range.tick_lower, range.tick_upper
        )));
    }
    let sqrt_lower = get_sqrt_ratio_at_tick(range.tick_lower)?;
    let sqrt_upper = get_sqrt_ratio_at_tick(range.tick_upper)?;
    compute_amounts(
        &pool.sqrt_price_x96,
        &sqrt_lower,
        &sqrt_upper,
        liquidity,
        round_up,
    )
}

pub fn summarize_position(
    pool: &PoolState,
    range: &PositionRange,
    liquidity: u128,
) -> Result<PositionSummary, ClientError> {
    let (amount0, amount1) = amounts_for_liquidity(pool, range, liquidity, false)?;
    Ok(PositionSummary {
        status: classify_status(pool, range, liquidity),
        amount0,
        amount1,
    })
}

fn validate_pool(pool: &PoolState) -> Result<(), ClientError> {
    if pool.tick_spacing <= 0 {
        return Err(ClientError::InvalidSpacing(pool.tick_spacing));
    }
    if pool.sqrt_price_x96 < min_sqrt_ratio() || pool.sqrt_price_x96 >= max_sqrt_ratio() {
        return Err(ClientError::OutOfRange(format!(
            "pool sqrt price {} outside the valid tick domain",
            pool.sqrt_price_x96
        )));
    }
    Ok(())
}

fn validate_range(range: &PositionRange, spacing: i32) -> Result<(), ClientError> {
    if range.tick_lower >= range.tick_upper {
        return Err(ClientError::InvalidRange(format!(
            "tick_lower {} must be below tick_upper {}",
            range.tick_lower, range.tick_upper
        )));
    }
    if range.tick_lower < MIN_TICK || range.tick_upper > MAX_TICK {
        return Err(ClientError::OutOfRange(format!(
            "range [{}, {}) outside [{MIN_TICK}, {MAX_TICK}]",
            range.tick_lower, range.tick_upper
        )));
    }
    if range.tick_lower % spacing != 0 || range.tick_upper % spacing != 0 {
        return Err(ClientError::InvalidRange(format!(
            "range [{}, {}) is not aligned to spacing {spacing}",
            range.tick_lower, range.tick_upper
        )));
    }
    Ok(())
}

fn compute_amounts(
    sqrt_price: &BigUint,
    sqrt_lower: &BigUint,
    sqrt_upper: &BigUint,
    liquidity: u128,
    round_up: bool,
) -> Result<(u128, u128), ClientError> {
    if sqrt_price <= sqrt_lower {
        Ok((amount0_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?, 0))
    } else if sqrt_price < sqrt_upper {
        Ok((
            amount0_delta(sqrt_price, sqrt_upper, liquidity, round_up)?,
            amount1_delta(sqrt_lower, sqrt_price, liquidity, round_up)?,
        ))
    } else {
        Ok((0, amount1_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?))
    }
}

fn amount0_delta(
    sqrt_a: &BigUint,
    sqrt_b: &BigUint,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, ClientError> {
    let (lower, upper) = if sqrt_a < sqrt_b {
        (sqrt_a, sqrt_b)
    } else {
        (sqrt_b, sqrt_a)
    };
    if lower.is_zero() {
        return Err(ClientError::InvalidInput("sqrt ratio is zero".to_string()));
    }
    let numerator = (BigUint::from(liquidity) << 96u32) * (upper - lower);
    let amount = if round_up {
        Integer::div_ceil(&Integer::div_ceil(&numerator, upper), lower)
    } else {
        (numerator / upper) / lower
    };
    to_u128(&amount, "amount0")
}

fn amount1_delta(
    sqrt_a: &BigUint,
    sqrt_b: &BigUint,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, ClientError> {
    let (lower, upper) = if sqrt_a < sqrt_b {
        (sqrt_a, sqrt_b)
    } else {
        (sqrt_b, sqrt_a)
    };
    let product = BigUint::from(liquidity) * (upper - lower);
    let amount = if round_up {
        Integer::div_ceil(&product, &q96())
    } else {
        product >> 96u32
    };
    to_u128(&amount, "amount1")
}

// amount0 * sqrt_a * sqrt_b / (Q96 * (sqrt_b - sqrt_a)), one division.
fn liquidity_for_amount0(sqrt_a: &BigUint, sqrt_b: &BigUint, amount0: u128) -> BigUint {
    let numerator = BigUint::from(amount0) * sqrt_a * sqrt_b;
    let denominator = q96() * (sqrt_b - sqrt_a);
    numerator / denominator
}

fn liquidity_for_amount1(sqrt_a: &BigUint, sqrt_b: &BigUint, amount1: u128) -> BigUint {
    (BigUint::from(amount1) << 96u32) / (sqrt_b - sqrt_a)
}

fn to_u128(value: &BigUint, what: &str) -> Result<u128, ClientError> {
    value
        .to_u128()
        .ok_or_else(|| ClientError::AmountOverflow(format!("{what} exceeds u128")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratio::{parse_decimal_to_ratio, ratio_to_sqrt_price_x96};

    const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

    fn pool_at(price: &str, tick_spacing: i32) -> PoolState {
        let sqrt_price_x96 =
            ratio_to_sqrt_price_x96(&parse_decimal_to_ratio(price).unwrap()).unwrap();
        let tick = crate::tick_math::get_tick_at_sqrt_ratio(&sqrt_price_x96).unwrap();
        PoolState {
            sqrt_price_x96,
            tick,
            liquidity: 1_000_000,
            tick_spacing,
            fee: 3000,
        }
    }

    fn range(tick_lower: Tick, tick_upper: Tick) -> PositionRange {
        PositionRange {
            tick_lower,
            tick_upper,
        }
    }

    #[test]
    fn align_rounds_to_nearest_multiple() {
        assert_eq!(align_to_spacing(4054, 60).unwrap(), 4080);
        assert_eq!(align_to_spacing(6931, 60).unwrap(), 6960);
        assert_eq!(align_to_spacing(-6932, 60).unwrap(), -6960);
        assert_eq!(align_to_spacing(29, 60).unwrap(), 0);
        assert_eq!(align_to_spacing(-31, 60).unwrap(), -60);
    }

    #[test]
    fn align_breaks_ties_upward() {
        assert_eq!(align_to_spacing(5, 10).unwrap(), 10);
        assert_eq!(align_to_spacing(-5, 10).unwrap(), 0);
        assert_eq!(align_to_spacing(-15, 10).unwrap(), -10);
        assert_eq!(align_to_spacing(30, 60).unwrap(), 60);
    }

    #[test]
    fn align_keeps_result_inside_usable_domain() {
        assert_eq!(align_to_spacing(MIN_TICK, 60).unwrap(), -887220);
        assert_eq!(align_to_spacing(MAX_TICK, 60).unwrap(), 887220);
        assert_eq!(align_to_spacing(MIN_TICK, 1).unwrap(), MIN_TICK);
        assert_eq!(align_to_spacing(MAX_TICK, 200).unwrap(), 887200);
        assert_eq!(align_to_spacing(887_250, 100).unwrap(), 887200);
    }

    #[test]
    fn align_rejects_ticks_outside_domain() {
        for (tick, spacing) in [
            (i32::MAX, 200),
            (i32::MIN, 200),
            (-1_000_000, 10),
            (MAX_TICK + 1, 1),
            (MIN_TICK - 1, 60),
        ] {
            assert!(
                matches!(align_to_spacing(tick, spacing), Err(ClientError::OutOfRange(_))),
                "tick {tick} spacing {spacing}"
            );
        }
    }

    #[test]
    fn align_rejects_non_positive_spacing() {
        assert!(matches!(align_to_spacing(10, 0), Err(ClientError::InvalidSpacing(0))));
        assert!(matches!(align_to_spacing(10, -10), Err(ClientError::InvalidSpacing(-10))));
    }

    #[test]
    fn align_is_idempotent() {
        let ticks = [
            MIN_TICK, -100_001, -61, -30, -5, -1, 0, 1, 5, 29, 30, 99_999, MAX_TICK,
        ];
        for spacing in [1, 2, 10, 60, 200, 1000, 16_384] {
            for tick in ticks {
                let once = align_to_spacing(tick, spacing).unwrap();
                assert_eq!(
                    align_to_spacing(once, spacing).unwrap(),
                    once,
                    "tick {tick} spacing {spacing}"
                );
                assert_eq!(once % spacing, 0);
            }
        }
    }

    #[test]
    fn compute_range_aligns_both_bounds() {
        let pool = pool_at("1.5", 60);
        let aligned = compute_range("1.2", "1.8", &pool).unwrap();
        assert_eq!(aligned, range(1800, 5880));
    }

    #[test]
    fn compute_range_rejects_degenerate_or_inverted_ranges() {
        let pool = pool_at("1.5", 60);
        let err = compute_range("1.8", "1.2", &pool).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
        let err = compute_range("1.5", "1.501", &pool).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
    }

    #[test]
    fn compute_range_surfaces_codec_errors() {
        let pool = pool_at("1.5", 60);
        assert!(matches!(
            compute_range("abc", "1.8", &pool),
            Err(ClientError::InvalidInput(_))
        ));
        let mut bad_spacing = pool.clone();
        bad_spacing.tick_spacing = 0;
        assert!(matches!(
            compute_range("1.2", "1.8", &bad_spacing),
            Err(ClientError::InvalidSpacing(0))
        ));
    }

    #[test]
    fn sizes_token0_inside_range() {
        let pool = pool_at("1.5", 60);
        let amounts =
            size_from_single_sided_amount(&pool, &range(1800, 5880), ONE_TOKEN, Token::Token0)
                .unwrap();
        assert_eq!(
            amounts,
            PositionAmounts {
                liquidity: 14043142162043262539,
                amount0: ONE_TOKEN,
                amount1: 1833690465699020019,
            }
        );
    }

    #[test]
    fn sizes_token1_inside_range() {
        let pool = pool_at("1.5", 60);
        let amounts =
            size_from_single_sided_amount(&pool, &range(1800, 5880), ONE_TOKEN, Token::Token1)
                .unwrap();
        assert_eq!(
            amounts,
            PositionAmounts {
                liquidity: 7658403871718820831,
                amount0: 545348311891227843,
                amount1: ONE_TOKEN,
            }
        );
    }

    #[test]
    fn price_below_range_consumes_only_token0() {
        let pool = pool_at("1.5", 60);
        let amounts =
            size_from_single_sided_amount(&pool, &range(6960, 10980), ONE_TOKEN, Token::Token0)
                .unwrap();
        assert_eq!(amounts.liquidity, 7777969426275405953);
        assert_eq!(amounts.amount0, ONE_TOKEN);
        assert_eq!(amounts.amount1, 0);

        let err =
            size_from_single_sided_amount(&pool, &range(6960, 10980), ONE_TOKEN, Token::Token1)
                .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
    }

    #[test]
    fn price_above_range_consumes_only_token1() {
        let pool = pool_at("1.5", 60);
        let amounts =
            size_from_single_sided_amount(&pool, &range(0, 1800), ONE_TOKEN, Token::Token1)
                .unwrap();
        assert_eq!(amounts.liquidity, 10619165270279905277);
        assert_eq!(amounts.amount0, 0);
        assert_eq!(amounts.amount1, ONE_TOKEN);

        let err = size_from_single_sided_amount(&pool, &range(0, 1800), ONE_TOKEN, Token::Token0)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
    }

    #[test]
    fn inside_range_token0_only_covers_the_span_above_price() {
        let pool = pool_at("1.5", 60);
        let inside =
            size_from_single_sided_amount(&pool, &range(1800, 5880), ONE_TOKEN, Token::Token0)
                .unwrap();
        let low_pool = pool_at("1", 60);
        let below =
            size_from_single_sided_amount(&low_pool, &range(1800, 5880), ONE_TOKEN, Token::Token0)
                .unwrap();
        assert!(inside.liquidity > below.liquidity);
        assert_eq!(below.amount1, 0);
    }

    #[test]
    fn sizing_overflow_is_reported_not_wrapped() {
        let pool = pool_at("0.5", 60);
        let err = size_from_single_sided_amount(&pool, &range(0, 60), u128::MAX, Token::Token0)
            .unwrap_err();
        assert!(matches!(err, ClientError::AmountOverflow(_)));
    }

    #[test]
    fn sizing_rejects_unaligned_or_inverted_ranges() {
        let pool = pool_at("1.5", 60);
        let err = size_from_single_sided_amount(&pool, &range(1801, 5880), ONE_TOKEN, Token::Token0)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
        let err = size_from_single_sided_amount(&pool, &range(5880, 1800), ONE_TOKEN, Token::Token0)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
    }

    #[test]
    fn zero_commitment_yields_empty_position() {
        let pool = pool_at("1.5", 60);
        let amounts =
            size_from_single_sided_amount(&pool, &range(1800, 5880), 0, Token::Token0).unwrap();
        assert_eq!(
            amounts,
            PositionAmounts {
                liquidity: 0,
                amount0: 0,
                amount1: 0,
            }
        );
    }

    #[test]
    fn classify_covers_every_status() {
        let mut pool = pool_at("1", 10);
        let r = range(50, 150);
        pool.tick = 100;
        assert_eq!(classify_status(&pool, &r, 0), PositionStatus::Closed);
        assert_eq!(classify_status(&pool, &r, 500), PositionStatus::Active);
        pool.tick = 200;
        assert_eq!(classify_status(&pool, &r, 500), PositionStatus::OutOfRange);
        assert_eq!(classify_status(&pool, &r, 0), PositionStatus::Closed);
        pool.tick = 150;
        assert_eq!(classify_status(&pool, &r, 500), PositionStatus::OutOfRange);
        pool.tick = 50;
        assert_eq!(classify_status(&pool, &r, 500), PositionStatus::Active);
        pool.tick = 49;
        assert_eq!(classify_status(&pool, &r, 500), PositionStatus::OutOfRange);
    }

    #[test]
    fn summary_reports_current_amounts_rounded_down() {
        let pool = pool_at("1.5", 60);
        let liquidity = 100_000_000_000_000_000_000;
        let summary = summarize_position(&pool, &range(1800, 5880), liquidity).unwrap();
        assert_eq!(summary.status, PositionStatus::Active);
        assert_eq!(summary.amount0, 7120913456981632113);
        assert_eq!(summary.amount1, 13057551113135067548);

        let summary = summarize_position(&pool, &range(6960, 10980), liquidity).unwrap();
        assert_eq!(summary.status, PositionStatus::OutOfRange);
        assert_eq!(summary.amount0, 12856826058248786122);
        assert_eq!(summary.amount1, 0);
    }

    #[test]
    fn status_strings_match_wire_names() {
        assert_eq!(PositionStatus::Closed.to_string(), "CLOSED");
        assert_eq!(PositionStatus::OutOfRange.to_string(), "OUT_OF_RANGE");
        assert_eq!(PositionStatus::Active.to_string(), "ACTIVE");
    }
}
