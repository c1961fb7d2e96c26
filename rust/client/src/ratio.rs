use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::ClientError;
use crate::tick_math::{get_tick_at_sqrt_ratio, max_sqrt_ratio, min_sqrt_ratio, SqrtPriceX96, Tick};

/// A decimal price kept as an exact fraction. `1.5` is `15/10`, never reduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRatio {
    pub numerator: BigUint,
    pub denominator: BigUint,
}

impl FromStr for PriceRatio {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_decimal_to_ratio(value)
    }
}

impl fmt::Display for PriceRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

pub fn parse_decimal_to_ratio(input: &str) -> Result<PriceRatio, ClientError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidInput("price is empty".to_string()));
    }
    let mut parts = trimmed.split('.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(ClientError::InvalidInput(format!(
            "price {trimmed:?} has more than one decimal point"
        )));
    }
    if whole.is_empty() && fraction.is_empty() {
        return Err(ClientError::InvalidInput(format!("price {trimmed:?} has no digits")));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(ClientError::InvalidInput(format!("price {trimmed:?} is not numeric")));
    }

    let digits = format!("{whole}{fraction}");
    let numerator = BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| ClientError::InvalidInput(format!("price {trimmed:?} is not numeric")))?;
    let scale = u32::try_from(fraction.len())
        .map_err(|_| ClientError::InvalidInput("price has too many fraction digits".to_string()))?;
    let denominator = BigUint::from(10u32).pow(scale);
    Ok(PriceRatio {
        numerator,
        denominator,
    })
}

/// `floor(sqrt(numerator * 2^192 / denominator))`, the Q64.96 encoding of
/// `sqrt(numerator / denominator)`.
pub fn ratio_to_sqrt_price_x96(ratio: &PriceRatio) -> Result<SqrtPriceX96, ClientError> {
    if ratio.denominator.is_zero() {
        return Err(ClientError::InvalidInput("price denominator is zero".to_string()));
    }
    let ratio_x192 = (&ratio.numerator << 192u32) / &ratio.denominator;
    let sqrt_price = ratio_x192.sqrt();
    if sqrt_price < min_sqrt_ratio() || sqrt_price >= max_sqrt_ratio() {
        return Err(ClientError::OutOfRange(format!(
            "price {ratio} is outside the representable tick range"
        )));
    }
    Ok(sqrt_price)
}

/// Tick whose price is the closest one not above `price`.
pub fn tick_at_price(price: &str) -> Result<Tick, ClientError> {
    let ratio = parse_decimal_to_ratio(price)?;
    let sqrt_price = ratio_to_sqrt_price_x96(&ratio)?;
    get_tick_at_sqrt_ratio(&sqrt_price)
}
