//! Fixed-point price arithmetic.
//!
//! Prices are `rust_decimal::Decimal` with two fractional digits. Every ratio
//! computed from prices goes through [`percent_change`] or [`ratio_percent`],
//! which return zero instead of dividing by zero.

use core::fmt;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits carried by a price.
pub const PRICE_SCALE: u32 = 2;

/// A strictly positive price, at most `999999.99`, with two decimal places.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Upper bound accepted for any price.
    pub const MAX: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, PRICE_SCALE);

    pub fn new(value: Decimal) -> DomainResult<Self> {
        let normalized = value.normalize();
        if normalized <= Decimal::ZERO {
            return Err(DomainError::field("price", "must be greater than 0"));
        }
        if normalized > Self::MAX {
            return Err(DomainError::field("price", "cannot exceed 999999.99"));
        }
        if normalized.scale() > PRICE_SCALE {
            return Err(DomainError::field(
                "price",
                "must have at most 2 decimal places",
            ));
        }
        let mut scaled = normalized;
        scaled.rescale(PRICE_SCALE);
        Ok(Self(scaled))
    }

    /// Build a price from an integer number of cents.
    pub fn from_cents(cents: i64) -> DomainResult<Self> {
        Self::new(Decimal::new(cents, PRICE_SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::field("price", format!("not a decimal number: {e}")))?;
        Self::new(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Round to two decimal places, midpoint away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `(to - from) / from * 100`, rounded to two decimals. Zero when `from` is zero.
pub fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    match (to - from).checked_div(from) {
        Some(ratio) => round2(ratio * Decimal::ONE_HUNDRED),
        None => Decimal::ZERO,
    }
}

/// `part / whole * 100`, rounded to two decimals. Zero when `whole` is zero.
pub fn ratio_percent(part: u64, whole: u64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    round2(Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole))
}

/// Arithmetic mean rounded to two decimals. Zero for an empty input.
pub fn mean<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let (sum, count) = values
        .into_iter()
        .fold((Decimal::ZERO, 0u64), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return Decimal::ZERO;
    }
    round2(sum / Decimal::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn price_accepts_two_decimals_and_rescales() {
        let p = Price::new(dec("19.5")).unwrap();
        assert_eq!(p.to_string(), "19.50");
        assert_eq!(Price::new(dec("10.500")).unwrap().to_string(), "10.50");
    }

    #[test]
    fn price_rejects_zero_negative_and_too_large() {
        assert!(Price::new(Decimal::ZERO).is_err());
        assert!(Price::new(dec("-1")).is_err());
        assert!(Price::new(dec("1000000.00")).is_err());
        assert!(Price::new(dec("999999.99")).is_ok());
    }

    #[test]
    fn price_rejects_sub_cent_precision() {
        let err = Price::new(dec("1.005")).unwrap_err();
        assert_eq!(err.details()[0].field, "price");
    }

    #[test]
    fn price_deserializes_from_json_number_and_string() {
        let a: Price = serde_json::from_str("21.5").unwrap();
        let b: Price = serde_json::from_str("\"21.50\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Price>("0").is_err());
    }

    #[test]
    fn percent_change_matches_reference_trend() {
        assert_eq!(percent_change(dec("21"), dec("25")), dec("19.05"));
        assert_eq!(percent_change(dec("25"), dec("21")), dec("-16.00"));
    }

    #[test]
    fn percent_change_guards_zero_base() {
        assert_eq!(percent_change(Decimal::ZERO, dec("10")), Decimal::ZERO);
    }

    #[test]
    fn ratio_and_mean_guard_empty_inputs() {
        assert_eq!(ratio_percent(3, 0), Decimal::ZERO);
        assert_eq!(ratio_percent(1, 3), dec("33.33"));
        assert_eq!(mean(Vec::<Decimal>::new()), Decimal::ZERO);
        assert_eq!(mean(vec![dec("10"), dec("20"), dec("25.01")]), dec("18.34"));
    }

    #[test]
    fn max_constant_is_six_nines() {
        assert_eq!(Price::MAX, dec("999999.99"));
    }
}
