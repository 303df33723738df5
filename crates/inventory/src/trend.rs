//! Trend classification over a window of price history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use pricetrack_core::Price;
use pricetrack_core::money::round2;

use crate::price_history::PriceHistoryRecord;

/// Net movement (in percent) beyond which a window counts as trending.
pub const TREND_THRESHOLD_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    /// `up` above +5%, `down` below -5%, `neutral` otherwise (bounds inclusive).
    pub fn classify(change_percent: Decimal) -> Self {
        if change_percent > TREND_THRESHOLD_PERCENT {
            Trend::Up
        } else if change_percent < -TREND_THRESHOLD_PERCENT {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

/// One step of the window, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub price: Price,
    pub change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTrend {
    pub trend: Trend,
    /// Number of history records in the window.
    pub changes: usize,
    pub total_change: Decimal,
    pub change_percent: Decimal,
    pub price_history: Vec<TrendPoint>,
}

impl PriceTrend {
    pub fn neutral() -> Self {
        Self {
            trend: Trend::Neutral,
            changes: 0,
            total_change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            price_history: Vec::new(),
        }
    }

    /// Compute the trend of a window of records.
    ///
    /// Input order does not matter; records are sorted by creation time
    /// (stable, so equal timestamps keep insertion order).
    pub fn from_history(history: &[PriceHistoryRecord]) -> Self {
        let mut window: Vec<&PriceHistoryRecord> = history.iter().collect();
        window.sort_by_key(|r| r.created_at);

        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return Self::neutral();
        };

        let first_price = first.old_price.as_decimal();
        let last_price = last.new_price.as_decimal();
        let total_change = last_price - first_price;
        let raw_percent = if first_price.is_zero() {
            Decimal::ZERO
        } else {
            total_change
                .checked_div(first_price)
                .map(|r| r * Decimal::ONE_HUNDRED)
                .unwrap_or(Decimal::ZERO)
        };

        Self {
            trend: Trend::classify(raw_percent),
            changes: window.len(),
            total_change,
            change_percent: round2(raw_percent),
            price_history: window
                .iter()
                .map(|r| TrendPoint {
                    date: r.created_at,
                    price: r.new_price,
                    change: r.change(),
                })
                .collect(),
        }
    }
}
