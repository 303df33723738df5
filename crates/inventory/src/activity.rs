//! Aggregations over ledger records: change projections, activity summaries,
//! dashboard statistics and volatility rankings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use pricetrack_core::money::{mean, ratio_percent, round2};
use pricetrack_core::{Price, PriceHistoryId, SerialNumber};

use crate::price_history::{PriceDirection, PriceHistoryRecord};

/// How many of the newest records feed the overall trend.
pub const OVERALL_TREND_SAMPLE: usize = 50;
/// How many of those are echoed back in the overall trend.
pub const OVERALL_TREND_ECHO: usize = 10;

/// A ledger record joined with its item's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeView {
    pub id: PriceHistoryId,
    pub serial_number: SerialNumber,
    pub item_name: Option<String>,
    pub old_price: Price,
    pub new_price: Price,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub direction: PriceDirection,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChangeView {
    pub fn new(record: &PriceHistoryRecord, item_name: Option<String>) -> Self {
        Self {
            id: record.id,
            serial_number: record.serial_number.clone(),
            item_name,
            old_price: record.old_price,
            new_price: record.new_price,
            change: record.change(),
            change_percent: record.change_percent(),
            direction: record.direction(),
            notes: record.notes.clone(),
            created_at: record.created_at,
        }
    }
}

/// Increase/decrease breakdown of a set of changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub total_changes: usize,
    pub increases: usize,
    pub decreases: usize,
    pub average_increase: Decimal,
    /// Reported as a positive magnitude.
    pub average_decrease: Decimal,
    pub changes: Vec<ChangeView>,
}

impl ActivitySummary {
    pub fn from_changes(changes: Vec<ChangeView>) -> Self {
        let increases: Vec<Decimal> = changes
            .iter()
            .filter(|c| c.direction == PriceDirection::Up)
            .map(|c| c.change)
            .collect();
        let decreases: Vec<Decimal> = changes
            .iter()
            .filter(|c| c.direction == PriceDirection::Down)
            .map(|c| c.change)
            .collect();

        Self {
            total_changes: changes.len(),
            increases: increases.len(),
            decreases: decreases.len(),
            average_increase: mean(increases),
            average_decrease: mean(decreases).abs(),
            changes,
        }
    }
}

/// Market-wide movement over the most recent changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallTrend {
    pub total_changes: usize,
    pub increases: usize,
    pub decreases: usize,
    pub increase_percent: Decimal,
    pub decrease_percent: Decimal,
    pub recent_changes: Vec<ChangeView>,
}

impl OverallTrend {
    /// `recent` must be newest first.
    pub fn from_recent(mut recent: Vec<ChangeView>) -> Self {
        recent.truncate(OVERALL_TREND_SAMPLE);
        let total = recent.len();
        let increases = recent
            .iter()
            .filter(|c| c.direction == PriceDirection::Up)
            .count();
        let decreases = recent
            .iter()
            .filter(|c| c.direction == PriceDirection::Down)
            .count();
        recent.truncate(OVERALL_TREND_ECHO);

        Self {
            total_changes: total,
            increases,
            decreases,
            increase_percent: ratio_percent(increases as u64, total as u64),
            decrease_percent: ratio_percent(decreases as u64, total as u64),
            recent_changes: recent,
        }
    }
}

/// Dashboard summary.
///
/// `items_increased_today` / `items_decreased_today` count *records*, not
/// distinct items: an item raised twice today counts twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStats {
    pub total_items: u64,
    pub price_updates_today: u64,
    pub average_price: Decimal,
    pub items_increased_today: u64,
    pub items_decreased_today: u64,
}

/// Per-record direction counts for a set of records.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DirectionCounts {
    pub total: u64,
    pub increases: u64,
    pub decreases: u64,
}

impl DirectionCounts {
    pub fn tally<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PriceHistoryRecord>,
    {
        records.into_iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            match r.direction() {
                PriceDirection::Up => acc.increases += 1,
                PriceDirection::Down => acc.decreases += 1,
                PriceDirection::Unchanged => {}
            }
            acc
        })
    }
}

/// An item ranked by how often its price changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatileItem {
    pub serial_number: SerialNumber,
    pub item_name: Option<String>,
    pub current_price: Price,
    pub price_change_count: u64,
}

/// Order `(serial, count)` pairs by count descending and keep `limit`.
///
/// Ties are broken by serial number so results are deterministic.
pub fn rank_by_volatility<I>(counts: I, limit: usize) -> Vec<(SerialNumber, u64)>
where
    I: IntoIterator<Item = (SerialNumber, u64)>,
{
    let mut ranked: Vec<(SerialNumber, u64)> = counts.into_iter().collect();
    ranked.sort_by(|(sa, ca), (sb, cb)| cb.cmp(ca).then_with(|| sa.cmp(sb)));
    ranked.truncate(limit);
    ranked
}

/// Count records per serial number.
pub fn count_by_serial<'a, I>(records: I) -> BTreeMap<SerialNumber, u64>
where
    I: IntoIterator<Item = &'a PriceHistoryRecord>,
{
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.serial_number.clone()).or_insert(0) += 1;
    }
    counts
}

/// Mean of current prices, two decimals, zero for an empty catalog.
pub fn average_price<I>(prices: I) -> Decimal
where
    I: IntoIterator<Item = Price>,
{
    round2(mean(prices.into_iter().map(|p| p.as_decimal())))
}
