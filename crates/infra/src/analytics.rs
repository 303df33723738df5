//! Read-only statistics over the catalog and its price history.

use std::sync::Arc;

use chrono::Duration;

use pricetrack_core::{DomainError, SerialNumber};
use pricetrack_inventory::activity::OVERALL_TREND_SAMPLE;
use pricetrack_inventory::{
    ActivitySummary, ChangeView, OverallTrend, PriceStats, PriceTrend, VolatileItem,
};

use crate::clock::Clock;
use crate::error::ServiceResult;
use crate::policy::StorePolicy;
use crate::store::{DateRange, HistoryEntry, ItemStore, PriceLedger};

pub const DEFAULT_TREND_DAYS: i64 = 30;
pub const MAX_TREND_DAYS: i64 = 3650;
pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const MAX_RECENT_LIMIT: u32 = 100;
pub const DEFAULT_VOLATILE_LIMIT: u32 = 10;
pub const MAX_VOLATILE_LIMIT: u32 = 50;

pub struct AnalyticsEngine<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
}

impl<S: ?Sized> Clone for AnalyticsEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S> AnalyticsEngine<S>
where
    S: ItemStore + PriceLedger + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: StorePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Dashboard numbers. "Today" is the current UTC calendar day.
    pub async fn price_stats(&self) -> ServiceResult<PriceStats> {
        let today = DateRange::day_of(self.clock.now());
        let totals = self.policy.read("totals", || self.store.totals()).await?;
        let counts = self
            .policy
            .read("direction_counts_since", || {
                self.store.direction_counts_since(today.start)
            })
            .await?;

        Ok(PriceStats {
            total_items: totals.total_items,
            price_updates_today: counts.total,
            average_price: totals.average_price,
            items_increased_today: counts.increases,
            items_decreased_today: counts.decreases,
        })
    }

    /// Trend of `raw` over the last `days` days.
    ///
    /// A serial with no history in the window (including one that does not
    /// exist) gets a neutral trend.
    pub async fn price_trend(&self, raw: &str, days: i64) -> ServiceResult<PriceTrend> {
        if !(1..=MAX_TREND_DAYS).contains(&days) {
            return Err(DomainError::field("days", "must be between 1 and 3650").into());
        }
        let Some(serial) = SerialNumber::lookup(raw) else {
            return Ok(PriceTrend::neutral());
        };

        let now = self.clock.now();
        let since = now - Duration::days(days);
        let mut window = self
            .policy
            .read("list_since", || self.store.list_since(&serial, since))
            .await?;
        window.retain(|r| r.created_at <= now);
        Ok(PriceTrend::from_history(&window))
    }

    /// Market-wide direction over the newest changes.
    pub async fn overall_trend(&self) -> ServiceResult<OverallTrend> {
        let recent = self
            .policy
            .read("list_recent", || self.store.list_recent(OVERALL_TREND_SAMPLE))
            .await?;
        Ok(OverallTrend::from_recent(views(recent)))
    }

    pub async fn todays_activity(&self) -> ServiceResult<ActivitySummary> {
        self.date_range_activity(DateRange::day_of(self.clock.now()))
            .await
    }

    pub async fn date_range_activity(&self, range: DateRange) -> ServiceResult<ActivitySummary> {
        let entries = self
            .policy
            .read("list_by_date_range", || {
                self.store.list_by_date_range(range, None)
            })
            .await?;
        Ok(ActivitySummary::from_changes(views(entries)))
    }

    /// Newest changes, `limit` defaulting to 10 and capped at 100.
    pub async fn recent_changes(&self, limit: Option<u32>) -> ServiceResult<Vec<ChangeView>> {
        let limit = bounded_limit(limit, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT)?;
        let entries = self
            .policy
            .read("list_recent", || self.store.list_recent(limit))
            .await?;
        Ok(views(entries))
    }

    /// Items with the most recorded price changes.
    ///
    /// Serials whose item can no longer be loaded are left out, so fewer than
    /// `limit` results may come back.
    pub async fn most_volatile_items(&self, limit: Option<u32>) -> ServiceResult<Vec<VolatileItem>> {
        let limit = bounded_limit(limit, DEFAULT_VOLATILE_LIMIT, MAX_VOLATILE_LIMIT)?;
        let ranked = self
            .policy
            .read("volatility", || self.store.volatility(limit))
            .await?;

        let mut out = Vec::with_capacity(ranked.len());
        for (serial, count) in ranked {
            let item = self
                .policy
                .read("get_by_serial", || self.store.get_by_serial(&serial))
                .await?;
            if let Some(item) = item {
                out.push(VolatileItem {
                    serial_number: item.serial_number,
                    item_name: item.item_name,
                    current_price: item.current_price,
                    price_change_count: count,
                });
            }
        }
        Ok(out)
    }
}

fn views(entries: Vec<HistoryEntry>) -> Vec<ChangeView> {
    entries
        .into_iter()
        .map(|e| ChangeView::new(&e.record, e.item_name))
        .collect()
}

fn bounded_limit(limit: Option<u32>, default: u32, max: u32) -> ServiceResult<usize> {
    match limit {
        None => Ok(default as usize),
        Some(0) => Err(DomainError::field("limit", "must be 1 or greater").into()),
        Some(n) => Ok(n.min(max) as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::coordinator::PriceUpdateCoordinator;
    use crate::error::ServiceError;
    use crate::store::InMemoryPriceStore;
    use chrono::{DateTime, TimeZone, Utc};
    use core::str::FromStr;
    use pricetrack_core::Price;
    use pricetrack_inventory::{Item, NewItem, PriceUpdateInput, Trend};
    use rust_decimal::Decimal;

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<InMemoryPriceStore>,
        coordinator: PriceUpdateCoordinator<InMemoryPriceStore>,
        analytics: AnalyticsEngine<InMemoryPriceStore>,
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(noon()));
        let store = Arc::new(InMemoryPriceStore::with_clock(clock.clone()));
        let policy = StorePolicy::default();
        Fixture {
            coordinator: PriceUpdateCoordinator::new(store.clone(), clock.clone(), policy),
            analytics: AnalyticsEngine::new(store.clone(), clock.clone(), policy),
            clock,
            store,
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    impl Fixture {
        async fn item(&self, serial: &str, price: &str) {
            self.store
                .create(Item::create(
                    NewItem {
                        serial_number: SerialNumber::parse(serial).unwrap(),
                        item_name: Some(format!("Item {serial}")),
                        category: None,
                        description: None,
                        current_price: Price::from_str(price).unwrap(),
                        image_url: None,
                    },
                    self.clock.now(),
                ))
                .await
                .unwrap();
        }

        async fn set_price(&self, serial: &str, price: &str) {
            self.coordinator
                .update_price(
                    serial,
                    PriceUpdateInput {
                        new_price: Some(dec(price)),
                        notes: None,
                    },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn trend_without_history_is_neutral() {
        let f = fixture();
        f.item("A", "10").await;

        let trend = f.analytics.price_trend("A", 30).await.unwrap();
        assert_eq!(trend, PriceTrend::neutral());
        let ghost = f.analytics.price_trend("NOBODY", 30).await.unwrap();
        assert_eq!(ghost.trend, Trend::Neutral);
    }

    #[tokio::test]
    async fn trend_over_two_raises_is_up() {
        let f = fixture();
        f.item("A", "21").await;
        f.set_price("A", "23").await;
        f.clock.advance(Duration::hours(1));
        f.set_price("A", "25").await;

        let trend = f.analytics.price_trend("A", 30).await.unwrap();
        assert_eq!(trend.trend, Trend::Up);
        assert_eq!(trend.changes, 2);
        assert_eq!(trend.total_change, dec("4"));
        assert_eq!(trend.change_percent, dec("19.05"));
        assert_eq!(trend.price_history.len(), 2);
    }

    #[tokio::test]
    async fn trend_window_excludes_old_records() {
        let f = fixture();
        f.item("A", "100").await;
        f.set_price("A", "200").await;
        f.clock.advance(Duration::days(10));
        f.set_price("A", "202").await;

        let trend = f.analytics.price_trend("A", 5).await.unwrap();
        assert_eq!(trend.changes, 1);
        assert_eq!(trend.change_percent, dec("1"));
        assert_eq!(trend.trend, Trend::Neutral);
    }

    #[tokio::test]
    async fn trend_days_out_of_range_is_rejected() {
        let f = fixture();
        for days in [0, -1, MAX_TREND_DAYS + 1] {
            let err = f.analytics.price_trend("A", days).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn stats_count_todays_records_by_direction() {
        let f = fixture();
        f.item("A", "10").await;
        f.item("B", "30").await;

        f.clock.set(noon() - Duration::days(1));
        f.set_price("A", "11").await;
        f.clock.set(noon());
        f.set_price("A", "12").await;
        f.set_price("A", "13").await;
        f.set_price("B", "20").await;

        let stats = f.analytics.price_stats().await.unwrap();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.price_updates_today, 3);
        assert_eq!(stats.items_increased_today, 2);
        assert_eq!(stats.items_decreased_today, 1);
        assert_eq!(stats.average_price, dec("16.5"));
    }

    #[tokio::test]
    async fn volatility_ranks_and_skips_deleted_items() {
        let f = fixture();
        f.item("A", "1").await;
        f.item("B", "1").await;
        for p in ["2", "3", "4", "5", "6"] {
            f.set_price("A", p).await;
        }
        for p in ["2", "3"] {
            f.set_price("B", p).await;
        }

        let ranked = f.analytics.most_volatile_items(None).await.unwrap();
        let got: Vec<_> = ranked
            .iter()
            .map(|v| (v.serial_number.as_str(), v.price_change_count))
            .collect();
        assert_eq!(got, vec![("A", 5), ("B", 2)]);
        assert_eq!(ranked[0].current_price, Price::from_str("6").unwrap());

        f.store.delete(&SerialNumber::parse("A").unwrap()).await.unwrap();
        let ranked = f.analytics.most_volatile_items(Some(1)).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].serial_number.as_str(), "B");
    }

    #[tokio::test]
    async fn recent_changes_are_newest_first_and_capped() {
        let f = fixture();
        f.item("A", "10").await;
        for p in ["11", "12", "9"] {
            f.set_price("A", p).await;
        }

        let recent = f.analytics.recent_changes(Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].new_price, Price::from_str("9").unwrap());
        assert_eq!(recent[0].item_name.as_deref(), Some("Item A"));
        assert!(f.analytics.recent_changes(Some(0)).await.is_err());
        assert_eq!(f.analytics.recent_changes(Some(1000)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn todays_activity_and_overall_trend() {
        let f = fixture();
        f.item("A", "10").await;
        f.clock.set(noon() - Duration::days(2));
        f.set_price("A", "20").await;
        f.clock.set(noon());
        f.set_price("A", "24").await;
        f.set_price("A", "18").await;

        let today = f.analytics.todays_activity().await.unwrap();
        assert_eq!(today.total_changes, 2);
        assert_eq!(today.average_increase, dec("4"));
        assert_eq!(today.average_decrease, dec("6"));

        let overall = f.analytics.overall_trend().await.unwrap();
        assert_eq!(overall.total_changes, 3);
        assert_eq!(overall.increases, 2);
        assert_eq!(overall.increase_percent, dec("66.67"));
    }

    #[tokio::test]
    async fn date_range_activity_is_inclusive() {
        let f = fixture();
        f.item("A", "10").await;
        f.set_price("A", "11").await;

        let range = DateRange::new(noon(), noon()).unwrap();
        let activity = f.analytics.date_range_activity(range).await.unwrap();
        assert_eq!(activity.total_changes, 1);
    }
}
