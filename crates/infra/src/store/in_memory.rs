use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pricetrack_core::{ExpectedVersion, ItemId, Price, PriceHistoryId, SerialNumber};
use pricetrack_inventory::activity::{average_price, count_by_serial, rank_by_volatility};
use pricetrack_inventory::catalog::category_counts;
use pricetrack_inventory::{
    CategoryCount, DirectionCounts, Item, ItemPatch, NewPriceRecord, PriceHistoryRecord,
};

use crate::clock::{Clock, SystemClock};

use super::query::{DateRange, ItemQuery, Page, Pagination};
use super::r#trait::{
    CatalogTotals, CommittedPriceChange, DeletedItem, HistoryEntry, ItemStore, PriceChange,
    PriceLedger, PriceStore, StoreError,
};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, Item>,
    by_serial: HashMap<SerialNumber, ItemId>,
    /// Insertion order, which is also timestamp order.
    history: Vec<PriceHistoryRecord>,
    last_stamp: Option<DateTime<Utc>>,
}

impl State {
    /// Next ledger timestamp: the clock, but never earlier than the last one issued.
    fn stamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ts = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(ts);
        ts
    }

    fn item_by_serial_mut(&mut self, serial: &SerialNumber) -> Result<&mut Item, StoreError> {
        let id = self
            .by_serial
            .get(serial)
            .copied()
            .ok_or_else(|| StoreError::NotFound(serial.to_string()))?;
        self.items
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("serial index points at missing item {id}")))
    }

    fn entry(&self, record: &PriceHistoryRecord) -> HistoryEntry {
        HistoryEntry {
            record: record.clone(),
            item_name: self
                .items
                .get(&record.item_id)
                .and_then(|i| i.item_name.clone()),
        }
    }
}

/// In-memory item store and price ledger.
///
/// Intended for tests/dev. All state sits behind one lock, so every operation
/// (including a price commit) is atomic with respect to every other.
#[derive(Debug)]
pub struct InMemoryPriceStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
    fail_next_commit: AtomicBool,
    stall_next_reply: Mutex<Option<Duration>>,
}

impl Default for InMemoryPriceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
            fail_next_commit: AtomicBool::new(false),
            stall_next_reply: Mutex::new(None),
        }
    }

    /// Make the next `commit_price_change` fail after its ledger write, as a
    /// dropped connection would. The partial write is rolled back.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Apply the next `commit_price_change` at once but hold its reply back for
    /// `delay`, as a slow network would. The caller may time out on a write
    /// that has already landed.
    pub fn stall_next_commit_reply(&self, delay: Duration) {
        if let Ok(mut stall) = self.stall_next_reply.lock() {
            *stall = Some(delay);
        }
    }

    fn take_reply_stall(&self) -> Option<Duration> {
        self.stall_next_reply.lock().ok().and_then(|mut s| s.take())
    }

    /// Ledger write and price move under one write lock.
    fn apply_price_change(&self, change: PriceChange) -> Result<CommittedPriceChange, StoreError> {
        let mut state = self.write()?;
        let PriceChange {
            id,
            record,
            expected_version,
        } = change;

        if let Some(existing) = state.history.iter().find(|r| r.id == id).cloned() {
            let item = state
                .items
                .get(&existing.item_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(existing.serial_number.to_string()))?;
            return Ok(CommittedPriceChange {
                item,
                record: existing,
                replayed: true,
            });
        }

        let item = state
            .items
            .get(&record.item_id)
            .ok_or_else(|| StoreError::NotFound(record.serial_number.to_string()))?;
        if !expected_version.matches(item.version) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found version {}",
                item.version
            )));
        }
        if item.current_price != record.old_price {
            return Err(StoreError::Concurrency(format!(
                "recorded old price {} does not match current price {}",
                record.old_price, item.current_price
            )));
        }

        let ts = state.stamp(self.clock.now());
        let new_price = record.new_price;
        let stored = record.commit(id, ts);
        state.history.push(stored.clone());

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            state.history.pop();
            return Err(StoreError::Unavailable(
                "connection lost during price commit".to_string(),
            ));
        }

        let item = state
            .items
            .get_mut(&stored.item_id)
            .ok_or_else(|| StoreError::NotFound(stored.serial_number.to_string()))?;
        item.apply_price(new_price, ts);
        Ok(CommittedPriceChange {
            item: item.clone(),
            record: stored,
            replayed: false,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl ItemStore for InMemoryPriceStore {
    async fn get_by_serial(&self, serial: &SerialNumber) -> Result<Option<Item>, StoreError> {
        let state = self.read()?;
        Ok(state
            .by_serial
            .get(serial)
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    async fn get_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn create(&self, item: Item) -> Result<Item, StoreError> {
        let mut state = self.write()?;
        if state.by_serial.contains_key(&item.serial_number) {
            return Err(StoreError::Duplicate(item.serial_number.to_string()));
        }
        state.by_serial.insert(item.serial_number.clone(), item.id);
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_details(
        &self,
        serial: &SerialNumber,
        patch: &ItemPatch,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut state = self.write()?;
        let item = state.item_by_serial_mut(serial)?;
        item.apply_patch(patch, at);
        Ok(item.clone())
    }

    async fn delete(&self, serial: &SerialNumber) -> Result<DeletedItem, StoreError> {
        let mut state = self.write()?;
        let id = state
            .by_serial
            .remove(serial)
            .ok_or_else(|| StoreError::NotFound(serial.to_string()))?;
        let item = state
            .items
            .remove(&id)
            .ok_or_else(|| StoreError::Backend(format!("serial index points at missing item {id}")))?;
        let before = state.history.len();
        state.history.retain(|r| r.item_id != id);
        let history_removed = (before - state.history.len()) as u64;
        Ok(DeletedItem {
            item,
            history_removed,
        })
    }

    async fn list(&self, query: &ItemQuery, page: Pagination) -> Result<Page<Item>, StoreError> {
        let state = self.read()?;
        let mut matching: Vec<&Item> = state.items.values().filter(|i| query.matches(i)).collect();
        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.serial_number.cmp(&b.serial_number))
        });
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let state = self.read()?;
        let distinct: BTreeSet<&String> = state
            .items
            .values()
            .filter_map(|i| i.category.as_ref())
            .collect();
        Ok(distinct.into_iter().cloned().collect())
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>, StoreError> {
        let state = self.read()?;
        Ok(category_counts(
            state.items.values().map(|i| i.category.as_deref()),
        ))
    }

    async fn totals(&self) -> Result<CatalogTotals, StoreError> {
        let state = self.read()?;
        Ok(CatalogTotals {
            total_items: state.items.len() as u64,
            average_price: average_price(state.items.values().map(|i| i.current_price)),
        })
    }
}

#[async_trait]
impl PriceLedger for InMemoryPriceStore {
    async fn append(&self, record: NewPriceRecord) -> Result<PriceHistoryRecord, StoreError> {
        let mut state = self.write()?;
        if !state.items.contains_key(&record.item_id) {
            return Err(StoreError::NotFound(record.serial_number.to_string()));
        }
        let ts = state.stamp(self.clock.now());
        let stored = record.commit(PriceHistoryId::new(), ts);
        state.history.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Vec<PriceHistoryRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|r| &r.serial_number == serial)
            .cloned()
            .collect())
    }

    async fn list_by_item(&self, item_id: ItemId) -> Result<Vec<PriceHistoryRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn list_since(
        &self,
        serial: &SerialNumber,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceHistoryRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .history
            .iter()
            .filter(|r| &r.serial_number == serial && r.created_at >= since)
            .cloned()
            .collect())
    }

    async fn list_by_date_range(
        &self,
        range: DateRange,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let state = self.read()?;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|r| range.contains(r.created_at))
            .take(limit.unwrap_or(usize::MAX))
            .map(|r| state.entry(r))
            .collect())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let state = self.read()?;
        Ok(state
            .history
            .iter()
            .rev()
            .take(limit)
            .map(|r| state.entry(r))
            .collect())
    }

    async fn direction_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<DirectionCounts, StoreError> {
        let state = self.read()?;
        Ok(DirectionCounts::tally(
            state.history.iter().filter(|r| r.created_at >= since),
        ))
    }

    async fn volatility(&self, limit: usize) -> Result<Vec<(SerialNumber, u64)>, StoreError> {
        let state = self.read()?;
        Ok(rank_by_volatility(count_by_serial(&state.history), limit))
    }

    async fn latest_for_item(
        &self,
        item_id: ItemId,
    ) -> Result<Option<PriceHistoryRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .history
            .iter()
            .rev()
            .find(|r| r.item_id == item_id)
            .cloned())
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn commit_price_change(
        &self,
        change: PriceChange,
    ) -> Result<CommittedPriceChange, StoreError> {
        let committed = self.apply_price_change(change)?;
        if let Some(delay) = self.take_reply_stall() {
            tokio::time::sleep(delay).await;
        }
        Ok(committed)
    }

    async fn set_current_price(
        &self,
        serial: &SerialNumber,
        price: Price,
        expected_version: ExpectedVersion,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut state = self.write()?;
        let item = state.item_by_serial_mut(serial)?;
        if !expected_version.matches(item.version) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found version {}",
                item.version
            )));
        }
        item.apply_price(price, at);
        Ok(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use core::str::FromStr;
    use pricetrack_inventory::NewItem;
    use proptest::prelude::*;

    fn serial(s: &str) -> SerialNumber {
        SerialNumber::parse(s).unwrap()
    }

    fn price(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    fn item(s: &str, p: &str, at: DateTime<Utc>) -> Item {
        Item::create(
            NewItem {
                serial_number: serial(s),
                item_name: Some(format!("Item {s}")),
                category: None,
                description: None,
                current_price: price(p),
                image_url: None,
            },
            at,
        )
    }

    fn change(item: &Item, to: &str) -> PriceChange {
        PriceChange {
            id: PriceHistoryId::new(),
            record: item.price_change(price(to), None),
            expected_version: ExpectedVersion::of(item),
        }
    }

    #[tokio::test]
    async fn duplicate_serial_is_rejected_case_insensitively() {
        let store = InMemoryPriceStore::new();
        store.create(item("SN-1", "10", Utc::now())).await.unwrap();

        let err = store.create(item("sn-1", "99", Utc::now())).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let kept = store.get_by_serial(&serial("SN-1")).await.unwrap().unwrap();
        assert_eq!(kept.current_price, price("10"));
    }

    #[tokio::test]
    async fn commit_appends_and_moves_price_together() {
        let store = InMemoryPriceStore::new();
        let created = store.create(item("A", "21", Utc::now())).await.unwrap();

        let committed = store.commit_price_change(change(&created, "23")).await.unwrap();
        assert!(!committed.replayed);
        assert_eq!(committed.item.current_price, price("23"));
        assert_eq!(committed.record.old_price, price("21"));
        assert_eq!(committed.item.version, created.version + 1);

        let history = store.list_by_serial(&serial("A")).await.unwrap();
        assert_eq!(history, vec![committed.record]);
    }

    #[tokio::test]
    async fn stale_version_commits_nothing() {
        let store = InMemoryPriceStore::new();
        let created = store.create(item("A", "10", Utc::now())).await.unwrap();
        store.commit_price_change(change(&created, "11")).await.unwrap();

        let err = store.commit_price_change(change(&created, "12")).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        assert_eq!(store.list_by_serial(&serial("A")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_rolls_back_the_ledger_write() {
        let store = InMemoryPriceStore::new();
        let created = store.create(item("A", "10", Utc::now())).await.unwrap();

        store.fail_next_commit();
        let err = store.commit_price_change(change(&created, "11")).await.unwrap_err();
        assert!(err.is_transient());

        let after = store.get_by_serial(&serial("A")).await.unwrap().unwrap();
        assert_eq!(after, created);
        assert!(store.list_by_serial(&serial("A")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replaying_a_committed_change_is_a_no_op() {
        let store = InMemoryPriceStore::new();
        let created = store.create(item("A", "10", Utc::now())).await.unwrap();
        let c = change(&created, "11");

        let first = store.commit_price_change(c.clone()).await.unwrap();
        let second = store.commit_price_change(c).await.unwrap();

        assert!(second.replayed);
        assert_eq!(second.record, first.record);
        assert_eq!(store.list_by_serial(&serial("A")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ledger_timestamps_never_go_backwards() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = InMemoryPriceStore::with_clock(clock.clone());
        let created = store.create(item("A", "10", start)).await.unwrap();

        let first = store.commit_price_change(change(&created, "11")).await.unwrap();
        clock.set(start - Duration::hours(1));
        let second = store.commit_price_change(change(&first.item, "12")).await.unwrap();

        assert!(second.record.created_at >= first.record.created_at);
        let newest = store.list_by_serial(&serial("A")).await.unwrap();
        assert_eq!(newest[0].id, second.record.id);
    }

    #[tokio::test]
    async fn ledger_order_spans_items() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = InMemoryPriceStore::with_clock(clock.clone());
        let a = store.create(item("A", "10", start)).await.unwrap();
        let b = store.create(item("B", "20", start)).await.unwrap();

        let on_a = store.commit_price_change(change(&a, "11")).await.unwrap();
        clock.set(start - Duration::minutes(30));
        let on_b = store.commit_price_change(change(&b, "21")).await.unwrap();

        assert!(on_b.record.created_at >= on_a.record.created_at);
        let recent = store.list_recent(10).await.unwrap();
        assert_eq!(recent[0].record.id, on_b.record.id);
        assert_eq!(recent[1].record.id, on_a.record.id);
    }

    #[tokio::test]
    async fn delete_cascades_to_history() {
        let store = InMemoryPriceStore::new();
        let created = store.create(item("A", "10", Utc::now())).await.unwrap();
        let other = store.create(item("B", "10", Utc::now())).await.unwrap();
        let c = store.commit_price_change(change(&created, "11")).await.unwrap();
        store.commit_price_change(change(&c.item, "12")).await.unwrap();
        store.commit_price_change(change(&other, "9")).await.unwrap();

        let deleted = store.delete(&serial("A")).await.unwrap();
        assert_eq!(deleted.history_removed, 2);
        assert!(store.list_by_serial(&serial("A")).await.unwrap().is_empty());
        assert_eq!(store.list_recent(10).await.unwrap().len(), 1);
        assert!(matches!(
            store.delete(&serial("A")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_orders_by_last_update_and_paginates() {
        let start = Utc::now();
        let store = InMemoryPriceStore::new();
        for (i, s) in ["SN001", "SN002", "OTHER"].iter().enumerate() {
            store
                .create(item(s, "10", start + Duration::seconds(i as i64)))
                .await
                .unwrap();
        }

        let page = store
            .list(&ItemQuery::all(), Pagination::new(Some(1), Some(2)).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let serials: Vec<_> = page.items.iter().map(|i| i.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["OTHER", "SN002"]);

        let found = store
            .list(&ItemQuery::all().text("sn0"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.total, 2);
    }

    #[tokio::test]
    async fn append_requires_an_existing_item() {
        let store = InMemoryPriceStore::new();
        let ghost = item("GHOST", "10", Utc::now());
        let err = store.append(ghost.price_change(price("11"), None)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    proptest! {
        #[test]
        fn current_price_always_matches_latest_record(cents in prop::collection::vec(1i64..100_000, 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryPriceStore::new();
                let mut current = store.create(item("P", "5", Utc::now())).await.unwrap();
                for c in cents {
                    let to = Price::from_cents(c).unwrap();
                    let committed = store
                        .commit_price_change(PriceChange {
                            id: PriceHistoryId::new(),
                            record: current.price_change(to, None),
                            expected_version: ExpectedVersion::of(&current),
                        })
                        .await
                        .unwrap();
                    current = committed.item;

                    let latest = store.latest_for_item(current.id).await.unwrap().unwrap();
                    assert_eq!(latest.new_price, current.current_price);
                }

                let history = store.list_by_item(current.id).await.unwrap();
                for pair in history.windows(2) {
                    assert_eq!(pair[0].old_price, pair[1].new_price);
                }
            });
        }
    }
}
