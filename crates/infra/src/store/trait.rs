use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use pricetrack_core::{ExpectedVersion, ItemId, Price, PriceHistoryId, SerialNumber};
use pricetrack_inventory::{
    CategoryCount, DirectionCounts, Item, ItemPatch, NewPriceRecord, PriceHistoryRecord,
};

use super::query::{DateRange, ItemQuery, Page, Pagination};

/// Repository operation error.
///
/// These are **infrastructure errors** (storage, concurrency, availability) as
/// opposed to domain errors (validation). Services decide which ones to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("serial number already registered: {0}")]
    Duplicate(String),

    /// The item changed between read and write (version or price mismatch).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    /// Connection-level failure; the operation did not take effect.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Timeouts and connection failures. Safe to retry for idempotent operations.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Unavailable(_))
    }
}

/// A ledger record joined with its owning item's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub record: PriceHistoryRecord,
    pub item_name: Option<String>,
}

/// An item removed together with its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedItem {
    pub item: Item,
    pub history_removed: u64,
}

/// Count and mean of all current prices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CatalogTotals {
    pub total_items: u64,
    pub average_price: Decimal,
}

/// One atomic price transition: a ledger append plus the matching item update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    /// Chosen by the caller once per logical update and reused on retry, so a
    /// change that already landed is recognized instead of appended twice.
    pub id: PriceHistoryId,
    pub record: NewPriceRecord,
    /// Version of the item the record was computed from.
    pub expected_version: ExpectedVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedPriceChange {
    pub item: Item,
    pub record: PriceHistoryRecord,
    /// `true` when `id` was already in the ledger and nothing new was written.
    pub replayed: bool,
}

/// Item records and current-price state.
///
/// Serial numbers passed in are already canonical.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get_by_serial(&self, serial: &SerialNumber) -> Result<Option<Item>, StoreError>;

    async fn get_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Insert a new item. `Duplicate` if the serial is already registered.
    async fn create(&self, item: Item) -> Result<Item, StoreError>;

    /// Apply a detail patch. Never touches price or serial.
    async fn update_details(
        &self,
        serial: &SerialNumber,
        patch: &ItemPatch,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError>;

    /// Delete an item and every history record it owns, atomically.
    async fn delete(&self, serial: &SerialNumber) -> Result<DeletedItem, StoreError>;

    /// Filtered page ordered by last-updated descending.
    async fn list(&self, query: &ItemQuery, page: Pagination) -> Result<Page<Item>, StoreError>;

    /// Distinct non-null categories, ascending.
    async fn categories(&self) -> Result<Vec<String>, StoreError>;

    /// Item counts per category (nulls bucketed as uncategorized), by name.
    async fn category_counts(&self) -> Result<Vec<CategoryCount>, StoreError>;

    async fn totals(&self) -> Result<CatalogTotals, StoreError>;
}

/// Append-only price history.
#[async_trait]
pub trait PriceLedger: Send + Sync {
    /// Pure insert. The ledger stamps the record with an id and a timestamp
    /// that never goes backwards in insertion order.
    async fn append(&self, record: NewPriceRecord) -> Result<PriceHistoryRecord, StoreError>;

    /// Newest first. Empty for unknown serials.
    async fn list_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Vec<PriceHistoryRecord>, StoreError>;

    /// Newest first.
    async fn list_by_item(&self, item_id: ItemId) -> Result<Vec<PriceHistoryRecord>, StoreError>;

    /// Records for `serial` created at or after `since`, oldest first.
    async fn list_since(
        &self,
        serial: &SerialNumber,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceHistoryRecord>, StoreError>;

    /// Records inside `range` (inclusive), newest first, with item names.
    async fn list_by_date_range(
        &self,
        range: DateRange,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    /// The `limit` newest records, with item names.
    async fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Per-record direction counts for records created at or after `since`.
    async fn direction_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<DirectionCounts, StoreError>;

    /// `(serial, record count)` for the `limit` serials with the most records.
    async fn volatility(&self, limit: usize) -> Result<Vec<(SerialNumber, u64)>, StoreError>;

    async fn latest_for_item(
        &self,
        item_id: ItemId,
    ) -> Result<Option<PriceHistoryRecord>, StoreError>;
}

/// The write path that moves prices. Only the price update coordinator holds one.
#[async_trait]
pub trait PriceStore: ItemStore + PriceLedger {
    /// Append `change.record` and set the item's current price in one atomic unit.
    ///
    /// Fails with `Concurrency` if the item's version is not the expected one or
    /// its current price differs from `change.record.old_price`; nothing is
    /// written in that case.
    async fn commit_price_change(
        &self,
        change: PriceChange,
    ) -> Result<CommittedPriceChange, StoreError>;

    /// Overwrite the current price without a ledger entry. Reconciliation only.
    async fn set_current_price(
        &self,
        serial: &SerialNumber,
        price: Price,
        expected_version: ExpectedVersion,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError>;
}
