//! Postgres-backed item store and price ledger.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (serialization failure, deadlock) | `40001`, `40P01` | `Concurrency` |
//! | Database (other) | Any other | `Backend` |
//! | PoolTimedOut | N/A | `Timeout` |
//! | PoolClosed, Io | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |
//!
//! ## Atomicity
//!
//! Price commits, deletes and detail updates run in a transaction that locks
//! the item row (`SELECT ... FOR UPDATE`), so two writers on the same item
//! serialize and a failure anywhere rolls the whole unit back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument};

use pricetrack_core::money::round2;
use pricetrack_core::{ExpectedVersion, ItemId, Price, PriceHistoryId, SerialNumber};
use pricetrack_inventory::{
    CategoryCount, DirectionCounts, Item, ItemPatch, NewPriceRecord, PriceHistoryRecord,
    UNCATEGORIZED,
};


use super::query::{DateRange, ItemQuery, Page, Pagination};
use super::r#trait::{
    CatalogTotals, CommittedPriceChange, DeletedItem, HistoryEntry, ItemStore, PriceChange,
    PriceLedger, PriceStore, StoreError,
};

const SCHEMA: &str = include_str!("../../migrations/0001_price_tracking.sql");

macro_rules! select_items {
    ($rest:literal) => {
        concat!(
            "SELECT id, serial_number, item_name, category, description, current_price, \
             image_url, version, created_at, updated_at FROM items ",
            $rest
        )
    };
}

macro_rules! select_history {
    ($rest:literal) => {
        concat!(
            "SELECT h.id, h.item_id, h.serial_number, h.old_price, h.new_price, h.notes, \
             h.created_at, i.item_name FROM price_history h \
             LEFT JOIN items i ON i.id = h.item_id ",
            $rest
        )
    };
}

/// Advisory lock key held while appending to the ledger.
const LEDGER_APPEND_LOCK: i64 = 0x7072_6963_6574_726b;

const INSERT_RECORD: &str = r#"
    INSERT INTO price_history (id, item_id, serial_number, old_price, new_price, notes, created_at)
    VALUES (
        $1, $2, $3, $4, $5, $6,
        GREATEST(clock_timestamp(), COALESCE((SELECT MAX(created_at) FROM price_history), clock_timestamp()))
    )
    RETURNING created_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresPriceStore {
    pool: Arc<PgPool>,
}

impl PostgresPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("price tracking schema is up to date");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn lock_by_serial(
        tx: &mut Transaction<'_, Postgres>,
        serial: &SerialNumber,
    ) -> Result<Item, StoreError> {
        let row = sqlx::query(select_items!("WHERE serial_number = $1 FOR UPDATE"))
            .bind(serial.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;
        match row {
            Some(row) => item_from_row(&row),
            None => Err(StoreError::NotFound(serial.to_string())),
        }
    }

    async fn write_price(
        tx: &mut Transaction<'_, Postgres>,
        id: ItemId,
        price: Price,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE items
            SET current_price = $2, updated_at = $3, version = version + 1
            WHERE id = $1
            RETURNING id, serial_number, item_name, category, description, current_price,
                      image_url, version, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(price.as_decimal())
        .bind(at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_price", e))?;
        item_from_row(&row)
    }

    /// Insert a ledger row stamped by the database clock.
    ///
    /// Appends are serialized on a transaction-scoped advisory lock, and
    /// `created_at` never precedes the newest record of any item, so ledger
    /// time order is insertion order across every writer.
    async fn insert_record(
        tx: &mut Transaction<'_, Postgres>,
        id: PriceHistoryId,
        record: NewPriceRecord,
    ) -> Result<PriceHistoryRecord, StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LEDGER_APPEND_LOCK)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_ledger", e))?;
        let row = sqlx::query(INSERT_RECORD)
            .bind(id.as_uuid())
            .bind(record.item_id.as_uuid())
            .bind(record.serial_number.as_str())
            .bind(record.old_price.as_decimal())
            .bind(record.new_price.as_decimal())
            .bind(record.notes.as_deref())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_price_history", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("insert_price_history", e))?;
        Ok(record.commit(id, created_at))
    }

    async fn fetch_history(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(history_from_row).collect()
    }
}

#[async_trait]
impl ItemStore for PostgresPriceStore {
    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn get_by_serial(&self, serial: &SerialNumber) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(select_items!("WHERE serial_number = $1"))
            .bind(serial.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_serial", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(select_items!("WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_id", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, item), fields(serial = %item.serial_number), err)]
    async fn create(&self, item: Item) -> Result<Item, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (
                id, serial_number, item_name, category, description,
                current_price, image_url, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.serial_number.as_str())
        .bind(item.item_name.as_deref())
        .bind(item.category.as_deref())
        .bind(item.description.as_deref())
        .bind(item.current_price.as_decimal())
        .bind(item.image_url.as_deref())
        .bind(item.version as i64)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self, patch), fields(serial = %serial), err)]
    async fn update_details(
        &self,
        serial: &SerialNumber,
        patch: &ItemPatch,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut tx = self.begin().await?;
        let mut item = Self::lock_by_serial(&mut tx, serial).await?;
        item.apply_patch(patch, at);

        sqlx::query(
            r#"
            UPDATE items
            SET item_name = $2, category = $3, description = $4, image_url = $5,
                updated_at = $6, version = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.item_name.as_deref())
        .bind(item.category.as_deref())
        .bind(item.description.as_deref())
        .bind(item.image_url.as_deref())
        .bind(item.updated_at)
        .bind(item.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_details", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(item)
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn delete(&self, serial: &SerialNumber) -> Result<DeletedItem, StoreError> {
        let mut tx = self.begin().await?;
        let item = Self::lock_by_serial(&mut tx, serial).await?;

        let history = sqlx::query("DELETE FROM price_history WHERE item_id = $1")
            .bind(item.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_history", e))?;
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(DeletedItem {
            item,
            history_removed: history.rows_affected(),
        })
    }

    #[instrument(skip(self), err)]
    async fn list(&self, query: &ItemQuery, page: Pagination) -> Result<Page<Item>, StoreError> {
        let needle = query.needle();
        let category = query.category_filter();

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM items
            WHERE ($1::text IS NULL
                   OR strpos(lower(serial_number), $1) > 0
                   OR strpos(lower(COALESCE(item_name, '')), $1) > 0)
              AND ($2::text IS NULL OR category = $2)
            "#,
        )
        .bind(needle)
        .bind(category)
        .fetch_one(&*self.pool)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("count_items", e))?;

        let rows = sqlx::query(select_items!(
            r#"
            WHERE ($1::text IS NULL
                   OR strpos(lower(serial_number), $1) > 0
                   OR strpos(lower(COALESCE(item_name, '')), $1) > 0)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY updated_at DESC, serial_number ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(needle)
        .bind(category)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let items = rows.iter().map(item_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total.max(0) as u64, page))
    }

    #[instrument(skip(self), err)]
    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT category FROM items
            WHERE category IS NOT NULL
            ORDER BY category COLLATE "C" ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("categories", e))?;
        rows.iter()
            .map(|r| r.try_get("category"))
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| map_sqlx_error("categories", e))
    }

    #[instrument(skip(self), err)]
    async fn category_counts(&self) -> Result<Vec<CategoryCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT COALESCE(category, $1) AS category, COUNT(*) AS count
            FROM items
            GROUP BY 1
            ORDER BY 1 COLLATE "C" ASC
            "#,
        )
        .bind(UNCATEGORIZED)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("category_counts", e))?;
        rows.iter()
            .map(|r| {
                Ok(CategoryCount {
                    category: r.try_get("category")?,
                    count: r.try_get::<i64, _>("count")?.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("category_counts", e))
    }

    #[instrument(skip(self), err)]
    async fn totals(&self) -> Result<CatalogTotals, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total, AVG(current_price) AS average FROM items")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("totals", e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("totals", e))?;
        let average: Option<Decimal> = row
            .try_get("average")
            .map_err(|e| map_sqlx_error("totals", e))?;
        Ok(CatalogTotals {
            total_items: total.max(0) as u64,
            average_price: average.map(round2).unwrap_or(Decimal::ZERO),
        })
    }
}

#[async_trait]
impl PriceLedger for PostgresPriceStore {
    #[instrument(skip(self, record), fields(serial = %record.serial_number), err)]
    async fn append(&self, record: NewPriceRecord) -> Result<PriceHistoryRecord, StoreError> {
        let mut tx = self.begin().await?;
        let stored = Self::insert_record(&mut tx, PriceHistoryId::new(), record).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(stored)
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn list_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Vec<PriceHistoryRecord>, StoreError> {
        let query = sqlx::query(select_history!(
            "WHERE h.serial_number = $1 ORDER BY h.created_at DESC, h.seq DESC"
        ))
        .bind(serial.as_str());
        let entries = self.fetch_history("list_by_serial", query).await?;
        Ok(entries.into_iter().map(|e| e.record).collect())
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn list_by_item(&self, item_id: ItemId) -> Result<Vec<PriceHistoryRecord>, StoreError> {
        let query = sqlx::query(select_history!(
            "WHERE h.item_id = $1 ORDER BY h.created_at DESC, h.seq DESC"
        ))
        .bind(item_id.as_uuid());
        let entries = self.fetch_history("list_by_item", query).await?;
        Ok(entries.into_iter().map(|e| e.record).collect())
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn list_since(
        &self,
        serial: &SerialNumber,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceHistoryRecord>, StoreError> {
        let query = sqlx::query(select_history!(
            "WHERE h.serial_number = $1 AND h.created_at >= $2 ORDER BY h.created_at ASC, h.seq ASC"
        ))
        .bind(serial.as_str())
        .bind(since);
        let entries = self.fetch_history("list_since", query).await?;
        Ok(entries.into_iter().map(|e| e.record).collect())
    }

    #[instrument(skip(self), err)]
    async fn list_by_date_range(
        &self,
        range: DateRange,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let query = sqlx::query(select_history!(
            "WHERE h.created_at BETWEEN $1 AND $2 ORDER BY h.created_at DESC, h.seq DESC LIMIT $3"
        ))
        .bind(range.start)
        .bind(range.end)
        .bind(limit.map(|l| l as i64));
        self.fetch_history("list_by_date_range", query).await
    }

    #[instrument(skip(self), err)]
    async fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let query = sqlx::query(select_history!(
            "ORDER BY h.created_at DESC, h.seq DESC LIMIT $1"
        ))
        .bind(limit as i64);
        self.fetch_history("list_recent", query).await
    }

    #[instrument(skip(self), err)]
    async fn direction_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<DirectionCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE new_price > old_price) AS increases,
                COUNT(*) FILTER (WHERE new_price < old_price) AS decreases
            FROM price_history
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("direction_counts_since", e))?;

        let count = |col: &str| -> Result<u64, StoreError> {
            row.try_get::<i64, _>(col)
                .map(|n| n.max(0) as u64)
                .map_err(|e| map_sqlx_error("direction_counts_since", e))
        };
        Ok(DirectionCounts {
            total: count("total")?,
            increases: count("increases")?,
            decreases: count("decreases")?,
        })
    }

    #[instrument(skip(self), err)]
    async fn volatility(&self, limit: usize) -> Result<Vec<(SerialNumber, u64)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT serial_number, COUNT(*) AS changes
            FROM price_history
            GROUP BY serial_number
            ORDER BY changes DESC, serial_number COLLATE "C" ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("volatility", e))?;

        rows.iter()
            .map(|r| {
                let serial: String = r
                    .try_get("serial_number")
                    .map_err(|e| map_sqlx_error("volatility", e))?;
                let changes: i64 = r
                    .try_get("changes")
                    .map_err(|e| map_sqlx_error("volatility", e))?;
                Ok((parse_serial(&serial)?, changes.max(0) as u64))
            })
            .collect()
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn latest_for_item(
        &self,
        item_id: ItemId,
    ) -> Result<Option<PriceHistoryRecord>, StoreError> {
        let query = sqlx::query(select_history!(
            "WHERE h.item_id = $1 ORDER BY h.created_at DESC, h.seq DESC LIMIT 1"
        ))
        .bind(item_id.as_uuid());
        let entries = self.fetch_history("latest_for_item", query).await?;
        Ok(entries.into_iter().next().map(|e| e.record))
    }
}

#[async_trait]
impl PriceStore for PostgresPriceStore {
    #[instrument(
        skip(self, change),
        fields(
            change_id = %change.id,
            serial = %change.record.serial_number,
            expected_version = ?change.expected_version
        ),
        err
    )]
    async fn commit_price_change(
        &self,
        change: PriceChange,
    ) -> Result<CommittedPriceChange, StoreError> {
        let PriceChange {
            id,
            record,
            expected_version,
        } = change;
        let mut tx = self.begin().await?;

        let item = Self::lock_by_serial(&mut tx, &record.serial_number).await?;

        let existing = sqlx::query(select_history!("WHERE h.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("find_price_change", e))?;
        if let Some(row) = existing {
            let entry = history_from_row(&row)?;
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(CommittedPriceChange {
                item,
                record: entry.record,
                replayed: true,
            });
        }

        if item.id != record.item_id {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "serial {} now belongs to a different item",
                record.serial_number
            )));
        }
        if !expected_version.matches(item.version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found version {}",
                item.version
            )));
        }
        if item.current_price != record.old_price {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "recorded old price {} does not match current price {}",
                record.old_price, item.current_price
            )));
        }

        let new_price = record.new_price;
        let stored = Self::insert_record(&mut tx, id, record).await?;
        let item = Self::write_price(&mut tx, item.id, new_price, stored.created_at).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(CommittedPriceChange {
            item,
            record: stored,
            replayed: false,
        })
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn set_current_price(
        &self,
        serial: &SerialNumber,
        price: Price,
        expected_version: ExpectedVersion,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut tx = self.begin().await?;
        let item = Self::lock_by_serial(&mut tx, serial).await?;
        if !expected_version.matches(item.version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found version {}",
                item.version
            )));
        }
        let item = Self::write_price(&mut tx, item.id, price, at).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(item)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("23503") => StoreError::NotFound(msg),
                Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("timed out acquiring a connection in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn parse_serial(raw: &str) -> Result<SerialNumber, StoreError> {
    SerialNumber::parse(raw)
        .map_err(|e| StoreError::Backend(format!("stored serial '{raw}' is invalid: {e}")))
}

fn parse_price(column: &str, raw: Decimal) -> Result<Price, StoreError> {
    Price::new(raw).map_err(|e| StoreError::Backend(format!("stored {column} {raw} is invalid: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: uuid::Uuid,
    serial_number: String,
    item_name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    current_price: Decimal,
    image_url: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            serial_number: row.try_get("serial_number")?,
            item_name: row.try_get("item_name")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            current_price: row.try_get("current_price")?,
            image_url: row.try_get("image_url")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            id: ItemId::from_uuid(row.id),
            serial_number: parse_serial(&row.serial_number)?,
            item_name: row.item_name,
            category: row.category,
            description: row.description,
            current_price: parse_price("current_price", row.current_price)?,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version.max(0) as u64,
        })
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    use sqlx::FromRow;
    ItemRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to deserialize item row: {}", e)))?
        .try_into()
}

#[derive(Debug)]
struct HistoryRow {
    id: uuid::Uuid,
    item_id: uuid::Uuid,
    serial_number: String,
    old_price: Decimal,
    new_price: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    item_name: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for HistoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            serial_number: row.try_get("serial_number")?,
            old_price: row.try_get("old_price")?,
            new_price: row.try_get("new_price")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            item_name: row.try_get("item_name")?,
        })
    }
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(HistoryEntry {
            record: PriceHistoryRecord {
                id: PriceHistoryId::from_uuid(row.id),
                item_id: ItemId::from_uuid(row.item_id),
                serial_number: parse_serial(&row.serial_number)?,
                old_price: parse_price("old_price", row.old_price)?,
                new_price: parse_price("new_price", row.new_price)?,
                notes: row.notes,
                created_at: row.created_at,
            },
            item_name: row.item_name,
        })
    }
}

fn history_from_row(row: &PgRow) -> Result<HistoryEntry, StoreError> {
    use sqlx::FromRow;
    HistoryRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to deserialize price history row: {}", e)))?
        .try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_transient() {
        assert!(map_sqlx_error("op", sqlx::Error::PoolTimedOut).is_transient());
        assert!(map_sqlx_error("op", sqlx::Error::PoolClosed).is_transient());
        assert!(!map_sqlx_error("op", sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn ledger_stamps_clamp_against_every_item() {
        assert!(INSERT_RECORD.contains("clock_timestamp()"));
        assert!(INSERT_RECORD.contains("(SELECT MAX(created_at) FROM price_history)"));
        assert!(!INSERT_RECORD.contains("WHERE item_id"));
    }

    #[test]
    fn schema_declares_cascading_history() {
        assert!(SCHEMA.contains("ON DELETE CASCADE"));
        assert!(SCHEMA.contains("NOT NULL UNIQUE"));
    }
}
