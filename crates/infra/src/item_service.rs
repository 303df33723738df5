//! Item registration, detail edits, deletion and listing.
//!
//! Prices never move through here; see [`crate::coordinator`].

use std::sync::Arc;

use tracing::info;

use pricetrack_core::{DomainError, ItemId, SerialNumber};
use pricetrack_inventory::{CreateItemInput, Item, ItemPatchInput, PriceHistoryRecord};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::policy::StorePolicy;
use crate::store::{DeletedItem, ItemQuery, ItemStore, Page, Pagination, PriceLedger};

pub struct ItemService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
}

impl<S: ?Sized> Clone for ItemService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S> ItemService<S>
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

    pub async fn get_by_serial(&self, raw: &str) -> ServiceResult<Item> {
        let serial = SerialNumber::lookup(raw).ok_or_else(ServiceError::item_not_found)?;
        self.policy
            .read("get_by_serial", || self.store.get_by_serial(&serial))
            .await?
            .ok_or_else(ServiceError::item_not_found)
    }

    pub async fn get_by_id(&self, id: ItemId) -> ServiceResult<Item> {
        self.policy
            .read("get_by_id", || self.store.get_by_id(id))
            .await?
            .ok_or_else(ServiceError::item_not_found)
    }

    /// Register a new item. Its first price has no history record.
    pub async fn create(&self, input: CreateItemInput) -> ServiceResult<Item> {
        let new = input.validate()?;
        let item = Item::create(new, self.clock.now());
        let created = self
            .policy
            .bounded("create_item", self.store.create(item))
            .await?;
        info!(serial = %created.serial_number, item_id = %created.id, "item created");
        Ok(created)
    }

    pub async fn update_details(&self, raw: &str, input: ItemPatchInput) -> ServiceResult<Item> {
        let patch = input.validate()?;
        let serial = SerialNumber::lookup(raw).ok_or_else(ServiceError::item_not_found)?;
        let updated = self
            .policy
            .bounded(
                "update_details",
                self.store.update_details(&serial, &patch, self.clock.now()),
            )
            .await?;
        info!(serial = %updated.serial_number, "item details updated");
        Ok(updated)
    }

    /// Delete an item together with its whole price history.
    pub async fn delete(&self, raw: &str) -> ServiceResult<DeletedItem> {
        let serial = SerialNumber::lookup(raw).ok_or_else(ServiceError::item_not_found)?;
        let deleted = self
            .policy
            .bounded("delete_item", self.store.delete(&serial))
            .await?;
        info!(
            serial = %deleted.item.serial_number,
            history_removed = deleted.history_removed,
            "item deleted"
        );
        Ok(deleted)
    }

    pub async fn list(&self, page: Pagination) -> ServiceResult<Page<Item>> {
        let query = ItemQuery::all();
        Ok(self
            .policy
            .read("list_items", || self.store.list(&query, page))
            .await?)
    }

    pub async fn list_by_category(&self, category: &str, page: Pagination) -> ServiceResult<Page<Item>> {
        if category.trim().is_empty() {
            return Err(DomainError::field("category", "category is required").into());
        }
        let query = ItemQuery::all().category(category);
        Ok(self
            .policy
            .read("list_by_category", || self.store.list(&query, page))
            .await?)
    }

    pub async fn categories(&self) -> ServiceResult<Vec<String>> {
        Ok(self
            .policy
            .read("categories", || self.store.categories())
            .await?)
    }

    /// Price history for `raw`, newest first. Unknown serials have no history.
    pub async fn history(&self, raw: &str) -> ServiceResult<Vec<PriceHistoryRecord>> {
        let Some(serial) = SerialNumber::lookup(raw) else {
            return Ok(Vec::new());
        };
        Ok(self
            .policy
            .read("list_history", || self.store.list_by_serial(&serial))
            .await?)
    }
}
