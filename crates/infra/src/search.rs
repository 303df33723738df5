//! Text search, autocomplete and category aggregation over items.

use std::sync::Arc;

use pricetrack_core::{DomainError, FieldViolation};
use pricetrack_inventory::item::CATEGORY_MAX_LEN;
use pricetrack_inventory::{CategoryCount, Item, ItemSummary};

use crate::error::ServiceResult;
use crate::policy::StorePolicy;
use crate::store::{ItemQuery, ItemStore, Page, Pagination};

pub const QUERY_MAX_LEN: usize = 50;
pub const SUGGESTION_LIMIT: u32 = 10;

pub struct SearchService<S: ?Sized> {
    store: Arc<S>,
    policy: StorePolicy,
}

impl<S: ?Sized> Clone for SearchService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S> SearchService<S>
where
    S: ItemStore + ?Sized,
{
    pub fn new(store: Arc<S>, policy: StorePolicy) -> Self {
        Self { store, policy }
    }

    /// Case-insensitive substring match on serial or name, optionally within
    /// one category, newest update first.
    pub async fn search(
        &self,
        q: &str,
        category: Option<&str>,
        page: Pagination,
    ) -> ServiceResult<Page<Item>> {
        let mut violations = Vec::new();
        let q = q.trim();
        if q.is_empty() {
            violations.push(FieldViolation::new("q", "query is required"));
        } else if q.chars().count() > QUERY_MAX_LEN {
            violations.push(FieldViolation::new("q", "query must be 50 characters or less"));
        }
        if category.is_some_and(|c| c.trim().chars().count() > CATEGORY_MAX_LEN) {
            violations.push(FieldViolation::new(
                "category",
                "category must be 50 characters or less",
            ));
        }
        DomainError::check_fields(violations)?;

        let mut query = ItemQuery::all().text(q);
        if let Some(c) = category {
            query = query.category(c);
        }
        Ok(self
            .policy
            .read("search_items", || self.store.list(&query, page))
            .await?)
    }

    /// Up to ten matches for autocomplete. A blank query yields nothing.
    pub async fn suggestions(&self, q: &str) -> ServiceResult<Vec<ItemSummary>> {
        let q = q.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }
        let query = ItemQuery::all().text(q.chars().take(QUERY_MAX_LEN).collect::<String>());
        let page = Pagination {
            page: 1,
            limit: SUGGESTION_LIMIT,
        };
        let found = self
            .policy
            .read("suggestions", || self.store.list(&query, page))
            .await?;
        Ok(found.items.iter().map(ItemSummary::from).collect())
    }

    /// Item count per category, with uncategorized items bucketed together.
    pub async fn category_counts(&self) -> ServiceResult<Vec<CategoryCount>> {
        Ok(self
            .policy
            .read("category_counts", || self.store.category_counts())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::store::InMemoryPriceStore;
    use chrono::{Duration, Utc};
    use core::str::FromStr;
    use pricetrack_core::{Price, SerialNumber};
    use pricetrack_inventory::{NewItem, UNCATEGORIZED};

    async fn seeded() -> SearchService<InMemoryPriceStore> {
        let store = Arc::new(InMemoryPriceStore::new());
        let start = Utc::now();
        let rows = [
            ("SN001", "Laptop", Some("Electronics")),
            ("SN002", "Phone", Some("Electronics")),
            ("OTHER", "sn0 lookalike", None),
            ("ZZZ", "Chair", Some("Furniture")),
        ];
        for (i, (serial, name, category)) in rows.into_iter().enumerate() {
            store
                .create(Item::create(
                    NewItem {
                        serial_number: SerialNumber::parse(serial).unwrap(),
                        item_name: Some(name.to_string()),
                        category: category.map(str::to_string),
                        description: None,
                        current_price: Price::from_str("10").unwrap(),
                        image_url: None,
                    },
                    start + Duration::seconds(i as i64),
                ))
                .await
                .unwrap();
        }
        SearchService::new(store, StorePolicy::default())
    }

    fn serials(page: &Page<Item>) -> Vec<&str> {
        page.items.iter().map(|i| i.serial_number.as_str()).collect()
    }

    #[tokio::test]
    async fn matches_serial_or_name_case_insensitively() {
        let svc = seeded().await;
        let page = svc.search("sn0", None, Pagination::default()).await.unwrap();
        assert_eq!(serials(&page), vec!["OTHER", "SN002", "SN001"]);

        let page = svc.search("LAPTOP", None, Pagination::default()).await.unwrap();
        assert_eq!(serials(&page), vec!["SN001"]);
    }

    #[tokio::test]
    async fn category_filter_is_exact() {
        let svc = seeded().await;
        let page = svc
            .search("sn0", Some("Electronics"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(serials(&page), vec!["SN002", "SN001"]);

        let none = svc
            .search("sn0", Some("electronics"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn query_length_is_validated() {
        let svc = seeded().await;
        assert!(matches!(
            svc.search("   ", None, Pagination::default()).await,
            Err(ServiceError::Validation { .. })
        ));
        let long = "x".repeat(QUERY_MAX_LEN + 1);
        assert!(matches!(
            svc.search(&long, None, Pagination::default()).await,
            Err(ServiceError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn suggestions_are_capped_projections() {
        let svc = seeded().await;
        assert!(svc.suggestions("").await.unwrap().is_empty());

        let hits = svc.suggestions("phone").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].serial_number.as_str(), "SN002");
        assert_eq!(hits[0].item_name.as_deref(), Some("Phone"));
    }

    #[tokio::test]
    async fn category_counts_bucket_nulls() {
        let counts = seeded().await.category_counts().await.unwrap();
        let got: Vec<_> = counts.iter().map(|c| (c.category.as_str(), c.count)).collect();
        assert_eq!(
            got,
            vec![("Electronics", 2), ("Furniture", 1), (UNCATEGORIZED, 1)]
        );
    }
}
