//! Inventory price-tracking domain.
//!
//! This crate contains the business rules for items and their price history,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage): validation, the price-change contract, trend classification and
//! history aggregations.

pub mod activity;
pub mod catalog;
pub mod item;
pub mod price_history;
pub mod trend;

pub use activity::{
    ActivitySummary, ChangeView, DirectionCounts, OverallTrend, PriceStats, VolatileItem,
};
pub use catalog::{CategoryCount, UNCATEGORIZED};
pub use item::{CreateItemInput, Item, ItemPatch, ItemPatchInput, ItemSummary, NewItem};
pub use price_history::{
    NewPriceRecord, PriceDirection, PriceHistoryRecord, PriceUpdate, PriceUpdateInput,
};
pub use trend::{PriceTrend, Trend, TrendPoint};
