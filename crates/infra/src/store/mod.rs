//! Repository boundary for items and their price history.
//!
//! Services talk to storage only through these traits, so the same code runs
//! against the in-memory store (tests/dev) and Postgres (production).

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryPriceStore;
pub use postgres::PostgresPriceStore;
pub use query::{DateRange, ItemQuery, Page, Pagination};
pub use r#trait::{
    CatalogTotals, CommittedPriceChange, DeletedItem, HistoryEntry, ItemStore, PriceChange,
    PriceLedger, PriceStore, StoreError,
};
