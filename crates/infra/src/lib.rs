//! Infrastructure layer: storage, configuration and the services that sit on
//! top of the item store and price ledger.

pub mod analytics;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod item_service;
pub mod policy;
pub mod search;
pub mod store;

pub use analytics::AnalyticsEngine;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use coordinator::{PriceUpdateCoordinator, PriceUpdated, ReconcileOutcome};
pub use error::{ServiceError, ServiceResult};
pub use item_service::ItemService;
pub use policy::StorePolicy;
pub use search::SearchService;
