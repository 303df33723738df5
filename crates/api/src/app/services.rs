use std::sync::Arc;

use tracing::{info, warn};

use pricetrack_infra::store::{InMemoryPriceStore, PostgresPriceStore, PriceStore, StoreError};
use pricetrack_infra::{
    AnalyticsEngine, AppConfig, Clock, ItemService, PriceUpdateCoordinator, SearchService,
    StorePolicy, SystemClock,
};

/// Every service the handlers use, sharing one store.
pub struct AppServices {
    pub items: ItemService<dyn PriceStore>,
    pub prices: PriceUpdateCoordinator<dyn PriceStore>,
    pub analytics: AnalyticsEngine<dyn PriceStore>,
    pub search: SearchService<dyn PriceStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn PriceStore>, clock: Arc<dyn Clock>, policy: StorePolicy) -> Self {
        Self {
            items: ItemService::new(Arc::clone(&store), Arc::clone(&clock), policy),
            prices: PriceUpdateCoordinator::new(Arc::clone(&store), Arc::clone(&clock), policy),
            analytics: AnalyticsEngine::new(Arc::clone(&store), clock, policy),
            search: SearchService::new(store, policy),
        }
    }

    /// Dev/test wiring on a fresh in-memory store.
    pub fn in_memory(policy: StorePolicy) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(InMemoryPriceStore::with_clock(Arc::clone(&clock)));
        Self::new(store, clock, policy)
    }
}

/// Pick the store from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise in-memory.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let Some(url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set; using in-memory store, data will not survive a restart");
        return Ok(AppServices::in_memory(config.store));
    };

    let store = PostgresPriceStore::connect(url, config.db_max_connections, config.store.timeout).await?;
    store.migrate().await?;
    info!(max_connections = config.db_max_connections, "connected to postgres");

    Ok(AppServices::new(
        Arc::new(store),
        Arc::new(SystemClock),
        config.store,
    ))
}
