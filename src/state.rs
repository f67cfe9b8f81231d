use std::sync::Arc;
use sqlx::PgPool;

use crate::config::FetchConfig;
use crate::external::market_data::MarketDataProvider;
use crate::services::cache::MarketCache;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub provider: Arc<dyn MarketDataProvider>,
    pub cache: MarketCache,
    pub fetch: FetchConfig,
}
