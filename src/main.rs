use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use stockcast_backend::app;
use stockcast_backend::config::FetchConfig;
use stockcast_backend::external::market_data::MarketDataProvider;
use stockcast_backend::external::yahoo::YahooFinanceProvider;
use stockcast_backend::logging::{init_logging, LoggingConfig};
use stockcast_backend::services::cache::MarketCache;
use stockcast_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    init_logging(LoggingConfig::from_env())?;

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooFinanceProvider::new());

    let state = AppState {
        pool,
        provider,
        cache: MarketCache::new(),
        fetch: FetchConfig::from_env(),
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Stockcast backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
