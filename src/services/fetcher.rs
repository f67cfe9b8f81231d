use std::collections::HashMap;

use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::FetchConfig;
use crate::db;
use crate::external::market_data::{CompanyProfile, DailyBar, MarketDataProvider};
use crate::models::StockInfo;
use crate::services::cache::MarketCache;

/// Price history cache lifetime.
pub const HISTORY_CACHE_TTL_SECS: u64 = 3600;
/// Company info cache lifetime. Info changes far less often than prices.
pub const INFO_CACHE_TTL_SECS: u64 = 21600;

/// A successful fetch: the price history and the company profile obtained in
/// the same round trip. Cached as a single unit.
#[derive(Debug, Clone)]
pub struct FetchedHistory {
    pub bars: Vec<DailyBar>,
    pub profile: CompanyProfile,
}

fn history_cache_key(ticker: &str, period: &str) -> String {
    format!("stock_data_{}_{}", ticker, period)
}

fn info_cache_key(ticker: &str) -> String {
    format!("stock_info_{}", ticker)
}

/// Delay in seconds before the retry that follows attempt `attempt`
/// (0-indexed): exponential with uniform jitter in [0, 1).
pub fn backoff_delay(attempt: u32, base_delay: f64) -> f64 {
    2f64.powi(attempt as i32) * base_delay + rand::random::<f64>()
}

/// Fetches daily history plus company info for a ticker, with a capped
/// exponential-backoff retry loop around the provider call.
///
/// Only rate-limit failures are retried; every other failure, an empty
/// result set, or retry exhaustion ends the call with `None`. Errors never
/// cross this boundary.
pub async fn fetch_with_backoff(
    provider: &dyn MarketDataProvider,
    cache: &MarketCache,
    ticker: &str,
    period: &str,
    max_retries: u32,
    base_delay: f64,
) -> Option<FetchedHistory> {
    let cache_key = history_cache_key(ticker, period);

    if let Some(cached) = cache.history.get(&cache_key) {
        info!("Using cached data for {}", ticker);
        return Some(cached);
    }

    for attempt in 0..max_retries {
        match provider.get_history(ticker, period).await {
            Ok(bars) if bars.is_empty() => {
                warn!(
                    "{}: No price data found, symbol may be delisted (period={})",
                    ticker, period
                );
                return None;
            }
            Ok(bars) => {
                // Best-effort: a failed info call does not fail the fetch.
                let profile = match provider.get_company_info(ticker).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!("Error fetching info for {}: {}", ticker, e);
                        CompanyProfile {
                            short_name: Some(ticker.to_string()),
                            ..Default::default()
                        }
                    }
                };

                let fetched = FetchedHistory { bars, profile };
                cache
                    .history
                    .set(&cache_key, fetched.clone(), HISTORY_CACHE_TTL_SECS);

                return Some(fetched);
            }
            Err(e) if e.is_rate_limit() => {
                if attempt + 1 < max_retries {
                    let delay = backoff_delay(attempt, base_delay);
                    warn!(
                        "Rate limited for {}. Retrying in {:.2} seconds... (Attempt {}/{})",
                        ticker,
                        delay,
                        attempt + 1,
                        max_retries
                    );
                    sleep(Duration::from_secs_f64(delay)).await;
                } else {
                    warn!("Maximum retries reached for {}", ticker);
                    return None;
                }
            }
            Err(e) => {
                error!("Failed to get ticker '{}' reason: {}", ticker, e);
                return None;
            }
        }
    }

    None
}

/// Fetches history and persists it: refreshes the stock's display name and
/// upserts every bar keyed by (ticker, date). Re-fetching an overlapping
/// window merges idempotently; the later fetch wins per day.
///
/// Persistence failures are logged and collapse to `None` like fetch
/// failures do.
pub async fn fetch_and_persist(
    pool: &PgPool,
    provider: &dyn MarketDataProvider,
    cache: &MarketCache,
    config: &FetchConfig,
    ticker: &str,
    period: &str,
) -> Option<Vec<DailyBar>> {
    let fetched = fetch_with_backoff(
        provider,
        cache,
        ticker,
        period,
        config.max_retries,
        config.base_delay,
    )
    .await?;

    let name = fetched.profile.display_name(ticker);

    if let Err(e) = db::stock_queries::upsert(pool, ticker, &name).await {
        error!("Error processing data for {}: {}", ticker, e);
        return None;
    }

    if let Err(e) = db::price_queries::upsert_bars(pool, ticker, &fetched.bars).await {
        error!("Error processing data for {}: {}", ticker, e);
        return None;
    }

    Some(fetched.bars)
}

/// Normalized company info for a ticker. Cached independently of price
/// history with a longer TTL; never fails: a fetch failure yields the
/// "N/A"-filled sentinel record (which is not cached).
pub async fn get_info(
    provider: &dyn MarketDataProvider,
    cache: &MarketCache,
    config: &FetchConfig,
    ticker: &str,
) -> StockInfo {
    let cache_key = info_cache_key(ticker);

    if let Some(cached) = cache.info.get(&cache_key) {
        return cached;
    }

    match fetch_with_backoff(
        provider,
        cache,
        ticker,
        "1d",
        config.max_retries,
        config.base_delay,
    )
    .await
    {
        Some(fetched) => {
            let info = StockInfo::from_profile(ticker, &fetched.profile);
            cache.info.set(&cache_key, info.clone(), INFO_CACHE_TTL_SECS);
            info
        }
        None => StockInfo::unavailable(ticker),
    }
}

/// Sequential fetch-and-persist over a list of tickers with a fixed pause
/// between successive provider calls (none after the last). Outcomes are
/// independent; one ticker failing does not stop the rest.
pub async fn fetch_many(
    pool: &PgPool,
    provider: &dyn MarketDataProvider,
    cache: &MarketCache,
    config: &FetchConfig,
    tickers: &[String],
    period: &str,
    delay_between_calls: f64,
) -> HashMap<String, Option<Vec<DailyBar>>> {
    let mut results = HashMap::new();

    for (i, ticker) in tickers.iter().enumerate() {
        let bars = fetch_and_persist(pool, provider, cache, config, ticker, period).await;
        results.insert(ticker.clone(), bars);

        if i + 1 < tickers.len() {
            sleep(Duration::from_secs_f64(delay_between_calls)).await;
        }
    }

    results
}
