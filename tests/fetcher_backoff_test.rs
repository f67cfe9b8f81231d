//! Behavioral tests for the data fetcher: caching, retry classification,
//! backoff shape, and info fallbacks, driven by a scripted provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use stockcast_backend::external::market_data::{
    CompanyProfile, DailyBar, MarketDataProvider, ProviderError,
};
use stockcast_backend::services::cache::MarketCache;
use stockcast_backend::services::fetcher;

/// Replays a fixed sequence of history outcomes and counts every call.
struct ScriptedProvider {
    history: Mutex<VecDeque<Result<Vec<DailyBar>, ProviderError>>>,
    history_calls: AtomicUsize,
    info_calls: AtomicUsize,
    info_fails: bool,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<Vec<DailyBar>, ProviderError>>) -> Self {
        Self {
            history: Mutex::new(script.into()),
            history_calls: AtomicUsize::new(0),
            info_calls: AtomicUsize::new(0),
            info_fails: false,
        }
    }

    fn with_failing_info(mut self) -> Self {
        self.info_fails = true;
        self
    }

    fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    async fn get_history(
        &self,
        _ticker: &str,
        _period: &str,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap()
            .pop_front()
            .expect("provider script exhausted")
    }

    async fn get_company_info(&self, ticker: &str) -> Result<CompanyProfile, ProviderError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.info_fails {
            Err(ProviderError::Network("info endpoint down".into()))
        } else {
            Ok(CompanyProfile {
                short_name: Some(format!("{} Inc.", ticker)),
                sector: Some("Technology".into()),
                ..Default::default()
            })
        }
    }
}

fn sample_bars(n: usize) -> Vec<DailyBar> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    (0..n)
        .map(|i| {
            let close = 50.0 + i as f64;
            DailyBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 500_000,
            }
        })
        .collect()
}

fn rate_limited() -> ProviderError {
    ProviderError::Status(429, "Too Many Requests".into())
}

#[tokio::test]
async fn cache_hit_short_circuits_the_provider() {
    let provider = ScriptedProvider::new(vec![Ok(sample_bars(3))]);
    let cache = MarketCache::new();

    let first = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 5, 0.0).await;
    assert!(first.is_some());
    assert_eq!(provider.history_calls(), 1);

    let second = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 5, 0.0).await;
    let second = second.expect("cached fetch should succeed");
    assert_eq!(second.bars.len(), 3);
    // No further provider traffic on a cache hit.
    assert_eq!(provider.history_calls(), 1);
    assert_eq!(provider.info_calls(), 1);
}

#[tokio::test]
async fn cache_keys_include_the_period() {
    let provider = ScriptedProvider::new(vec![Ok(sample_bars(3)), Ok(sample_bars(5))]);
    let cache = MarketCache::new();

    fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 5, 0.0).await;
    let other = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "6mo", 5, 0.0).await;

    assert_eq!(other.unwrap().bars.len(), 5);
    assert_eq!(provider.history_calls(), 2);
}

#[tokio::test]
async fn rate_limit_errors_retry_until_exhaustion() {
    let provider = ScriptedProvider::new(vec![
        Err(rate_limited()),
        Err(rate_limited()),
        Err(rate_limited()),
    ]);
    let cache = MarketCache::new();

    let result = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 3, 0.0).await;

    assert!(result.is_none());
    assert_eq!(provider.history_calls(), 3);
}

#[tokio::test]
async fn rate_limit_then_success_recovers() {
    let provider = ScriptedProvider::new(vec![Err(rate_limited()), Ok(sample_bars(4))]);
    let cache = MarketCache::new();

    let result = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 5, 0.0).await;

    assert_eq!(result.unwrap().bars.len(), 4);
    assert_eq!(provider.history_calls(), 2);
}

#[tokio::test]
async fn non_rate_limit_errors_are_terminal() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Network(
        "connection refused".into(),
    ))]);
    let cache = MarketCache::new();

    let result = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 5, 0.0).await;

    assert!(result.is_none());
    assert_eq!(provider.history_calls(), 1);
}

#[tokio::test]
async fn empty_history_is_terminal_and_not_retried() {
    let provider = ScriptedProvider::new(vec![Ok(vec![])]);
    let cache = MarketCache::new();

    let result = fetcher::fetch_with_backoff(&provider, &cache, "GONE", "1y", 5, 0.0).await;

    assert!(result.is_none());
    assert_eq!(provider.history_calls(), 1);
    // Empty results are not cached either.
    assert!(cache.history.is_empty());
}

#[tokio::test]
async fn info_failure_falls_back_to_the_symbol() {
    let provider = ScriptedProvider::new(vec![Ok(sample_bars(3))]).with_failing_info();
    let cache = MarketCache::new();

    let fetched = fetcher::fetch_with_backoff(&provider, &cache, "AAPL", "1y", 5, 0.0)
        .await
        .expect("history fetch should still succeed");

    assert_eq!(fetched.profile.display_name("AAPL"), "AAPL");
}

#[tokio::test]
async fn get_info_returns_sentinel_without_caching_it() {
    let config = stockcast_backend::config::FetchConfig {
        max_retries: 2,
        base_delay: 0.0,
    };
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Network("down".into()))]);
    let cache = MarketCache::new();

    let info = fetcher::get_info(&provider, &cache, &config, "MSFT").await;

    assert_eq!(info.name, "MSFT");
    assert_eq!(info.sector, "N/A");
    assert_eq!(info.description, "Information not available");
    assert!(cache.info.is_empty());
}

#[tokio::test]
async fn get_info_caches_successful_lookups() {
    let config = stockcast_backend::config::FetchConfig {
        max_retries: 2,
        base_delay: 0.0,
    };
    let provider = ScriptedProvider::new(vec![Ok(sample_bars(2))]);
    let cache = MarketCache::new();

    let first = fetcher::get_info(&provider, &cache, &config, "MSFT").await;
    let second = fetcher::get_info(&provider, &cache, &config, "MSFT").await;

    assert_eq!(first.name, "MSFT Inc.");
    assert_eq!(second.name, "MSFT Inc.");
    assert_eq!(provider.history_calls(), 1);
    assert_eq!(provider.info_calls(), 1);
}

#[test]
fn backoff_delay_is_exponential_with_unit_jitter() {
    for attempt in 0..5u32 {
        let floor = 2f64.powi(attempt as i32) * 2.0;
        let delay = fetcher::backoff_delay(attempt, 2.0);
        assert!(delay >= floor, "attempt {}: {} < {}", attempt, delay, floor);
        assert!(delay < floor + 1.0, "attempt {}: {} jitter out of band", attempt, delay);
    }
}
