/// Retry and pacing knobs for the market-data fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum provider attempts per fetch.
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: 2.0,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: std::env::var("STOCK_API_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay: std::env::var("STOCK_API_BACKOFF_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.base_delay),
        }
    }
}
