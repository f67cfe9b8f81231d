use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trading day of OHLCV data as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Raw company metadata as surfaced by a provider. Every field is optional;
/// normalization into a displayable record happens in the service layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub summary: Option<String>,
}

impl CompanyProfile {
    /// Prefers the short name, then the long name, then the ticker symbol.
    pub fn display_name(&self, fallback: &str) -> String {
        self.short_name
            .clone()
            .or_else(|| self.long_name.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Loose rate-limit classifier: anything whose display text carries
    /// "429" or "Too Many Requests" counts, regardless of variant.
    pub fn is_rate_limit(&self) -> bool {
        let msg = self.to_string();
        msg.contains("429") || msg.contains("Too Many Requests")
    }
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily history for a ticker over a named period ("1mo", "1y", ...).
    async fn get_history(
        &self,
        ticker: &str,
        period: &str,
    ) -> Result<Vec<DailyBar>, ProviderError>;

    /// Company metadata for a ticker.
    async fn get_company_info(&self, ticker: &str) -> Result<CompanyProfile, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_matches_status_code_text() {
        let err = ProviderError::Status(429, "Too Many Requests".into());
        assert!(err.is_rate_limit());
    }

    #[test]
    fn rate_limit_matches_substring_in_any_variant() {
        let err = ProviderError::Network("server said 429, slow down".into());
        assert!(err.is_rate_limit());
    }

    #[test]
    fn other_errors_are_not_rate_limits() {
        let err = ProviderError::Network("connection refused".into());
        assert!(!err.is_rate_limit());

        let err = ProviderError::Status(404, "Not Found".into());
        assert!(!err.is_rate_limit());
    }
}
