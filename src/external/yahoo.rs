use async_trait::async_trait;
use serde::Deserialize;

use crate::external::market_data::{CompanyProfile, DailyBar, MarketDataProvider, ProviderError};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance provider. No API key required; the free chart endpoint
/// throttles aggressively, which is what the fetcher's backoff is for.
pub struct YahooFinanceProvider {
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; Stockcast/0.1)")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for YahooFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfileModule>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "marketCap")]
    market_cap: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct SummaryDetailModule {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    #[serde(rename = "dividendYield")]
    dividend_yield: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
    #[serde(rename = "longBusinessSummary")]
    long_business_summary: Option<String>,
}

// Yahoo wraps numbers as {"raw": 1.23, "fmt": "1.23"}.
#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn status_error(status: reqwest::StatusCode) -> ProviderError {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    ProviderError::Status(status.as_u16(), reason.to_string())
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    async fn get_history(
        &self,
        ticker: &str,
        period: &str,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let url = format!("{}/{}", CHART_URL, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", period)])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(status_error(resp.status()));
        }

        let body: ChartResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.chart.error {
            return Err(ProviderError::BadResponse(error.description));
        }

        let results = body
            .chart
            .result
            .ok_or_else(|| ProviderError::BadResponse("no results in response".into()))?;
        let result = results
            .first()
            .ok_or_else(|| ProviderError::BadResponse("empty result set".into()))?;

        let timestamps = result.timestamp.as_deref().unwrap_or(&[]);
        let quote = result
            .indicators
            .quote
            .first()
            .ok_or_else(|| ProviderError::BadResponse("no quote data in response".into()))?;

        if [
            quote.open.len(),
            quote.high.len(),
            quote.low.len(),
            quote.close.len(),
            quote.volume.len(),
        ]
        .iter()
        .any(|&len| len != timestamps.len())
        {
            return Err(ProviderError::Parse(
                "quote arrays do not align with timestamps".into(),
            ));
        }

        // Null entries are market holidays; a bar is kept only when the full
        // OHLCV tuple is present.
        let mut bars: Vec<DailyBar> = timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let date = chrono::DateTime::from_timestamp(ts, 0)?.date_naive();
                Some(DailyBar {
                    date,
                    open: quote.open[i]?,
                    high: quote.high[i]?,
                    low: quote.low[i]?,
                    close: quote.close[i]?,
                    volume: quote.volume[i]?,
                })
            })
            .collect();

        bars.sort_by_key(|b| b.date);

        Ok(bars)
    }

    async fn get_company_info(&self, ticker: &str) -> Result<CompanyProfile, ProviderError> {
        let url = format!("{}/{}", QUOTE_SUMMARY_URL, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[("modules", "price,summaryDetail,assetProfile")])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(status_error(resp.status()));
        }

        let body: QuoteSummaryResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.quote_summary.error {
            return Err(ProviderError::BadResponse(error.description));
        }

        let result = body
            .quote_summary
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| ProviderError::BadResponse("no quote summary for ticker".into()))?;

        let mut profile = CompanyProfile::default();

        if let Some(price) = result.price {
            profile.short_name = price.short_name;
            profile.long_name = price.long_name;
            profile.market_cap = price.market_cap.and_then(|v| v.raw);
        }
        if let Some(detail) = result.summary_detail {
            profile.trailing_pe = detail.trailing_pe.and_then(|v| v.raw);
            profile.dividend_yield = detail.dividend_yield.and_then(|v| v.raw);
        }
        if let Some(asset) = result.asset_profile {
            profile.sector = asset.sector;
            profile.industry = asset.industry;
            profile.summary = asset.long_business_summary;
        }

        Ok(profile)
    }
}
