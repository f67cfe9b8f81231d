use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One stored calendar day of OHLCV data for a ticker.
/// Unique on (ticker, date); refetches overwrite in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceBar {
    pub id: Uuid,
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub created_at: DateTime<Utc>,
}
