use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::StockInfo;

/// The three forecasting strategies. Dispatch is a tagged enum, not a
/// trait hierarchy; each strategy is a single function on the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    LinearRegression,
    Arima,
    Lstm,
}

impl Algorithm {
    /// Parses a request tag. Unknown tags are an invalid-input error, never
    /// silently defaulted.
    pub fn parse(tag: &str) -> Result<Self, AppError> {
        match tag {
            "linear_regression" => Ok(Algorithm::LinearRegression),
            "arima" => Ok(Algorithm::Arima),
            "lstm" => Ok(Algorithm::Lstm),
            other => Err(AppError::Validation(format!(
                "Unsupported algorithm: {}",
                other
            ))),
        }
    }

    /// Human-readable label stored alongside each prediction row.
    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::LinearRegression => "Linear Regression",
            Algorithm::Arima => "ARIMA",
            Algorithm::Lstm => "LSTM Neural Network (Mock)",
        }
    }
}

/// One forecast day: date and predicted close, rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Output of one prediction run. Confidence is a run-level scalar shared by
/// every forecast day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub predictions: Vec<ForecastPoint>,
    pub confidence: f64,
    pub algorithm: String,
}

/// A persisted forecast day. Confidence and algorithm are denormalized onto
/// every row of a run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockPrediction {
    pub id: Uuid,
    pub ticker: String,
    pub created_at: DateTime<Utc>,
    pub prediction_date: NaiveDate,
    pub predicted_price: f64,
    pub confidence_score: Option<f64>,
    pub algorithm: String,
}

/// Rows of `StockPrediction` grouped back into the run that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRun {
    pub ticker: String,
    pub date_created: NaiveDate,
    pub predictions: Vec<StockPrediction>,
}

pub const DATA_PERIODS: [&str; 6] = ["1mo", "3mo", "6mo", "1y", "2y", "5y"];

pub const MAX_PREDICTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub ticker: String,
    #[serde(default = "default_prediction_days")]
    pub prediction_days: u32,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_prediction_days() -> u32 {
    7
}

fn default_algorithm() -> String {
    "linear_regression".to_string()
}

fn default_period() -> String {
    "1y".to_string()
}

impl PredictRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let symbol = self.ticker.trim();
        if symbol.is_empty() || symbol.len() > 10 {
            return Err(AppError::Validation(
                "Ticker symbol must be 1-10 characters".to_string(),
            ));
        }
        if self.prediction_days < 1 || self.prediction_days > MAX_PREDICTION_DAYS {
            return Err(AppError::Validation(format!(
                "Prediction days must be between 1 and {}",
                MAX_PREDICTION_DAYS
            )));
        }
        if !DATA_PERIODS.contains(&self.period.as_str()) {
            return Err(AppError::Validation(format!(
                "Invalid data period: {}",
                self.period
            )));
        }
        Algorithm::parse(&self.algorithm)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalSeries {
    pub dates: Vec<String>,
    pub closes: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub ticker: String,
    pub info: StockInfo,
    pub algorithm: String,
    pub confidence: f64,
    pub predictions: Vec<ForecastPoint>,
    pub historical: HistoricalSeries,
}
