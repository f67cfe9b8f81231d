use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db;
use crate::errors::AppError;
use crate::models::{PriceBar, StockInfo};
use crate::services::fetcher;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh_stocks))
        .route("/:ticker/data", get(get_stock_data))
        .route("/:ticker/bars", get(get_stored_bars))
        .route("/:ticker/info", get(get_stock_info))
}

#[derive(Debug, Deserialize)]
struct DataParams {
    period: Option<String>,
}

#[derive(Debug, Serialize)]
struct StockDataResponse {
    dates: Vec<String>,
    prices: Vec<f64>,
    volumes: Vec<i64>,
}

async fn get_stock_data(
    Path(ticker): Path<String>,
    Query(params): Query<DataParams>,
    State(state): State<AppState>,
) -> Result<Json<StockDataResponse>, AppError> {
    let ticker = ticker.trim().to_uppercase();
    let period = params.period.unwrap_or_else(|| "1y".to_string());
    info!("GET /api/stocks/{}/data - period {}", ticker, period);

    let bars = fetcher::fetch_and_persist(
        &state.pool,
        state.provider.as_ref(),
        &state.cache,
        &state.fetch,
        &ticker,
        &period,
    )
    .await
    .ok_or_else(|| AppError::External(format!("Could not fetch data for {}", ticker)))?;

    Ok(Json(StockDataResponse {
        dates: bars.iter().map(|b| b.date.format("%Y-%m-%d").to_string()).collect(),
        prices: bars.iter().map(|b| (b.close * 100.0).round() / 100.0).collect(),
        volumes: bars.iter().map(|b| b.volume).collect(),
    }))
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    tickers: Vec<String>,
    #[serde(default = "default_period")]
    period: String,
    #[serde(default = "default_refresh_delay")]
    delay_between_calls: f64,
}

fn default_period() -> String {
    "1y".to_string()
}

fn default_refresh_delay() -> f64 {
    1.0
}

/// Sequential batch refresh. Each ticker's outcome is independent; the
/// response maps every requested ticker to the number of bars fetched, or
/// null when that ticker failed.
async fn refresh_stocks(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<HashMap<String, Option<usize>>>, AppError> {
    if req.tickers.is_empty() {
        return Err(AppError::Validation("No tickers provided".to_string()));
    }
    info!(
        "POST /api/stocks/refresh - {} tickers, period {}",
        req.tickers.len(),
        req.period
    );

    let tickers: Vec<String> = req
        .tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .collect();

    let results = fetcher::fetch_many(
        &state.pool,
        state.provider.as_ref(),
        &state.cache,
        &state.fetch,
        &tickers,
        &req.period,
        req.delay_between_calls,
    )
    .await;

    Ok(Json(
        results
            .into_iter()
            .map(|(ticker, bars)| (ticker, bars.map(|b| b.len())))
            .collect(),
    ))
}

/// The bars already persisted for a ticker, oldest first. Unlike
/// `/data`, this never touches the provider.
async fn get_stored_bars(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PriceBar>>, AppError> {
    let ticker = ticker.trim().to_uppercase();
    info!("GET /api/stocks/{}/bars", ticker);

    let bars = db::price_queries::fetch_all(&state.pool, &ticker).await?;
    Ok(Json(bars))
}

async fn get_stock_info(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Json<StockInfo> {
    let ticker = ticker.trim().to_uppercase();
    info!("GET /api/stocks/{}/info", ticker);

    let info = fetcher::get_info(
        state.provider.as_ref(),
        &state.cache,
        &state.fetch,
        &ticker,
    )
    .await;

    Json(info)
}
