use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};

use crate::db;
use crate::errors::AppError;
use crate::models::{
    HistoricalSeries, PredictRequest, PredictionResponse, PredictionRun, StockPrediction,
};
use crate::services::fetcher;
use crate::services::predictor::StockPredictor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_prediction))
        .route("/recent", get(recent_predictions))
        .route("/history", get(prediction_history))
}

async fn create_prediction(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictionResponse>, AppError> {
    req.validate()?;

    let symbol = req.ticker.trim().to_uppercase();
    info!(
        "POST /api/predictions - {} ({} days, {}, period {})",
        symbol, req.prediction_days, req.algorithm, req.period
    );

    let bars = fetcher::fetch_and_persist(
        &state.pool,
        state.provider.as_ref(),
        &state.cache,
        &state.fetch,
        &symbol,
        &req.period,
    )
    .await
    .ok_or_else(|| {
        AppError::External(format!(
            "Could not fetch data for {}. Please check the symbol and try again.",
            symbol
        ))
    })?;

    let info = fetcher::get_info(
        state.provider.as_ref(),
        &state.cache,
        &state.fetch,
        &symbol,
    )
    .await;

    let historical = HistoricalSeries {
        dates: bars.iter().map(|b| b.date.format("%Y-%m-%d").to_string()).collect(),
        closes: bars.iter().map(|b| (b.close * 100.0).round() / 100.0).collect(),
    };

    let predictor = StockPredictor::new(bars, &req.algorithm)?;
    let forecast = predictor.predict(req.prediction_days)?;

    // fetch_and_persist upserted the stock row above; a miss here means the
    // persistence step was skipped.
    let stock = db::stock_queries::fetch_by_symbol(&state.pool, &symbol)
        .await?
        .ok_or(AppError::NotFound)?;

    db::prediction_queries::insert_forecast(&state.pool, &stock.symbol, &forecast)
        .await
        .map_err(|e| {
            error!("Failed to persist forecast for {}: {}", symbol, e);
            AppError::Db(e)
        })?;

    Ok(Json(PredictionResponse {
        ticker: symbol,
        info,
        algorithm: forecast.algorithm,
        confidence: forecast.confidence,
        predictions: forecast.predictions,
        historical,
    }))
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    limit: Option<i64>,
}

async fn recent_predictions(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<StockPrediction>>, AppError> {
    let limit = params.limit.unwrap_or(5).clamp(1, 100);
    info!("GET /api/predictions/recent - limit {}", limit);

    let rows = db::prediction_queries::fetch_recent(&state.pool, limit).await?;
    Ok(Json(rows))
}

/// Rows share a run exactly when they share a ticker and a creation date;
/// that matches how they were written (one insert per forecast run).
async fn prediction_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionRun>>, AppError> {
    info!("GET /api/predictions/history");

    let rows = db::prediction_queries::fetch_all(&state.pool).await?;

    let mut grouped: BTreeMap<(String, NaiveDate), Vec<StockPrediction>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry((row.ticker.clone(), row.created_at.date_naive()))
            .or_default()
            .push(row);
    }

    let mut runs: Vec<PredictionRun> = grouped
        .into_iter()
        .map(|((ticker, date_created), predictions)| PredictionRun {
            ticker,
            date_created,
            predictions,
        })
        .collect();
    runs.sort_by(|a, b| b.date_created.cmp(&a.date_created));

    Ok(Json(runs))
}
