use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::models::{Forecast, StockPrediction};

/// Persists one run: a row per forecast day, each carrying the run-level
/// confidence and algorithm label.
pub async fn insert_forecast(
    pool: &PgPool,
    ticker: &str,
    forecast: &Forecast,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for point in &forecast.predictions {
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO stock_predictions
                (id, ticker, prediction_date, predicted_price, confidence_score, algorithm)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ticker)
        .bind(point.date)
        .bind(point.price)
        .bind(forecast.confidence)
        .bind(&forecast.algorithm)
        .execute(&mut *tx)
        .await
        {
            error!(
                "Failed to insert prediction for ticker {} (date: {}): {}",
                ticker, point.date, e
            );
            return Err(e);
        }
    }

    tx.commit().await
}

/// Most recently created rows first.
pub async fn fetch_recent(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<StockPrediction>, sqlx::Error> {
    sqlx::query_as::<_, StockPrediction>(
        r#"
        SELECT id, ticker, created_at, prediction_date, predicted_price,
               confidence_score, algorithm
        FROM stock_predictions
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Every persisted row, newest runs first, forecast days in order within a
/// run.
pub async fn fetch_all(pool: &PgPool) -> Result<Vec<StockPrediction>, sqlx::Error> {
    sqlx::query_as::<_, StockPrediction>(
        r#"
        SELECT id, ticker, created_at, prediction_date, predicted_price,
               confidence_score, algorithm
        FROM stock_predictions
        ORDER BY created_at DESC, prediction_date ASC
        "#,
    )
    .fetch_all(pool)
    .await
}
