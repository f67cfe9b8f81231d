use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::external::market_data::DailyBar;
use crate::models::PriceBar;

/// Row-by-row upsert of a fetched window, keyed by (ticker, date). The
/// merge is idempotent; re-fetching an overlapping window overwrites the
/// same-day values with the later fetch.
pub async fn upsert_bars(
    pool: &PgPool,
    ticker: &str,
    bars: &[DailyBar],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await.map_err(|e| {
        error!("Failed to begin transaction for ticker {}: {}", ticker, e);
        e
    })?;

    for bar in bars {
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO price_bars (id, ticker, date, open, high, low, close, volume)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (ticker, date)
            DO UPDATE SET open = EXCLUDED.open,
                          high = EXCLUDED.high,
                          low = EXCLUDED.low,
                          close = EXCLUDED.close,
                          volume = EXCLUDED.volume
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ticker)
        .bind(bar.date)
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .execute(&mut *tx)
        .await
        {
            error!(
                "Failed to upsert bar for ticker {} (date: {}): {}",
                ticker, bar.date, e
            );
            return Err(e);
        }
    }

    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction for ticker {}: {}", ticker, e);
        e
    })?;
    Ok(())
}

/// Full stored history for a ticker, oldest first.
pub async fn fetch_all(pool: &PgPool, ticker: &str) -> Result<Vec<PriceBar>, sqlx::Error> {
    sqlx::query_as::<_, PriceBar>(
        r#"
        SELECT id, ticker, date, open, high, low, close, volume, created_at
        FROM price_bars
        WHERE ticker = $1
        ORDER BY date ASC
        "#,
    )
    .bind(ticker)
    .fetch_all(pool)
    .await
}

