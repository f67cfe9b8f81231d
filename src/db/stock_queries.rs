use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Stock;

/// Get-or-create by symbol; an existing row gets its display name refreshed.
pub async fn upsert(pool: &PgPool, symbol: &str, name: &str) -> Result<Stock, sqlx::Error> {
    sqlx::query_as::<_, Stock>(
        r#"
        INSERT INTO stocks (id, symbol, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (symbol) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, symbol, name
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(symbol)
    .bind(name)
    .fetch_one(pool)
    .await
}

pub async fn fetch_by_symbol(pool: &PgPool, symbol: &str) -> Result<Option<Stock>, sqlx::Error> {
    sqlx::query_as::<_, Stock>(
        r#"
        SELECT id, symbol, name
        FROM stocks
        WHERE symbol = $1
        "#,
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await
}
