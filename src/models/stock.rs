use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tracked symbol. The display name is refreshed opportunistically on
/// every successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
}
