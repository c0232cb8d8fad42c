use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSelectionRules {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_from_furthest_row: bool,
    pub start_from_middle_col: bool,
    pub overflow_to_closer_row: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
