use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::allocation::{row_letter, AllocationError, TheaterGeometry, MAX_ROWS};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub total_rows: i32,
    pub seats_per_row: i32,
    pub sort: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    pub fn geometry(&self) -> Result<TheaterGeometry, AllocationError> {
        TheaterGeometry::from_columns(self.total_rows, self.seats_per_row)
    }

    pub fn row_order(&self) -> RowOrder {
        RowOrder::parse(&self.sort).unwrap_or_default()
    }
}

/// Порядок вывода рядов в схеме зала.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOrder {
    Asc,
    #[default]
    Desc,
}

impl RowOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(RowOrder::Asc),
            "desc" => Some(RowOrder::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowOrder::Asc => "asc",
            RowOrder::Desc => "desc",
        }
    }

    /// Первые `count` букв алфавита (count зажимается в 1..=26) в нужном порядке.
    pub fn row_letters(&self, count: i32) -> Vec<char> {
        let count = count.clamp(1, MAX_ROWS as i32) as usize;
        let letters = (0..count).filter_map(row_letter);
        match self {
            RowOrder::Asc => letters.collect(),
            RowOrder::Desc => letters.rev().collect(),
        }
    }
}
