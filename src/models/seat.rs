use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::allocation::SeatPosition;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub movie_id: Uuid,
    pub row_letter: String,
    pub seat_number: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    /// Позиция места для аллокатора. None для битых строк.
    pub fn position(&self) -> Option<SeatPosition> {
        parse_position(&self.row_letter, self.seat_number)
    }
}

/// Строка из `SELECT row_letter, seat_number` для снимка занятости.
#[derive(Debug, Clone, FromRow)]
pub struct OccupiedSeatRow {
    pub row_letter: String,
    pub seat_number: i32,
}

impl OccupiedSeatRow {
    pub fn position(&self) -> Option<SeatPosition> {
        parse_position(&self.row_letter, self.seat_number)
    }
}

fn parse_position(row_letter: &str, seat_number: i32) -> Option<SeatPosition> {
    let mut chars = row_letter.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let number = u32::try_from(seat_number).ok()?;
    Some(SeatPosition::new(letter, number))
}
