pub mod bookings;
pub mod movies;
pub mod rules;
pub mod seats;
pub mod ws;

use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::allocation::SeatPosition;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(movies::routes())
        .merge(bookings::routes())
        .merge(seats::routes())
        .merge(rules::routes())
        .merge(ws::routes())
}

/// Место в теле запроса: `{ "rowLetter": "C", "seatNumber": 3 }`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SeatPositionRequest {
    #[validate(custom(function = "validate_row_letter"))]
    pub row_letter: String,
    #[validate(range(min = 1, max = 50))]
    pub seat_number: u32,
}

impl SeatPositionRequest {
    /// Позиция как есть. Для якоря: строчная буква уводит подбор в режим по умолчанию.
    pub fn anchor(&self) -> SeatPosition {
        SeatPosition::new(first_char(&self.row_letter), self.seat_number)
    }

    /// Позиция с буквой ряда в верхнем регистре.
    pub fn position(&self) -> SeatPosition {
        SeatPosition::new(first_char(&self.row_letter).to_ascii_uppercase(), self.seat_number)
    }
}

fn first_char(value: &str) -> char {
    value.chars().next().unwrap_or_default()
}

/// Ровно одна латинская буква.
pub fn validate_row_letter(value: &str) -> Result<(), ValidationError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(()),
        _ => Err(ValidationError::new("row_letter")
            .with_message("row letter must be a single latin letter".into())),
    }
}
