use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::validate_row_letter;
use crate::{
    allocation::SeatPosition,
    error::{AppError, AppResult},
    services::seats::{NewSeat, SeatChanges},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats", post(create_seat))
        .route("/seats/multiple", post(create_seats))
        .route(
            "/seats/{id}",
            get(get_seat).put(update_seat).delete(delete_seat),
        )
        .route(
            "/seats/booking/{booking_id}",
            get(get_booking_seats).delete(delete_booking_seats),
        )
        .route(
            "/seats/booking/{booking_id}/{row}/{number}",
            get(get_seat_by_position),
        )
        .route("/seats/movie/{movie_id}", get(get_movie_seats))
        .route(
            "/seats/check-availability/{movie_id}/{row}/{number}",
            get(check_availability),
        )
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateSeatRequest {
    booking_id: Uuid,
    #[validate(custom(function = "validate_row_letter"))]
    row_letter: String,
    #[validate(range(min = 1, max = 50))]
    seat_number: u32,
}

impl CreateSeatRequest {
    fn into_new_seat(self) -> NewSeat {
        NewSeat {
            booking_id: self.booking_id,
            position: SeatPosition::new(upper_letter(&self.row_letter), self.seat_number),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateSeatRequest {
    booking_id: Option<Uuid>,
    #[validate(custom(function = "validate_row_letter"))]
    row_letter: Option<String>,
    #[validate(range(min = 1, max = 50))]
    seat_number: Option<u32>,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    available: bool,
}

fn upper_letter(value: &str) -> char {
    value.chars().next().unwrap_or_default().to_ascii_uppercase()
}

fn path_position(row: &str, number: u32) -> AppResult<SeatPosition> {
    validate_row_letter(row).map_err(|_| AppError::Validation(format!("invalid row letter '{}'", row)))?;
    Ok(SeatPosition::new(upper_letter(row), number))
}

// GET /api/seats/{id}
async fn get_seat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let seat = state.seats.find_by_id(id).await?.ok_or(AppError::NotFound("seat"))?;
    Ok(Json(seat))
}

// GET /api/seats/booking/{booking_id}
async fn get_booking_seats(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.seats.find_by_booking_id(booking_id).await?))
}

// GET /api/seats/booking/{booking_id}/{row}/{number}
async fn get_seat_by_position(
    State(state): State<Arc<AppState>>,
    Path((booking_id, row, number)): Path<(Uuid, String, u32)>,
) -> AppResult<impl IntoResponse> {
    let position = path_position(&row, number)?;
    let seat = state
        .seats
        .find_by_position(booking_id, position)
        .await?
        .ok_or(AppError::NotFound("seat"))?;
    Ok(Json(seat))
}

// GET /api/seats/movie/{movie_id}
async fn get_movie_seats(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.seats.find_all_for_movie(movie_id).await?))
}

// GET /api/seats/check-availability/{movie_id}/{row}/{number}
async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path((movie_id, row, number)): Path<(Uuid, String, u32)>,
) -> AppResult<impl IntoResponse> {
    let position = path_position(&row, number)?;
    let available = state.seats.is_available(movie_id, position).await?;
    Ok(Json(AvailabilityResponse { available }))
}

// POST /api/seats
async fn create_seat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSeatRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let seat = state.seats.create(req.into_new_seat()).await?;
    Ok((StatusCode::CREATED, Json(seat)))
}

// POST /api/seats/multiple
async fn create_seats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Vec<CreateSeatRequest>>,
) -> AppResult<impl IntoResponse> {
    if req.is_empty() {
        return Err(AppError::Validation("at least one seat is required".to_string()));
    }
    for seat in &req {
        seat.validate()?;
    }

    let seats = req
        .into_iter()
        .map(CreateSeatRequest::into_new_seat)
        .collect();
    let created = state.seats.create_multiple(seats).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/seats/{id}
async fn update_seat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSeatRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let changes = SeatChanges {
        booking_id: req.booking_id,
        row_letter: req.row_letter.as_deref().map(upper_letter),
        seat_number: req.seat_number,
    };
    let seat = state
        .seats
        .update(id, changes)
        .await?
        .ok_or(AppError::NotFound("seat"))?;
    Ok(Json(seat))
}

// DELETE /api/seats/{id}
async fn delete_seat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    if state.seats.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("seat"))
    }
}

// DELETE /api/seats/booking/{booking_id}
async fn delete_booking_seats(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.seats.delete_by_booking_id(booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uppercases_the_row() {
        let booking_id = Uuid::new_v4();
        let body = format!(r#"{{"bookingId":"{}","rowLetter":"c","seatNumber":4}}"#, booking_id);
        let req: CreateSeatRequest = serde_json::from_str(&body).unwrap();
        assert!(req.validate().is_ok());

        let seat = req.into_new_seat();
        assert_eq!(seat.booking_id, booking_id);
        assert_eq!(seat.position, SeatPosition::new('C', 4));
    }

    #[test]
    fn path_rows_are_checked() {
        assert_eq!(path_position("d", 2).unwrap(), SeatPosition::new('D', 2));
        assert!(matches!(path_position("DD", 2), Err(AppError::Validation(_))));
    }

    #[test]
    fn partial_update_validates_present_fields() {
        let req: UpdateSeatRequest = serde_json::from_str(r#"{"seatNumber":7}"#).unwrap();
        assert!(req.validate().is_ok());

        let req: UpdateSeatRequest = serde_json::from_str(r#"{"rowLetter":"12"}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
