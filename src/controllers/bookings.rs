use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::SeatPositionRequest;
use crate::{
    error::{AppError, AppResult},
    models::{BookingWithSeats, Seat},
    services::bookings::{BookingUpdate, NewBooking},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/with-seats", get(list_bookings_with_seats))
        .route(
            "/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/bookings/{id}/with-seats", get(get_booking_with_seats))
        .route("/bookings/{id}/seats", get(get_booking_seats))
        .route("/bookings/code/{code}", get(get_booking_by_code))
        .route("/bookings/code/{code}/with-seats", get(get_booking_by_code_with_seats))
        .route("/bookings/movie/{movie_id}", get(get_movie_bookings))
}

/* ---------- requests ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BookingData {
    movie_id: Uuid,
    #[validate(range(min = 1, max = 50))]
    num_tickets: u32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    #[validate(nested)]
    booking: BookingData,
    #[serde(default)]
    #[validate(nested)]
    seats: Vec<SeatPositionRequest>,
    #[validate(nested)]
    starting_position: Option<SeatPositionRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateBookingData {
    #[validate(length(min = 1, max = 36))]
    booking_code: String,
    movie_id: Uuid,
    #[validate(range(min = 1, max = 50))]
    num_tickets: u32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateBookingRequest {
    #[validate(nested)]
    booking_data: UpdateBookingData,
    #[serde(default)]
    #[validate(nested)]
    seats: Vec<SeatPositionRequest>,
    #[serde(default)]
    update_seats: bool,
    #[validate(nested)]
    starting_position: Option<SeatPositionRequest>,
}

/* ---------- responses ---------- */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingResponse {
    id: Uuid,
    booking_code: String,
    movie_id: Uuid,
    num_tickets: i32,
    seats_list: Vec<Seat>,
    error_code: &'static str,
    error_message: &'static str,
}

impl From<BookingWithSeats> for CreateBookingResponse {
    fn from(created: BookingWithSeats) -> Self {
        Self {
            id: created.booking.id,
            booking_code: created.booking.booking_code,
            movie_id: created.booking.movie_id,
            num_tickets: created.booking.num_tickets,
            seats_list: created.seats,
            error_code: "",
            error_message: "",
        }
    }
}

/* ---------- handlers ---------- */

// GET /api/bookings
async fn list_bookings(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.bookings.find_all().await?))
}

// GET /api/bookings/with-seats
async fn list_bookings_with_seats(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.bookings.find_all_with_seats().await?))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let booking = state
        .bookings
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    Ok(Json(booking))
}

// GET /api/bookings/{id}/with-seats
async fn get_booking_with_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let booking = state
        .bookings
        .find_by_id_with_seats(id)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    Ok(Json(booking))
}

// GET /api/bookings/{id}/seats
async fn get_booking_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.bookings.booking_seats(id).await?))
}

// GET /api/bookings/code/{code}
async fn get_booking_by_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let booking = state
        .bookings
        .find_by_booking_code(&code)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    Ok(Json(booking))
}

// GET /api/bookings/code/{code}/with-seats
async fn get_booking_by_code_with_seats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let booking = state
        .bookings
        .find_by_booking_code_with_seats(&code)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    Ok(Json(booking))
}

// GET /api/bookings/movie/{movie_id}
async fn get_movie_bookings(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.bookings.find_by_movie_id(movie_id).await?))
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let created = state
        .bookings
        .create(NewBooking {
            movie_id: req.booking.movie_id,
            num_tickets: req.booking.num_tickets,
            seats: req.seats.iter().map(SeatPositionRequest::position).collect(),
            starting_position: req.starting_position.as_ref().map(SeatPositionRequest::anchor),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreateBookingResponse::from(created))))
}

// PUT /api/bookings/{id}
async fn update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let updated = state
        .bookings
        .update(
            id,
            BookingUpdate {
                booking_code: req.booking_data.booking_code,
                movie_id: req.booking_data.movie_id,
                num_tickets: req.booking_data.num_tickets,
                seats: req.seats.iter().map(SeatPositionRequest::position).collect(),
                update_seats: req.update_seats,
                starting_position: req.starting_position.as_ref().map(SeatPositionRequest::anchor),
            },
        )
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    Ok(Json(updated))
}

// DELETE /api/bookings/{id}
async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    if state.bookings.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("booking"))
    }
}
