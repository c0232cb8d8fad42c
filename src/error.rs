//! Единый тип ошибки для сервисов и HTTP-обработчиков.
//!
//! Ошибки БД логируются при превращении в ответ и уходят клиенту как 500 без
//! подробностей. Redis сюда не попадает: кеш превращает свои ошибки в промах.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::allocation::AllocationError;

pub const ERROR_MOVIE_NOT_FOUND: &str = "ERROR_CODE1";
pub const ERROR_TICKET_MISMATCH: &str = "ERROR_CODE2";
pub const ERROR_ALLOCATION_FAILED: &str = "ERROR_CODE3";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("movie not found")]
    MovieNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("number of tickets does not match number of seats")]
    TicketMismatch,

    #[error("failed to allocate seats: {0}")]
    Allocation(#[from] AllocationError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error_code: &'static str,
    message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::MovieNotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TicketMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Allocation(err) => match err {
                AllocationError::InvalidGeometry { .. } | AllocationError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                AllocationError::InsufficientCapacity { .. }
                | AllocationError::AllocationExhausted { .. } => StatusCode::CONFLICT,
            },
            AppError::Database(err) if is_unique_violation(err) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MovieNotFound => ERROR_MOVIE_NOT_FOUND,
            AppError::Conflict(_) => "CONFLICT",
            AppError::TicketMismatch => ERROR_TICKET_MISMATCH,
            AppError::Allocation(_) => ERROR_ALLOCATION_FAILED,
            AppError::Database(err) if is_unique_violation(err) => "CONFLICT",
            AppError::Database(_) => "INTERNAL_ERROR",
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Текст ответа по имени нарушенного уникального ограничения.
fn unique_violation_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("uq_seats_movie_position") => "seat is already taken",
        Some("bookings_booking_code_key") => "booking code is already in use",
        _ => "resource already exists",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else if let AppError::Database(sqlx::Error::Database(db)) = &self {
            unique_violation_message(db.constraint()).to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            error_code: self.error_code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_failures_map_to_conflict() {
        let err = AppError::from(AllocationError::InsufficientCapacity {
            requested: 5,
            available: 2,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), ERROR_ALLOCATION_FAILED);

        let err = AppError::from(AllocationError::AllocationExhausted {
            requested: 5,
            allocated: 4,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn malformed_allocation_input_is_bad_request() {
        let err = AppError::from(AllocationError::InvalidRequest("zero".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = AppError::from(AllocationError::InvalidGeometry {
            total_rows: 30,
            seats_per_row: 5,
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn booking_errors_keep_legacy_codes() {
        assert_eq!(AppError::MovieNotFound.error_code(), "ERROR_CODE1");
        assert_eq!(AppError::MovieNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::TicketMismatch.error_code(), "ERROR_CODE2");
        assert_eq!(
            AppError::TicketMismatch.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn infrastructure_errors_are_internal() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unique_violations_name_what_collided() {
        assert_eq!(
            unique_violation_message(Some("uq_seats_movie_position")),
            "seat is already taken"
        );
        assert_eq!(
            unique_violation_message(Some("bookings_booking_code_key")),
            "booking code is already in use"
        );
        assert_eq!(
            unique_violation_message(Some("seat_selection_rules_name_key")),
            "resource already exists"
        );
        assert_eq!(unique_violation_message(None), "resource already exists");
    }
}
