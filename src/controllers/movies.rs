use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    error::{AppError, AppResult},
    models::RowOrder,
    services::movies::{MovieUpdate, NewMovie},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/movies/{id}/available-seats", get(available_seats))
}

#[derive(Debug, Deserialize)]
struct MovieFilter {
    title: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateMovieRequest {
    #[validate(length(min = 1, max = 255))]
    title: String,
    #[validate(range(min = 1, max = 26))]
    total_rows: u32,
    #[validate(range(min = 1, max = 50))]
    seats_per_row: u32,
    #[validate(custom(function = "validate_sort"))]
    sort: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateMovieRequest {
    #[validate(length(min = 1, max = 255))]
    title: String,
    #[validate(range(min = 1, max = 26))]
    total_rows: u32,
    #[validate(range(min = 1, max = 50))]
    seats_per_row: u32,
}

fn validate_sort(value: &str) -> Result<(), ValidationError> {
    match RowOrder::parse(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("sort").with_message("sort must be 'asc' or 'desc'".into())),
    }
}

// GET /api/movies?title=...
async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MovieFilter>,
) -> AppResult<impl IntoResponse> {
    let movies: Vec<_> = match filter.title {
        Some(title) => state.movies.find_by_title(&title).await?.into_iter().collect(),
        None => state.movies.find_all().await?,
    };
    Ok(Json(movies))
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let movie = state.movies.find_by_id(id).await?.ok_or(AppError::MovieNotFound)?;
    Ok(Json(movie))
}

// POST /api/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMovieRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let sort = req
        .sort
        .as_deref()
        .and_then(RowOrder::parse)
        .unwrap_or_default();
    let movie = state
        .movies
        .create(NewMovie {
            title: req.title,
            total_rows: req.total_rows,
            seats_per_row: req.seats_per_row,
            sort,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(movie)))
}

// PUT /api/movies/{id}
async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMovieRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let movie = state
        .movies
        .update(
            id,
            MovieUpdate {
                title: req.title,
                total_rows: req.total_rows,
                seats_per_row: req.seats_per_row,
            },
        )
        .await?
        .ok_or(AppError::MovieNotFound)?;
    Ok(Json(movie))
}

// DELETE /api/movies/{id}
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    if state.movies.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::MovieNotFound)
    }
}

// GET /api/movies/{id}/available-seats
async fn available_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.movies.available_seats(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, total_rows: u32, seats_per_row: u32, sort: Option<&str>) -> CreateMovieRequest {
        CreateMovieRequest {
            title: title.to_string(),
            total_rows,
            seats_per_row,
            sort: sort.map(str::to_string),
        }
    }

    #[test]
    fn movie_bounds_are_validated() {
        assert!(request("Solaris", 26, 50, None).validate().is_ok());
        assert!(request("Solaris", 10, 10, Some("asc")).validate().is_ok());
        assert!(request("", 10, 10, None).validate().is_err());
        assert!(request(&"x".repeat(256), 10, 10, None).validate().is_err());
        assert!(request("Solaris", 0, 10, None).validate().is_err());
        assert!(request("Solaris", 27, 10, None).validate().is_err());
        assert!(request("Solaris", 10, 51, None).validate().is_err());
        assert!(request("Solaris", 10, 10, Some("sideways")).validate().is_err());
    }

    #[test]
    fn create_request_reads_camel_case() {
        let req: CreateMovieRequest =
            serde_json::from_str(r#"{"title":"Stalker","totalRows":5,"seatsPerRow":8}"#).unwrap();
        assert_eq!(req.total_rows, 5);
        assert_eq!(req.seats_per_row, 8);
        assert!(req.sort.is_none());
    }
}
