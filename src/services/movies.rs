use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    allocation::{OccupancyGrid, SeatPosition, TheaterGeometry},
    cache::{movies::MOVIE_COLUMNS, CacheService},
    database::{self, Database},
    error::{AppError, AppResult},
    events::{BookingEvent, EventBus},
    models::{Movie, RowOrder},
};

#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub total_rows: u32,
    pub seats_per_row: u32,
    pub sort: RowOrder,
}

#[derive(Debug, Clone)]
pub struct MovieUpdate {
    pub title: String,
    pub total_rows: u32,
    pub seats_per_row: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSeat {
    pub row: String,
    pub seat_number: u32,
}

/// Снимок зала для WebSocket-клиентов.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub movie_id: Uuid,
    pub total_rows: u32,
    pub seats_per_row: u32,
    pub taken: usize,
    pub available: Vec<SeatPosition>,
}

#[derive(Clone)]
pub struct MoviesService {
    db: Database,
    cache: CacheService,
    events: EventBus,
}

impl MoviesService {
    pub fn new(db: Database, cache: CacheService, events: EventBus) -> Self {
        Self { db, cache, events }
    }

    pub async fn find_all(&self) -> AppResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies ORDER BY created_at",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(movies)
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Movie>> {
        Ok(self.cache.get_movie(id).await?)
    }

    pub async fn find_by_title(&self, title: &str) -> AppResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies WHERE title = $1 ORDER BY created_at LIMIT 1",
            MOVIE_COLUMNS
        ))
        .bind(title)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(movie)
    }

    pub async fn create(&self, new_movie: NewMovie) -> AppResult<Movie> {
        TheaterGeometry::new(new_movie.total_rows, new_movie.seats_per_row)?;

        let movie = sqlx::query_as::<_, Movie>(&format!(
            "INSERT INTO movies (id, title, total_rows, seats_per_row, sort)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            MOVIE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_movie.title)
        .bind(new_movie.total_rows as i32)
        .bind(new_movie.seats_per_row as i32)
        .bind(new_movie.sort.as_str())
        .fetch_one(&self.db.pool)
        .await?;

        info!("Created movie {} ({})", movie.id, movie.title);
        Ok(movie)
    }

    /// Обновляет фильм. Уменьшить зал так, что проданные места окажутся вне его, нельзя.
    pub async fn update(&self, id: Uuid, update: MovieUpdate) -> AppResult<Option<Movie>> {
        TheaterGeometry::new(update.total_rows, update.seats_per_row)?;

        let mut tx = self.db.begin().await?;
        database::lock_movie(&mut tx, id).await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Ok(None);
        }

        let stranded = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM seats
             WHERE movie_id = $1
               AND (ascii(row_letter) - 65 >= $2 OR seat_number > $3)",
        )
        .bind(id)
        .bind(update.total_rows as i32)
        .bind(update.seats_per_row as i32)
        .fetch_one(&mut *tx)
        .await?;
        if stranded > 0 {
            return Err(AppError::Conflict(format!(
                "{} booked seats would fall outside of the new layout",
                stranded
            )));
        }

        let movie = sqlx::query_as::<_, Movie>(&format!(
            "UPDATE movies
             SET title = $2, total_rows = $3, seats_per_row = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .bind(&update.title)
        .bind(update.total_rows as i32)
        .bind(update.seats_per_row as i32)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.cache.invalidate_movie(id).await;
        self.events.publish(BookingEvent::SeatsChanged { movie_id: id }).await;
        Ok(Some(movie))
    }

    /// Удаляет фильм без бронирований. false, если фильма нет.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        database::lock_movie(&mut tx, id).await?;

        let bookings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE movie_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if bookings > 0 {
            return Err(AppError::Conflict(format!(
                "movie has {} bookings and cannot be deleted",
                bookings
            )));
        }

        let deleted = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;

        if deleted {
            self.cache.invalidate_movie(id).await;
            self.cache.invalidate_seats(id).await;
            info!("Deleted movie {}", id);
        }
        Ok(deleted)
    }

    /// Свободные места; ряды в порядке, заданном у фильма.
    pub async fn available_seats(&self, id: Uuid) -> AppResult<Vec<AvailableSeat>> {
        let movie = self.find_by_id(id).await?.ok_or(AppError::MovieNotFound)?;
        let grid = self.occupancy(&movie).await?;
        Ok(list_available(&grid, movie.row_order()))
    }

    pub async fn seat_map(&self, id: Uuid) -> AppResult<SeatMap> {
        let movie = self.find_by_id(id).await?.ok_or(AppError::MovieNotFound)?;
        let grid = self.occupancy(&movie).await?;
        let geometry = grid.geometry();
        Ok(SeatMap {
            movie_id: movie.id,
            total_rows: geometry.total_rows(),
            seats_per_row: geometry.seats_per_row(),
            taken: grid.taken_count(),
            available: grid.available(),
        })
    }

    async fn occupancy(&self, movie: &Movie) -> AppResult<OccupancyGrid> {
        let geometry = movie.geometry()?;
        let occupied = self.cache.get_occupied_seats(movie.id).await?;
        Ok(OccupancyGrid::from_occupied(geometry, &occupied))
    }
}

fn list_available(grid: &OccupancyGrid, order: RowOrder) -> Vec<AvailableSeat> {
    order
        .row_letters(grid.geometry().total_rows() as i32)
        .into_iter()
        .flat_map(|letter| {
            let row = (letter as u8 - b'A') as usize;
            grid.free_seats(row).into_iter().map(move |seat_number| AvailableSeat {
                row: letter.to_string(),
                seat_number,
            })
        })
        .collect()
}
