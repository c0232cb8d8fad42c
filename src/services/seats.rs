use tracing::info;
use uuid::Uuid;

use crate::{
    allocation::{OccupancyGrid, SeatPosition},
    cache::CacheService,
    database::{self, Database},
    error::{AppError, AppResult},
    events::{BookingEvent, EventBus},
    models::Seat,
    services::seat_selection::{self, SEAT_COLUMNS},
};

#[derive(Debug, Clone)]
pub struct NewSeat {
    pub booking_id: Uuid,
    pub position: SeatPosition,
}

#[derive(Debug, Clone, Default)]
pub struct SeatChanges {
    pub booking_id: Option<Uuid>,
    pub row_letter: Option<char>,
    pub seat_number: Option<u32>,
}

#[derive(Clone)]
pub struct SeatsService {
    db: Database,
    cache: CacheService,
    events: EventBus,
}

impl SeatsService {
    pub fn new(db: Database, cache: CacheService, events: EventBus) -> Self {
        Self { db, cache, events }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Seat>> {
        let seat = sqlx::query_as::<_, Seat>(&format!("SELECT {} FROM seats WHERE id = $1", SEAT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(seat)
    }

    pub async fn find_by_booking_id(&self, booking_id: Uuid) -> AppResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {} FROM seats WHERE booking_id = $1 ORDER BY row_letter, seat_number",
            SEAT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    pub async fn find_all_for_movie(&self, movie_id: Uuid) -> AppResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {} FROM seats WHERE movie_id = $1 ORDER BY row_letter, seat_number",
            SEAT_COLUMNS
        ))
        .bind(movie_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    pub async fn find_by_position(&self, booking_id: Uuid, position: SeatPosition) -> AppResult<Option<Seat>> {
        let seat = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {} FROM seats WHERE booking_id = $1 AND row_letter = $2 AND seat_number = $3",
            SEAT_COLUMNS
        ))
        .bind(booking_id)
        .bind(position.row_letter.to_string())
        .bind(position.seat_number as i32)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(seat)
    }

    /// Свободно ли место. Места вне зала считаются недоступными.
    pub async fn is_available(&self, movie_id: Uuid, position: SeatPosition) -> AppResult<bool> {
        let movie = self
            .cache
            .get_movie(movie_id)
            .await?
            .ok_or(AppError::MovieNotFound)?;
        let geometry = movie.geometry()?;
        if !geometry.contains(&position) {
            return Ok(false);
        }

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM seats WHERE movie_id = $1 AND row_letter = $2 AND seat_number = $3)",
        )
        .bind(movie_id)
        .bind(position.row_letter.to_string())
        .bind(position.seat_number as i32)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(!taken)
    }

    pub async fn create(&self, seat: NewSeat) -> AppResult<Seat> {
        let mut created = self.create_multiple(vec![seat]).await?;
        created
            .pop()
            .ok_or_else(|| AppError::Conflict("seat was not created".to_string()))
    }

    /// Добавляет места к броням. Все или ничего.
    pub async fn create_multiple(&self, seats: Vec<NewSeat>) -> AppResult<Vec<Seat>> {
        if seats.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.db.begin().await?;

        // booking -> movie
        let mut targets: Vec<(Uuid, Uuid, Vec<SeatPosition>)> = Vec::new();
        for seat in &seats {
            match targets.iter_mut().find(|(b, _, _)| *b == seat.booking_id) {
                Some((_, _, positions)) => positions.push(seat.position),
                None => {
                    let movie_id = seat_selection::booking_movie(&mut tx, seat.booking_id)
                        .await?
                        .ok_or(AppError::NotFound("booking"))?;
                    targets.push((seat.booking_id, movie_id, vec![seat.position]));
                }
            }
        }
        let movie_ids: Vec<Uuid> = targets.iter().map(|(_, movie_id, _)| *movie_id).collect();
        let movies = database::lock_movies(&mut tx, &movie_ids).await?;
        for (booking_id, movie_id, _) in &targets {
            let actual = seat_selection::booking_movie(&mut tx, *booking_id)
                .await?
                .ok_or(AppError::NotFound("booking"))?;
            seat_selection::ensure_locked_movie(*movie_id, actual)?;
        }

        for movie_id in &movies {
            let movie = seat_selection::load_movie(&mut tx, *movie_id)
                .await?
                .ok_or(AppError::MovieNotFound)?;
            let requested: Vec<SeatPosition> = targets
                .iter()
                .filter(|(_, m, _)| m == movie_id)
                .flat_map(|(_, _, positions)| positions.iter().copied())
                .collect();
            let occupied = seat_selection::occupied_seats(&mut tx, *movie_id).await?;
            let grid = OccupancyGrid::from_occupied(movie.geometry()?, &occupied);
            seat_selection::check_requested(&grid, &requested)?;
        }

        let mut created = Vec::with_capacity(seats.len());
        for (booking_id, movie_id, positions) in &targets {
            created.extend(seat_selection::persist_seats(&mut tx, *booking_id, *movie_id, positions).await?);
        }
        tx.commit().await?;

        info!("Created {} seats", created.len());
        self.changed(&movies).await;
        Ok(created)
    }

    /// Переносит место. Занятая позиция - конфликт.
    pub async fn update(&self, id: Uuid, changes: SeatChanges) -> AppResult<Option<Seat>> {
        let mut tx = self.db.begin().await?;

        // Залы блокируются раньше строки места
        let seen = sqlx::query_as::<_, Seat>(&format!("SELECT {} FROM seats WHERE id = $1", SEAT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(seen) = seen else {
            return Ok(None);
        };
        let planned_booking = changes.booking_id.unwrap_or(seen.booking_id);
        let movie_id = if planned_booking == seen.booking_id {
            seen.movie_id
        } else {
            seat_selection::booking_movie(&mut tx, planned_booking)
                .await?
                .ok_or(AppError::NotFound("booking"))?
        };
        let movies = database::lock_movies(&mut tx, &[seen.movie_id, movie_id]).await?;

        let current = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {} FROM seats WHERE id = $1 FOR UPDATE",
            SEAT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };
        seat_selection::ensure_locked_movie(seen.movie_id, current.movie_id)?;
        let booking_id = changes.booking_id.unwrap_or(current.booking_id);
        let target_movie = seat_selection::booking_movie(&mut tx, booking_id)
            .await?
            .ok_or(AppError::NotFound("booking"))?;
        seat_selection::ensure_locked_movie(movie_id, target_movie)?;

        let current_position = current
            .position()
            .ok_or_else(|| AppError::Conflict(format!("seat {} has a malformed position", id)))?;
        let target = SeatPosition::new(
            changes.row_letter.unwrap_or(current_position.row_letter),
            changes.seat_number.unwrap_or(current_position.seat_number),
        );

        let movie = seat_selection::load_movie(&mut tx, movie_id)
            .await?
            .ok_or(AppError::MovieNotFound)?;
        let occupied: Vec<SeatPosition> = seat_selection::occupied_seats(&mut tx, movie_id)
            .await?
            .into_iter()
            .filter(|position| movie_id != current.movie_id || *position != current_position)
            .collect();
        let grid = OccupancyGrid::from_occupied(movie.geometry()?, &occupied);
        seat_selection::check_requested(&grid, &[target])?;

        let seat = sqlx::query_as::<_, Seat>(&format!(
            "UPDATE seats
             SET booking_id = $2, movie_id = $3, row_letter = $4, seat_number = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            SEAT_COLUMNS
        ))
        .bind(id)
        .bind(booking_id)
        .bind(movie_id)
        .bind(target.row_letter.to_string())
        .bind(target.seat_number as i32)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        self.changed(&movies).await;
        Ok(Some(seat))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let movie_id = sqlx::query_scalar::<_, Uuid>("DELETE FROM seats WHERE id = $1 RETURNING movie_id")
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        match movie_id {
            Some(movie_id) => {
                self.changed(&[movie_id]).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Снимает все места брони. Возвращает число удаленных.
    pub async fn delete_by_booking_id(&self, booking_id: Uuid) -> AppResult<u64> {
        let movies = sqlx::query_scalar::<_, Uuid>("DELETE FROM seats WHERE booking_id = $1 RETURNING movie_id")
            .bind(booking_id)
            .fetch_all(&self.db.pool)
            .await?;
        let deleted = movies.len() as u64;

        let mut movies = movies;
        movies.sort();
        movies.dedup();
        self.changed(&movies).await;
        info!("Deleted {} seats of booking {}", deleted, booking_id);
        Ok(deleted)
    }

    async fn changed(&self, movies: &[Uuid]) {
        for movie_id in movies {
            self.cache.invalidate_seats(*movie_id).await;
            self.events
                .publish(BookingEvent::SeatsChanged { movie_id: *movie_id })
                .await;
        }
    }
}
