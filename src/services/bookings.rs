//! Бронирования.
//!
//! Создание и изменение брони идут одной транзакцией под блокировкой фильма:
//! блокировка -> проверка фильма -> снимок занятости -> подбор или проверка мест -> запись.
//! Если подобрать места не удалось, транзакция откатывается и брони не остается.

use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::{
    allocation::SeatPosition,
    cache::CacheService,
    database::{self, Database, Tx},
    error::{AppError, AppResult},
    events::{BookingEvent, EventBus},
    models::{Booking, BookingWithSeats, Seat},
    services::seat_selection::{self, SEAT_COLUMNS},
};

const BOOKING_COLUMNS: &str = "id, booking_code, movie_id, num_tickets, created_at, updated_at";
const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const BOOKING_CODE_LEN: usize = 6;
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub movie_id: Uuid,
    pub num_tickets: u32,
    /// Пусто - места подбираются автоматически.
    pub seats: Vec<SeatPosition>,
    pub starting_position: Option<SeatPosition>,
}

#[derive(Debug, Clone)]
pub struct BookingUpdate {
    pub booking_code: String,
    pub movie_id: Uuid,
    pub num_tickets: u32,
    pub seats: Vec<SeatPosition>,
    /// Переподобрать места, если явные места не переданы.
    pub update_seats: bool,
    pub starting_position: Option<SeatPosition>,
}

/// Шесть символов A-Z0-9.
pub fn generate_booking_code() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(BOOKING_CODE_LEN)
        .map(|byte| CODE_ALPHABET[*byte as usize % CODE_ALPHABET.len()] as char)
        .collect()
}

#[derive(Clone)]
pub struct BookingsService {
    db: Database,
    cache: CacheService,
    events: EventBus,
}

impl BookingsService {
    pub fn new(db: Database, cache: CacheService, events: EventBus) -> Self {
        Self { db, cache, events }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(booking)
    }

    pub async fn find_by_booking_code(&self, code: &str) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE booking_code = $1",
            BOOKING_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(booking)
    }

    pub async fn find_by_movie_id(&self, movie_id: Uuid) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE movie_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(movie_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(bookings)
    }

    pub async fn find_all(&self) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(bookings)
    }

    pub async fn find_all_with_seats(&self) -> AppResult<Vec<BookingWithSeats>> {
        let bookings = self.find_all().await?;
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {} FROM seats ORDER BY row_letter, seat_number",
            SEAT_COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await?;

        let mut by_booking: BTreeMap<Uuid, Vec<Seat>> = BTreeMap::new();
        for seat in seats {
            by_booking.entry(seat.booking_id).or_default().push(seat);
        }

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let seats = by_booking.remove(&booking.id).unwrap_or_default();
                BookingWithSeats { booking, seats }
            })
            .collect())
    }

    pub async fn find_by_id_with_seats(&self, id: Uuid) -> AppResult<Option<BookingWithSeats>> {
        match self.find_by_id(id).await? {
            Some(booking) => Ok(Some(self.with_seats(booking).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_booking_code_with_seats(&self, code: &str) -> AppResult<Option<BookingWithSeats>> {
        match self.find_by_booking_code(code).await? {
            Some(booking) => Ok(Some(self.with_seats(booking).await?)),
            None => Ok(None),
        }
    }

    pub async fn booking_seats(&self, booking_id: Uuid) -> AppResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {} FROM seats WHERE booking_id = $1 ORDER BY row_letter, seat_number",
            SEAT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn with_seats(&self, booking: Booking) -> AppResult<BookingWithSeats> {
        let seats = self.booking_seats(booking.id).await?;
        Ok(BookingWithSeats { booking, seats })
    }

    pub async fn create(&self, request: NewBooking) -> AppResult<BookingWithSeats> {
        let mut tx = self.db.begin().await?;

        // Размер зала читаем уже под блокировкой: параллельное уменьшение зала
        // или удаление фильма ждут нас
        database::lock_movie(&mut tx, request.movie_id).await?;
        let movie = seat_selection::load_movie(&mut tx, request.movie_id)
            .await?
            .ok_or(AppError::MovieNotFound)?;
        if !request.seats.is_empty() && request.seats.len() != request.num_tickets as usize {
            return Err(AppError::TicketMismatch);
        }
        let geometry = movie.geometry()?;

        let booking_code = unused_booking_code(&mut tx).await?;
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (id, booking_code, movie_id, num_tickets)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&booking_code)
        .bind(movie.id)
        .bind(request.num_tickets as i32)
        .fetch_one(&mut *tx)
        .await?;

        let seats = if request.seats.is_empty() {
            seat_selection::allocate_seats(
                &mut tx,
                &geometry,
                movie.id,
                booking.id,
                request.num_tickets,
                request.starting_position,
            )
            .await?
        } else {
            seat_selection::assign_seats(&mut tx, &geometry, movie.id, booking.id, &request.seats)
                .await?
        };

        tx.commit().await?;

        info!(
            "Booking {} ({}) created for movie {} with {} seats",
            booking.id,
            booking.booking_code,
            movie.id,
            seats.len()
        );
        self.cache.invalidate_seats(movie.id).await;
        self.events
            .publish(BookingEvent::Created {
                booking_id: booking.id,
                movie_id: movie.id,
                seats: positions(&seats),
            })
            .await;

        Ok(BookingWithSeats { booking, seats })
    }

    /// Изменяет бронь. None, если брони нет.
    ///
    /// Число билетов всегда должно совпадать с числом мест: либо передаются новые
    /// места, либо `update_seats` просит подобрать их заново, либо старые места
    /// остаются и их количество не меняется.
    pub async fn update(&self, id: Uuid, request: BookingUpdate) -> AppResult<Option<BookingWithSeats>> {
        let mut tx = self.db.begin().await?;

        let Some(current_movie) = seat_selection::booking_movie(&mut tx, id).await? else {
            return Ok(None);
        };
        let locked = database::lock_movies(&mut tx, &[current_movie, request.movie_id]).await?;

        let current = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };
        seat_selection::ensure_locked_movie(current_movie, current.movie_id)?;

        let movie = seat_selection::load_movie(&mut tx, request.movie_id)
            .await?
            .ok_or(AppError::MovieNotFound)?;
        let geometry = movie.geometry()?;

        let replace_seats = !request.seats.is_empty() || request.update_seats;
        if !request.seats.is_empty() && request.seats.len() != request.num_tickets as usize {
            return Err(AppError::TicketMismatch);
        }
        if !replace_seats {
            if current.movie_id != movie.id {
                return Err(AppError::Validation(
                    "seats must be provided when moving a booking to another movie".to_string(),
                ));
            }
            let held = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seats WHERE booking_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            if held != request.num_tickets as i64 {
                return Err(AppError::TicketMismatch);
            }
        }

        if replace_seats {
            sqlx::query("DELETE FROM seats WHERE booking_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if request.seats.is_empty() {
                seat_selection::allocate_seats(
                    &mut tx,
                    &geometry,
                    movie.id,
                    id,
                    request.num_tickets,
                    request.starting_position,
                )
                .await?;
            } else {
                seat_selection::assign_seats(&mut tx, &geometry, movie.id, id, &request.seats)
                    .await?;
            }
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings
             SET booking_code = $2, movie_id = $3, num_tickets = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(&request.booking_code)
        .bind(movie.id)
        .bind(request.num_tickets as i32)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        for movie_id in &locked {
            self.cache.invalidate_seats(*movie_id).await;
        }
        let updated = self.with_seats(booking).await?;
        if current.movie_id != movie.id {
            self.events
                .publish(BookingEvent::SeatsChanged {
                    movie_id: current.movie_id,
                })
                .await;
        }
        self.events
            .publish(BookingEvent::Updated {
                booking_id: id,
                movie_id: movie.id,
                seats: positions(&updated.seats),
            })
            .await;
        info!("Booking {} updated", id);

        Ok(Some(updated))
    }

    /// Удаляет бронь вместе с местами. false, если брони нет.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        let Some(movie_id) = seat_selection::booking_movie(&mut tx, id).await? else {
            return Ok(false);
        };
        database::lock_movie(&mut tx, movie_id).await?;

        let locked = sqlx::query_scalar::<_, Uuid>("SELECT movie_id FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(locked) = locked else {
            return Ok(false);
        };
        seat_selection::ensure_locked_movie(movie_id, locked)?;

        sqlx::query("DELETE FROM seats WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;

        if deleted {
            info!("Booking {} deleted", id);
            self.cache.invalidate_seats(movie_id).await;
            self.events
                .publish(BookingEvent::Deleted {
                    booking_id: id,
                    movie_id,
                })
                .await;
        }
        Ok(deleted)
    }
}

async fn unused_booking_code(tx: &mut Tx) -> AppResult<String> {
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_booking_code();
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE booking_code = $1)",
        )
        .bind(&code)
        .fetch_one(&mut **tx)
        .await?;
        if !taken {
            return Ok(code);
        }
    }
    Err(AppError::Conflict("could not generate a unique booking code".to_string()))
}

fn positions(seats: &[Seat]) -> Vec<SeatPosition> {
    seats.iter().filter_map(Seat::position).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_codes_are_six_alphanumerics() {
        for _ in 0..100 {
            let code = generate_booking_code();
            assert_eq!(code.len(), BOOKING_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn booking_codes_vary() {
        let first = generate_booking_code();
        let differs = (0..20).any(|_| generate_booking_code() != first);
        assert!(differs);
    }
}
