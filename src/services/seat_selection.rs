//! Связка аллокатора с БД.
//!
//! Контракт: все функции здесь вызываются внутри транзакции, которая уже держит
//! `database::lock_movie` для фильма. Только так снимок занятости остается
//! верным до записи новых мест.
//!
//! Порядок блокировок везде один: сначала блокировка зала, потом строки
//! (`FOR UPDATE`, вставка с проверкой внешнего ключа). Фильм брони или места
//! читается без блокировки, а после `lock_movie` сверяется заново.

use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::{
    allocation::{self, OccupancyGrid, SeatPosition, TheaterGeometry},
    cache::movies::MOVIE_COLUMNS,
    database::Tx,
    error::{AppError, AppResult},
    models::{Movie, OccupiedSeatRow, Seat},
};

pub(crate) const SEAT_COLUMNS: &str =
    "id, booking_id, movie_id, row_letter, seat_number, created_at, updated_at";

/// Фильм, прочитанный в той же транзакции.
pub async fn load_movie(tx: &mut Tx, movie_id: Uuid) -> Result<Option<Movie>, sqlx::Error> {
    sqlx::query_as::<_, Movie>(&format!("SELECT {} FROM movies WHERE id = $1", MOVIE_COLUMNS))
        .bind(movie_id)
        .fetch_optional(&mut **tx)
        .await
}

/// Снимок занятых мест фильма внутри транзакции.
/// Фильм брони без блокировки строки.
pub async fn booking_movie(tx: &mut Tx, booking_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT movie_id FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn occupied_seats(tx: &mut Tx, movie_id: Uuid) -> Result<Vec<SeatPosition>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OccupiedSeatRow>(
        "SELECT row_letter, seat_number FROM seats WHERE movie_id = $1",
    )
    .bind(movie_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.iter().filter_map(OccupiedSeatRow::position).collect())
}

/// Подбирает места автоматически и сохраняет их за бронью.
pub async fn allocate_seats(
    tx: &mut Tx,
    geometry: &TheaterGeometry,
    movie_id: Uuid,
    booking_id: Uuid,
    num_tickets: u32,
    anchor: Option<SeatPosition>,
) -> AppResult<Vec<Seat>> {
    let occupied = occupied_seats(tx, movie_id).await?;
    let positions = allocation::allocate(geometry, &occupied, num_tickets, anchor)?;
    debug!(
        "Allocated {} seats for booking {}: {}",
        positions.len(),
        booking_id,
        positions.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    );
    Ok(persist_seats(tx, booking_id, movie_id, &positions).await?)
}

/// Сохраняет явно выбранные места после проверки.
pub async fn assign_seats(
    tx: &mut Tx,
    geometry: &TheaterGeometry,
    movie_id: Uuid,
    booking_id: Uuid,
    requested: &[SeatPosition],
) -> AppResult<Vec<Seat>> {
    let occupied = occupied_seats(tx, movie_id).await?;
    let grid = OccupancyGrid::from_occupied(*geometry, &occupied);
    check_requested(&grid, requested)?;
    Ok(persist_seats(tx, booking_id, movie_id, requested).await?)
}

/// Явно запрошенные места: в пределах зала, без повторов, свободны.
pub fn check_requested(grid: &OccupancyGrid, requested: &[SeatPosition]) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(requested.len());
    for position in requested {
        if !grid.geometry().contains(position) {
            return Err(AppError::Validation(format!(
                "seat {} is outside of the theater",
                position
            )));
        }
        if !seen.insert(*position) {
            return Err(AppError::Validation(format!(
                "seat {} is requested more than once",
                position
            )));
        }
        if grid.is_taken(position) {
            return Err(AppError::Conflict(format!("seat {} is already taken", position)));
        }
    }
    Ok(())
}

/// Запись успела переехать в другой фильм между чтением и блокировкой.
pub fn ensure_locked_movie(locked: Uuid, actual: Uuid) -> AppResult<()> {
    if locked == actual {
        Ok(())
    } else {
        Err(AppError::Conflict(
            "booking was moved to another movie concurrently, retry the request".to_string(),
        ))
    }
}

pub async fn persist_seats(
    tx: &mut Tx,
    booking_id: Uuid,
    movie_id: Uuid,
    positions: &[SeatPosition],
) -> Result<Vec<Seat>, sqlx::Error> {
    if positions.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "INSERT INTO seats (id, booking_id, movie_id, row_letter, seat_number) ",
    );
    query.push_values(positions, |mut row, position| {
        row.push_bind(Uuid::new_v4())
            .push_bind(booking_id)
            .push_bind(movie_id)
            .push_bind(position.row_letter.to_string())
            .push_bind(position.seat_number as i32);
    });
    query.push(" RETURNING ");
    query.push(SEAT_COLUMNS);

    query.build_query_as::<Seat>().fetch_all(&mut **tx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> OccupancyGrid {
        let geometry = TheaterGeometry::new(3, 5).unwrap();
        OccupancyGrid::from_occupied(geometry, [SeatPosition::new('B', 2)])
    }

    #[test]
    fn free_in_bounds_seats_pass() {
        let requested = [SeatPosition::new('A', 1), SeatPosition::new('C', 5)];
        assert!(check_requested(&grid(), &requested).is_ok());
    }

    #[test]
    fn taken_seat_is_a_conflict() {
        let err = check_requested(&grid(), &[SeatPosition::new('B', 2)]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn outside_and_duplicate_seats_are_invalid() {
        let err = check_requested(&grid(), &[SeatPosition::new('D', 1)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let twice = [SeatPosition::new('A', 1), SeatPosition::new('A', 1)];
        let err = check_requested(&grid(), &twice).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn moved_record_is_a_conflict() {
        let locked = Uuid::from_u128(7);
        assert!(ensure_locked_movie(locked, locked).is_ok());
        let err = ensure_locked_movie(locked, Uuid::from_u128(8)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
