use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{seats_generation_key, seats_key, CacheService};
use crate::allocation::SeatPosition;
use crate::models::OccupiedSeatRow;

// Снимок кладется, только если поколение не менялось с начала чтения из БД.
// Иначе между чтением и SET прошла инвалидация, и снимок уже старый.
const FILL_IF_CURRENT: &str = r#"
    local current = redis.call('GET', KEYS[2]) or '0'
    if current ~= ARGV[1] then
        return 0
    end
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
    return 1
"#;

impl CacheService {
    /// Занятые места фильма для витрины (список свободных мест, WebSocket).
    ///
    /// Для подбора мест этот снимок не годится: он может устареть. Бронирование
    /// читает занятость внутри своей транзакции.
    pub async fn get_occupied_seats(&self, movie_id: Uuid) -> Result<Vec<SeatPosition>, sqlx::Error> {
        if self.enabled() {
            if let Ok(seats) = self.get_seats_from_cache(movie_id).await {
                return Ok(seats);
            }
        }

        // Поколение читается до снимка БД
        let generation = if self.enabled() {
            self.seats_generation(movie_id).await.ok()
        } else {
            None
        };
        let seats = self.load_seats_from_db(movie_id).await?;
        if let Some(generation) = generation {
            let _ = self.save_seats_to_cache(movie_id, generation, &seats).await;
        }
        Ok(seats)
    }

    // Инвалидировать кеш мест
    pub async fn invalidate_seats(&self, movie_id: Uuid) {
        if !self.enabled() {
            return;
        }
        let mut conn = self.redis.conn.clone();
        let result: Result<(), _> = redis::pipe()
            .atomic()
            .incr(seats_generation_key(movie_id), 1)
            .ignore()
            .del(seats_key(movie_id))
            .ignore()
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => info!("Invalidated seats cache for movie {}", movie_id),
            Err(e) => warn!("Failed to invalidate seats cache for movie {}: {:?}", movie_id, e),
        }
    }

    async fn load_seats_from_db(&self, movie_id: Uuid) -> Result<Vec<SeatPosition>, sqlx::Error> {
        let rows = sqlx::query_as::<_, OccupiedSeatRow>(
            "SELECT row_letter, seat_number FROM seats WHERE movie_id = $1 ORDER BY row_letter, seat_number",
        )
        .bind(movie_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows.iter().filter_map(OccupiedSeatRow::position).collect())
    }

    async fn get_seats_from_cache(&self, movie_id: Uuid) -> Result<Vec<SeatPosition>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(seats_key(movie_id)).await?;
        let seats: Vec<SeatPosition> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        debug!("Seats of movie {} served from cache", movie_id);
        Ok(seats)
    }

    async fn seats_generation(&self, movie_id: Uuid) -> Result<u64, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let generation: Option<u64> = conn.get(seats_generation_key(movie_id)).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn save_seats_to_cache(
        &self,
        movie_id: Uuid,
        generation: u64,
        seats: &[SeatPosition],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        let stored: i32 = redis::Script::new(FILL_IF_CURRENT)
            .key(seats_key(movie_id))
            .key(seats_generation_key(movie_id))
            .arg(generation)
            .arg(data)
            .arg(self.settings.seats_ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        if stored == 0 {
            debug!("Seats of movie {} changed while loading, cache fill skipped", movie_id);
        }
        Ok(())
    }
}
