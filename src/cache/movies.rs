use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use super::{movie_key, CacheService};
use crate::models::Movie;

pub(crate) const MOVIE_COLUMNS: &str =
    "id, title, total_rows, seats_per_row, sort, created_at, updated_at";

impl CacheService {
    /// Фильм по id: сначала кеш, потом БД.
    pub async fn get_movie(&self, movie_id: Uuid) -> Result<Option<Movie>, sqlx::Error> {
        if self.enabled() {
            if let Ok(movie) = self.get_movie_from_cache(movie_id).await {
                return Ok(Some(movie));
            }
        }

        let movie = self.load_movie_from_db(movie_id).await?;
        if let Some(ref movie) = movie {
            let _ = self.save_movie_to_cache(movie).await;
        }
        Ok(movie)
    }

    pub async fn invalidate_movie(&self, movie_id: Uuid) {
        if !self.enabled() {
            return;
        }
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(movie_key(movie_id)).await;
        info!("Invalidated movie cache for {}", movie_id);
    }

    // === Работа с БД ===

    pub(super) async fn load_all_movies_from_db(&self) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies ORDER BY created_at",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await
    }

    async fn load_movie_from_db(&self, movie_id: Uuid) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!("SELECT {} FROM movies WHERE id = $1", MOVIE_COLUMNS))
            .bind(movie_id)
            .fetch_optional(&self.db.pool)
            .await
    }

    // === Работа с кешем ===

    async fn get_movie_from_cache(&self, movie_id: Uuid) -> Result<Movie, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(movie_key(movie_id)).await?;
        let movie: Movie = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        debug!("Movie {} served from cache", movie_id);
        Ok(movie)
    }

    pub(super) async fn save_movie_to_cache(&self, movie: &Movie) -> Result<(), redis::RedisError> {
        if !self.enabled() {
            return Ok(());
        }
        let data = serde_json::to_string(movie).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(movie_key(movie.id), data, self.settings.movie_ttl_seconds).await
    }
}
