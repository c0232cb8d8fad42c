use crate::{config::CacheConfig, database::Database, redis_client::RedisClient};
use tracing::info;

pub mod movies;
pub mod seats;

/// Кеш поверх Redis. Любая ошибка Redis означает промах: идем в БД.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
    settings: CacheConfig,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database, settings: CacheConfig) -> Self {
        Self { redis, db, settings }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        if !self.enabled() {
            return;
        }
        info!("Starting cache warmup...");

        match self.load_all_movies_from_db().await {
            Ok(movies) => {
                info!("Loaded {} movies", movies.len());
                for movie in &movies {
                    let _ = self.save_movie_to_cache(movie).await;
                    let _ = self.get_occupied_seats(movie.id).await;
                }
            }
            Err(e) => tracing::warn!("Cache warmup skipped: {:?}", e),
        }

        info!("Cache warmup done");
    }
}

fn movie_key(movie_id: uuid::Uuid) -> String {
    format!("movie:{}", movie_id)
}

fn seats_key(movie_id: uuid::Uuid) -> String {
    format!("seats:{}", movie_id)
}

// Счетчик инвалидаций снимка мест
fn seats_generation_key(movie_id: uuid::Uuid) -> String {
    format!("seats-generation:{}", movie_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn cache_keys_are_per_movie() {
        let first = Uuid::from_u128(1);
        let second = Uuid::from_u128(2);
        assert_eq!(seats_key(first), format!("seats:{}", first));
        assert_ne!(seats_key(first), seats_key(second));
        assert_ne!(seats_generation_key(first), seats_generation_key(second));
        assert_ne!(seats_generation_key(first), seats_key(first));
        assert_ne!(movie_key(first), seats_key(first));
    }
}
