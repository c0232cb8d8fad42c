use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub type Tx = Transaction<'static, Postgres>;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed");
        Ok(())
    }

    pub async fn begin(&self) -> Result<Tx, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Блокировка зала до конца транзакции.
///
/// Все изменения мест одного фильма (чтение занятости -> подбор -> запись)
/// выполняются под этой блокировкой, иначе два параллельных бронирования
/// увидят один и тот же снимок и займут одни и те же кресла.
pub async fn lock_movie(tx: &mut Tx, movie_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(movie_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Блокирует несколько залов. Порядок всегда по возрастанию id, иначе два
/// встречных переноса между фильмами взаимоблокируются.
pub async fn lock_movies(tx: &mut Tx, movie_ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
    let ordered = lock_order(movie_ids);
    for movie_id in &ordered {
        lock_movie(tx, *movie_id).await?;
    }
    Ok(ordered)
}

fn lock_order(movie_ids: &[Uuid]) -> Vec<Uuid> {
    let mut ordered = movie_ids.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movies_are_locked_once_in_ascending_order() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        assert_eq!(lock_order(&[high, low, high]), vec![low, high]);
        assert_eq!(lock_order(&[low, high]), lock_order(&[high, low]));
        assert!(lock_order(&[]).is_empty());
    }
}
