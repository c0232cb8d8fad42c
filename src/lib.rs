pub mod allocation;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod events;
pub mod models;
pub mod redis_client;
pub mod services;

use anyhow::Context;
use std::sync::Arc;
use tokio::task;
use tracing::info;

use crate::{
    cache::CacheService,
    config::Config,
    database::Database,
    events::EventBus,
    redis_client::RedisClient,
    services::{BookingsService, MoviesService, RulesService, SeatsService},
};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub redis: RedisClient,
    pub cache: CacheService,
    pub events: EventBus,
    pub config: Config,
    pub movies: MoviesService,
    pub bookings: BookingsService,
    pub seats: SeatsService,
    pub rules: RulesService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let db = Database::new(&config.database.url, config.database.pool_size)
            .await
            .context("failed to connect to database")?;
        info!("Database connected");

        db.run_migrations().await.context("failed to run migrations")?;
        info!("Migrations applied");

        let redis = RedisClient::new(&config.redis.url)
            .await
            .context("failed to connect to Redis")?;
        info!("Redis connected");

        let cache = CacheService::new(redis.clone(), db.clone(), config.cache.clone());
        let events = if config.events.distributed {
            EventBus::distributed(redis.clone(), config.events.channel.clone())
        } else {
            EventBus::local()
        };

        let rules = RulesService::new(db.clone());
        rules
            .initialize_default_rules()
            .await
            .context("failed to seed seat selection rules")?;

        let state = Arc::new(Self {
            movies: MoviesService::new(db.clone(), cache.clone(), events.clone()),
            bookings: BookingsService::new(db.clone(), cache.clone(), events.clone()),
            seats: SeatsService::new(db.clone(), cache.clone(), events.clone()),
            rules,
            db,
            redis,
            cache,
            events,
            config,
        });

        if state.events.is_distributed() {
            info!("Distributed events enabled on '{}'", state.config.events.channel);
            task::spawn(events::run_subscriber(state.events.clone(), state.cache.clone()));
        }

        let state_for_bg = state.clone();
        task::spawn(async move {
            // Warmup cache в фоне
            state_for_bg.cache.warmup_cache().await;
        });

        Ok(state)
    }
}
