use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use mimalloc::MiMalloc;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{
    config::{Config, LogFormat},
    controllers, AppState,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config);
    info!(
        "Starting cinema booking API ({} environment)",
        config.app.environment
    );

    let addr = config.bind_address();
    let app_state = AppState::new(config).await?;

    let app = Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

// GET /health
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            error!("Health check: database unavailable: {:?}", e);
            false
        }
    };

    let mut conn = state.redis.conn.clone();
    let redis = match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health check: Redis unavailable: {:?}", e);
            false
        }
    };

    // Без Redis сервис работает (кеш - промах), без БД нет
    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "database": database,
            "redis": redis,
        })),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {:?}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
