// src/main.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use survey_backend::{
    config::Config,
    routes,
    state::AppState,
    store::{MemoryStore, PgStore, SurveyStore},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn SurveyStore> = match &config.database_url {
        Some(database_url) => Arc::new(connect(database_url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, keeping surveys in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, config.clone());
    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects with retry and applies pending migrations.
async fn connect(database_url: &str) -> Result<PgStore, BoxError> {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(format!("Failed to connect to database after 5 retries: {}", e).into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected...");

    let store = PgStore::new(pool);
    tracing::info!("Running migrations...");
    store.migrate().await?;
    tracing::info!("Migrations applied successfully.");
    Ok(store)
}
