use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use metaforge::config;
use metaforge::engine::Engine;
use metaforge::schema::builtin::builtin_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cfg = config::config();
    tracing::info!("Starting metaforge in {:?} mode", cfg.environment);

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.database.connect_timeout_secs))
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    let registry = builtin_registry().context("builtin schema catalog is invalid")?;
    let engine = Engine::compile(registry, pool).context("failed to compile schemas")?;

    // Storage must match the compiled definitions before any request is
    // accepted; a drifted table aborts startup.
    engine.prepare_storage().await.context("storage preparation failed")?;

    let app = engine.router();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("metaforge listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
