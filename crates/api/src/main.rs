//! Helpdesk API server

use std::sync::Arc;

use anyhow::Context;
use helpdesk_api::{
    auth::{JwtManager, RedisRevocationStore},
    create_router,
    store::{PgAccountDirectory, PgCommentStore},
    websocket::Hub,
    AppState, Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("helpdesk_api=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().with_target(true).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(bind_address = %config.bind_address, "Starting helpdesk API");

    let pool = helpdesk_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    let revocations = RedisRevocationStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;

    let jwt_manager = JwtManager::new(
        &config.jwt_secret,
        time::Duration::minutes(config.access_token_ttl_minutes),
        time::Duration::days(config.refresh_token_ttl_days),
        Arc::new(revocations),
    )
    .with_revocation_fail_open(config.revocation_fail_open);
    if config.revocation_fail_open {
        tracing::warn!("Revocation store failures will be treated as 'not revoked'");
    }

    let hub = Hub::spawn();
    let bind_address = config.bind_address.clone();

    let state = AppState::new(
        config,
        jwt_manager,
        hub,
        Arc::new(PgAccountDirectory::new(pool.clone())),
        Arc::new(PgCommentStore::new(pool)),
    )
    .context("Invalid refresh mask key")?;

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
