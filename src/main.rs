mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::{Context, Result};
use std::time::Duration;

use services::RedisCache;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting serenity-scheduler"
    );

    // Create database pool and bring the schema up to date
    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Create Redis cache (no-op without REDIS_URL)
    let cache = RedisCache::new(settings.redis_url.as_deref(), settings.redis_cache_ttl_seconds).await?;
    tracing::info!(enabled = cache.is_enabled(), "Redis cache initialized");

    // One HTTP client for Supabase, Resend, Google Calendar and Slack
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.outbound_timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    // Create JWKS cache for JWT verification
    let jwks_cache = auth::JwksCache::new(
        http_client.clone(),
        settings.supabase_jwt_jwks_url.clone(),
        settings.supabase_jwt_issuer.clone(),
        settings.supabase_jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    );

    // Optionally warm the JWKS cache
    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), jwks_cache, cache, http_client);
    if !state.mailer.is_configured() {
        tracing::warn!("RESEND_API_KEY not set, confirmation and 2FA emails will be skipped");
    }

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
