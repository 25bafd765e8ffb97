use axum::{http::HeaderValue, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwksCache;
use crate::config::Settings;
use crate::middleware::{request_id_layer, X_REQUEST_ID};
use crate::routes;
use crate::services::{AuthProvider, CalendarClient, Mailer, RedisCache, SlackNotifier};

/// Request bodies are small JSON documents; branding logos are URLs.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Settings,
    pub jwks_cache: JwksCache,
    pub cache: RedisCache,
    pub auth_provider: AuthProvider,
    pub mailer: Mailer,
    pub slack: SlackNotifier,
    pub calendar: CalendarClient,
}

impl AppState {
    /// Wire the outbound clients around one shared `reqwest::Client`.
    pub fn new(
        db: PgPool,
        settings: Settings,
        jwks_cache: JwksCache,
        cache: RedisCache,
        http_client: reqwest::Client,
    ) -> Arc<Self> {
        Arc::new(Self {
            auth_provider: AuthProvider::new(http_client.clone(), &settings),
            mailer: Mailer::new(http_client.clone(), &settings),
            slack: SlackNotifier::new(http_client.clone(), settings.slack_webhook_url.clone()),
            calendar: CalendarClient::new(http_client, &settings.business_timezone),
            db,
            settings,
            jwks_cache,
            cache,
        })
    }
}

#[cfg(test)]
impl AppState {
    /// State over `db` with no Redis and unconfigured outbound integrations.
    pub fn for_tests(db: PgPool) -> Arc<Self> {
        let settings = Settings::for_tests();
        let client = reqwest::Client::new();
        let jwks_cache = JwksCache::new(
            client.clone(),
            settings.supabase_jwt_jwks_url.clone(),
            settings.supabase_jwt_issuer.clone(),
            settings.supabase_jwt_audience.clone(),
            60,
        );
        let cache = RedisCache::disabled(std::time::Duration::from_secs(60));
        Self::new(db, settings, jwks_cache, cache, client)
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(&state.settings);

    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Request ID layers
    let (set_request_id, propagate_request_id) = request_id_layer();

    // Build router (routes at root level, no /api prefix)
    Router::new()
        .merge(routes::api_router())
        // Middleware stack (applied bottom-up)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    // Credentials are allowed for the Google token cookie
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static(X_REQUEST_ID),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
