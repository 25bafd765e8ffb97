use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub redis: String,
}

/// Overall status from the individual probes; only the database is critical.
fn overall_status(database_ok: bool, redis: &str) -> &'static str {
    match (database_ok, redis) {
        (false, _) => "unhealthy",
        (true, "ok") => "healthy",
        (true, _) => "degraded",
    }
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, redis_result) =
        tokio::join!(db::health_check(&state.db), state.cache.health_check());

    let redis_status = match redis_result {
        Ok(()) => "ok",
        Err(_) if !state.cache.is_enabled() => "disabled",
        Err(_) => "error",
    };
    let status = overall_status(db_ok, redis_status);

    let status_code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: if db_ok { "ok" } else { "error" }.to_string(),
                redis: redis_status.to_string(),
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_outage_is_unhealthy() {
        assert_eq!(overall_status(false, "ok"), "unhealthy");
        assert_eq!(overall_status(true, "ok"), "healthy");
        assert_eq!(overall_status(true, "error"), "degraded");
        assert_eq!(overall_status(true, "disabled"), "degraded");
    }
}
