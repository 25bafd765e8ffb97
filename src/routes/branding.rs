//! Branding routes
//!
//! The public site reads branding on every page load, so reads go through the
//! cache and the admin write refreshes it.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAdmin;
use crate::domain::branding::{BrandingSettings, BrandingUpdate, BRANDING_KEY};
use crate::error::ApiError;
use crate::services::cache::{keys as cache_keys, ttl as cache_ttl};

/// Stored branding, or the defaults when nothing valid is saved.
async fn stored_branding(db: &PgPool) -> Result<BrandingSettings, sqlx::Error> {
    let saved: Option<Value> = sqlx::query_scalar("SELECT value FROM app_settings WHERE key = $1")
        .bind(BRANDING_KEY)
        .fetch_optional(db)
        .await?;

    Ok(saved
        .and_then(|v| match serde_json::from_value(v) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(error = %e, "Stored branding is malformed, using defaults");
                None
            }
        })
        .unwrap_or_default())
}

/// GET /branding
pub async fn get_branding(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let cache_key = cache_keys::branding();
    if let Some(cached) = state.cache.get::<BrandingSettings>(&cache_key).await {
        return Ok(Json(DataResponse::new(cached)));
    }

    let branding = stored_branding(&state.db).await?;
    let _ = state
        .cache
        .set_with_ttl(&cache_key, &branding, cache_ttl::BRANDING)
        .await;

    Ok(Json(DataResponse::new(branding)))
}

/// PUT /branding
pub async fn update_branding(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Json(update): Json<BrandingUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let merged = stored_branding(&state.db)
        .await?
        .merge(update)
        .map_err(ApiError::BadRequest)?;

    let value = serde_json::to_value(&merged)
        .map_err(|e| ApiError::internal(format!("Failed to encode branding: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO app_settings (key, value, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
        "#,
    )
    .bind(BRANDING_KEY)
    .bind(&value)
    .execute(&state.db)
    .await?;

    let _ = state
        .cache
        .set_with_ttl(&cache_keys::branding(), &merged, cache_ttl::BRANDING)
        .await;

    tracing::info!(admin_id = %admin.user_id(), "Branding updated");

    Ok(Json(DataResponse::new(merged)))
}
