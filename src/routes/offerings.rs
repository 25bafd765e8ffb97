//! Professional offering routes
//!
//! Which catalogue services a professional performs, at what price.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireProfessional;
use crate::domain::services::{
    effective_price, OfferingResponse, ServiceResponse, UpdateOfferingRequest,
};
use crate::error::ApiError;
use crate::services::cache::{keys as cache_keys, ttl as cache_ttl};

use super::profiles::is_active_professional;
use super::services::fetch_service;

#[derive(Debug, sqlx::FromRow)]
struct OfferingRow {
    offering_id: Option<Uuid>,
    custom_price: Option<Decimal>,
    is_offered: Option<bool>,
    id: Uuid,
    name: String,
    description: String,
    duration_minutes: i32,
    price: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<OfferingRow> for OfferingResponse {
    fn from(row: OfferingRow) -> Self {
        let service = ServiceResponse {
            id: row.id,
            name: row.name,
            description: row.description,
            duration_minutes: row.duration_minutes,
            price: row.price,
            is_active: row.is_active,
            created_at: row.created_at,
        };
        Self {
            id: row.offering_id,
            effective_price: effective_price(row.custom_price, service.price),
            custom_price: row.custom_price,
            // Professionals opt in; no row means not offered
            is_offered: row.is_offered.unwrap_or(false),
            service,
        }
    }
}

const OFFERING_SELECT: &str = r#"
    SELECT ps.id AS offering_id, ps.custom_price, ps.is_offered,
           s.id, s.name, s.description, s.duration_minutes, s.price, s.is_active, s.created_at
    FROM services s
    LEFT JOIN professional_services ps
        ON ps.service_id = s.id AND ps.professional_id = $1
"#;

async fn fetch_offerings(
    db: &PgPool,
    professional_id: Uuid,
) -> Result<Vec<OfferingResponse>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OfferingRow>(&format!(
        "{} WHERE s.is_active = TRUE ORDER BY s.name",
        OFFERING_SELECT
    ))
    .bind(professional_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// One service as offered by a professional, whether or not it is active.
pub(crate) async fn fetch_offering(
    db: &PgPool,
    professional_id: Uuid,
    service_id: Uuid,
) -> Result<Option<OfferingResponse>, sqlx::Error> {
    Ok(sqlx::query_as::<_, OfferingRow>(&format!("{} WHERE s.id = $2", OFFERING_SELECT))
        .bind(professional_id)
        .bind(service_id)
        .fetch_optional(db)
        .await?
        .map(Into::into))
}

/// GET /professional/services
pub async fn list_my_offerings(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
) -> Result<impl IntoResponse, ApiError> {
    let offerings = fetch_offerings(&state.db, pro.user_id()).await?;
    Ok(Json(DataResponse::new(offerings)))
}

/// PUT /professional/services/:service_id
pub async fn update_offering(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
    Path(service_id): Path<Uuid>,
    Json(req): Json<UpdateOfferingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.custom_price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ApiError::bad_request("custom_price cannot be negative"));
    }
    fetch_service(&state.db, service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    sqlx::query(
        r#"
        INSERT INTO professional_services (professional_id, service_id, custom_price, is_offered)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (professional_id, service_id) DO UPDATE SET
            custom_price = EXCLUDED.custom_price,
            is_offered = EXCLUDED.is_offered
        "#,
    )
    .bind(pro.user_id())
    .bind(service_id)
    .bind(req.custom_price.map(|p| p.round_dp(2)))
    .bind(req.is_offered)
    .execute(&state.db)
    .await?;

    respond_with_offering(&state, pro.user_id(), service_id).await
}

/// POST /professional/services/:service_id/toggle
///
/// The first toggle of a service creates the row as offered.
pub async fn toggle_offering(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
    Path(service_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    fetch_service(&state.db, service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    sqlx::query(
        r#"
        INSERT INTO professional_services (professional_id, service_id, is_offered)
        VALUES ($1, $2, TRUE)
        ON CONFLICT (professional_id, service_id) DO UPDATE SET
            is_offered = NOT professional_services.is_offered
        "#,
    )
    .bind(pro.user_id())
    .bind(service_id)
    .execute(&state.db)
    .await?;

    respond_with_offering(&state, pro.user_id(), service_id).await
}

async fn respond_with_offering(
    state: &AppState,
    professional_id: Uuid,
    service_id: Uuid,
) -> Result<Json<DataResponse<OfferingResponse>>, ApiError> {
    let _ = state
        .cache
        .delete(&cache_keys::professional_services(professional_id))
        .await;

    let offering = fetch_offering(&state.db, professional_id, service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    tracing::info!(
        professional_id = %professional_id,
        service_id = %service_id,
        is_offered = offering.is_offered,
        "Offering updated"
    );

    Ok(Json(DataResponse::new(offering)))
}

/// GET /professionals/:id/services
///
/// Public: services the professional offers, with the price they charge.
pub async fn list_professional_services(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // Checked before the cache so a deactivation hides the list at once
    if !is_active_professional(&state.db, professional_id).await? {
        return Err(ApiError::not_found("Professional not found"));
    }

    let cache_key = cache_keys::professional_services(professional_id);
    if let Some(cached) = state.cache.get::<Vec<OfferingResponse>>(&cache_key).await {
        return Ok(Json(DataResponse::new(cached)));
    }

    let offered: Vec<OfferingResponse> = fetch_offerings(&state.db, professional_id)
        .await?
        .into_iter()
        .filter(|o| o.is_offered)
        .collect();

    let _ = state
        .cache
        .set_with_ttl(&cache_key, &offered, cache_ttl::SERVICES)
        .await;

    Ok(Json(DataResponse::new(offered)))
}
