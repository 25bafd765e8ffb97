//! Service catalogue routes
//!
//! Public catalogue reads and admin CRUD. The active catalogue is cached and
//! every write drops all catalogue-derived cache entries.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::{CurrentProfile, RequireAdmin};
use crate::domain::profiles::Role;
use crate::domain::services::{ServiceListQuery, ServiceRequest, ServiceResponse};
use crate::error::ApiError;
use crate::services::cache::keys as cache_keys;

/// Database row for service
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ServiceRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub(crate) const SERVICE_COLUMNS: &str =
    "id, name, description, duration_minutes, price, is_active, created_at";

impl From<ServiceRow> for ServiceResponse {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            duration_minutes: row.duration_minutes,
            price: row.price,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn fetch_service(
    db: &sqlx::PgPool,
    service_id: Uuid,
) -> Result<Option<ServiceResponse>, sqlx::Error> {
    Ok(sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {} FROM services WHERE id = $1",
        SERVICE_COLUMNS
    ))
    .bind(service_id)
    .fetch_optional(db)
    .await?
    .map(Into::into))
}

async fn invalidate_catalogue(state: &AppState) {
    if let Err(e) = state.cache.delete_pattern(&cache_keys::services_pattern()).await {
        tracing::warn!(error = %e, "Failed to invalidate service cache");
    }
}

/// GET /services
///
/// Active services for everyone; admins may pass `include_inactive=true`.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    caller: Option<CurrentProfile>,
    Query(query): Query<ServiceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let is_admin = caller.as_ref().is_some_and(|c| c.role() == Role::Admin);
    let include_inactive = query.include_inactive && is_admin;

    let cache_key = cache_keys::active_services();
    if !include_inactive {
        if let Some(cached) = state.cache.get::<Vec<ServiceResponse>>(&cache_key).await {
            return Ok(Json(DataResponse::new(cached)));
        }
    }

    let services: Vec<ServiceResponse> = sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {} FROM services WHERE ($1 OR is_active = TRUE) ORDER BY name",
        SERVICE_COLUMNS
    ))
    .bind(include_inactive)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    if !include_inactive {
        let _ = state.cache.set(&cache_key, &services).await;
    }

    Ok(Json(DataResponse::new(services)))
}

/// GET /services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    caller: Option<CurrentProfile>,
    Path(service_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let is_admin = caller.as_ref().is_some_and(|c| c.role() == Role::Admin);
    let service = fetch_service(&state.db, service_id)
        .await?
        .filter(|s| s.is_active || is_admin)
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    Ok(Json(DataResponse::new(service)))
}

/// POST /services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Json(req): Json<ServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = req.validate().map_err(ApiError::BadRequest)?;

    let row = sqlx::query_as::<_, ServiceRow>(&format!(
        r#"
        INSERT INTO services (name, description, duration_minutes, price, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        SERVICE_COLUMNS
    ))
    .bind(&valid.name)
    .bind(&valid.description)
    .bind(valid.duration_minutes)
    .bind(valid.price)
    .bind(valid.is_active)
    .fetch_one(&state.db)
    .await?;

    invalidate_catalogue(&state).await;

    tracing::info!(
        service_id = %row.id,
        admin_id = %admin.user_id(),
        name = %row.name,
        "Service created"
    );

    Ok(Created(ServiceResponse::from(row)))
}

/// PUT /services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(service_id): Path<Uuid>,
    Json(req): Json<ServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keep_active = req.is_active.is_none();
    let valid = req.validate().map_err(ApiError::BadRequest)?;

    let row = sqlx::query_as::<_, ServiceRow>(&format!(
        r#"
        UPDATE services SET
            name = $2,
            description = $3,
            duration_minutes = $4,
            price = $5,
            is_active = CASE WHEN $6 THEN is_active ELSE $7 END
        WHERE id = $1
        RETURNING {}
        "#,
        SERVICE_COLUMNS
    ))
    .bind(service_id)
    .bind(&valid.name)
    .bind(&valid.description)
    .bind(valid.duration_minutes)
    .bind(valid.price)
    .bind(keep_active)
    .bind(valid.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Service not found"))?;

    invalidate_catalogue(&state).await;

    tracing::info!(service_id = %service_id, admin_id = %admin.user_id(), "Service updated");

    Ok(Json(DataResponse::new(ServiceResponse::from(row))))
}

/// POST /services/:id/toggle-active
pub async fn toggle_service_active(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(service_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, ServiceRow>(&format!(
        "UPDATE services SET is_active = NOT is_active WHERE id = $1 RETURNING {}",
        SERVICE_COLUMNS
    ))
    .bind(service_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Service not found"))?;

    invalidate_catalogue(&state).await;

    tracing::info!(
        service_id = %service_id,
        admin_id = %admin.user_id(),
        is_active = row.is_active,
        "Service active flag toggled"
    );

    Ok(Json(DataResponse::new(ServiceResponse::from(row))))
}

/// DELETE /services/:id
///
/// Refused while any appointment references the service.
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(service_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let in_use: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM appointments WHERE service_id = $1)")
            .bind(service_id)
            .fetch_one(&state.db)
            .await?;

    if in_use {
        return Err(ApiError::conflict(
            "Cannot delete service with existing appointments",
        ));
    }

    let result = sqlx::query("DELETE FROM services WHERE id = $1")
        .bind(service_id)
        .execute(&state.db)
        .await
        .map_err(|e| match e {
            // An appointment booked between the check and the delete
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ApiError::conflict("Cannot delete service with existing appointments")
            }
            other => ApiError::Database(other),
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Service not found"));
    }

    invalidate_catalogue(&state).await;

    tracing::info!(service_id = %service_id, admin_id = %admin.user_id(), "Service deleted");

    Ok(MessageResponse::new("Service deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::load_profile;
    use crate::db::fixtures;
    use axum::http::StatusCode;
    use axum::response::Response;
    use serde_json::Value;
    use sqlx::PgPool;

    async fn admin(state: &AppState) -> RequireAdmin {
        let id = fixtures::profile(&state.db, "admin").await;
        let profile = load_profile(&state.db, &state.cache, id)
            .await
            .unwrap()
            .unwrap();
        RequireAdmin(CurrentProfile::for_tests(profile))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn hot_stone() -> ServiceRequest {
        ServiceRequest {
            name: Some("Hot stone".to_string()),
            description: Some("Heated basalt stones".to_string()),
            duration_minutes: Some(90),
            price: Some(Decimal::new(12000, 2)),
            is_active: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_service_returns_the_generated_id(pool: PgPool) {
        let state = AppState::for_tests(pool);

        let response = create_service(State(state.clone()), admin(&state).await, Json(hot_stone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        let id: Uuid = body["data"]["id"].as_str().unwrap().parse().unwrap();
        let stored = fetch_service(&state.db, id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Hot stone");
        assert_eq!(stored.duration_minutes, 90);
        assert!(stored.is_active);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_service_rejects_missing_fields(pool: PgPool) {
        let state = AppState::for_tests(pool);
        let mut req = hot_stone();
        req.price = None;

        let response = create_service(State(state.clone()), admin(&state).await, Json(req))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Missing required fields");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn toggle_flips_and_persists_the_active_flag(pool: PgPool) {
        let state = AppState::for_tests(pool);
        let service_id = fixtures::service(&state.db, "Shiatsu", 60).await;

        let response =
            toggle_service_active(State(state.clone()), admin(&state).await, Path(service_id))
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["is_active"], false);
        assert!(!fetch_service(&state.db, service_id).await.unwrap().unwrap().is_active);

        toggle_service_active(State(state.clone()), admin(&state).await, Path(service_id))
            .await
            .unwrap();
        assert!(fetch_service(&state.db, service_id).await.unwrap().unwrap().is_active);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_is_refused_while_appointments_reference_the_service(pool: PgPool) {
        let state = AppState::for_tests(pool);
        let service_id = fixtures::service(&state.db, "Aromatherapy", 60).await;
        let customer = fixtures::profile(&state.db, "customer").await;
        let professional = fixtures::profile(&state.db, "professional").await;
        sqlx::query(
            r#"
            INSERT INTO appointments
                (customer_id, professional_id, service_id, appointment_date, start_time, end_time, status)
            VALUES ($1, $2, $3, '2030-06-03', '10:00', '11:00', 'cancelled')
            "#,
        )
        .bind(customer)
        .bind(professional)
        .bind(service_id)
        .execute(&state.db)
        .await
        .unwrap();

        let response = delete_service(State(state.clone()), admin(&state).await, Path(service_id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(fetch_service(&state.db, service_id).await.unwrap().is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unused_service_is_deleted(pool: PgPool) {
        let state = AppState::for_tests(pool);
        let service_id = fixtures::service(&state.db, "Cupping", 45).await;

        let response = delete_service(State(state.clone()), admin(&state).await, Path(service_id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(fetch_service(&state.db, service_id).await.unwrap().is_none());

        let again = delete_service(State(state.clone()), admin(&state).await, Path(service_id))
            .await
            .into_response();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }
}
