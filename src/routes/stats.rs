//! Dashboard statistics routes

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::{RequireAdmin, RequireProfessional};
use crate::domain::appointments::AppointmentStatus;
use crate::domain::profiles::Role;
use crate::domain::stats::{admin_stats, professional_stats, AppointmentFigures};
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct FiguresRow {
    status: String,
    total_price: Decimal,
    appointment_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<FiguresRow> for AppointmentFigures {
    fn from(row: FiguresRow) -> Self {
        Self {
            status: AppointmentStatus::parse(&row.status).unwrap_or_default(),
            total_price: row.total_price,
            appointment_date: row.appointment_date,
            created_at: row.created_at,
        }
    }
}

/// Figures for every appointment, or one professional's when `professional_id` is set.
async fn fetch_figures(
    db: &PgPool,
    professional_id: Option<Uuid>,
) -> Result<Vec<AppointmentFigures>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FiguresRow>(
        r#"
        SELECT status, total_price, appointment_date, created_at
        FROM appointments
        WHERE ($1::uuid IS NULL OR professional_id = $1)
        "#,
    )
    .bind(professional_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// GET /admin/stats
pub async fn get_admin_stats(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let roles: Vec<Role> = sqlx::query_scalar::<_, String>("SELECT role FROM profiles")
        .fetch_all(&state.db)
        .await?
        .iter()
        .filter_map(|r| Role::parse(r))
        .collect();
    let figures = fetch_figures(&state.db, None).await?;

    let stats = admin_stats(&roles, &figures, Utc::now().date_naive());
    Ok(Json(DataResponse::new(stats)))
}

/// GET /professional/stats
pub async fn get_professional_stats(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
) -> Result<impl IntoResponse, ApiError> {
    let figures = fetch_figures(&state.db, Some(pro.user_id())).await?;

    let stats = professional_stats(&figures, Utc::now().date_naive());
    Ok(Json(DataResponse::new(stats)))
}
