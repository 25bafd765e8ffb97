//! Weekly schedule and slot routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveTime;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireProfessional;
use crate::domain::schedules::{
    available_slots, day_name, fill_week, upcoming_slots, validate_day, validate_hours,
    weekday_index, ScheduleDay, SlotQuery, SlotsResponse, UpdateScheduleRequest,
};
use crate::error::ApiError;

use super::offerings::fetch_offering;
use super::profiles::is_active_professional;

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    professional_id: Uuid,
    day_of_week: i16,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_available: bool,
}

impl From<ScheduleRow> for ScheduleDay {
    fn from(row: ScheduleRow) -> Self {
        Self {
            id: Some(row.id),
            professional_id: row.professional_id,
            day_of_week: row.day_of_week,
            day_name: day_name(row.day_of_week).to_string(),
            start_time: row.start_time,
            end_time: row.end_time,
            is_available: row.is_available,
        }
    }
}

/// Stored day, or the default when the professional never saved it.
pub(crate) async fn schedule_for_day(
    db: &PgPool,
    professional_id: Uuid,
    day_of_week: i16,
) -> Result<ScheduleDay, sqlx::Error> {
    let stored = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id, professional_id, day_of_week, start_time, end_time, is_available
        FROM professional_schedules
        WHERE professional_id = $1 AND day_of_week = $2
        "#,
    )
    .bind(professional_id)
    .bind(day_of_week)
    .fetch_optional(db)
    .await?;

    Ok(stored
        .map(ScheduleDay::from)
        .unwrap_or_else(|| ScheduleDay::default_for(professional_id, day_of_week)))
}

/// Start/end of every slot-holding appointment on a date.
pub(crate) async fn booked_intervals(
    db: &PgPool,
    professional_id: Uuid,
    date: chrono::NaiveDate,
) -> Result<Vec<(NaiveTime, NaiveTime)>, sqlx::Error> {
    sqlx::query_as::<_, (NaiveTime, NaiveTime)>(
        r#"
        SELECT start_time, end_time
        FROM appointments
        WHERE professional_id = $1 AND appointment_date = $2 AND status <> 'cancelled'
        ORDER BY start_time
        "#,
    )
    .bind(professional_id)
    .bind(date)
    .fetch_all(db)
    .await
}

/// GET /professional/schedule
pub async fn get_my_schedule(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
) -> Result<impl IntoResponse, ApiError> {
    let stored: Vec<ScheduleDay> = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id, professional_id, day_of_week, start_time, end_time, is_available
        FROM professional_schedules
        WHERE professional_id = $1
        ORDER BY day_of_week
        "#,
    )
    .bind(pro.user_id())
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    Ok(Json(DataResponse::new(fill_week(pro.user_id(), stored))))
}

/// PUT /professional/schedule/:day
pub async fn update_schedule_day(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
    Path(day_of_week): Path<i16>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_day(day_of_week).map_err(ApiError::BadRequest)?;
    validate_hours(req.start_time, req.end_time).map_err(ApiError::BadRequest)?;

    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        INSERT INTO professional_schedules
            (professional_id, day_of_week, start_time, end_time, is_available)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (professional_id, day_of_week) DO UPDATE SET
            start_time = EXCLUDED.start_time,
            end_time = EXCLUDED.end_time,
            is_available = EXCLUDED.is_available
        RETURNING id, professional_id, day_of_week, start_time, end_time, is_available
        "#,
    )
    .bind(pro.user_id())
    .bind(day_of_week)
    .bind(req.start_time)
    .bind(req.end_time)
    .bind(req.is_available)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        professional_id = %pro.user_id(),
        day_of_week = day_of_week,
        is_available = row.is_available,
        "Schedule day saved"
    );

    Ok(Json(DataResponse::new(ScheduleDay::from(row))))
}

/// POST /professional/schedule/:day/toggle
///
/// An unsaved day is materialised from its default before flipping.
pub async fn toggle_schedule_day(
    State(state): State<Arc<AppState>>,
    pro: RequireProfessional,
    Path(day_of_week): Path<i16>,
) -> Result<impl IntoResponse, ApiError> {
    validate_day(day_of_week).map_err(ApiError::BadRequest)?;
    let default = ScheduleDay::default_for(pro.user_id(), day_of_week);

    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        INSERT INTO professional_schedules
            (professional_id, day_of_week, start_time, end_time, is_available)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (professional_id, day_of_week) DO UPDATE SET
            is_available = NOT professional_schedules.is_available
        RETURNING id, professional_id, day_of_week, start_time, end_time, is_available
        "#,
    )
    .bind(pro.user_id())
    .bind(day_of_week)
    .bind(default.start_time)
    .bind(default.end_time)
    .bind(!default.is_available)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        professional_id = %pro.user_id(),
        day_of_week = day_of_week,
        is_available = row.is_available,
        "Schedule day toggled"
    );

    Ok(Json(DataResponse::new(ScheduleDay::from(row))))
}

/// GET /professionals/:id/slots?date=&service_id=
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_active_professional(&state.db, professional_id).await? {
        return Err(ApiError::not_found("Professional not found"));
    }
    let offering = fetch_offering(&state.db, professional_id, query.service_id)
        .await?
        .filter(|o| o.service.is_active && o.is_offered)
        .ok_or_else(|| ApiError::not_found("Service not offered by this professional"))?;

    let now = chrono::Utc::now().naive_utc();
    let slots = if query.date < now.date() {
        Vec::new()
    } else {
        let day = schedule_for_day(&state.db, professional_id, weekday_index(query.date)).await?;
        let booked = booked_intervals(&state.db, professional_id, query.date).await?;
        let slots = available_slots(&day, offering.service.duration_minutes, &booked);
        upcoming_slots(query.date, slots, now)
    };

    Ok(Json(DataResponse::new(SlotsResponse {
        professional_id,
        date: query.date,
        duration_minutes: offering.service.duration_minutes,
        slots,
    })))
}
