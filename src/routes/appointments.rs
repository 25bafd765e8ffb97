//! Appointment routes
//!
//! Booking, role-scoped listings and status changes. The booking write is the
//! primary effect; calendar, email and Slack follow in that order and their
//! failures are only logged.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::CurrentProfile;
use crate::domain::appointments::{
    authorize_transition, Actor, AppointmentQuery, AppointmentResponse, AppointmentStatus,
    BookedService, BookingResponse, CreateAppointmentRequest, Participant, TransitionError,
    UpdateAppointmentStatusRequest,
};
use crate::domain::profiles::{ilike_pattern, Role};
use crate::domain::schedules::{end_time_for, starts_in_past, weekday_index, within_schedule};
use crate::error::ApiError;
use crate::services::email::BookingConfirmation;
use crate::services::google_calendar::{CalendarEvent, EventDetails, ACCESS_TOKEN_COOKIE};
use crate::services::slack::{new_booking_message, status_change_message, BookingNotice};

use super::offerings::fetch_offering;
use super::profiles::is_active_professional;
use super::schedules::schedule_for_day;

/// Appointment joined with its participants and service
#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    appointment_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    notes: Option<String>,
    total_price: Decimal,
    google_calendar_event_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    customer_id: Uuid,
    customer_name: Option<String>,
    customer_email: String,
    customer_phone: Option<String>,
    professional_id: Uuid,
    professional_name: Option<String>,
    professional_email: String,
    professional_phone: Option<String>,
    service_id: Uuid,
    service_name: String,
    service_duration: i32,
}

impl From<AppointmentRow> for AppointmentResponse {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.id,
            customer: Participant {
                id: row.customer_id,
                full_name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            professional: Participant {
                id: row.professional_id,
                full_name: row.professional_name,
                email: row.professional_email,
                phone: row.professional_phone,
            },
            service: BookedService {
                id: row.service_id,
                name: row.service_name,
                duration_minutes: row.service_duration,
            },
            appointment_date: row.appointment_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status: AppointmentStatus::parse(&row.status).unwrap_or_default(),
            notes: row.notes,
            total_price: row.total_price,
            google_calendar_event_id: row.google_calendar_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const APPOINTMENT_SELECT: &str = r#"
    SELECT a.id, a.appointment_date, a.start_time, a.end_time, a.status, a.notes,
           a.total_price, a.google_calendar_event_id, a.created_at, a.updated_at,
           c.id AS customer_id, c.full_name AS customer_name,
           c.email AS customer_email, c.phone AS customer_phone,
           p.id AS professional_id, p.full_name AS professional_name,
           p.email AS professional_email, p.phone AS professional_phone,
           s.id AS service_id, s.name AS service_name, s.duration_minutes AS service_duration
    FROM appointments a
    JOIN profiles c ON c.id = a.customer_id
    JOIN profiles p ON p.id = a.professional_id
    JOIN services s ON s.id = a.service_id
"#;

const APPOINTMENT_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR a.customer_id = $1)
      AND ($2::uuid IS NULL OR a.professional_id = $2)
      AND ($3::text IS NULL OR a.status = $3)
      AND ($4::date IS NULL OR a.appointment_date = $4)
      AND ($5::text IS NULL
           OR c.full_name ILIKE $5 OR c.email ILIKE $5
           OR p.full_name ILIKE $5 OR s.name ILIKE $5)
"#;

async fn fetch_appointment(
    db: &PgPool,
    appointment_id: Uuid,
) -> Result<Option<AppointmentResponse>, sqlx::Error> {
    Ok(sqlx::query_as::<_, AppointmentRow>(&format!("{} WHERE a.id = $1", APPOINTMENT_SELECT))
        .bind(appointment_id)
        .fetch_optional(db)
        .await?
        .map(Into::into))
}

fn can_view(current: &CurrentProfile, appt: &AppointmentResponse) -> bool {
    match current.role() {
        Role::Admin => true,
        _ => current.user_id() == appt.customer.id || current.user_id() == appt.professional.id,
    }
}

fn google_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn calendar_event(state: &AppState, appt: &AppointmentResponse) -> CalendarEvent {
    CalendarEvent::for_appointment(
        &EventDetails {
            client_name: appt.customer.display_name(),
            client_email: &appt.customer.email,
            service_name: &appt.service.name,
            date: appt.appointment_date,
            start_time: appt.start_time,
            duration_minutes: appt.service.duration_minutes,
            notes: appt.notes.as_deref(),
        },
        state.calendar.time_zone(),
    )
}

fn booking_notice(appt: &AppointmentResponse) -> BookingNotice<'_> {
    BookingNotice {
        client_name: appt.customer.display_name(),
        client_email: &appt.customer.email,
        client_phone: appt.customer.phone.as_deref(),
        service_name: &appt.service.name,
        professional_name: appt.professional.display_name(),
        date: appt.appointment_date,
        start_time: appt.start_time,
        duration_minutes: appt.service.duration_minutes,
        price: appt.total_price,
        notes: appt.notes.as_deref(),
    }
}

/// Calendar event, confirmation email, Slack. Returns (calendar, email).
async fn announce_booking(
    state: &AppState,
    appt: &mut AppointmentResponse,
    google_token: Option<&str>,
) -> (bool, bool) {
    let mut calendar_created = false;
    if let Some(token) = google_token {
        match state
            .calendar
            .create_event(token, &calendar_event(state, appt))
            .await
        {
            Ok(event_id) => {
                let stored = sqlx::query(
                    "UPDATE appointments SET google_calendar_event_id = $2 WHERE id = $1",
                )
                .bind(appt.id)
                .bind(&event_id)
                .execute(&state.db)
                .await;
                if let Err(e) = stored {
                    tracing::warn!(appointment_id = %appt.id, error = %e, "Failed to store calendar event id");
                }
                appt.google_calendar_event_id = Some(event_id);
                calendar_created = true;
            }
            Err(e) => {
                tracing::warn!(appointment_id = %appt.id, error = %e, "Calendar event creation failed");
            }
        }
    }

    let email_sent = state
        .mailer
        .send_booking_confirmation(&BookingConfirmation {
            appointment_id: appt.id,
            client_name: appt.customer.display_name().to_string(),
            client_email: appt.customer.email.clone(),
            service_name: appt.service.name.clone(),
            professional_name: appt.professional.display_name().to_string(),
            date: appt.appointment_date,
            start_time: appt.start_time,
            duration_minutes: appt.service.duration_minutes,
            price: appt.total_price,
            notes: appt.notes.clone(),
        })
        .await;

    let message = new_booking_message(&booking_notice(appt), &state.settings.business_name);
    state.slack.notify(&state.db, &message).await;

    (calendar_created, email_sent)
}

/// Slot-holding fields of a booking about to be written
#[derive(Debug, Clone)]
pub(crate) struct NewBooking {
    pub customer_id: Uuid,
    pub professional_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: Option<String>,
    pub total_price: Decimal,
}

/// Serialize bookings for one professional on one date until the transaction ends.
async fn lock_professional_day(
    conn: &mut PgConnection,
    professional_id: Uuid,
    date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || '/' || $2::text, 0))")
        .bind(professional_id)
        .bind(date)
        .execute(conn)
        .await?;
    Ok(())
}

/// Insert unless a non-cancelled appointment overlaps `[start, end)`.
async fn insert_if_free(
    conn: &mut PgConnection,
    booking: &NewBooking,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO appointments
            (customer_id, professional_id, service_id, appointment_date,
             start_time, end_time, status, notes, total_price)
        SELECT $1, $2, $3, $4, $5, $6, 'pending', $7, $8
        WHERE NOT EXISTS (
            SELECT 1 FROM appointments
            WHERE professional_id = $2
              AND appointment_date = $4
              AND status <> 'cancelled'
              AND start_time < $6
              AND end_time > $5
        )
        RETURNING id
        "#,
    )
    .bind(booking.customer_id)
    .bind(booking.professional_id)
    .bind(booking.service_id)
    .bind(booking.date)
    .bind(booking.start_time)
    .bind(booking.end_time)
    .bind(booking.notes.as_deref())
    .bind(booking.total_price)
    .fetch_optional(conn)
    .await
}

/// Write the booking, or return `None` when the slot is taken.
///
/// The overlap check runs after the professional's day lock is held, so it
/// sees every competing booking that committed first.
pub(crate) async fn insert_booking(
    db: &PgPool,
    booking: &NewBooking,
) -> Result<Option<Uuid>, sqlx::Error> {
    let mut tx = db.begin().await?;
    lock_professional_day(&mut *tx, booking.professional_id, booking.date).await?;
    let appointment_id = insert_if_free(&mut *tx, booking).await?;
    tx.commit().await?;
    Ok(appointment_id)
}

/// POST /appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    current: CurrentProfile,
    jar: CookieJar,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if current.role() != Role::Customer {
        return Err(ApiError::forbidden("Only customers can book appointments"));
    }
    if starts_in_past(req.appointment_date, req.start_time, Utc::now().naive_utc()) {
        return Err(ApiError::bad_request("Cannot book an appointment in the past"));
    }
    if !is_active_professional(&state.db, req.professional_id).await? {
        return Err(ApiError::not_found("Professional not found"));
    }

    let offering = fetch_offering(&state.db, req.professional_id, req.service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;
    if !offering.service.is_active {
        return Err(ApiError::bad_request("Service is not available for booking"));
    }
    if !offering.is_offered {
        return Err(ApiError::bad_request(
            "This professional does not offer the selected service",
        ));
    }

    let end_time = end_time_for(req.start_time, offering.service.duration_minutes)
        .ok_or_else(|| ApiError::bad_request("Appointment must end on the same day"))?;

    let day = schedule_for_day(
        &state.db,
        req.professional_id,
        weekday_index(req.appointment_date),
    )
    .await?;
    if !within_schedule(&day, req.start_time, end_time) {
        return Err(ApiError::bad_request(
            "Selected time is outside the professional's working hours",
        ));
    }

    let booking = NewBooking {
        customer_id: current.user_id(),
        professional_id: req.professional_id,
        service_id: req.service_id,
        date: req.appointment_date,
        start_time: req.start_time,
        end_time,
        notes: req
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        total_price: offering.effective_price,
    };
    let appointment_id = insert_booking(&state.db, &booking)
        .await?
        .ok_or_else(|| ApiError::conflict("This time slot is no longer available"))?;

    tracing::info!(
        appointment_id = %appointment_id,
        customer_id = %current.user_id(),
        professional_id = %req.professional_id,
        service_id = %req.service_id,
        date = %req.appointment_date,
        start_time = %req.start_time,
        "Appointment booked"
    );

    let mut appointment = fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::internal("Booked appointment vanished"))?;

    let token = google_token(&jar);
    let (calendar, email) = announce_booking(&state, &mut appointment, token.as_deref()).await;

    Ok(Created(BookingResponse::new(appointment, calendar, email)))
}

/// GET /appointments
///
/// Admins see everything; everyone else sees the appointments they take part in.
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    current: CurrentProfile,
    Query(query): Query<AppointmentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let params = PaginationParams::new(query.page, query.per_page);
    let (customer_id, professional_id) = match current.role() {
        Role::Admin => (None, None),
        Role::Professional => (None, Some(current.user_id())),
        Role::Customer => (Some(current.user_id()), None),
    };
    let status = query.status.map(|s| s.as_str());
    let pattern = query.search.as_deref().and_then(ilike_pattern);

    let total: i64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COUNT(*)
        FROM appointments a
        JOIN profiles c ON c.id = a.customer_id
        JOIN profiles p ON p.id = a.professional_id
        JOIN services s ON s.id = a.service_id
        {}
        "#,
        APPOINTMENT_FILTER
    ))
    .bind(customer_id)
    .bind(professional_id)
    .bind(status)
    .bind(query.date)
    .bind(&pattern)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        "{} {} ORDER BY a.appointment_date DESC, a.start_time DESC LIMIT $6 OFFSET $7",
        APPOINTMENT_SELECT, APPOINTMENT_FILTER
    ))
    .bind(customer_id)
    .bind(professional_id)
    .bind(status)
    .bind(query.date)
    .bind(&pattern)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&state.db)
    .await?;

    let appointments: Vec<AppointmentResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(appointments, &params, total as u64))
}

/// GET /appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    current: CurrentProfile,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let appointment = fetch_appointment(&state.db, appointment_id)
        .await?
        .filter(|a| can_view(&current, a))
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    Ok(Json(DataResponse::new(appointment)))
}

/// PATCH /appointments/:id
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    current: CurrentProfile,
    jar: CookieJar,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = fetch_appointment(&state.db, appointment_id)
        .await?
        .filter(|a| can_view(&current, a))
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    let actor = Actor {
        user_id: current.user_id(),
        role: current.role(),
    };
    authorize_transition(
        actor,
        existing.customer.id,
        existing.professional.id,
        existing.status,
        req.status,
    )
    .map_err(|e| match e {
        TransitionError::NotPermitted => ApiError::forbidden(e.to_string()),
        TransitionError::Invalid { .. } => ApiError::conflict(e.to_string()),
    })?;

    // Guard on the old status so concurrent changes cannot both apply
    let updated = sqlx::query(
        "UPDATE appointments SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
    )
    .bind(appointment_id)
    .bind(existing.status.as_str())
    .bind(req.status.as_str())
    .execute(&state.db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Appointment was changed by someone else"));
    }

    tracing::info!(
        appointment_id = %appointment_id,
        actor_id = %current.user_id(),
        from = %existing.status,
        to = %req.status,
        "Appointment status changed"
    );

    let mut appointment = fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    sync_calendar(&state, &mut appointment, google_token(&jar).as_deref()).await;

    let message = status_change_message(
        &booking_notice(&appointment),
        existing.status,
        appointment.status,
        &state.settings.business_name,
    );
    state.slack.notify(&state.db, &message).await;

    Ok(Json(DataResponse::new(appointment)))
}

/// Cancelled appointments lose their event; confirmed ones refresh it.
async fn sync_calendar(state: &AppState, appt: &mut AppointmentResponse, token: Option<&str>) {
    let (Some(token), Some(event_id)) = (token, appt.google_calendar_event_id.clone()) else {
        return;
    };

    match appt.status {
        AppointmentStatus::Cancelled => {
            if let Err(e) = state.calendar.delete_event(token, &event_id).await {
                tracing::warn!(appointment_id = %appt.id, error = %e, "Calendar event deletion failed");
                return;
            }
            let cleared = sqlx::query(
                "UPDATE appointments SET google_calendar_event_id = NULL WHERE id = $1",
            )
            .bind(appt.id)
            .execute(&state.db)
            .await;
            match cleared {
                Ok(_) => appt.google_calendar_event_id = None,
                Err(e) => {
                    tracing::warn!(appointment_id = %appt.id, error = %e, "Failed to clear calendar event id")
                }
            }
        }
        AppointmentStatus::Confirmed => {
            let event = calendar_event(state, appt);
            if let Err(e) = state.calendar.update_event(token, &event_id, &event).await {
                tracing::warn!(appointment_id = %appt.id, error = %e, "Calendar event update failed");
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn booking(
        pool: &PgPool,
        professional_id: Uuid,
        service_id: Uuid,
        start: NaiveTime,
        end: NaiveTime,
    ) -> NewBooking {
        NewBooking {
            customer_id: fixtures::profile(pool, "customer").await,
            professional_id,
            service_id,
            date: NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
            start_time: start,
            end_time: end,
            notes: None,
            total_price: Decimal::new(8000, 2),
        }
    }

    async fn live_count(pool: &PgPool, professional_id: Uuid) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments WHERE professional_id = $1 AND status <> 'cancelled'",
        )
        .bind(professional_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn booking_waits_for_an_uncommitted_overlap(pool: PgPool) {
        let professional = fixtures::profile(&pool, "professional").await;
        let service = fixtures::service(&pool, "Swedish", 60).await;

        let first = booking(&pool, professional, service, t(10, 0), t(11, 0)).await;
        let second = booking(&pool, professional, service, t(10, 30), t(11, 30)).await;

        // First booking holds the day lock and has inserted but not committed
        let mut held = pool.begin().await.unwrap();
        lock_professional_day(&mut *held, professional, first.date)
            .await
            .unwrap();
        assert!(insert_if_free(&mut *held, &first).await.unwrap().is_some());

        let competing = tokio::spawn({
            let pool = pool.clone();
            async move { insert_booking(&pool, &second).await }
        });
        tokio::task::yield_now().await;
        held.commit().await.unwrap();

        assert_eq!(competing.await.unwrap().unwrap(), None);
        assert_eq!(live_count(&pool, professional).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_overlapping_bookings_admit_one(pool: PgPool) {
        let professional = fixtures::profile(&pool, "professional").await;
        let service = fixtures::service(&pool, "Deep tissue", 60).await;

        let a = booking(&pool, professional, service, t(14, 0), t(15, 0)).await;
        let mut b = a.clone();
        b.customer_id = fixtures::profile(&pool, "customer").await;

        let (ra, rb) = tokio::join!(insert_booking(&pool, &a), insert_booking(&pool, &b));
        let admitted = [ra.unwrap(), rb.unwrap()]
            .iter()
            .filter(|id| id.is_some())
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(live_count(&pool, professional).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn cancelled_and_adjacent_appointments_leave_the_slot_free(pool: PgPool) {
        let professional = fixtures::profile(&pool, "professional").await;
        let service = fixtures::service(&pool, "Reflexology", 60).await;

        let morning = booking(&pool, professional, service, t(9, 0), t(10, 0)).await;
        let first = insert_booking(&pool, &morning).await.unwrap().unwrap();

        sqlx::query("UPDATE appointments SET status = 'cancelled' WHERE id = $1")
            .bind(first)
            .execute(&pool)
            .await
            .unwrap();
        assert!(insert_booking(&pool, &morning).await.unwrap().is_some());

        let next = booking(&pool, professional, service, t(10, 0), t(11, 0)).await;
        assert!(insert_booking(&pool, &next).await.unwrap().is_some());

        let mut clash = next.clone();
        clash.start_time = t(9, 30);
        clash.end_time = t(10, 30);
        assert_eq!(insert_booking(&pool, &clash).await.unwrap(), None);
    }
}
