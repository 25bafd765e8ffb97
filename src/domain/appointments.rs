//! Appointment domain types
//!
//! Status lifecycle:
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            │
//!    └──► cancelled ◄──┘
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profiles::Role;

/// Appointment status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use self::AppointmentStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking to change an appointment, relative to that appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

/// Check that `actor` may move an appointment from `current` to `next`.
///
/// Admins act on everything, professionals on their own bookings, customers
/// may only cancel their own.
pub fn authorize_transition(
    actor: Actor,
    customer_id: Uuid,
    professional_id: Uuid,
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), TransitionError> {
    let permitted = match actor.role {
        Role::Admin => true,
        Role::Professional => actor.user_id == professional_id,
        Role::Customer => actor.user_id == customer_id && next == AppointmentStatus::Cancelled,
    };
    if !permitted {
        return Err(TransitionError::NotPermitted);
    }
    if !current.can_transition_to(next) {
        return Err(TransitionError::Invalid { from: current, to: next });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    NotPermitted,
    Invalid {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPermitted => f.write_str("You cannot change this appointment"),
            Self::Invalid { from, to } => {
                write!(f, "Cannot change appointment status from {} to {}", from, to)
            }
        }
    }
}

/// Participant details embedded in appointment responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

impl Participant {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Service details embedded in appointment responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedService {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
}

/// Response DTO for appointment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub customer: Participant,
    pub professional: Participant,
    pub service: BookedService,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub total_price: Decimal,
    pub google_calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for booking an appointment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub professional_id: Uuid,
    pub service_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request DTO for a status change
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

/// Response for a successful booking
#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub appointment: AppointmentResponse,
    pub calendar_event_created: bool,
    pub confirmation_email_sent: bool,
    pub message: String,
}

impl BookingResponse {
    pub fn new(appointment: AppointmentResponse, calendar: bool, email: bool) -> Self {
        let message = match (calendar, email) {
            (true, true) => "Appointment created, added to Google Calendar, and confirmation email with calendar invite sent!",
            (true, false) => "Appointment created and added to Google Calendar.",
            (false, true) => "Appointment created and confirmation email with calendar invite sent!",
            (false, false) => "Appointment created.",
        };
        Self {
            appointment,
            calendar_event_created: calendar,
            confirmation_email_sent: email,
            message: message.to_string(),
        }
    }
}

/// Query filters for appointment listings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppointmentQuery {
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::AppointmentStatus::*;

    const ALL: [AppointmentStatus; 4] = [Pending, Confirmed, Completed, Cancelled];

    #[test]
    fn only_documented_transitions_are_allowed() {
        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_stay_put() {
        for to in ALL {
            assert!(!Completed.can_transition_to(to));
            assert!(!Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ALL {
            assert_eq!(AppointmentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AppointmentStatus::parse("approved"), None);
    }

    #[test]
    fn customers_may_only_cancel_their_own() {
        let customer = Uuid::new_v4();
        let pro = Uuid::new_v4();
        let actor = Actor { user_id: customer, role: Role::Customer };

        assert!(authorize_transition(actor, customer, pro, Pending, Cancelled).is_ok());
        assert_eq!(
            authorize_transition(actor, customer, pro, Pending, Confirmed),
            Err(TransitionError::NotPermitted)
        );

        let stranger = Actor { user_id: Uuid::new_v4(), role: Role::Customer };
        assert_eq!(
            authorize_transition(stranger, customer, pro, Pending, Cancelled),
            Err(TransitionError::NotPermitted)
        );
    }

    #[test]
    fn professionals_act_on_their_own_bookings() {
        let customer = Uuid::new_v4();
        let pro = Uuid::new_v4();
        let own = Actor { user_id: pro, role: Role::Professional };
        let other = Actor { user_id: Uuid::new_v4(), role: Role::Professional };

        assert!(authorize_transition(own, customer, pro, Confirmed, Completed).is_ok());
        assert_eq!(
            authorize_transition(other, customer, pro, Confirmed, Completed),
            Err(TransitionError::NotPermitted)
        );
    }

    #[test]
    fn participant_name_falls_back_to_email() {
        let mut p = Participant {
            id: Uuid::new_v4(),
            full_name: None,
            email: "sam@example.com".to_string(),
            phone: None,
        };
        assert_eq!(p.display_name(), "sam@example.com");
        p.full_name = Some("Sam Rivera".to_string());
        assert_eq!(p.display_name(), "Sam Rivera");
    }

    #[test]
    fn booking_message_reflects_side_effects() {
        let now = Utc::now();
        let participant = Participant {
            id: Uuid::new_v4(),
            full_name: None,
            email: "x@example.com".to_string(),
            phone: None,
        };
        let appt = AppointmentResponse {
            id: Uuid::new_v4(),
            customer: participant.clone(),
            professional: participant,
            service: BookedService {
                id: Uuid::new_v4(),
                name: "Reflexology".to_string(),
                duration_minutes: 30,
            },
            appointment_date: now.date_naive(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            status: Pending,
            notes: None,
            total_price: Decimal::new(45, 0),
            google_calendar_event_id: None,
            created_at: now,
            updated_at: now,
        };
        let resp = BookingResponse::new(appt.clone(), false, true);
        assert_eq!(
            resp.message,
            "Appointment created and confirmation email with calendar invite sent!"
        );
        assert_eq!(BookingResponse::new(appt, false, false).message, "Appointment created.");
    }

    #[test]
    fn admins_are_still_bound_by_the_lifecycle() {
        let admin = Actor { user_id: Uuid::new_v4(), role: Role::Admin };
        let err = authorize_transition(admin, Uuid::new_v4(), Uuid::new_v4(), Completed, Pending)
            .unwrap_err();
        assert_eq!(err, TransitionError::Invalid { from: Completed, to: Pending });
        assert_eq!(
            err.to_string(),
            "Cannot change appointment status from completed to pending"
        );
    }
}
