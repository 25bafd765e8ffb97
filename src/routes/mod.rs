pub mod appointments;
pub mod auth;
pub mod branding;
pub mod health;
pub mod integrations;
pub mod me;
pub mod offerings;
pub mod profiles;
pub mod schedules;
pub mod services;
pub mod stats;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/branding", get(branding::get_branding).put(branding::update_branding))
        // Auth
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/2fa/send", post(auth::send_code))
        .route("/auth/signout", post(auth::sign_out))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/me", get(me::get_me))
        // Profiles
        .route(
            "/profiles/me",
            get(profiles::get_my_profile).put(profiles::update_my_profile),
        )
        .route("/professionals", get(profiles::list_professionals))
        .route(
            "/professionals/:professional_id/services",
            get(offerings::list_professional_services),
        )
        .route(
            "/professionals/:professional_id/slots",
            get(schedules::list_slots),
        )
        // Service catalogue
        .route(
            "/services",
            get(services::list_services).post(services::create_service),
        )
        .route(
            "/services/:service_id",
            get(services::get_service)
                .put(services::update_service)
                .delete(services::delete_service),
        )
        .route(
            "/services/:service_id/toggle-active",
            post(services::toggle_service_active),
        )
        // Professional self-service
        .route("/professional/services", get(offerings::list_my_offerings))
        .route(
            "/professional/services/:service_id",
            put(offerings::update_offering),
        )
        .route(
            "/professional/services/:service_id/toggle",
            post(offerings::toggle_offering),
        )
        .route("/professional/schedule", get(schedules::get_my_schedule))
        .route(
            "/professional/schedule/:day",
            put(schedules::update_schedule_day),
        )
        .route(
            "/professional/schedule/:day/toggle",
            post(schedules::toggle_schedule_day),
        )
        .route("/professional/stats", get(stats::get_professional_stats))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/:appointment_id",
            get(appointments::get_appointment).patch(appointments::update_appointment_status),
        )
        // Admin
        .route("/admin/users", get(profiles::list_users))
        .route("/admin/users/:user_id", put(profiles::update_user))
        .route(
            "/admin/users/:user_id/toggle-active",
            post(profiles::toggle_user_active),
        )
        .route("/admin/stats", get(stats::get_admin_stats))
        // Integrations
        .route("/integrations/google/status", get(integrations::google_status))
        .route(
            "/integrations/slack/webhook",
            post(integrations::save_slack_webhook),
        )
        .route("/integrations/slack/test", post(integrations::test_slack))
}
