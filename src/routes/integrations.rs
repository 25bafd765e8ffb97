//! Integration routes: Google Calendar connection status and Slack setup.

use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::services::google_calendar::ACCESS_TOKEN_COOKIE;
use crate::services::slack::{redact_webhook, test_message, validate_webhook_url};

#[derive(Debug, Serialize)]
pub struct GoogleStatus {
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct SlackWebhookRequest {
    pub webhook_url: String,
}

/// GET /integrations/google/status
///
/// Connected means the browser carries an access token cookie; the token
/// itself is not checked against Google.
pub async fn google_status(jar: CookieJar) -> impl IntoResponse {
    let connected = jar
        .get(ACCESS_TOKEN_COOKIE)
        .is_some_and(|c| !c.value().is_empty());
    Json(DataResponse::new(GoogleStatus { connected }))
}

/// POST /integrations/slack/webhook
pub async fn save_slack_webhook(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Json(req): Json<SlackWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let webhook = validate_webhook_url(&req.webhook_url).map_err(ApiError::BadRequest)?;
    state.slack.save_webhook(&state.db, &webhook).await?;

    tracing::info!(
        admin_id = %admin.user_id(),
        webhook = %redact_webhook(&webhook),
        "Slack webhook saved"
    );

    Ok(MessageResponse::new("Slack webhook saved"))
}

/// POST /integrations/slack/test
pub async fn test_slack(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    if state.slack.resolve_webhook(&state.db).await.is_none() {
        return Err(ApiError::bad_request("Slack webhook is not configured"));
    }

    let message = test_message(&state.settings.business_name);
    if !state.slack.notify(&state.db, &message).await {
        return Err(ApiError::internal("Failed to send Slack test message"));
    }

    Ok(MessageResponse::new("Test message sent to Slack"))
}
