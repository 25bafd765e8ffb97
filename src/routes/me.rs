use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentProfile;
use crate::domain::profiles::ProfileResponse;

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    /// Supabase session role; the application role is on `profile`
    pub session_role: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub expires_at: i64,
    pub profile: ProfileResponse,
}

/// Get current authenticated user info
pub async fn get_me(current: CurrentProfile) -> Json<MeResponse> {
    let auth = &current.auth;
    Json(MeResponse {
        user_id: auth.user_id,
        email: auth.email.clone(),
        session_role: auth.role.clone(),
        issuer: auth.issuer.clone(),
        audience: auth.audience.clone(),
        expires_at: auth.claims().exp,
        profile: current.profile.clone(),
    })
}
