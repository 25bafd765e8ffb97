//! Authentication routes
//!
//! These routes proxy authentication requests to Supabase Auth. Sign in and
//! sign up never hand out tokens directly: a code is emailed first and the
//! session is only released by `/auth/verify`.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::roles::load_profile;
use crate::auth::{CurrentProfile, RequireAuth};
use crate::domain::auth::{
    normalize_email, AuthResponse, RefreshTokenRequest, SignInRequest, SignUpRequest,
    VerifyRequest,
};
use crate::domain::two_factor::{IssuedCode, SendCodeRequest, TokenPurpose, TwoFactorChallenge};
use crate::error::ApiError;
use crate::services::cache::keys as cache_keys;
use crate::services::supabase::LogoutScope;
use crate::services::two_factor;

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::internal("Invalid user ID from auth service"))
}

fn challenge(issued: IssuedCode, email_sent: bool) -> TwoFactorChallenge {
    TwoFactorChallenge {
        two_factor_required: true,
        user_id: issued.user_id,
        purpose: issued.purpose,
        expires_at: issued.expires_at,
        email_sent,
    }
}

/// POST /auth/signup
///
/// Register a new customer and email a signup code.
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;
    let email = req.normalized_email().map_err(ApiError::BadRequest)?;
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let outcome = state
        .auth_provider
        .sign_up(&email, &req.password, full_name)
        .await?;
    let user_id = parse_user_id(outcome.user_id())?;

    // Role is fixed at creation; a re-signup must not demote staff
    sqlx::query(
        r#"
        INSERT INTO profiles (id, email, full_name, phone, role, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'customer', TRUE, NOW(), NOW())
        ON CONFLICT (id) DO UPDATE SET
            email = EXCLUDED.email,
            full_name = COALESCE(EXCLUDED.full_name, profiles.full_name),
            phone = COALESCE(EXCLUDED.phone, profiles.phone),
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(full_name)
    .bind(req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()))
    .execute(&state.db)
    .await?;

    let _ = state.cache.delete(&cache_keys::profile(user_id)).await;

    tracing::info!(user_id = %user_id, "User signed up");

    let (issued, email_sent) =
        two_factor::issue(&state.db, &state.mailer, user_id, &email, TokenPurpose::Signup).await?;

    Ok(Created(challenge(issued, email_sent)))
}

/// POST /auth/signin
///
/// Check credentials and the requested portal, then email a login code.
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email).map_err(ApiError::BadRequest)?;
    let session = state
        .auth_provider
        .password_grant(&email, &req.password)
        .await?;
    let user_id = parse_user_id(&session.user.id)?;

    // Tokens are released by /auth/verify, not here; other devices keep their sessions
    state
        .auth_provider
        .logout(&session.access_token, LogoutScope::Local)
        .await;

    let profile = load_profile(&state.db, &state.cache, user_id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Profile not found"))?;

    if profile.role != req.role {
        tracing::warn!(
            user_id = %user_id,
            role = %profile.role,
            requested = %req.role,
            "Sign in through the wrong portal"
        );
        return Err(ApiError::forbidden(format!(
            "This account does not have {} access",
            req.role
        )));
    }
    if !profile.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let (issued, email_sent) =
        two_factor::issue(&state.db, &state.mailer, user_id, &profile.email, TokenPurpose::Login)
            .await?;

    Ok(Json(DataResponse::new(challenge(issued, email_sent))))
}

/// POST /auth/verify
///
/// Consume the emailed code and return the session tokens.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email).map_err(ApiError::BadRequest)?;
    let session = state
        .auth_provider
        .password_grant(&email, &req.password)
        .await?;
    let user_id = parse_user_id(&session.user.id)?;

    if !two_factor::verify(&state.db, user_id, &req.code, req.purpose).await? {
        state
            .auth_provider
            .logout(&session.access_token, LogoutScope::Local)
            .await;
        return Err(ApiError::unauthorized("Invalid or expired verification code"));
    }

    let role = load_profile(&state.db, &state.cache, user_id)
        .await?
        .map(|p| p.role);

    tracing::info!(user_id = %user_id, token_type = req.purpose.token_type(), "Two-factor verification passed");

    Ok(Json(DataResponse::new(AuthResponse::from_supabase(session, role))))
}

/// POST /auth/2fa/send
pub async fn send_code(
    State(state): State<Arc<AppState>>,
    current: CurrentProfile,
    req: Option<Json<SendCodeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let purpose = req.map(|Json(r)| r.purpose).unwrap_or_default();
    let (issued, email_sent) = two_factor::issue(
        &state.db,
        &state.mailer,
        current.user_id(),
        &current.profile.email,
        purpose,
    )
    .await?;

    Ok(Json(DataResponse::new(challenge(issued, email_sent))))
}

/// POST /auth/signout
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> impl IntoResponse {
    state.auth_provider.logout(auth.token(), LogoutScope::Global).await;
    tracing::info!(user_id = %auth.user_id, "User signed out");
    NoContent
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth_provider.refresh(&req.refresh_token).await?;
    let user_id = parse_user_id(&session.user.id)?;
    let role = load_profile(&state.db, &state.cache, user_id)
        .await?
        .map(|p| p.role);

    Ok(Json(DataResponse::new(AuthResponse::from_supabase(session, role))))
}
