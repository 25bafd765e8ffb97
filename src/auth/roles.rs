//! Role-aware extractors.
//!
//! Each extractor authenticates the bearer token, loads the caller's profile
//! (through the profile cache) and rejects deactivated accounts.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::RequireAuth;
use crate::app::AppState;
use crate::domain::profiles::{ProfileResponse, Role};
use crate::error::ApiError;
use crate::services::cache::{keys as cache_keys, ttl as cache_ttl};
use crate::services::RedisCache;

/// Database row for profile
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const PROFILE_COLUMNS: &str =
    "id, email, full_name, phone, role, avatar_url, bio, is_active, created_at, updated_at";

impl From<ProfileRow> for ProfileResponse {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            role: Role::parse(&row.role).unwrap_or_default(),
            avatar_url: row.avatar_url,
            bio: row.bio,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fetch a profile, serving from cache when possible.
pub async fn load_profile(
    db: &PgPool,
    cache: &RedisCache,
    user_id: Uuid,
) -> Result<Option<ProfileResponse>, sqlx::Error> {
    let cache_key = cache_keys::profile(user_id);
    if let Some(cached) = cache.get::<ProfileResponse>(&cache_key).await {
        return Ok(Some(cached));
    }

    let profile = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles WHERE id = $1",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .map(ProfileResponse::from);

    if let Some(profile) = &profile {
        let _ = cache
            .set_with_ttl(&cache_key, profile, cache_ttl::PROFILE)
            .await;
    }
    Ok(profile)
}

/// Authenticated caller together with their active profile
#[derive(Debug, Clone)]
pub struct CurrentProfile {
    pub auth: RequireAuth,
    pub profile: ProfileResponse,
}

impl CurrentProfile {
    pub fn user_id(&self) -> Uuid {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }
}

#[cfg(test)]
impl CurrentProfile {
    /// Caller already past token verification, for driving handlers directly.
    pub fn for_tests(profile: ProfileResponse) -> Self {
        let claims = super::Claims {
            sub: profile.id.to_string(),
            aud: "authenticated".to_string(),
            iss: "http://localhost:54321/auth/v1".to_string(),
            iat: 0,
            exp: i64::MAX,
            nbf: None,
            email: Some(profile.email.clone()),
            role: Some("authenticated".to_string()),
        };
        let context = super::AuthContext::from_claims_with_token(&claims, "test-token")
            .unwrap_or_else(|e| panic!("{e}"));
        CurrentProfile {
            auth: RequireAuth(context),
            profile,
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentProfile {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = RequireAuth::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::unauthorized(e.message()))?;

        let profile = load_profile(&state.db, &state.cache, auth.user_id)
            .await?
            .ok_or_else(|| ApiError::forbidden("Profile not found"))?;

        if !profile.is_active {
            tracing::warn!(user_id = %profile.id, "Deactivated account attempted access");
            return Err(ApiError::forbidden("Account is deactivated"));
        }

        Ok(CurrentProfile { auth, profile })
    }
}

macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, $message:literal, $allowed:pat) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(pub CurrentProfile);

        impl std::ops::Deref for $name {
            type Target = CurrentProfile;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        #[async_trait]
        impl FromRequestParts<Arc<AppState>> for $name {
            type Rejection = ApiError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &Arc<AppState>,
            ) -> Result<Self, Self::Rejection> {
                let current = CurrentProfile::from_request_parts(parts, state).await?;
                if !matches!(current.role(), $allowed) {
                    tracing::warn!(
                        user_id = %current.user_id(),
                        role = %current.role(),
                        "Insufficient role for route"
                    );
                    return Err(ApiError::forbidden($message));
                }
                Ok($name(current))
            }
        }
    };
}

role_extractor!(
    /// Admins only
    RequireAdmin,
    "Admin privileges required",
    Role::Admin
);

role_extractor!(
    /// Professionals only
    RequireProfessional,
    "Professional account required",
    Role::Professional
);
