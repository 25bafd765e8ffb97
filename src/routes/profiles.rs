//! Profile routes
//!
//! Self-service profile endpoints, admin user management and the public
//! professional directory.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::roles::{ProfileRow, PROFILE_COLUMNS};
use crate::auth::{CurrentProfile, RequireAdmin};
use crate::domain::profiles::{
    ilike_pattern, AdminUpdateProfileRequest, ProfessionalSummary, ProfileResponse, Role,
    UpdateProfileRequest, UserQuery,
};
use crate::error::ApiError;
use crate::services::cache::keys as cache_keys;

/// GET /profiles/me
pub async fn get_my_profile(current: CurrentProfile) -> impl IntoResponse {
    Json(DataResponse::new(current.profile))
}

/// PUT /profiles/me
///
/// Role and active flag are not editable here.
pub async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    current: CurrentProfile,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = sqlx::query_as::<_, ProfileRow>(&format!(
        r#"
        UPDATE profiles SET
            full_name = COALESCE($2, full_name),
            phone = COALESCE($3, phone),
            avatar_url = COALESCE($4, avatar_url),
            bio = COALESCE($5, bio),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        PROFILE_COLUMNS
    ))
    .bind(current.user_id())
    .bind(&req.full_name)
    .bind(&req.phone)
    .bind(&req.avatar_url)
    .bind(&req.bio)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let _ = state.cache.delete(&cache_keys::profile(current.user_id())).await;

    Ok(Json(DataResponse::new(ProfileResponse::from(profile))))
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let params = PaginationParams::new(query.page, query.per_page);
    let role = query.role.map(|r| r.as_str());
    let pattern = query.search.as_deref().and_then(ilike_pattern);

    let filter = r#"
        WHERE ($1::text IS NULL OR role = $1)
          AND ($2::text IS NULL OR full_name ILIKE $2 OR email ILIKE $2)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM profiles {}", filter))
        .bind(role)
        .bind(&pattern)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        PROFILE_COLUMNS, filter
    ))
    .bind(role)
    .bind(&pattern)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&state.db)
    .await?;

    let users: Vec<ProfileResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Paginated::new(users, &params, total as u64))
}

/// PUT /admin/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdminUpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == admin.user_id() {
        if req.is_active == Some(false) {
            return Err(ApiError::bad_request("You cannot deactivate your own account"));
        }
        if req.role.is_some_and(|r| r != Role::Admin) {
            return Err(ApiError::bad_request("You cannot remove your own admin role"));
        }
    }

    let profile = sqlx::query_as::<_, ProfileRow>(&format!(
        r#"
        UPDATE profiles SET
            full_name = COALESCE($2, full_name),
            phone = COALESCE($3, phone),
            role = COALESCE($4, role),
            is_active = COALESCE($5, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .bind(&req.full_name)
    .bind(&req.phone)
    .bind(req.role.map(|r| r.as_str()))
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    forget_user(&state, user_id).await;

    tracing::info!(
        admin_id = %admin.user_id(),
        user_id = %user_id,
        role = %profile.role,
        is_active = profile.is_active,
        "User updated by admin"
    );

    Ok(Json(DataResponse::new(ProfileResponse::from(profile))))
}

/// Drop cached entries derived from a user's profile.
async fn forget_user(state: &AppState, user_id: Uuid) {
    let _ = state.cache.delete(&cache_keys::profile(user_id)).await;
    let _ = state
        .cache
        .delete(&cache_keys::professional_services(user_id))
        .await;
}

/// POST /admin/users/:id/toggle-active
pub async fn toggle_user_active(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == admin.user_id() {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    let profile = sqlx::query_as::<_, ProfileRow>(&format!(
        "UPDATE profiles SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING {}",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    forget_user(&state, user_id).await;

    tracing::info!(
        admin_id = %admin.user_id(),
        user_id = %user_id,
        is_active = profile.is_active,
        "User active flag toggled"
    );

    Ok(Json(DataResponse::new(ProfileResponse::from(profile))))
}

/// Whether `id` belongs to an active professional.
pub(crate) async fn is_active_professional(db: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $1 AND role = 'professional' AND is_active = TRUE)",
    )
    .bind(id)
    .fetch_one(db)
    .await
}

#[derive(Debug, sqlx::FromRow)]
struct ProfessionalRow {
    id: Uuid,
    full_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
}

/// GET /professionals
///
/// Public list of active professionals for the booking page.
pub async fn list_professionals(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, ProfessionalRow>(
        r#"
        SELECT id, full_name, avatar_url, bio
        FROM profiles
        WHERE role = 'professional' AND is_active = TRUE
        ORDER BY full_name NULLS LAST
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let professionals: Vec<ProfessionalSummary> = rows
        .into_iter()
        .map(|r| ProfessionalSummary {
            id: r.id,
            full_name: r.full_name,
            avatar_url: r.avatar_url,
            bio: r.bio,
        })
        .collect();

    Ok(Json(DataResponse::new(professionals)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::load_profile;
    use crate::db::fixtures;
    use crate::routes::offerings::list_professional_services;
    use axum::http::StatusCode;
    use sqlx::PgPool;

    async fn admin(state: &AppState) -> RequireAdmin {
        let id = fixtures::profile(&state.db, "admin").await;
        let profile = load_profile(&state.db, &state.cache, id)
            .await
            .unwrap()
            .unwrap();
        RequireAdmin(CurrentProfile::for_tests(profile))
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deactivated_professional_offerings_disappear(pool: PgPool) {
        let state = AppState::for_tests(pool);
        let professional = fixtures::profile(&state.db, "professional").await;
        let service = fixtures::service(&state.db, "Thai", 60).await;
        sqlx::query(
            "INSERT INTO professional_services (professional_id, service_id, is_offered) VALUES ($1, $2, TRUE)",
        )
        .bind(professional)
        .bind(service)
        .execute(&state.db)
        .await
        .unwrap();

        let listed = list_professional_services(State(state.clone()), Path(professional))
            .await
            .into_response();
        assert_eq!(listed.status(), StatusCode::OK);

        let toggled = toggle_user_active(State(state.clone()), admin(&state).await, Path(professional))
            .await
            .into_response();
        assert_eq!(toggled.status(), StatusCode::OK);

        let hidden = list_professional_services(State(state.clone()), Path(professional))
            .await
            .into_response();
        assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn admins_cannot_deactivate_themselves(pool: PgPool) {
        let state = AppState::for_tests(pool);
        let admin = admin(&state).await;
        let own_id = admin.user_id();

        let response = toggle_user_active(State(state.clone()), admin, Path(own_id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(load_profile(&state.db, &state.cache, own_id)
            .await
            .unwrap()
            .unwrap()
            .is_active);
    }
}
