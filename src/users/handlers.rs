use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::MessageResponse,
        extractors::Actor,
        password::{hash_password, verify_password},
        validate::{normalize_email, validate_email, validate_new_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            AdminUpdateUserRequest, PublicUser, UpdatePasswordRequest,
            UpdateProfilePictureRequest, UpdateProfileRequest,
        },
        policy,
        repo_types::User,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/profile", get(get_profile).patch(update_profile))
        .route("/users/password", patch(update_password))
        .route("/users/profile-picture", patch(update_profile_picture))
        .route(
            "/users/:id",
            get(get_user).patch(admin_update_user).delete(delete_user),
        )
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// Normalize and validate an email change, refusing addresses already owned
/// by a different account.
async fn prepare_email_change(
    state: &AppState,
    email: &str,
    for_user: Uuid,
) -> Result<String, ApiError> {
    let email = normalize_email(email);
    validate_email(&email)?;
    if let Some(existing) = User::find_by_email(&state.db, &email).await? {
        if existing.id != for_user {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
    }
    Ok(email)
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<PublicUser>, ApiError> {
    let user = load_user(&state, actor.id).await?;
    Ok(Json(PublicUser::from(user)))
}

/// Self-service profile update: name and email only. Role and password are
/// not reachable through this path.
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let email = match payload.email.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(e) => Some(prepare_email_change(&state, e, actor.id).await?),
        None => None,
    };

    let user = User::update_profile(&state.db, actor.id, name.as_deref(), email.as_deref()).await?;
    info!(user_id = %actor.id, "profile updated");
    Ok(Json(PublicUser::from(user)))
}

/// Change own password; requires the current one. The failure message is
/// deliberately generic.
#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_new_password(&payload.new_password)?;

    let user = load_user(&state, actor.id).await?;
    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id = %actor.id, "password change with wrong current password");
        return Err(ApiError::Unauthorized("Current password is incorrect".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, actor.id, &hash).await?;

    info!(user_id = %actor.id, "password changed");
    Ok(Json(MessageResponse::success("Password updated")))
}

/// Records the picture URL; blob upload and storage live elsewhere.
#[instrument(skip(state, payload))]
pub async fn update_profile_picture(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<UpdateProfilePictureRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let user =
        User::update_profile_picture(&state.db, actor.id, &payload.profile_picture_url).await?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    actor.require_admin()?;
    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    actor.require_admin()?;
    let user = load_user(&state, id).await?;
    Ok(Json(PublicUser::from(user)))
}

/// Admin update: name, email, role. The password column is explicitly out
/// of reach here, even if the request body carries a `password` key.
#[instrument(skip(state, payload))]
pub async fn admin_update_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    actor.require_admin()?;
    load_user(&state, id).await?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let email = match payload.email.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(e) => Some(prepare_email_change(&state, e, id).await?),
        None => None,
    };

    let user =
        User::admin_update(&state.db, id, name.as_deref(), email.as_deref(), payload.role).await?;
    info!(user_id = %id, admin_id = %actor.id, "user updated by admin");
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let target = load_user(&state, id).await?;
    policy::authorize_user_delete(&actor, &target)?;

    User::delete(&state.db, id).await?;
    info!(user_id = %id, admin_id = %actor.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
