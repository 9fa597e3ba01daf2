use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::{validate_password_len, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db;
use crate::repositories;
use crate::schemas::user::{AdminUserCreate, AdminUserUpdate, UserResponse};
use crate::schemas::Envelope;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/:user_id", get(get_user).patch(update_user))
}

/// Creates the user and its default-school link in one transaction.
async fn create_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<Envelope<UserResponse>>), ApiError> {
    let username = validate_username(&payload.username)?;
    validate_password_len(&payload.password)?;
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("Full name is required".to_string()));
    }

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::schools::find_by_id(&mut *tx, &payload.school_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch school"))?
        .ok_or_else(|| ApiError::NotFound("School not found".to_string()))?;

    let existing = repositories::users::exists_by_username(&mut *tx, &username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing {
        return Err(ApiError::Conflict("User with this username already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        &mut *tx,
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &username,
            hashed_password,
            full_name,
            role: payload.role,
            default_school_id: Some(&payload.school_id),
            is_active: payload.is_active,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            ApiError::Conflict("User with this username already exists".to_string())
        } else {
            ApiError::internal(e, "Failed to create user")
        }
    })?;

    repositories::schools::add_member(&mut tx, &payload.school_id, &user.id, payload.role, true)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to link user to school"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit user creation"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user.id,
        school_id = %payload.school_id,
        action = "user_create",
        "Admin created user"
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(UserResponse::from_db(user)))))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<UserResponse>>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(Envelope::data(UserResponse::from_db(user))))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<Envelope<UserResponse>>, ApiError> {
    if let Some(password) = payload.password.as_deref() {
        validate_password_len(password)?;
    }

    repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let hashed_password = payload
        .password
        .as_deref()
        .map(security::hash_password)
        .transpose()
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    repositories::users::update(
        state.db(),
        &user_id,
        repositories::users::UpdateUser {
            role: payload.role,
            is_active: payload.is_active,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user"))?;

    let updated = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %updated.id,
        action = "user_update",
        "Admin updated user"
    );

    Ok(Json(Envelope::data(UserResponse::from_db(updated))))
}
