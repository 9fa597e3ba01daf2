use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{InstitutionType, SchoolType, UserRole};
use crate::repositories;
use crate::schemas::school::{MemberCreate, SchoolCreate, SchoolResponse};
use crate::schemas::Envelope;
use crate::services::validation_rules;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_school))
        .route("/:school_id", get(get_school))
        .route("/:school_id/members", post(add_member))
}

/// Normalized sections for a new school, after the type rules.
fn checked_sections(payload: &SchoolCreate) -> Result<Vec<String>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("School name is required".to_string()));
    }
    if payload.school_type == SchoolType::Middle && payload.institution_type != InstitutionType::None
    {
        return Err(ApiError::BadRequest(
            "A middle school cannot declare an institution type".to_string(),
        ));
    }
    validation_rules::school_sections(&payload.sections)
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

async fn create_school(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<SchoolCreate>,
) -> Result<(StatusCode, Json<Envelope<SchoolResponse>>), ApiError> {
    let sections = checked_sections(&payload)?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    if let Some(manager_id) = payload.manager_id.as_deref() {
        repositories::users::find_by_id(&mut *tx, manager_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch manager"))?
            .ok_or_else(|| ApiError::NotFound("Manager not found".to_string()))?;
    }

    let school = repositories::schools::create(
        &mut *tx,
        repositories::schools::CreateSchool {
            id: &Uuid::new_v4().to_string(),
            name: payload.name.trim(),
            school_type: payload.school_type,
            institution_type: payload.institution_type,
            sections: &sections,
            manager_id: payload.manager_id.as_deref(),
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create school"))?;

    if let Some(manager_id) = payload.manager_id.as_deref() {
        repositories::schools::add_member(&mut tx, &school.id, manager_id, UserRole::Teacher, false)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to link manager to school"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit school creation"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        school_id = %school.id,
        action = "school_create",
        "Admin created school"
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(SchoolResponse::from_db(school)))))
}

async fn get_school(
    Path(school_id): Path<String>,
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<SchoolResponse>>, ApiError> {
    if user.role != UserRole::Admin {
        let membership =
            repositories::schools::find_membership(state.db(), &school_id, &user.user_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch school membership"))?;
        if membership.is_none() {
            return Err(ApiError::NotFound(
                "School not found or insufficient permissions".to_string(),
            ));
        }
    }

    let school = repositories::schools::find_by_id(state.db(), &school_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch school"))?
        .ok_or_else(|| {
            ApiError::NotFound("School not found or insufficient permissions".to_string())
        })?;

    Ok(Json(Envelope::data(SchoolResponse::from_db(school))))
}

async fn add_member(
    Path(school_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<MemberCreate>,
) -> Result<Json<Envelope<()>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::schools::find_by_id(&mut *tx, &school_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch school"))?
        .ok_or_else(|| ApiError::NotFound("School not found".to_string()))?;
    repositories::users::find_by_id(&mut *tx, &payload.user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    repositories::schools::add_member(
        &mut tx,
        &school_id,
        &payload.user_id,
        payload.role,
        payload.is_default,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to link user to school"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit school membership"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        school_id = %school_id,
        user_id = %payload.user_id,
        is_default = payload.is_default,
        action = "school_member_add",
        "Admin linked user to school"
    );

    Ok(Json(Envelope::message("User linked to school")))
}
