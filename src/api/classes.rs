use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::begin_roster;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::core::state::AppState;
use crate::core::time::current_school_year;
use crate::schemas::roster::{
    ClassCreate, ClassLookupQuery, ClassLookupResponse, ClassResponse, ClassStudentsPayload,
    ClassTeacherPayload,
};
use crate::schemas::Envelope;
use crate::services::class_membership;
use crate::services::class_resolution::{self, ClassLookup, ClassSpec};
use crate::services::roster_store::finish;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_classes).post(create_class))
        .route("/lookup", get(lookup_class))
        .route("/:class_id", get(get_class).delete(delete_class))
        .route("/:class_id/teachers", post(add_teacher))
        .route("/:class_id/teachers/:teacher_id", delete(remove_teacher))
        .route("/:class_id/students", post(add_students))
        .route("/:class_id/students/:student_id", delete(remove_student))
}

async fn create_class(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ClassCreate>,
) -> Result<(StatusCode, Json<Envelope<ClassResponse>>), ApiError> {
    let spec = ClassSpec {
        number: payload.number,
        section: payload.section,
        school_year: payload.school_year.unwrap_or_else(current_school_year),
    };

    let mut tx = begin_roster(&state).await?;
    let outcome =
        class_resolution::resolve_or_create_class(tx.as_mut(), &ctx, &spec, payload.create_if_missing)
            .await;
    let resolved = finish(tx, outcome).await?;

    let status = if resolved.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(Envelope::data(ClassResponse::from_db(resolved.class)))))
}

async fn list_classes(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<ClassResponse>>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = class_membership::list_classes(tx.as_mut(), &ctx).await;
    let classes = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(classes.into_iter().map(ClassResponse::from_db).collect())))
}

async fn lookup_class(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Query(query): Query<ClassLookupQuery>,
) -> Result<Json<Envelope<ClassLookupResponse>>, ApiError> {
    let spec = ClassSpec {
        number: query.number,
        section: query.section,
        school_year: query.school_year.unwrap_or_else(current_school_year),
    };

    let mut tx = begin_roster(&state).await?;
    let outcome = class_resolution::lookup_class(tx.as_mut(), &ctx, &spec).await;
    let lookup = finish(tx, outcome).await?;

    let response = match lookup {
        ClassLookup::Missing => ClassLookupResponse { exists: false, managed: false, class: None },
        ClassLookup::Managed(class) => ClassLookupResponse {
            exists: true,
            managed: true,
            class: Some(ClassResponse::from_db(class)),
        },
        ClassLookup::ManagedByOthers => {
            ClassLookupResponse { exists: true, managed: false, class: None }
        }
    };
    Ok(Json(Envelope::data(response)))
}

async fn get_class(
    Path(class_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ClassResponse>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = class_membership::managed_class(tx.as_mut(), &ctx, &class_id).await;
    let class = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(ClassResponse::from_db(class))))
}

async fn delete_class(
    Path(class_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = class_membership::delete_class(tx.as_mut(), &ctx, &class_id).await;
    let released = finish(tx, outcome).await?;

    Ok(Json(Envelope::message(format!("Class deleted; {released} students need a new class"))))
}

async fn add_teacher(
    Path(class_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ClassTeacherPayload>,
) -> Result<Json<Envelope<ClassResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut tx = begin_roster(&state).await?;
    let outcome =
        class_membership::add_teacher(tx.as_mut(), &ctx, &class_id, &payload.teacher_id).await;
    let class = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(ClassResponse::from_db(class))))
}

async fn remove_teacher(
    Path((class_id, teacher_id)): Path<(String, String)>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ClassResponse>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = class_membership::remove_teacher(tx.as_mut(), &ctx, &class_id, &teacher_id).await;
    let class = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(ClassResponse::from_db(class))))
}

async fn add_students(
    Path(class_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ClassStudentsPayload>,
) -> Result<Json<Envelope<ClassResponse>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome =
        class_membership::add_students(tx.as_mut(), &ctx, &class_id, &payload.student_ids).await;
    let class = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(ClassResponse::from_db(class))))
}

async fn remove_student(
    Path((class_id, student_id)): Path<(String, String)>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ClassResponse>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = class_membership::remove_student(tx.as_mut(), &ctx, &class_id, &student_id).await;
    let class = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(ClassResponse::from_db(class))))
}
