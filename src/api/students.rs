use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use validator::Validate;

use crate::api::begin_roster;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::api::validation::validate_spreadsheet_upload;
use crate::core::config::ImportSettings;
use crate::core::state::AppState;
use crate::core::time::{current_school_year, today_utc};
use crate::schemas::roster::{
    BatchResponse, BatchSubmission, ClassResponse, ClassTarget, StudentCreate, StudentListQuery,
    StudentResponse, StudentUpdate,
};
use crate::schemas::Envelope;
use crate::services::class_resolution::{self, ClassSpec};
use crate::services::import_template::{self, TEMPLATE_CONTENT_TYPE, TEMPLATE_FILENAME};
use crate::services::roster_store::finish;
use crate::services::student_import::{self, spreadsheet::SheetRow, ImportContext, ImportReport};
use crate::services::student_placement::{self, ClassChoice, StudentInput, StudentPatch};
use crate::services::validation_rules;

/// Multipart framing on top of the workbook itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub(crate) fn router(import: &ImportSettings) -> Router<AppState> {
    let upload_limit = usize::try_from(import.max_upload_size_mb.saturating_mul(1024 * 1024))
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/unassigned", get(list_unassigned))
        .route("/batch", post(submit_batch))
        .route("/import", post(preview_import).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/import/template", get(download_template))
        .route("/:student_id", patch(update_student).delete(delete_student))
        .route("/:student_id/transfer", post(transfer_student))
        .route("/:student_id/assign-class", post(assign_class))
}

async fn create_student(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<StudentCreate>,
) -> Result<(StatusCode, Json<Envelope<StudentResponse>>), ApiError> {
    let input = StudentInput {
        first_name: payload.first_name,
        last_name: payload.last_name,
        gender: payload.gender,
        birth_date: payload.birth_date,
        note: payload.note,
        track: payload.track,
        tax_code: payload.tax_code,
    };
    let choice = payload.class.map(|class| ClassChoice {
        spec: ClassSpec {
            number: class.number,
            section: class.section,
            school_year: class.school_year.unwrap_or_else(current_school_year),
        },
        create_if_missing: class.create_if_missing,
    });

    let mut tx = begin_roster(&state).await?;
    let outcome =
        student_placement::create_student(tx.as_mut(), &ctx, &input, choice.as_ref()).await;
    let student = finish(tx, outcome).await?;

    Ok((StatusCode::CREATED, Json(Envelope::data(StudentResponse::from_db(student)))))
}

async fn list_students(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Query(query): Query<StudentListQuery>,
) -> Result<Json<Envelope<Vec<StudentResponse>>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome =
        student_placement::list_students(tx.as_mut(), &ctx, query.class_id.as_deref()).await;
    let students = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(students.into_iter().map(StudentResponse::from_db).collect())))
}

async fn list_unassigned(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<StudentResponse>>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = student_placement::list_unassigned(tx.as_mut(), &ctx).await;
    let students = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(students.into_iter().map(StudentResponse::from_db).collect())))
}

async fn update_student(
    Path(student_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<Envelope<StudentResponse>>, ApiError> {
    let patch = StudentPatch {
        first_name: payload.first_name,
        last_name: payload.last_name,
        gender: payload.gender,
        birth_date: payload.birth_date,
        note: payload.note,
        track: payload.track,
        tax_code: payload.tax_code,
    };

    let mut tx = begin_roster(&state).await?;
    let outcome = student_placement::update_student(tx.as_mut(), &ctx, &student_id, &patch).await;
    let student = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(StudentResponse::from_db(student))))
}

async fn delete_student(
    Path(student_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let mut tx = begin_roster(&state).await?;
    let outcome = student_placement::delete_student(tx.as_mut(), &ctx, &student_id).await;
    finish(tx, outcome).await?;

    Ok(Json(Envelope::message("Student deleted")))
}

async fn transfer_student(
    Path(student_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ClassTarget>,
) -> Result<Json<Envelope<StudentResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut tx = begin_roster(&state).await?;
    let outcome =
        student_placement::transfer(tx.as_mut(), &ctx, &student_id, &payload.class_id).await;
    let student = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(StudentResponse::from_db(student))))
}

async fn assign_class(
    Path(student_id): Path<String>,
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ClassTarget>,
) -> Result<Json<Envelope<StudentResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut tx = begin_roster(&state).await?;
    let outcome =
        student_placement::assign_first_class(tx.as_mut(), &ctx, &student_id, &payload.class_id)
            .await;
    let student = finish(tx, outcome).await?;

    Ok(Json(Envelope::data(StudentResponse::from_db(student))))
}

async fn submit_batch(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<BatchSubmission>,
) -> Result<(StatusCode, Json<Envelope<BatchResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let school_year = match payload.school_year.as_deref() {
        Some(raw) => validation_rules::school_year(raw)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        None => current_school_year(),
    };
    let rows: Vec<SheetRow> = payload
        .rows
        .iter()
        .enumerate()
        .map(|(index, object)| SheetRow::from_json(index, object))
        .collect();

    let mut tx = begin_roster(&state).await?;
    let outcome = student_placement::submit_batch(
        tx.as_mut(),
        &ctx,
        &rows,
        state.settings().import(),
        today_utc(),
        &school_year,
        payload.create_missing_classes,
    )
    .await;
    let batch = finish(tx, outcome).await?;

    let message = format!("{} students imported", batch.students.len());
    let response = BatchResponse {
        students: batch.students.into_iter().map(StudentResponse::from_db).collect(),
        classes_created: batch.classes_created.into_iter().map(ClassResponse::from_db).collect(),
    };
    Ok((StatusCode::CREATED, Json(Envelope::data(response).with_message(message))))
}

/// Validates an uploaded workbook and returns the outcome without writing.
async fn preview_import(
    CurrentTeacher(ctx): CurrentTeacher,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<ImportReport>>), ApiError> {
    let import = state.settings().import();
    let max_bytes = import.max_upload_size_mb.saturating_mul(1024 * 1024);

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().map(|s| s.to_string());
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
        {
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File exceeds the {} MB upload limit",
                    import.max_upload_size_mb
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        file_bytes = Some(bytes);
    }

    let file_bytes =
        file_bytes.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    let filename =
        filename.ok_or_else(|| ApiError::BadRequest("File name is required".to_string()))?;
    validate_spreadsheet_upload(&filename, file_bytes.len(), import)?;

    let mut tx = begin_roster(&state).await?;
    let outcome = class_resolution::requester_school(tx.as_mut(), &ctx).await;
    let school = finish(tx, outcome).await?;

    let context = ImportContext {
        school_type: school.school_type,
        sections: &school.sections,
        min_age: import.min_age,
        max_age: import.max_age,
        today: today_utc(),
    };
    let report = student_import::import_workbook(&file_bytes, context)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    tracing::info!(
        teacher_id = %ctx.requester_id,
        filename = %filename,
        total_rows = report.total_rows,
        failed_rows = report.errors.len(),
        "Student import previewed"
    );

    if report.is_accepted() {
        let message = format!("{} rows ready to import", report.valid_rows);
        return Ok((StatusCode::OK, Json(Envelope::data(report).with_message(message))));
    }

    let message = format!("{} rows failed validation; nothing was imported", report.errors.len());
    Ok((StatusCode::BAD_REQUEST, Json(Envelope::failure(message, Some(report)))))
}

async fn download_template(
    CurrentTeacher(_ctx): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let import = state.settings().import();
    let bytes =
        import_template::build_template(import.template_min_age, import.template_max_age, today_utc())
            .map_err(|e| ApiError::internal(e, "Failed to build import template"))?;

    Ok((
        [
            (header::CONTENT_TYPE, TEMPLATE_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{TEMPLATE_FILENAME}\"")),
        ],
        bytes,
    ))
}
