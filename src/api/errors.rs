use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::schemas::{Envelope, RowErrors};
use crate::services::errors::DomainError;

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    /// 400 listing every failing row alongside the joined message.
    RowsRejected(Vec<String>),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::RowsRejected(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Conflicts keep the 400 status clients of the roster endpoints rely on.
impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(message) | DomainError::Conflict(message) => {
                Self::BadRequest(message)
            }
            DomainError::Rejected(errors) => Self::RowsRejected(errors),
            DomainError::NotFound(_) => Self::NotFound(err.to_string()),
            DomainError::Forbidden(message) => Self::Forbidden(message),
            DomainError::Store(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, row_errors) = match self {
            ApiError::RowsRejected(errors) => (errors.join("; "), Some(RowErrors { errors })),
            ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::TooManyRequests(message) => (message.to_string(), None),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (message, None)
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::PayloadTooLarge(message) => (message, None),
        };

        let mut response = (status, Json(Envelope::failure(message, row_errors))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn domain_conflicts_are_bad_requests() {
        let err = ApiError::from(DomainError::conflict("Teacher is already assigned to this class"));
        let (status, json) = body_of(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Teacher is already assigned to this class");
    }

    #[tokio::test]
    async fn hidden_entities_are_not_found() {
        let (status, json) = body_of(DomainError::NotFound("Student").into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Student not found or insufficient permissions");
    }

    #[tokio::test]
    async fn store_failures_pass_the_message_through() {
        let (status, json) = body_of(DomainError::Store("deadlock detected".into()).into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "deadlock detected");
    }

    #[tokio::test]
    async fn rejected_rows_are_listed_in_data() {
        let rows = vec!["Row 2: missing data".to_string(), "Row 5: invalid gender 'x'".to_string()];
        let (status, json) = body_of(DomainError::Rejected(rows).into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Row 2: missing data; Row 5: invalid gender 'x'");
        assert_eq!(json["data"]["errors"][1], "Row 5: invalid gender 'x'");
    }

    #[tokio::test]
    async fn unauthorized_challenges_for_a_bearer_token() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
