use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::types::UserRole;
use crate::services::context::RequestContext;

/// Identity decoded from the bearer token.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub(crate) user_id: String,
    pub(crate) school_id: Option<String>,
    pub(crate) role: UserRole,
}

pub(crate) struct CurrentAdmin(pub(crate) CurrentUser);

/// Requester context for roster operations. Needs a school on the token.
pub(crate) struct CurrentTeacher(pub(crate) RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        Ok(CurrentUser { user_id: claims.sub, school_id: claims.school_id, role: claims.role })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentTeacher {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser { user_id, school_id, role } =
            CurrentUser::from_request_parts(parts, state).await?;

        let school_id =
            school_id.ok_or(ApiError::Forbidden("No school associated with this account"))?;

        Ok(CurrentTeacher(RequestContext::new(user_id, school_id, role)))
    }
}
