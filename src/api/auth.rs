use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::security::{self, TokenSubject};
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, SessionResponse, TokenResponse};
use crate::schemas::user::UserResponse;
use crate::schemas::Envelope;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<TokenResponse>>, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }

    let security_settings = state.settings().security();
    let rate_key = format!("rl:login:{username}");
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            security_settings.login_rate_limit,
            security_settings.login_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user = fetch_user_by_username(&state, username).await?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;
    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = security::create_access_token(
        TokenSubject {
            user_id: &user.id,
            school_id: user.default_school_id.as_deref(),
            role: user.role,
        },
        state.settings(),
        None,
    )
    .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(user_id = %user.id, action = "login", "User logged in");

    Ok(Json(Envelope::data(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    })))
}

async fn me(user: CurrentUser) -> Json<Envelope<SessionResponse>> {
    Json(Envelope::data(SessionResponse {
        user_id: user.user_id,
        school_id: user.school_id,
        role: user.role,
    }))
}

async fn fetch_user_by_username(state: &AppState, username: &str) -> Result<User, ApiError> {
    repositories::users::find_by_username(state.db(), username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))
}
