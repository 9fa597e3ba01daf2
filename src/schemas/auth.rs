use serde::{Deserialize, Serialize};

use crate::db::types::UserRole;
use crate::schemas::user::UserResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) user: UserResponse,
}

/// Identity carried by the bearer token.
#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) user_id: String,
    pub(crate) school_id: Option<String>,
    pub(crate) role: UserRole,
}
