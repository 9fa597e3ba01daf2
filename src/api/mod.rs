pub(crate) mod auth;
pub(crate) mod classes;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod router;
pub(crate) mod schools;
pub(crate) mod students;
pub(crate) mod users;
pub(crate) mod validation;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::services::errors::DomainError;
use crate::services::roster_store::RosterTx;

/// Opens the unit of work a roster handler runs its operation in.
pub(crate) async fn begin_roster(state: &AppState) -> Result<Box<dyn RosterTx>, ApiError> {
    state.roster().begin().await.map_err(|err| ApiError::from(DomainError::from(err)))
}
