use thiserror::Error;

use crate::services::roster_store::StoreError;
use crate::services::validation_rules::RuleViolation;

/// Outcome taxonomy of every roster operation.
///
/// Absent entities and entities the requester may not see are both reported
/// as `NotFound`, so callers cannot tell them apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum DomainError {
    #[error("{0}")]
    Validation(String),
    /// Row-level failures of a batch; nothing from it was written.
    #[error("{}", .0.join("; "))]
    Rejected(Vec<String>),
    #[error("{0} not found or insufficient permissions")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Store(String),
}

impl DomainError {
    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Rejected(_) => "rejected",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store",
        }
    }
}

impl From<RuleViolation> for DomainError {
    fn from(value: RuleViolation) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        Self::Store(value.to_string())
    }
}

pub(crate) type DomainResult<T> = Result<T, DomainError>;
