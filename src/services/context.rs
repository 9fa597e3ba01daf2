use crate::db::types::UserRole;

/// Who is asking, supplied by the authentication layer and trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestContext {
    pub(crate) requester_id: String,
    pub(crate) school_id: String,
    pub(crate) role: UserRole,
}

impl RequestContext {
    pub(crate) fn new(
        requester_id: impl Into<String>,
        school_id: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self { requester_id: requester_id.into(), school_id: school_id.into(), role }
    }
}
