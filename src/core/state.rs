use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::roster_store::RosterStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    roster: Arc<dyn RosterStore>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        roster: Arc<dyn RosterStore>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, roster }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    /// Unit-of-work entry point for class and student operations.
    pub(crate) fn roster(&self) -> &dyn RosterStore {
        self.inner.roster.as_ref()
    }
}
