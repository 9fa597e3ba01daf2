use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod roster;
pub(crate) mod school;
pub(crate) mod user;

/// Per-row failures carried in the `data` of a rejected batch.
#[derive(Debug, Serialize)]
pub(crate) struct RowErrors {
    pub(crate) errors: Vec<String>,
}

/// Body shape shared by every API response.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T> {
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl<T> Envelope<T> {
    pub(crate) fn data(data: T) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    /// Failed outcome, optionally with details such as per-row errors.
    pub(crate) fn failure(message: impl Into<String>, details: Option<T>) -> Self {
        Self { success: false, data: details, message: Some(message.into()) }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope<()> {
    pub(crate) fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, message: Some(message.into()) }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
}
