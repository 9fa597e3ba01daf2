use std::path::Path;

use crate::api::errors::ApiError;
use crate::core::config::ImportSettings;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const MIN_USERNAME_LEN: usize = 3;

/// Trimmed, lowercased username of letters, digits, dots, dashes or underscores.
pub(crate) fn validate_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim().to_ascii_lowercase();
    let valid = username.chars().count() >= MIN_USERNAME_LEN
        && username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(username)
    } else {
        Err(ApiError::BadRequest("Invalid username format".to_string()))
    }
}

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

/// Checks the uploaded workbook's name and size against the import limits.
pub(crate) fn validate_spreadsheet_upload(
    filename: &str,
    size: usize,
    settings: &ImportSettings,
) -> Result<(), ApiError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !settings.allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!("File extension '{extension}' is not allowed")));
    }

    let limit = settings.max_upload_size_mb.saturating_mul(1024 * 1024);
    if size as u64 > limit {
        return Err(ApiError::PayloadTooLarge(format!(
            "File exceeds the {} MB upload limit",
            settings.max_upload_size_mb
        )));
    }

    Ok(())
}
