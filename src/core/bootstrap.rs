use uuid::Uuid;

use crate::core::config::Settings;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = &admin.first_superuser_username;
    let user = repositories::users::find_by_username(state.db(), username).await?;

    if let Some(user) = user {
        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);
        let hashed_password = if verified {
            None
        } else {
            Some(security::hash_password(&admin.first_superuser_password)?)
        };
        let role = (user.role != UserRole::Admin).then_some(UserRole::Admin);
        let is_active = (!user.is_active).then_some(true);

        if hashed_password.is_none() && role.is_none() && is_active.is_none() {
            tracing::info!("Default superuser already up to date");
            return Ok(());
        }

        repositories::users::update(
            state.db(),
            &user.id,
            repositories::users::UpdateUser {
                role,
                is_active,
                hashed_password,
                updated_at: primitive_now_utc(),
            },
        )
        .await?;

        tracing::info!(username = %username, "Updated default superuser");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password,
            full_name: "Super Admin",
            role: UserRole::Admin,
            default_school_id: None,
            is_active: true,
            created_at: primitive_now_utc(),
        },
    )
    .await?;

    tracing::info!(username = %username, "Created default superuser");
    Ok(())
}

/// The template produces example students the importer may reject when the
/// two bands differ, so operators get told at startup.
pub(crate) fn log_age_bands(settings: &Settings) {
    let import = settings.import();
    if import.min_age == import.template_min_age && import.max_age == import.template_max_age {
        return;
    }

    tracing::warn!(
        import_min_age = import.min_age,
        import_max_age = import.max_age,
        template_min_age = import.template_min_age,
        template_max_age = import.template_max_age,
        "Import template age band differs from the accepted import band"
    );
}
