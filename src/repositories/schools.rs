use time::PrimitiveDateTime;

use crate::db::models::{School, SchoolMembership};
use crate::db::types::{InstitutionType, SchoolType, UserRole};

const COLUMNS: &str = "\
    id, name, school_type, institution_type, sections, manager_id, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<School>, sqlx::Error> {
    sqlx::query_as::<_, School>(&format!("SELECT {COLUMNS} FROM schools WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) struct CreateSchool<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) school_type: SchoolType,
    pub(crate) institution_type: InstitutionType,
    pub(crate) sections: &'a [String],
    pub(crate) manager_id: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSchool<'_>,
) -> Result<School, sqlx::Error> {
    sqlx::query_as::<_, School>(&format!(
        "INSERT INTO schools (
            id, name, school_type, institution_type, sections, manager_id, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.name)
    .bind(params.school_type)
    .bind(params.institution_type)
    .bind(params.sections)
    .bind(params.manager_id)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_membership(
    executor: impl sqlx::PgExecutor<'_>,
    school_id: &str,
    user_id: &str,
) -> Result<Option<SchoolMembership>, sqlx::Error> {
    sqlx::query_as::<_, SchoolMembership>(
        "SELECT school_id, user_id, role, is_default
         FROM school_users
         WHERE school_id = $1 AND user_id = $2",
    )
    .bind(school_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Links a user to a school. A default link replaces the user's previous
/// default so at most one remains.
pub(crate) async fn add_member(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    school_id: &str,
    user_id: &str,
    role: UserRole,
    is_default: bool,
) -> Result<(), sqlx::Error> {
    if is_default {
        sqlx::query("UPDATE school_users SET is_default = FALSE WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
    }

    sqlx::query(
        "INSERT INTO school_users (school_id, user_id, role, is_default)
         VALUES ($1,$2,$3,$4)
         ON CONFLICT (school_id, user_id)
         DO UPDATE SET role = EXCLUDED.role, is_default = EXCLUDED.is_default",
    )
    .bind(school_id)
    .bind(user_id)
    .bind(role)
    .bind(is_default)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
