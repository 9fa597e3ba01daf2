use uuid::Uuid;

use crate::core::{metrics, time::primitive_now_utc};
use crate::db::models::{Class, ClassKey, School};
use crate::services::context::RequestContext;
use crate::services::errors::{DomainError, DomainResult};
use crate::services::roster_store::{InsertOutcome, NewClass, RosterTx};
use crate::services::validation_rules;

pub(crate) const MANAGED_BY_OTHERS: &str = "Class already exists and is managed by another teacher";

/// Raw class coordinates as supplied by a caller.
#[derive(Debug, Clone)]
pub(crate) struct ClassSpec {
    pub(crate) number: i64,
    pub(crate) section: String,
    pub(crate) school_year: String,
}

#[derive(Debug, Clone)]
pub(crate) enum ClassLookup {
    Missing,
    Managed(Class),
    ManagedByOthers,
}

#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub(crate) class: Class,
    pub(crate) created: bool,
}

pub(crate) async fn requester_school(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
) -> DomainResult<School> {
    tx.school(&ctx.school_id).await?.ok_or(DomainError::NotFound("School"))
}

pub(crate) fn natural_key(school: &School, spec: &ClassSpec) -> DomainResult<ClassKey> {
    Ok(ClassKey {
        school_id: school.id.clone(),
        number: validation_rules::class_number(spec.number, school.school_type)?,
        section: validation_rules::section(&spec.section, &school.sections)?,
        school_year: validation_rules::school_year(&spec.school_year)?,
    })
}

/// Read-only existence check, the first half of creation on demand.
pub(crate) async fn lookup_class(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    spec: &ClassSpec,
) -> DomainResult<ClassLookup> {
    let school = requester_school(tx, ctx).await?;
    let key = natural_key(&school, spec)?;

    Ok(match tx.class_by_key(&key).await? {
        None => ClassLookup::Missing,
        Some(class) if class.is_managed_by(&ctx.requester_id) => ClassLookup::Managed(class),
        Some(_) => ClassLookup::ManagedByOthers,
    })
}

/// Finds the requester's class for the natural key or creates it.
///
/// Creation needs `create_if_missing`. A lost insert race is answered by
/// reading the winner's row.
pub(crate) async fn resolve_or_create_class(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    spec: &ClassSpec,
    create_if_missing: bool,
) -> DomainResult<Resolved> {
    let school = requester_school(tx, ctx).await?;
    let key = natural_key(&school, spec)?;

    if let Some(class) = tx.class_by_key(&key).await? {
        return authorize(class, ctx).map(|class| Resolved { class, created: false });
    }

    let label = format!("{}{} {}", key.number, key.section, key.school_year);
    if !create_if_missing {
        return Err(DomainError::conflict(format!(
            "Class {label} does not exist; confirm to create it"
        )));
    }

    let outcome = tx
        .insert_class(NewClass {
            id: Uuid::new_v4().to_string(),
            key: key.clone(),
            main_teacher_id: ctx.requester_id.clone(),
            created_at: primitive_now_utc(),
        })
        .await?;

    match outcome {
        InsertOutcome::Inserted(class) => {
            tracing::info!(
                class_id = %class.id,
                school_id = %class.school_id,
                teacher_id = %ctx.requester_id,
                role = ?ctx.role,
                class = %label,
                "Class created"
            );
            metrics::record_class_created();
            Ok(Resolved { class, created: true })
        }
        InsertOutcome::Duplicate => {
            tracing::info!(class = %label, "Class created concurrently; reading existing row");
            let class = tx.class_by_key(&key).await?.ok_or_else(|| {
                DomainError::conflict(format!(
                    "Class {label} is being created by another request; retry"
                ))
            })?;
            authorize(class, ctx).map(|class| Resolved { class, created: false })
        }
    }
}

fn authorize(class: Class, ctx: &RequestContext) -> DomainResult<Class> {
    if class.is_managed_by(&ctx.requester_id) {
        Ok(class)
    } else {
        Err(DomainError::conflict(MANAGED_BY_OTHERS))
    }
}
