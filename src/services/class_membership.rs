//! Class <-> student and class <-> teacher edits.
//!
//! Both sides of each relation are written inside the caller's unit of work:
//! a class lists a student exactly when the student's class reference points
//! back at it, and a class always lists its main teacher.

use std::collections::HashSet;

use crate::db::models::{Class, Student};
use crate::services::context::RequestContext;
use crate::services::errors::{DomainError, DomainResult};
use crate::services::roster_store::{Placement, RosterTx};

/// Class in the requester's school that the requester manages.
pub(crate) async fn managed_class(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: &str,
) -> DomainResult<Class> {
    match tx.class_by_id(class_id).await? {
        Some(class) if class.school_id == ctx.school_id && class.is_managed_by(&ctx.requester_id) => {
            Ok(class)
        }
        _ => Err(DomainError::NotFound("Class")),
    }
}

pub(crate) async fn list_classes(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
) -> DomainResult<Vec<Class>> {
    Ok(tx.classes_for_teacher(&ctx.school_id, &ctx.requester_id).await?)
}

async fn reload(tx: &mut dyn RosterTx, class_id: &str) -> DomainResult<Class> {
    tx.class_by_id(class_id).await?.ok_or(DomainError::NotFound("Class"))
}

/// Moves `student` into `class`, pulling it from any previous class, and
/// makes `teacher_id` one of its teachers.
pub(crate) async fn place_student(
    tx: &mut dyn RosterTx,
    class: &Class,
    student: &Student,
    teacher_id: &str,
) -> DomainResult<()> {
    if let Some(previous) = student.class_id.as_deref().filter(|id| *id != class.id) {
        tx.remove_class_student(previous, &student.id).await?;
    }
    tx.add_class_student(&class.id, &student.id).await?;
    tx.set_placement(&student.id, Some(&Placement::of(class))).await?;
    tx.add_student_teacher(&student.id, teacher_id).await?;
    Ok(())
}

pub(crate) async fn add_students(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: &str,
    student_ids: &[String],
) -> DomainResult<Class> {
    let class = managed_class(tx, ctx, class_id).await?;
    if student_ids.is_empty() {
        return Err(DomainError::validation("At least one student id is required"));
    }

    let mut seen = HashSet::new();
    for student_id in student_ids.iter().filter(|id| seen.insert(id.as_str())) {
        let student = match tx.student_by_id(student_id).await? {
            Some(student) if student.school_id == class.school_id => student,
            _ => return Err(DomainError::NotFound("Student")),
        };
        place_student(tx, &class, &student, &ctx.requester_id).await?;
    }

    tracing::info!(
        class_id = %class.id,
        teacher_id = %ctx.requester_id,
        students = seen.len(),
        "Students added to class"
    );
    reload(tx, &class.id).await
}

pub(crate) async fn remove_student(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: &str,
    student_id: &str,
) -> DomainResult<Class> {
    let class = managed_class(tx, ctx, class_id).await?;
    if !class.has_student(student_id) {
        return Err(DomainError::NotFound("Student"));
    }

    tx.remove_class_student(&class.id, student_id).await?;
    let points_here = tx
        .student_by_id(student_id)
        .await?
        .is_some_and(|student| student.class_id.as_deref() == Some(class.id.as_str()));
    if points_here {
        tx.set_placement(student_id, None).await?;
    }

    tracing::info!(class_id = %class.id, student_id, "Student removed from class");
    reload(tx, &class.id).await
}

pub(crate) async fn add_teacher(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: &str,
    teacher_id: &str,
) -> DomainResult<Class> {
    let class = managed_class(tx, ctx, class_id).await?;
    if tx.school_member_role(&class.school_id, teacher_id).await?.is_none() {
        return Err(DomainError::NotFound("Teacher"));
    }
    if !tx.add_class_teacher(&class.id, teacher_id).await? {
        return Err(DomainError::conflict("Teacher is already assigned to this class"));
    }

    tracing::info!(class_id = %class.id, teacher_id, added_by = %ctx.requester_id, "Teacher added to class");
    reload(tx, &class.id).await
}

pub(crate) async fn remove_teacher(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: &str,
    teacher_id: &str,
) -> DomainResult<Class> {
    let class = managed_class(tx, ctx, class_id).await?;
    if class.main_teacher_id != ctx.requester_id {
        return Err(DomainError::Forbidden("Only the main teacher can remove teachers"));
    }
    if class.main_teacher_id == teacher_id {
        return Err(DomainError::conflict("The main teacher cannot be removed from the class"));
    }
    if !tx.remove_class_teacher(&class.id, teacher_id).await? {
        return Err(DomainError::conflict("Teacher is not assigned to this class"));
    }

    tracing::info!(class_id = %class.id, teacher_id, "Teacher removed from class");
    reload(tx, &class.id).await
}

/// Deletes the class and returns how many students lost their placement.
pub(crate) async fn delete_class(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: &str,
) -> DomainResult<usize> {
    let class = managed_class(tx, ctx, class_id).await?;
    if class.main_teacher_id != ctx.requester_id {
        return Err(DomainError::Forbidden("Only the main teacher can delete the class"));
    }

    let mut cleared = 0;
    for student_id in &class.students {
        let points_here = tx
            .student_by_id(student_id)
            .await?
            .is_some_and(|student| student.class_id.as_deref() == Some(class.id.as_str()));
        if points_here {
            tx.set_placement(student_id, None).await?;
            cleared += 1;
        }
    }
    tx.delete_class(&class.id).await?;

    tracing::info!(class_id = %class.id, cleared, "Class deleted");
    Ok(cleared)
}
