//! Unit-of-work port for class and student writes.
//!
//! Every operation that touches more than one record runs against a single
//! [`RosterTx`], which is committed or rolled back as a whole.

#[cfg(test)]
pub(crate) mod memory;
pub(crate) mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, PrimitiveDateTime};

use crate::db::models::{Class, ClassKey, School, Student};
use crate::db::types::{Gender, UserRole};
use crate::services::errors::DomainResult;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NewClass {
    pub(crate) id: String,
    pub(crate) key: ClassKey,
    pub(crate) main_teacher_id: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub(crate) enum InsertOutcome {
    Inserted(Class),
    /// The natural key belongs to a class committed by someone else.
    Duplicate,
}

#[derive(Debug, Clone)]
pub(crate) struct NewStudent {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) gender: Gender,
    pub(crate) birth_date: Option<Date>,
    pub(crate) note: String,
    pub(crate) track: Option<String>,
    pub(crate) tax_code: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StudentChanges {
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) gender: Option<Gender>,
    pub(crate) birth_date: Option<Date>,
    pub(crate) note: Option<String>,
    pub(crate) track: Option<String>,
    pub(crate) tax_code: Option<String>,
}

/// Class fields copied onto a student that belongs to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    pub(crate) class_id: String,
    pub(crate) class_number: i16,
    pub(crate) section: String,
    pub(crate) school_year: String,
}

impl Placement {
    pub(crate) fn of(class: &Class) -> Self {
        Self {
            class_id: class.id.clone(),
            class_number: class.number,
            section: class.section.clone(),
            school_year: class.school_year.clone(),
        }
    }
}

#[async_trait]
pub(crate) trait RosterStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RosterTx>, StoreError>;
}

#[async_trait]
pub(crate) trait RosterTx: Send {
    async fn school(&mut self, school_id: &str) -> Result<Option<School>, StoreError>;
    async fn school_member_role(
        &mut self,
        school_id: &str,
        user_id: &str,
    ) -> Result<Option<UserRole>, StoreError>;

    async fn class_by_id(&mut self, class_id: &str) -> Result<Option<Class>, StoreError>;
    async fn class_by_key(&mut self, key: &ClassKey) -> Result<Option<Class>, StoreError>;
    async fn insert_class(&mut self, class: NewClass) -> Result<InsertOutcome, StoreError>;
    async fn delete_class(&mut self, class_id: &str) -> Result<(), StoreError>;
    async fn classes_for_teacher(
        &mut self,
        school_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<Class>, StoreError>;

    /// Set-add; `false` when the student was already a member.
    async fn add_class_student(&mut self, class_id: &str, student_id: &str)
        -> Result<bool, StoreError>;
    /// Set-remove; `false` when the student was not a member.
    async fn remove_class_student(
        &mut self,
        class_id: &str,
        student_id: &str,
    ) -> Result<bool, StoreError>;
    async fn add_class_teacher(&mut self, class_id: &str, teacher_id: &str)
        -> Result<bool, StoreError>;
    async fn remove_class_teacher(
        &mut self,
        class_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError>;

    async fn student_by_id(&mut self, student_id: &str) -> Result<Option<Student>, StoreError>;
    async fn insert_student(&mut self, student: NewStudent) -> Result<Student, StoreError>;
    async fn update_student(
        &mut self,
        student_id: &str,
        changes: &StudentChanges,
    ) -> Result<(), StoreError>;
    async fn set_placement(
        &mut self,
        student_id: &str,
        placement: Option<&Placement>,
    ) -> Result<(), StoreError>;
    async fn delete_student(&mut self, student_id: &str) -> Result<(), StoreError>;
    async fn add_student_teacher(
        &mut self,
        student_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError>;
    async fn students_for_teacher(
        &mut self,
        school_id: &str,
        teacher_id: &str,
        class_id: Option<&str>,
    ) -> Result<Vec<Student>, StoreError>;
    async fn unassigned_students(
        &mut self,
        school_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<Student>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Commits on success and rolls back on failure. The operation's own error
/// is returned unchanged even when the rollback itself fails.
pub(crate) async fn finish<T>(tx: Box<dyn RosterTx>, outcome: DomainResult<T>) -> DomainResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back roster transaction");
            }
            tracing::debug!(kind = err.kind(), error = %err, "Roster transaction rolled back");
            Err(err)
        }
    }
}
