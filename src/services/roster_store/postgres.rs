use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::core::time::primitive_now_utc;
use crate::db::models::{Class, ClassKey, School, Student};
use crate::db::types::UserRole;
use crate::repositories;

use super::{
    InsertOutcome, NewClass, NewStudent, Placement, RosterStore, RosterTx, StoreError,
    StudentChanges,
};

#[derive(Clone)]
pub(crate) struct PgRosterStore {
    pool: PgPool,
}

impl PgRosterStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterStore for PgRosterStore {
    async fn begin(&self) -> Result<Box<dyn RosterTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgRosterTx { tx }))
    }
}

/// Dropping without `commit` rolls the transaction back.
pub(crate) struct PgRosterTx {
    tx: Transaction<'static, Postgres>,
}

impl PgRosterTx {
    async fn load_class(&mut self, class_id: &str) -> Result<Class, StoreError> {
        repositories::classes::find_by_id(&mut *self.tx, class_id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("class {class_id} vanished mid-transaction")))
    }

    async fn load_student(&mut self, student_id: &str) -> Result<Student, StoreError> {
        repositories::students::find_by_id(&mut *self.tx, student_id)
            .await?
            .ok_or_else(|| {
                StoreError::Backend(format!("student {student_id} vanished mid-transaction"))
            })
    }
}

#[async_trait]
impl RosterTx for PgRosterTx {
    async fn school(&mut self, school_id: &str) -> Result<Option<School>, StoreError> {
        Ok(repositories::schools::find_by_id(&mut *self.tx, school_id).await?)
    }

    async fn school_member_role(
        &mut self,
        school_id: &str,
        user_id: &str,
    ) -> Result<Option<UserRole>, StoreError> {
        let membership =
            repositories::schools::find_membership(&mut *self.tx, school_id, user_id).await?;
        Ok(membership.map(|membership| membership.role))
    }

    async fn class_by_id(&mut self, class_id: &str) -> Result<Option<Class>, StoreError> {
        Ok(repositories::classes::find_by_id(&mut *self.tx, class_id).await?)
    }

    async fn class_by_key(&mut self, key: &ClassKey) -> Result<Option<Class>, StoreError> {
        Ok(repositories::classes::find_by_key(&mut *self.tx, key).await?)
    }

    async fn insert_class(&mut self, class: NewClass) -> Result<InsertOutcome, StoreError> {
        let inserted = repositories::classes::insert_if_absent(
            &mut *self.tx,
            repositories::classes::InsertClass {
                id: &class.id,
                school_id: &class.key.school_id,
                number: class.key.number,
                section: &class.key.section,
                school_year: &class.key.school_year,
                main_teacher_id: &class.main_teacher_id,
                created_at: class.created_at,
            },
        )
        .await?;

        let Some(id) = inserted else {
            return Ok(InsertOutcome::Duplicate);
        };

        repositories::classes::add_teacher(
            &mut *self.tx,
            &id,
            &class.main_teacher_id,
            class.created_at,
        )
        .await?;
        Ok(InsertOutcome::Inserted(self.load_class(&id).await?))
    }

    async fn delete_class(&mut self, class_id: &str) -> Result<(), StoreError> {
        Ok(repositories::classes::delete(&mut *self.tx, class_id).await?)
    }

    async fn classes_for_teacher(
        &mut self,
        school_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<Class>, StoreError> {
        Ok(repositories::classes::list_for_teacher(&mut *self.tx, school_id, teacher_id).await?)
    }

    async fn add_class_student(
        &mut self,
        class_id: &str,
        student_id: &str,
    ) -> Result<bool, StoreError> {
        let now = primitive_now_utc();
        let added =
            repositories::classes::add_student(&mut *self.tx, class_id, student_id, now).await?;
        if added {
            repositories::classes::touch(&mut *self.tx, class_id, now).await?;
        }
        Ok(added)
    }

    async fn remove_class_student(
        &mut self,
        class_id: &str,
        student_id: &str,
    ) -> Result<bool, StoreError> {
        let removed =
            repositories::classes::remove_student(&mut *self.tx, class_id, student_id).await?;
        if removed {
            repositories::classes::touch(&mut *self.tx, class_id, primitive_now_utc()).await?;
        }
        Ok(removed)
    }

    async fn add_class_teacher(
        &mut self,
        class_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError> {
        let now = primitive_now_utc();
        let added =
            repositories::classes::add_teacher(&mut *self.tx, class_id, teacher_id, now).await?;
        if added {
            repositories::classes::touch(&mut *self.tx, class_id, now).await?;
        }
        Ok(added)
    }

    async fn remove_class_teacher(
        &mut self,
        class_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError> {
        let removed =
            repositories::classes::remove_teacher(&mut *self.tx, class_id, teacher_id).await?;
        if removed {
            repositories::classes::touch(&mut *self.tx, class_id, primitive_now_utc()).await?;
        }
        Ok(removed)
    }

    async fn student_by_id(&mut self, student_id: &str) -> Result<Option<Student>, StoreError> {
        Ok(repositories::students::find_by_id(&mut *self.tx, student_id).await?)
    }

    async fn insert_student(&mut self, student: NewStudent) -> Result<Student, StoreError> {
        repositories::students::insert(
            &mut *self.tx,
            repositories::students::InsertStudent {
                id: &student.id,
                school_id: &student.school_id,
                first_name: &student.first_name,
                last_name: &student.last_name,
                gender: student.gender,
                birth_date: student.birth_date,
                note: &student.note,
                track: student.track.as_deref(),
                tax_code: student.tax_code.as_deref(),
                created_at: student.created_at,
            },
        )
        .await?;
        repositories::students::add_teacher(&mut *self.tx, &student.id, &student.teacher_id)
            .await?;
        self.load_student(&student.id).await
    }

    async fn update_student(
        &mut self,
        student_id: &str,
        changes: &StudentChanges,
    ) -> Result<(), StoreError> {
        repositories::students::update(
            &mut *self.tx,
            student_id,
            repositories::students::UpdateStudent {
                first_name: changes.first_name.as_deref(),
                last_name: changes.last_name.as_deref(),
                gender: changes.gender,
                birth_date: changes.birth_date,
                note: changes.note.as_deref(),
                track: changes.track.as_deref(),
                tax_code: changes.tax_code.as_deref(),
                updated_at: primitive_now_utc(),
            },
        )
        .await?;
        Ok(())
    }

    async fn set_placement(
        &mut self,
        student_id: &str,
        placement: Option<&Placement>,
    ) -> Result<(), StoreError> {
        repositories::students::set_placement(
            &mut *self.tx,
            student_id,
            repositories::students::SetPlacement {
                class_id: placement.map(|p| p.class_id.as_str()),
                class_number: placement.map(|p| p.class_number),
                section: placement.map(|p| p.section.as_str()),
                school_year: placement.map(|p| p.school_year.as_str()),
                updated_at: primitive_now_utc(),
            },
        )
        .await?;
        Ok(())
    }

    async fn delete_student(&mut self, student_id: &str) -> Result<(), StoreError> {
        Ok(repositories::students::delete(&mut *self.tx, student_id).await?)
    }

    async fn add_student_teacher(
        &mut self,
        student_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(repositories::students::add_teacher(&mut *self.tx, student_id, teacher_id).await?)
    }

    async fn students_for_teacher(
        &mut self,
        school_id: &str,
        teacher_id: &str,
        class_id: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        Ok(repositories::students::list_for_teacher(&mut *self.tx, school_id, teacher_id, class_id)
            .await?)
    }

    async fn unassigned_students(
        &mut self,
        school_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<Student>, StoreError> {
        Ok(repositories::students::list_unassigned_for_teacher(&mut *self.tx, school_id, teacher_id)
            .await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgRosterTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgRosterTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
