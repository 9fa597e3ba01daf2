use time::PrimitiveDateTime;

use crate::db::models::{Class, ClassKey};

/// Classes are read with their member sets folded in from the join tables.
const SELECT: &str = "\
    SELECT c.id, c.school_id, c.number, c.section, c.school_year, c.main_teacher_id, \
        ARRAY(SELECT cs.student_id FROM class_students cs \
              WHERE cs.class_id = c.id ORDER BY cs.added_at, cs.student_id) AS students, \
        ARRAY(SELECT ct.teacher_id FROM class_teachers ct \
              WHERE ct.class_id = c.id ORDER BY ct.added_at, ct.teacher_id) AS teachers, \
        c.created_at, c.updated_at \
    FROM classes c";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!("{SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_key(
    executor: impl sqlx::PgExecutor<'_>,
    key: &ClassKey,
) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "{SELECT} WHERE c.school_id = $1 AND c.number = $2 AND c.section = $3 AND c.school_year = $4"
    ))
    .bind(&key.school_id)
    .bind(key.number)
    .bind(&key.section)
    .bind(&key.school_year)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_for_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    school_id: &str,
    teacher_id: &str,
) -> Result<Vec<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "{SELECT}
         WHERE c.school_id = $1
           AND (c.main_teacher_id = $2
                OR EXISTS (SELECT 1 FROM class_teachers ct
                           WHERE ct.class_id = c.id AND ct.teacher_id = $2))
         ORDER BY c.school_year DESC, c.number, c.section"
    ))
    .bind(school_id)
    .bind(teacher_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct InsertClass<'a> {
    pub(crate) id: &'a str,
    pub(crate) school_id: &'a str,
    pub(crate) number: i16,
    pub(crate) section: &'a str,
    pub(crate) school_year: &'a str,
    pub(crate) main_teacher_id: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Inserts the class row unless the natural key is taken.
///
/// Returns `None` when another transaction owns the key; the statement waits
/// for that transaction to settle, so a follow-up lookup observes its row.
pub(crate) async fn insert_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    params: InsertClass<'_>,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "INSERT INTO classes (
            id, school_id, number, section, school_year, main_teacher_id, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
         ON CONFLICT ON CONSTRAINT classes_natural_key DO NOTHING
         RETURNING id",
    )
    .bind(params.id)
    .bind(params.school_id)
    .bind(params.number)
    .bind(params.section)
    .bind(params.school_year)
    .bind(params.main_teacher_id)
    .bind(params.created_at)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn delete(executor: impl sqlx::PgExecutor<'_>, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM classes WHERE id = $1").bind(id).execute(executor).await?;
    Ok(())
}

pub(crate) async fn touch(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE classes SET updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn add_student(
    executor: impl sqlx::PgExecutor<'_>,
    class_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO class_students (class_id, student_id, added_at)
         VALUES ($1,$2,$3)
         ON CONFLICT (class_id, student_id) DO NOTHING",
    )
    .bind(class_id)
    .bind(student_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove_student(
    executor: impl sqlx::PgExecutor<'_>,
    class_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM class_students WHERE class_id = $1 AND student_id = $2")
        .bind(class_id)
        .bind(student_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn add_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    class_id: &str,
    teacher_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO class_teachers (class_id, teacher_id, added_at)
         VALUES ($1,$2,$3)
         ON CONFLICT (class_id, teacher_id) DO NOTHING",
    )
    .bind(class_id)
    .bind(teacher_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    class_id: &str,
    teacher_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM class_teachers WHERE class_id = $1 AND teacher_id = $2")
        .bind(class_id)
        .bind(teacher_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
