use time::{Date, PrimitiveDateTime};

use crate::db::models::Student;
use crate::db::types::Gender;

const SELECT: &str = "\
    SELECT s.id, s.school_id, s.first_name, s.last_name, s.gender, s.birth_date, \
        s.class_id, s.class_number, s.section, s.school_year, s.note, s.track, s.tax_code, \
        ARRAY(SELECT st.teacher_id FROM student_teachers st \
              WHERE st.student_id = s.id ORDER BY st.teacher_id) AS teachers, \
        s.created_at, s.updated_at \
    FROM students s";

const TAUGHT_BY: &str =
    "EXISTS (SELECT 1 FROM student_teachers st WHERE st.student_id = s.id AND st.teacher_id = $2)";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!("{SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_for_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    school_id: &str,
    teacher_id: &str,
    class_id: Option<&str>,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "{SELECT}
         WHERE s.school_id = $1 AND {TAUGHT_BY}
           AND ($3::text IS NULL OR s.class_id = $3)
         ORDER BY s.last_name, s.first_name, s.id"
    ))
    .bind(school_id)
    .bind(teacher_id)
    .bind(class_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_unassigned_for_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    school_id: &str,
    teacher_id: &str,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "{SELECT}
         WHERE s.school_id = $1 AND s.class_id IS NULL AND {TAUGHT_BY}
         ORDER BY s.last_name, s.first_name, s.id"
    ))
    .bind(school_id)
    .bind(teacher_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct InsertStudent<'a> {
    pub(crate) id: &'a str,
    pub(crate) school_id: &'a str,
    pub(crate) first_name: &'a str,
    pub(crate) last_name: &'a str,
    pub(crate) gender: Gender,
    pub(crate) birth_date: Option<Date>,
    pub(crate) note: &'a str,
    pub(crate) track: Option<&'a str>,
    pub(crate) tax_code: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    params: InsertStudent<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO students (
            id, school_id, first_name, last_name, gender, birth_date,
            note, track, tax_code, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10)",
    )
    .bind(params.id)
    .bind(params.school_id)
    .bind(params.first_name)
    .bind(params.last_name)
    .bind(params.gender)
    .bind(params.birth_date)
    .bind(params.note)
    .bind(params.track)
    .bind(params.tax_code)
    .bind(params.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct UpdateStudent<'a> {
    pub(crate) first_name: Option<&'a str>,
    pub(crate) last_name: Option<&'a str>,
    pub(crate) gender: Option<Gender>,
    pub(crate) birth_date: Option<Date>,
    pub(crate) note: Option<&'a str>,
    pub(crate) track: Option<&'a str>,
    pub(crate) tax_code: Option<&'a str>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: UpdateStudent<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE students SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            gender = COALESCE($3, gender),
            birth_date = COALESCE($4, birth_date),
            note = COALESCE($5, note),
            track = COALESCE($6, track),
            tax_code = COALESCE($7, tax_code),
            updated_at = $8
         WHERE id = $9",
    )
    .bind(params.first_name)
    .bind(params.last_name)
    .bind(params.gender)
    .bind(params.birth_date)
    .bind(params.note)
    .bind(params.track)
    .bind(params.tax_code)
    .bind(params.updated_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Overwrites the denormalized class fields; `None` clears them all.
pub(crate) struct SetPlacement<'a> {
    pub(crate) class_id: Option<&'a str>,
    pub(crate) class_number: Option<i16>,
    pub(crate) section: Option<&'a str>,
    pub(crate) school_year: Option<&'a str>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn set_placement(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: SetPlacement<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE students
         SET class_id = $1, class_number = $2, section = $3, school_year = $4, updated_at = $5
         WHERE id = $6",
    )
    .bind(params.class_id)
    .bind(params.class_number)
    .bind(params.section)
    .bind(params.school_year)
    .bind(params.updated_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete(executor: impl sqlx::PgExecutor<'_>, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM students WHERE id = $1").bind(id).execute(executor).await?;
    Ok(())
}

pub(crate) async fn add_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    teacher_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO student_teachers (student_id, teacher_id)
         VALUES ($1,$2)
         ON CONFLICT (student_id, teacher_id) DO NOTHING",
    )
    .bind(student_id)
    .bind(teacher_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
