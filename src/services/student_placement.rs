use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::core::config::ImportSettings;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Class, Student};
use crate::services::class_membership::{managed_class, place_student};
use crate::services::class_resolution::{self, resolve_or_create_class, ClassSpec};
use crate::services::context::RequestContext;
use crate::services::errors::{DomainError, DomainResult};
use crate::services::roster_store::{NewStudent, RosterTx, StudentChanges};
use crate::services::student_import::{self, dates, spreadsheet::SheetRow, ImportContext};
use crate::services::validation_rules;

/// Student fields as typed by a user, validated with the import rules.
#[derive(Debug, Clone, Default)]
pub(crate) struct StudentInput {
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) gender: String,
    pub(crate) birth_date: Option<String>,
    pub(crate) note: Option<String>,
    pub(crate) track: Option<String>,
    pub(crate) tax_code: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StudentPatch {
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) gender: Option<String>,
    pub(crate) birth_date: Option<String>,
    pub(crate) note: Option<String>,
    pub(crate) track: Option<String>,
    pub(crate) tax_code: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassChoice {
    pub(crate) spec: ClassSpec,
    pub(crate) create_if_missing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchOutcome {
    pub(crate) students: Vec<Student>,
    pub(crate) classes_created: Vec<Class>,
}

/// Student in the requester's school that the requester teaches.
pub(crate) async fn taught_student(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    student_id: &str,
) -> DomainResult<Student> {
    match tx.student_by_id(student_id).await? {
        Some(student)
            if student.school_id == ctx.school_id && student.is_taught_by(&ctx.requester_id) =>
        {
            Ok(student)
        }
        _ => Err(DomainError::NotFound("Student")),
    }
}

async fn reload(tx: &mut dyn RosterTx, student_id: &str) -> DomainResult<Student> {
    tx.student_by_id(student_id).await?.ok_or(DomainError::NotFound("Student"))
}

fn birth_date(raw: Option<&str>) -> DomainResult<Option<Date>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => dates::parse_text(value)
            .map(Some)
            .ok_or_else(|| DomainError::validation(format!("invalid date format '{value}'"))),
    }
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

pub(crate) async fn transfer(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    student_id: &str,
    target_class_id: &str,
) -> DomainResult<Student> {
    let student = taught_student(tx, ctx, student_id).await?;
    let Some(current) = student.class_id.clone() else {
        return Err(DomainError::conflict("Student has no class to transfer from"));
    };
    let target = managed_class(tx, ctx, target_class_id).await?;
    if current == target.id {
        return Ok(student);
    }

    place_student(tx, &target, &student, &ctx.requester_id).await?;
    tracing::info!(
        student_id,
        from_class = %current,
        to_class = %target.id,
        teacher_id = %ctx.requester_id,
        "Student transferred"
    );
    reload(tx, student_id).await
}

pub(crate) async fn assign_first_class(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    student_id: &str,
    class_id: &str,
) -> DomainResult<Student> {
    let student = taught_student(tx, ctx, student_id).await?;
    if !student.needs_class() {
        return Err(DomainError::conflict("Student already has a class; use transfer instead"));
    }
    let class = tx.class_by_id(class_id).await?.ok_or(DomainError::NotFound("Class"))?;
    if class.school_id != student.school_id {
        return Err(DomainError::validation("Class belongs to a different school"));
    }

    place_student(tx, &class, &student, &ctx.requester_id).await?;
    tracing::info!(student_id, class_id, teacher_id = %ctx.requester_id, "Student assigned to first class");
    reload(tx, student_id).await
}

pub(crate) async fn list_unassigned(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
) -> DomainResult<Vec<Student>> {
    Ok(tx.unassigned_students(&ctx.school_id, &ctx.requester_id).await?)
}

pub(crate) async fn list_students(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    class_id: Option<&str>,
) -> DomainResult<Vec<Student>> {
    Ok(tx.students_for_teacher(&ctx.school_id, &ctx.requester_id, class_id).await?)
}

pub(crate) async fn create_student(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    input: &StudentInput,
    class: Option<&ClassChoice>,
) -> DomainResult<Student> {
    class_resolution::requester_school(tx, ctx).await?;

    let student = tx
        .insert_student(NewStudent {
            id: Uuid::new_v4().to_string(),
            school_id: ctx.school_id.clone(),
            first_name: validation_rules::person_name("nome", &input.first_name)?,
            last_name: validation_rules::person_name("cognome", &input.last_name)?,
            gender: validation_rules::gender(&input.gender)?,
            birth_date: birth_date(input.birth_date.as_deref())?,
            note: optional_text(input.note.as_deref()).unwrap_or_default(),
            track: optional_text(input.track.as_deref()),
            tax_code: optional_text(input.tax_code.as_deref()).map(|code| code.to_ascii_uppercase()),
            teacher_id: ctx.requester_id.clone(),
            created_at: primitive_now_utc(),
        })
        .await?;

    if let Some(choice) = class {
        let resolved = resolve_or_create_class(tx, ctx, &choice.spec, choice.create_if_missing).await?;
        place_student(tx, &resolved.class, &student, &ctx.requester_id).await?;
    }

    tracing::info!(student_id = %student.id, teacher_id = %ctx.requester_id, "Student created");
    reload(tx, &student.id).await
}

pub(crate) async fn update_student(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    student_id: &str,
    patch: &StudentPatch,
) -> DomainResult<Student> {
    taught_student(tx, ctx, student_id).await?;

    let changes = StudentChanges {
        first_name: patch
            .first_name
            .as_deref()
            .map(|value| validation_rules::person_name("nome", value))
            .transpose()?,
        last_name: patch
            .last_name
            .as_deref()
            .map(|value| validation_rules::person_name("cognome", value))
            .transpose()?,
        gender: patch.gender.as_deref().map(validation_rules::gender).transpose()?,
        birth_date: birth_date(patch.birth_date.as_deref())?,
        note: patch.note.as_ref().map(|value| value.trim().to_string()),
        track: optional_text(patch.track.as_deref()),
        tax_code: optional_text(patch.tax_code.as_deref()).map(|code| code.to_ascii_uppercase()),
    };
    tx.update_student(student_id, &changes).await?;

    tracing::info!(student_id, teacher_id = %ctx.requester_id, "Student updated");
    reload(tx, student_id).await
}

pub(crate) async fn delete_student(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    student_id: &str,
) -> DomainResult<()> {
    let student = taught_student(tx, ctx, student_id).await?;
    if let Some(class_id) = student.class_id.as_deref() {
        tx.remove_class_student(class_id, student_id).await?;
    }
    tx.delete_student(student_id).await?;

    tracing::info!(student_id, teacher_id = %ctx.requester_id, "Student deleted");
    Ok(())
}

/// Validates submitted rows, then creates every student and any missing
/// class inside the caller's unit of work.
pub(crate) async fn submit_batch(
    tx: &mut dyn RosterTx,
    ctx: &RequestContext,
    rows: &[SheetRow],
    import: &ImportSettings,
    today: Date,
    school_year: &str,
    create_missing_classes: bool,
) -> DomainResult<BatchOutcome> {
    let school = class_resolution::requester_school(tx, ctx).await?;
    let context = ImportContext {
        school_type: school.school_type,
        sections: &school.sections,
        min_age: import.min_age,
        max_age: import.max_age,
        today,
    };
    let report = student_import::validate_rows(rows, context)
        .map_err(|err| DomainError::validation(err.to_string()))?;
    if !report.is_accepted() {
        return Err(DomainError::Rejected(report.errors));
    }

    let mut outcome = BatchOutcome { students: Vec::new(), classes_created: Vec::new() };
    for row in &report.students {
        let choice = ClassChoice {
            spec: ClassSpec {
                number: i64::from(row.classe),
                section: row.sezione.clone(),
                school_year: school_year.to_string(),
            },
            create_if_missing: create_missing_classes,
        };
        let resolved =
            resolve_or_create_class(tx, ctx, &choice.spec, choice.create_if_missing).await?;
        if resolved.created {
            outcome.classes_created.push(resolved.class.clone());
        }

        let student = tx
            .insert_student(NewStudent {
                id: Uuid::new_v4().to_string(),
                school_id: school.id.clone(),
                first_name: row.nome.clone(),
                last_name: row.cognome.clone(),
                gender: row.sesso,
                birth_date: row.birth_date,
                note: row.note.clone().unwrap_or_default(),
                track: row.indirizzo.clone(),
                tax_code: row.codice_fiscale.clone(),
                teacher_id: ctx.requester_id.clone(),
                created_at: primitive_now_utc(),
            })
            .await?;
        place_student(tx, &resolved.class, &student, &ctx.requester_id).await?;
        outcome.students.push(reload(tx, &student.id).await?);
    }

    tracing::info!(
        students = outcome.students.len(),
        classes_created = outcome.classes_created.len(),
        teacher_id = %ctx.requester_id,
        "Student batch imported"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use time::Month;

    use super::*;
    use crate::db::types::Gender;
    use crate::services::roster_store::{finish, RosterStore};
    use crate::services::student_import::spreadsheet::CellValue;
    use crate::test_support::roster::{self, CO_TEACHER, MAIN_TEACHER, OTHER_SCHOOL_ID, OUTSIDER};

    fn today() -> Date {
        Date::from_calendar_date(2024, Month::October, 1).unwrap()
    }

    fn sheet_row(number: usize, nome: &str, birth: &str, classe: &str, sezione: &str) -> SheetRow {
        let cells: HashMap<String, CellValue> = [
            ("nome", nome),
            ("cognome", "Rossi"),
            ("sesso", "f"),
            ("dataNascita", birth),
            ("classe", classe),
            ("sezione", sezione),
        ]
        .into_iter()
        .map(|(column, value)| (column.to_string(), CellValue::Text(value.to_string())))
        .collect();
        SheetRow::new(number, cells)
    }

    #[tokio::test]
    async fn transfer_moves_membership_and_denormalized_fields() {
        let store = roster::store();
        let mut old = roster::class("class-old", 1, "A", MAIN_TEACHER, &[]);
        old.students.push("s1".to_string());
        store.add_student(roster::student("s1", MAIN_TEACHER, Some(&old)));
        store.add_class(old);
        store.add_class(roster::class("class-new", 2, "B", MAIN_TEACHER, &[]));
        let ctx = roster::teacher(MAIN_TEACHER);

        let mut tx = store.begin().await.unwrap();
        let result = transfer(tx.as_mut(), &ctx, "s1", "class-new").await;
        let student = finish(tx, result).await.unwrap();

        assert_eq!(student.class_id.as_deref(), Some("class-new"));
        assert_eq!(student.class_number, Some(2));
        assert_eq!(student.section.as_deref(), Some("B"));
        assert!(store.class("class-new").unwrap().has_student("s1"));
        assert!(!store.class("class-old").unwrap().has_student("s1"));
    }

    #[tokio::test]
    async fn transfer_requires_both_sides() {
        let store = roster::store();
        store.add_student(roster::student("s-free", MAIN_TEACHER, None));
        let placed_in = roster::class("class-1", 1, "A", MAIN_TEACHER, &[]);
        store.add_student(roster::student("s1", MAIN_TEACHER, Some(&placed_in)));
        store.add_class(placed_in);
        let ctx = roster::teacher(MAIN_TEACHER);

        let mut tx = store.begin().await.unwrap();
        let missing_student = transfer(tx.as_mut(), &ctx, "ghost", "class-1").await;
        assert_eq!(missing_student.unwrap_err(), DomainError::NotFound("Student"));

        let missing_class = transfer(tx.as_mut(), &ctx, "s1", "ghost").await;
        assert_eq!(missing_class.unwrap_err(), DomainError::NotFound("Class"));

        let unplaced = transfer(tx.as_mut(), &ctx, "s-free", "class-1").await;
        assert!(matches!(unplaced, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn first_assignment_only_for_unplaced_students() {
        let store = roster::store();
        store.add_class(roster::class("class-1", 1, "A", CO_TEACHER, &[]));
        store.add_student(roster::student("s1", MAIN_TEACHER, None));
        let ctx = roster::teacher(MAIN_TEACHER);

        let mut tx = store.begin().await.unwrap();
        let result = assign_first_class(tx.as_mut(), &ctx, "s1", "class-1").await;
        let student = finish(tx, result).await.unwrap();
        assert_eq!(student.class_id.as_deref(), Some("class-1"));
        assert!(store.class("class-1").unwrap().has_student("s1"));

        let mut tx = store.begin().await.unwrap();
        let again = assign_first_class(tx.as_mut(), &ctx, "s1", "class-1").await;
        assert!(matches!(again, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn first_assignment_checks_teacher_and_school() {
        let store = roster::store();
        let mut foreign = roster::class("class-foreign", 1, "A", MAIN_TEACHER, &[]);
        foreign.school_id = OTHER_SCHOOL_ID.to_string();
        store.add_class(foreign);
        store.add_student(roster::student("s1", MAIN_TEACHER, None));

        let mut tx = store.begin().await.unwrap();
        let outsider = assign_first_class(tx.as_mut(), &roster::teacher(OUTSIDER), "s1", "class-foreign").await;
        assert_eq!(outsider.unwrap_err(), DomainError::NotFound("Student"));

        let wrong_school = assign_first_class(tx.as_mut(), &roster::teacher(MAIN_TEACHER), "s1", "class-foreign").await;
        assert!(matches!(wrong_school, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn unassigned_query_is_scoped_to_teacher_and_school() {
        let store = roster::store();
        let class = roster::class("class-1", 1, "A", MAIN_TEACHER, &[]);
        store.add_student(roster::student("s-placed", MAIN_TEACHER, Some(&class)));
        store.add_class(class);
        store.add_student(roster::student("s-mine", MAIN_TEACHER, None));
        store.add_student(roster::student("s-theirs", CO_TEACHER, None));
        let mut foreign = roster::student("s-foreign", MAIN_TEACHER, None);
        foreign.school_id = OTHER_SCHOOL_ID.to_string();
        store.add_student(foreign);

        let mut tx = store.begin().await.unwrap();
        let students = list_unassigned(tx.as_mut(), &roster::teacher(MAIN_TEACHER)).await.unwrap();

        let ids: Vec<&str> = students.iter().map(|student| student.id.as_str()).collect();
        assert_eq!(ids, vec!["s-mine"]);
    }

    #[tokio::test]
    async fn create_student_validates_and_places() {
        let store = roster::store();
        let ctx = roster::teacher(MAIN_TEACHER);
        let input = StudentInput {
            first_name: " Mario ".to_string(),
            last_name: "Rossi".to_string(),
            gender: "m".to_string(),
            birth_date: Some("01/01/2010".to_string()),
            ..StudentInput::default()
        };
        let choice = ClassChoice {
            spec: ClassSpec { number: 1, section: "a".to_string(), school_year: "2024/2025".to_string() },
            create_if_missing: true,
        };

        let mut tx = store.begin().await.unwrap();
        let result = create_student(tx.as_mut(), &ctx, &input, Some(&choice)).await;
        let student = finish(tx, result).await.unwrap();

        assert_eq!(student.first_name, "Mario");
        assert_eq!(student.gender, Gender::M);
        assert_eq!(student.teachers, vec![MAIN_TEACHER.to_string()]);
        let class_id = student.class_id.clone().expect("placed");
        assert!(store.class(&class_id).unwrap().has_student(&student.id));
    }

    #[tokio::test]
    async fn create_student_without_confirmation_leaves_nothing_behind() {
        let store = roster::store();
        let ctx = roster::teacher(MAIN_TEACHER);
        let input = StudentInput {
            first_name: "Mario".to_string(),
            last_name: "Rossi".to_string(),
            gender: "M".to_string(),
            ..StudentInput::default()
        };
        let choice = ClassChoice {
            spec: ClassSpec { number: 1, section: "A".to_string(), school_year: "2024/2025".to_string() },
            create_if_missing: false,
        };

        let mut tx = store.begin().await.unwrap();
        let result = create_student(tx.as_mut(), &ctx, &input, Some(&choice)).await;
        assert!(matches!(finish(tx, result).await, Err(DomainError::Conflict(_))));
        assert!(store.students().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_need_a_teacher_of_the_student() {
        let store = roster::store();
        let mut class = roster::class("class-1", 1, "A", MAIN_TEACHER, &[]);
        class.students.push("s1".to_string());
        store.add_student(roster::student("s1", MAIN_TEACHER, Some(&class)));
        store.add_class(class);

        let patch = StudentPatch { note: Some("  moved from abroad ".to_string()), ..StudentPatch::default() };
        let mut tx = store.begin().await.unwrap();
        let outsider = update_student(tx.as_mut(), &roster::teacher(OUTSIDER), "s1", &patch).await;
        assert_eq!(outsider.unwrap_err(), DomainError::NotFound("Student"));

        let updated = update_student(tx.as_mut(), &roster::teacher(MAIN_TEACHER), "s1", &patch).await.unwrap();
        assert_eq!(updated.note, "moved from abroad");

        let bad = StudentPatch { gender: Some("x".to_string()), ..StudentPatch::default() };
        let invalid = update_student(tx.as_mut(), &roster::teacher(MAIN_TEACHER), "s1", &bad).await;
        assert!(matches!(invalid, Err(DomainError::Validation(_))));

        let deleted = delete_student(tx.as_mut(), &roster::teacher(MAIN_TEACHER), "s1").await;
        finish(tx, deleted).await.unwrap();
        assert!(store.student("s1").is_none());
        assert!(!store.class("class-1").unwrap().has_student("s1"));
    }

    #[tokio::test]
    async fn batch_creates_classes_and_students_together() {
        let store = roster::store();
        store.add_class(roster::class("class-1a", 1, "A", MAIN_TEACHER, &[]));
        let ctx = roster::teacher(MAIN_TEACHER);
        let rows = vec![
            sheet_row(2, "Anna", "2009-05-10", "1", "a"),
            sheet_row(3, "Bea", "2009-07-21", "2", "b"),
            sheet_row(4, "Carla", "12/12/2008", "2", "B"),
        ];

        let mut tx = store.begin().await.unwrap();
        let result = submit_batch(tx.as_mut(), &ctx, &rows, &ImportSettings::default(), today(), "2024/2025", true).await;
        let outcome = finish(tx, result).await.unwrap();

        assert_eq!(outcome.students.len(), 3);
        assert_eq!(outcome.classes_created.len(), 1);
        assert_eq!(store.classes().len(), 2);
        assert_eq!(store.class("class-1a").unwrap().students.len(), 1);
        let created = &outcome.classes_created[0];
        assert_eq!(store.class(&created.id).unwrap().students.len(), 2);
        for student in &outcome.students {
            let class = store.class(student.class_id.as_deref().unwrap()).unwrap();
            assert!(class.has_student(&student.id));
        }
    }

    #[tokio::test]
    async fn batch_with_one_bad_row_writes_nothing() {
        let store = roster::store();
        let ctx = roster::teacher(MAIN_TEACHER);
        let mut rows: Vec<SheetRow> =
            (2..7).map(|n| sheet_row(n, "Anna", "2009-05-10", "1", "A")).collect();
        rows.push(sheet_row(7, "Bea", "2015-01-01", "1", "A"));

        let mut tx = store.begin().await.unwrap();
        let result = submit_batch(tx.as_mut(), &ctx, &rows, &ImportSettings::default(), today(), "2024/2025", true).await;
        let err = finish(tx, result).await.unwrap_err();

        assert_eq!(err, DomainError::Rejected(vec!["Row 7: age 9 out of range (14-19)".to_string()]));
        assert!(store.students().is_empty());
        assert!(store.classes().is_empty());
    }

    #[tokio::test]
    async fn batch_into_a_missing_class_needs_confirmation() {
        let store = roster::store();
        let ctx = roster::teacher(MAIN_TEACHER);
        let rows = vec![sheet_row(2, "Anna", "2009-05-10", "1", "A")];

        let mut tx = store.begin().await.unwrap();
        let result = submit_batch(tx.as_mut(), &ctx, &rows, &ImportSettings::default(), today(), "2024/2025", false).await;
        assert!(matches!(finish(tx, result).await, Err(DomainError::Conflict(_))));
        assert!(store.students().is_empty());
    }

    #[tokio::test]
    async fn listing_filters_by_class() {
        let store = roster::store();
        let class = roster::class("class-1", 1, "A", MAIN_TEACHER, &[]);
        store.add_student(roster::student("s1", MAIN_TEACHER, Some(&class)));
        store.add_student(roster::student("s2", MAIN_TEACHER, None));
        store.add_class(class);
        let ctx = roster::teacher(MAIN_TEACHER);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(list_students(tx.as_mut(), &ctx, None).await.unwrap().len(), 2);
        let in_class = list_students(tx.as_mut(), &ctx, Some("class-1")).await.unwrap();
        assert_eq!(in_class.len(), 1);
        assert_eq!(in_class[0].id, "s1");
        let classes = crate::services::class_membership::list_classes(tx.as_mut(), &ctx).await.unwrap();
        assert_eq!(classes.len(), 1);
    }
}
