use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Class, Student};
use crate::db::types::Gender;

#[derive(Debug, Deserialize)]
pub(crate) struct ClassCreate {
    pub(crate) number: i64,
    pub(crate) section: String,
    #[serde(default)]
    #[serde(alias = "schoolYear")]
    pub(crate) school_year: Option<String>,
    #[serde(default)]
    #[serde(alias = "createIfMissing")]
    pub(crate) create_if_missing: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassLookupQuery {
    pub(crate) number: i64,
    pub(crate) section: String,
    #[serde(default)]
    #[serde(alias = "schoolYear")]
    pub(crate) school_year: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassLookupResponse {
    pub(crate) exists: bool,
    pub(crate) managed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) class: Option<ClassResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassStudentsPayload {
    #[serde(alias = "studentIds")]
    pub(crate) student_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ClassTeacherPayload {
    #[serde(alias = "teacherId")]
    #[validate(length(min = 1, message = "teacher_id must not be empty"))]
    pub(crate) teacher_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassResponse {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) number: i16,
    pub(crate) section: String,
    pub(crate) school_year: String,
    pub(crate) main_teacher_id: String,
    pub(crate) students: Vec<String>,
    pub(crate) teachers: Vec<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ClassResponse {
    pub(crate) fn from_db(class: Class) -> Self {
        Self {
            id: class.id,
            school_id: class.school_id,
            number: class.number,
            section: class.section,
            school_year: class.school_year,
            main_teacher_id: class.main_teacher_id,
            students: class.students,
            teachers: class.teachers,
            created_at: format_primitive(class.created_at),
            updated_at: format_primitive(class.updated_at),
        }
    }
}

/// Optional class placement for a newly created student.
#[derive(Debug, Deserialize)]
pub(crate) struct ClassPlacement {
    pub(crate) number: i64,
    pub(crate) section: String,
    #[serde(default)]
    #[serde(alias = "schoolYear")]
    pub(crate) school_year: Option<String>,
    #[serde(default)]
    #[serde(alias = "createIfMissing")]
    pub(crate) create_if_missing: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentCreate {
    #[serde(alias = "nome")]
    pub(crate) first_name: String,
    #[serde(alias = "cognome")]
    pub(crate) last_name: String,
    #[serde(alias = "sesso")]
    pub(crate) gender: String,
    #[serde(default)]
    #[serde(alias = "dataNascita", alias = "birthDate")]
    pub(crate) birth_date: Option<String>,
    #[serde(default)]
    pub(crate) note: Option<String>,
    #[serde(default)]
    #[serde(alias = "indirizzo")]
    pub(crate) track: Option<String>,
    #[serde(default)]
    #[serde(alias = "codiceFiscale", alias = "taxCode")]
    pub(crate) tax_code: Option<String>,
    #[serde(default)]
    pub(crate) class: Option<ClassPlacement>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StudentUpdate {
    #[serde(default)]
    #[serde(alias = "nome")]
    pub(crate) first_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "cognome")]
    pub(crate) last_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "sesso")]
    pub(crate) gender: Option<String>,
    #[serde(default)]
    #[serde(alias = "dataNascita", alias = "birthDate")]
    pub(crate) birth_date: Option<String>,
    #[serde(default)]
    pub(crate) note: Option<String>,
    #[serde(default)]
    #[serde(alias = "indirizzo")]
    pub(crate) track: Option<String>,
    #[serde(default)]
    #[serde(alias = "codiceFiscale", alias = "taxCode")]
    pub(crate) tax_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentListQuery {
    #[serde(default)]
    #[serde(alias = "classId")]
    pub(crate) class_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ClassTarget {
    #[serde(alias = "classId")]
    #[validate(length(min = 1, message = "class_id must not be empty"))]
    pub(crate) class_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BatchSubmission {
    #[validate(length(min = 1, message = "rows must not be empty"))]
    pub(crate) rows: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    #[serde(alias = "schoolYear")]
    pub(crate) school_year: Option<String>,
    #[serde(default)]
    #[serde(alias = "createMissingClasses")]
    pub(crate) create_missing_classes: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchResponse {
    pub(crate) students: Vec<StudentResponse>,
    pub(crate) classes_created: Vec<ClassResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResponse {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) gender: Gender,
    pub(crate) birth_date: Option<String>,
    pub(crate) class_id: Option<String>,
    pub(crate) class_number: Option<i16>,
    pub(crate) section: Option<String>,
    pub(crate) school_year: Option<String>,
    pub(crate) needs_class: bool,
    pub(crate) note: String,
    pub(crate) track: Option<String>,
    pub(crate) tax_code: Option<String>,
    pub(crate) teachers: Vec<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl StudentResponse {
    pub(crate) fn from_db(student: Student) -> Self {
        let needs_class = student.needs_class();
        Self {
            id: student.id,
            school_id: student.school_id,
            first_name: student.first_name,
            last_name: student.last_name,
            gender: student.gender,
            birth_date: student.birth_date.map(crate::services::student_import::dates::format_iso),
            class_id: student.class_id,
            class_number: student.class_number,
            section: student.section,
            school_year: student.school_year,
            needs_class,
            note: student.note,
            track: student.track,
            tax_code: student.tax_code,
            teachers: student.teachers,
            created_at: format_primitive(student.created_at),
            updated_at: format_primitive(student.updated_at),
        }
    }
}
