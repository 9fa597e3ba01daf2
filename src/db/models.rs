use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, PrimitiveDateTime};

use crate::db::types::{Gender, InstitutionType, SchoolType, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) default_school_id: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct School {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) school_type: SchoolType,
    pub(crate) institution_type: InstitutionType,
    pub(crate) sections: Vec<String>,
    pub(crate) manager_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SchoolMembership {
    pub(crate) school_id: String,
    pub(crate) user_id: String,
    pub(crate) role: UserRole,
    pub(crate) is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ClassKey {
    pub(crate) school_id: String,
    pub(crate) number: i16,
    pub(crate) section: String,
    pub(crate) school_year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Class {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) number: i16,
    pub(crate) section: String,
    pub(crate) school_year: String,
    pub(crate) main_teacher_id: String,
    pub(crate) students: Vec<String>,
    pub(crate) teachers: Vec<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Class {
    pub(crate) fn key(&self) -> ClassKey {
        ClassKey {
            school_id: self.school_id.clone(),
            number: self.number,
            section: self.section.clone(),
            school_year: self.school_year.clone(),
        }
    }

    /// Main teacher or any listed teacher.
    pub(crate) fn is_managed_by(&self, teacher_id: &str) -> bool {
        self.main_teacher_id == teacher_id || self.teachers.iter().any(|id| id == teacher_id)
    }

    pub(crate) fn has_student(&self, student_id: &str) -> bool {
        self.students.iter().any(|id| id == student_id)
    }

    pub(crate) fn label(&self) -> String {
        format!("{}{} {}", self.number, self.section, self.school_year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Student {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) gender: Gender,
    pub(crate) birth_date: Option<Date>,
    pub(crate) class_id: Option<String>,
    pub(crate) class_number: Option<i16>,
    pub(crate) section: Option<String>,
    pub(crate) school_year: Option<String>,
    pub(crate) note: String,
    pub(crate) track: Option<String>,
    pub(crate) tax_code: Option<String>,
    pub(crate) teachers: Vec<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Student {
    pub(crate) fn is_taught_by(&self, teacher_id: &str) -> bool {
        self.teachers.iter().any(|id| id == teacher_id)
    }

    pub(crate) fn needs_class(&self) -> bool {
        self.class_id.is_none()
    }
}
