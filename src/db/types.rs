use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Teacher,
    Admin,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "schooltype", rename_all = "lowercase")]
pub(crate) enum SchoolType {
    Middle,
    High,
}

impl SchoolType {
    /// Highest class number a school of this type runs.
    pub(crate) fn max_class_number(self) -> i16 {
        match self {
            Self::Middle => 3,
            Self::High => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "institutiontype", rename_all = "lowercase")]
pub(crate) enum InstitutionType {
    None,
    Liceo,
    Tecnico,
    Professionale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "gender")]
pub(crate) enum Gender {
    M,
    F,
}

impl Gender {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::M => "M",
            Self::F => "F",
        }
    }
}
