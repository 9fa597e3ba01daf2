use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::School;
use crate::db::types::{InstitutionType, SchoolType, UserRole};

#[derive(Debug, Deserialize)]
pub(crate) struct SchoolCreate {
    pub(crate) name: String,
    #[serde(alias = "schoolType")]
    pub(crate) school_type: SchoolType,
    #[serde(default = "default_institution")]
    #[serde(alias = "institutionType")]
    pub(crate) institution_type: InstitutionType,
    #[serde(default)]
    pub(crate) sections: Vec<String>,
    #[serde(default)]
    #[serde(alias = "managerId")]
    pub(crate) manager_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct MemberCreate {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "user_id must not be empty"))]
    pub(crate) user_id: String,
    #[serde(default = "default_member_role")]
    pub(crate) role: UserRole,
    #[serde(default)]
    #[serde(alias = "isDefault")]
    pub(crate) is_default: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SchoolResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) school_type: SchoolType,
    pub(crate) institution_type: InstitutionType,
    pub(crate) sections: Vec<String>,
    pub(crate) manager_id: Option<String>,
    pub(crate) created_at: String,
}

impl SchoolResponse {
    pub(crate) fn from_db(school: School) -> Self {
        Self {
            id: school.id,
            name: school.name,
            school_type: school.school_type,
            institution_type: school.institution_type,
            sections: school.sections,
            manager_id: school.manager_id,
            created_at: format_primitive(school.created_at),
        }
    }
}

fn default_institution() -> InstitutionType {
    InstitutionType::None
}

fn default_member_role() -> UserRole {
    UserRole::Teacher
}
