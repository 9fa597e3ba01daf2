pub(crate) mod class_membership;
pub(crate) mod class_resolution;
pub(crate) mod context;
pub(crate) mod errors;
pub(crate) mod import_template;
pub(crate) mod roster_store;
pub(crate) mod student_import;
pub(crate) mod student_placement;
pub(crate) mod validation_rules;
