pub(crate) mod classes;
pub(crate) mod health;
pub(crate) mod schools;
pub(crate) mod students;
pub(crate) mod users;
