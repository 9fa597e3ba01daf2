//! Field rules shared by single-record writes and spreadsheet imports.
//!
//! Every rule returns the normalized value so callers never store raw input.

use thiserror::Error;

use crate::db::types::{Gender, SchoolType};

pub(crate) const MIN_NAME_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RuleViolation {
    #[error("{field} must be at least {MIN_NAME_LEN} characters long")]
    NameTooShort { field: &'static str },
    #[error("invalid gender '{0}': expected M or F")]
    InvalidGender(String),
    #[error("invalid class number '{0}'")]
    InvalidClassNumber(String),
    #[error("class number {number} out of range (1-{max})")]
    ClassNumberOutOfRange { number: i64, max: i16 },
    #[error("invalid section '{0}': expected a single letter")]
    InvalidSection(String),
    #[error("section {0} is not offered by this school")]
    SectionNotOffered(String),
    #[error("invalid school year '{0}': expected YYYY/YYYY+1")]
    InvalidSchoolYear(String),
}

pub(crate) fn person_name(field: &'static str, raw: &str) -> Result<String, RuleViolation> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_NAME_LEN {
        return Err(RuleViolation::NameTooShort { field });
    }
    Ok(trimmed.to_string())
}

pub(crate) fn gender(raw: &str) -> Result<Gender, RuleViolation> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "M" => Ok(Gender::M),
        "F" => Ok(Gender::F),
        _ => Err(RuleViolation::InvalidGender(raw.trim().to_string())),
    }
}

pub(crate) fn class_number(number: i64, school_type: SchoolType) -> Result<i16, RuleViolation> {
    let max = school_type.max_class_number();
    if number < 1 || number > i64::from(max) {
        return Err(RuleViolation::ClassNumberOutOfRange { number, max });
    }
    Ok(number as i16)
}

/// Text form of a class number, as typed by users or read from a sheet.
/// Integral decimals such as `2.0` are accepted.
pub(crate) fn class_number_text(raw: &str, school_type: SchoolType) -> Result<i16, RuleViolation> {
    let trimmed = raw.trim();
    let parsed = match trimmed.parse::<i64>() {
        Ok(value) => value,
        Err(_) => match trimmed.parse::<f64>() {
            Ok(value) if value.fract() == 0.0 && value.is_finite() => value as i64,
            _ => return Err(RuleViolation::InvalidClassNumber(trimmed.to_string())),
        },
    };
    class_number(parsed, school_type)
}

/// One ASCII letter, uppercased. An empty `allowed` list accepts any letter.
pub(crate) fn section(raw: &str, allowed: &[String]) -> Result<String, RuleViolation> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => letter.to_ascii_uppercase(),
        _ => return Err(RuleViolation::InvalidSection(trimmed.to_string())),
    };

    let normalized = letter.to_string();
    if !allowed.is_empty() && !allowed.iter().any(|candidate| candidate == &normalized) {
        return Err(RuleViolation::SectionNotOffered(normalized));
    }
    Ok(normalized)
}

pub(crate) fn school_year(raw: &str) -> Result<String, RuleViolation> {
    let trimmed = raw.trim();
    let invalid = || RuleViolation::InvalidSchoolYear(trimmed.to_string());

    let (first, second) = trimmed.split_once('/').ok_or_else(invalid)?;
    let is_year = |part: &str| part.len() == 4 && part.chars().all(|c| c.is_ascii_digit());
    if !is_year(first) || !is_year(second) {
        return Err(invalid());
    }

    let first: u32 = first.parse().map_err(|_| invalid())?;
    let second: u32 = second.parse().map_err(|_| invalid())?;
    if second != first + 1 {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

/// Section letters a school declares, normalized and deduplicated.
pub(crate) fn school_sections(raw: &[String]) -> Result<Vec<String>, RuleViolation> {
    let mut sections: Vec<String> = Vec::with_capacity(raw.len());
    for value in raw {
        let letter = section(value, &[])?;
        if !sections.contains(&letter) {
            sections.push(letter);
        }
    }
    sections.sort();
    Ok(sections)
}
