//! Spreadsheet student import.
//!
//! Rows are validated one by one and the batch is accepted only when every
//! row passes; a single failing row rejects the whole upload.

pub(crate) mod dates;
pub(crate) mod spreadsheet;

use serde::Serialize;
use thiserror::Error;
use time::Date;

use crate::core::metrics;
use crate::db::types::{Gender, SchoolType};
use crate::services::validation_rules;

use self::spreadsheet::{CellValue, SheetRow};

pub(crate) const COLUMN_FIRST_NAME: &str = "nome";
pub(crate) const COLUMN_LAST_NAME: &str = "cognome";
pub(crate) const COLUMN_GENDER: &str = "sesso";
pub(crate) const COLUMN_BIRTH_DATE: &str = "dataNascita";
pub(crate) const COLUMN_CLASS: &str = "classe";
pub(crate) const COLUMN_SECTION: &str = "sezione";
pub(crate) const COLUMN_NOTE: &str = "note";
pub(crate) const COLUMN_TRACK: &str = "indirizzo";
pub(crate) const COLUMN_TAX_CODE: &str = "codiceFiscale";

pub(crate) const REQUIRED_COLUMNS: [&str; 6] = [
    COLUMN_FIRST_NAME,
    COLUMN_LAST_NAME,
    COLUMN_GENDER,
    COLUMN_BIRTH_DATE,
    COLUMN_CLASS,
    COLUMN_SECTION,
];

pub(crate) const OPTIONAL_COLUMNS: [&str; 3] = [COLUMN_NOTE, COLUMN_TRACK, COLUMN_TAX_CODE];

/// School facts and age band a batch is checked against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImportContext<'a> {
    pub(crate) school_type: SchoolType,
    pub(crate) sections: &'a [String],
    pub(crate) min_age: u8,
    pub(crate) max_age: u8,
    pub(crate) today: Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ImportedStudent {
    pub(crate) nome: String,
    pub(crate) cognome: String,
    pub(crate) sesso: Gender,
    pub(crate) classe: i16,
    pub(crate) sezione: String,
    #[serde(rename = "dataNascita")]
    pub(crate) data_nascita: String,
    pub(crate) eta: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) indirizzo: Option<String>,
    #[serde(rename = "codiceFiscale", skip_serializing_if = "Option::is_none")]
    pub(crate) codice_fiscale: Option<String>,
    #[serde(skip)]
    pub(crate) birth_date: Option<Date>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct ImportReport {
    pub(crate) students: Vec<ImportedStudent>,
    pub(crate) errors: Vec<String>,
    pub(crate) valid_rows: usize,
    pub(crate) total_rows: usize,
}

impl ImportReport {
    pub(crate) fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ImportError {
    #[error("The spreadsheet contains no student rows")]
    Empty,
    #[error("Unable to read the spreadsheet file")]
    Unreadable,
}

pub(crate) fn import_workbook(
    bytes: &[u8],
    context: ImportContext<'_>,
) -> Result<ImportReport, ImportError> {
    let rows = spreadsheet::read_rows(bytes).map_err(|err| {
        tracing::warn!(error = %err, "Failed to read uploaded spreadsheet");
        metrics::record_import_outcome("unreadable", 0);
        ImportError::Unreadable
    })?;
    validate_rows(&rows, context)
}

pub(crate) fn validate_rows(
    rows: &[SheetRow],
    context: ImportContext<'_>,
) -> Result<ImportReport, ImportError> {
    if rows.is_empty() {
        metrics::record_import_outcome("empty", 0);
        return Err(ImportError::Empty);
    }

    let mut students = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for row in rows {
        match validate_row(row, &context) {
            Ok(student) => students.push(student),
            Err(reason) => errors.push(format!("Row {}: {reason}", row.number)),
        }
    }

    let total_rows = rows.len();
    if !errors.is_empty() {
        tracing::info!(total_rows, failed_rows = errors.len(), "Student import rejected");
        metrics::record_import_outcome("rejected", total_rows);
        return Ok(ImportReport { students: Vec::new(), errors, valid_rows: 0, total_rows });
    }

    tracing::info!(total_rows, "Student import validated");
    metrics::record_import_outcome("accepted", total_rows);
    Ok(ImportReport { valid_rows: students.len(), students, errors, total_rows })
}

fn validate_row(row: &SheetRow, context: &ImportContext<'_>) -> Result<ImportedStudent, String> {
    let missing = REQUIRED_COLUMNS.iter().any(|column| row.text(column).is_none());
    if missing {
        return Err("missing data".to_string());
    }

    let birth_date = birth_date(row.cell(COLUMN_BIRTH_DATE))?;
    let age = dates::age_on(birth_date, context.today);
    if age < i32::from(context.min_age) || age > i32::from(context.max_age) {
        return Err(format!(
            "age {age} out of range ({}-{})",
            context.min_age, context.max_age
        ));
    }

    let required = |column: &str| row.text(column).unwrap_or_default();
    let nome = validation_rules::person_name(COLUMN_FIRST_NAME, &required(COLUMN_FIRST_NAME))
        .map_err(|err| err.to_string())?;
    let cognome = validation_rules::person_name(COLUMN_LAST_NAME, &required(COLUMN_LAST_NAME))
        .map_err(|err| err.to_string())?;
    let sesso = validation_rules::gender(&required(COLUMN_GENDER)).map_err(|err| err.to_string())?;
    let classe = validation_rules::class_number_text(&required(COLUMN_CLASS), context.school_type)
        .map_err(|err| err.to_string())?;
    let sezione = validation_rules::section(&required(COLUMN_SECTION), context.sections)
        .map_err(|err| err.to_string())?;

    Ok(ImportedStudent {
        nome,
        cognome,
        sesso,
        classe,
        sezione,
        data_nascita: dates::format_iso(birth_date),
        eta: age,
        note: row.text(COLUMN_NOTE),
        indirizzo: row.text(COLUMN_TRACK),
        codice_fiscale: row.text(COLUMN_TAX_CODE).map(|value| value.to_ascii_uppercase()),
        birth_date: Some(birth_date),
    })
}

fn birth_date(cell: &CellValue) -> Result<Date, String> {
    let parsed = match cell {
        CellValue::Number(serial) => dates::from_serial(*serial),
        CellValue::Text(text) => dates::parse_text(text),
        CellValue::Empty => None,
    };
    parsed.ok_or_else(|| {
        format!("invalid date format '{}'", cell.as_text().unwrap_or_default())
    })
}
