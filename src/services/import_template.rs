use rust_xlsxwriter::{Format, Workbook, XlsxError};
use time::{Date, Month};

use crate::services::student_import::{self, dates};

const SHEET_STUDENTS: &str = "Studenti";
const SHEET_NOTES: &str = "Istruzioni";

pub(crate) const TEMPLATE_FILENAME: &str = "student_import_template.xlsx";
pub(crate) const TEMPLATE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Header followed by two example rows whose ages sit on the band bounds.
pub(crate) fn build_template(min_age: u8, max_age: u8, today: Date) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let columns: Vec<&str> = student_import::REQUIRED_COLUMNS
        .iter()
        .chain(student_import::OPTIONAL_COLUMNS.iter())
        .copied()
        .collect();

    let examples = [
        ["Mario", "Rossi", "M", "", "1", "A", "", "", ""],
        ["Giulia", "Bianchi", "F", "", "2", "B", "Allergic to nuts", "Scientifico", ""],
    ];
    let birth_dates = [birth_date_for_age(today, min_age), birth_date_for_age(today, max_age)];

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_STUDENTS)?;
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header_format)?;
        sheet.set_column_width(col as u16, 16)?;
    }
    for (offset, (values, birth)) in examples.iter().zip(birth_dates).enumerate() {
        let row = offset as u32 + 1;
        for (col, value) in values.iter().enumerate() {
            let text = if columns[col] == student_import::COLUMN_BIRTH_DATE {
                dates::format_italian(birth)
            } else {
                (*value).to_string()
            };
            if !text.is_empty() {
                sheet.write_string(row, col as u16, text)?;
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;

    let notes = workbook.add_worksheet();
    notes.set_name(SHEET_NOTES)?;
    notes.write_string_with_format(0, 0, "Column", &header_format)?;
    notes.write_string_with_format(0, 1, "Content", &header_format)?;
    notes.set_column_width(0, 16)?;
    notes.set_column_width(1, 60)?;
    let lines = [
        ("nome", "First name, at least 2 characters"),
        ("cognome", "Last name, at least 2 characters"),
        ("sesso", "M or F"),
        ("dataNascita", "Birth date, dd/MM/yyyy or yyyy-MM-dd"),
        ("classe", "Class number"),
        ("sezione", "Section letter"),
        ("note", "Optional free text"),
        ("indirizzo", "Optional study track"),
        ("codiceFiscale", "Optional tax code"),
    ];
    for (offset, (column, content)) in lines.iter().enumerate() {
        let row = offset as u32 + 1;
        notes.write_string(row, 0, *column)?;
        notes.write_string(row, 1, *content)?;
    }
    let band = format!("Students must be between {min_age} and {max_age} years old");
    notes.write_string(lines.len() as u32 + 2, 0, band)?;

    workbook.save_to_buffer()
}

/// Latest birth date giving exactly `age` completed years on `today`.
fn birth_date_for_age(today: Date, age: u8) -> Date {
    let year = today.year() - i32::from(age);
    Date::from_calendar_date(year, today.month(), today.day())
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .unwrap_or(today)
}
