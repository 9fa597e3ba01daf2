use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Trimmed text form; `None` for blank cells.
    pub(crate) fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                Some(format!("{}", *value as i64))
            }
            Self::Number(value) => Some(value.to_string()),
        }
    }

    fn is_blank(&self) -> bool {
        self.as_text().is_none()
    }
}

impl From<&Data> for CellValue {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty | Data::Error(_) => Self::Empty,
            Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
                Self::Text(text.clone())
            }
            Data::Int(number) => Self::Number(*number as f64),
            Data::Float(number) => Self::Number(*number),
            Data::DateTime(datetime) => Self::Number(datetime.as_f64()),
            Data::Bool(flag) => Self::Text(flag.to_string()),
        }
    }
}

impl From<&serde_json::Value> for CellValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Empty,
            serde_json::Value::String(text) => Self::Text(text.clone()),
            serde_json::Value::Number(number) => {
                number.as_f64().map(Self::Number).unwrap_or(Self::Empty)
            }
            serde_json::Value::Bool(flag) => Self::Text(flag.to_string()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// One data row keyed by header name, with its 1-based sheet row number.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetRow {
    pub(crate) number: usize,
    cells: HashMap<String, CellValue>,
}

impl SheetRow {
    pub(crate) fn new(number: usize, cells: HashMap<String, CellValue>) -> Self {
        Self { number, cells }
    }

    /// Row submitted as JSON objects; the first object is sheet row 2.
    pub(crate) fn from_json(index: usize, object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let cells = object
            .iter()
            .map(|(column, value)| (column.trim().to_string(), CellValue::from(value)))
            .collect();
        Self { number: index + 2, cells }
    }

    pub(crate) fn cell(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&CellValue::Empty)
    }

    pub(crate) fn text(&self, column: &str) -> Option<String> {
        self.cell(column).as_text()
    }

    fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_blank)
    }
}

#[derive(Debug, Error)]
pub(crate) enum SpreadsheetError {
    #[error("unreadable workbook: {0}")]
    Unreadable(String),
    #[error("workbook has no worksheet")]
    NoWorksheet,
}

/// Reads the first worksheet. Row 1 is the header; fully blank data rows are
/// skipped but keep their position in the numbering.
pub(crate) fn read_rows(bytes: &[u8]) -> Result<Vec<SheetRow>, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| SpreadsheetError::Unreadable(err.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)?
        .map_err(|err| SpreadsheetError::Unreadable(err.to_string()))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let columns: Vec<Option<String>> = header
        .iter()
        .map(|cell| CellValue::from(cell).as_text())
        .collect();

    let mut result = Vec::new();
    for (offset, values) in rows.enumerate() {
        let cells = columns
            .iter()
            .zip(values.iter())
            .filter_map(|(column, value)| {
                column.as_ref().map(|name| (name.clone(), CellValue::from(value)))
            })
            .collect();
        // +1 for the header, +1 for 1-based numbering.
        let row = SheetRow::new(first_row + offset + 2, cells);
        if !row.is_blank() {
            result.push(row);
        }
    }

    Ok(result)
}
