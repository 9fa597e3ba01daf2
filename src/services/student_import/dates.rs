use time::format_description::FormatItem;
use time::macros::{date, format_description};
use time::{Date, Duration};

/// Text layouts tried in order; the first one producing a real calendar
/// date wins. Day and month may omit their leading zero.
const LAYOUTS: [&[FormatItem<'static>]; 5] = [
    format_description!("[year]-[month padding:none]-[day padding:none]"),
    format_description!("[day padding:none]/[month padding:none]/[year]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
    format_description!("[day padding:none]-[month padding:none]-[year]"),
    format_description!("[year]/[month padding:none]/[day padding:none]"),
];

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const ITALIAN_DATE: &[FormatItem<'static>] = format_description!("[day]/[month]/[year]");

const SERIAL_EPOCH: Date = date!(1899 - 12 - 30);

/// Serial number of 9999-12-31, the last date a workbook can hold.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Spreadsheet serial day number to a date. Any time fraction is dropped.
pub(crate) fn from_serial(serial: f64) -> Option<Date> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    SERIAL_EPOCH.checked_add(Duration::days(serial.floor() as i64))
}

pub(crate) fn parse_text(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    // ISO timestamps from some writers carry a time part.
    let date_part = trimmed.split_once('T').map_or(trimmed, |(date, _)| date);
    LAYOUTS.iter().find_map(|layout| Date::parse(date_part, layout).ok())
}

/// Completed years between `birth` and `today`.
pub(crate) fn age_on(birth: Date, today: Date) -> i32 {
    let mut years = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        years -= 1;
    }
    years
}

pub(crate) fn format_iso(date: Date) -> String {
    date.format(ISO_DATE).unwrap_or_else(|_| date.to_string())
}

/// `dd/MM/yyyy`, the layout shown to users in the template.
pub(crate) fn format_italian(date: Date) -> String {
    date.format(ITALIAN_DATE).unwrap_or_else(|_| date.to_string())
}
