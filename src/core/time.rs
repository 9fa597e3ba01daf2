use time::{format_description::well_known::Rfc3339, Date, Month, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// School year a date falls in. The session starts in September.
pub(crate) fn school_year_for(date: Date) -> String {
    let year = date.year();
    if date.month() as u8 >= Month::September as u8 {
        format!("{}/{}", year, year + 1)
    } else {
        format!("{}/{}", year - 1, year)
    }
}

pub(crate) fn current_school_year() -> String {
    school_year_for(today_utc())
}
