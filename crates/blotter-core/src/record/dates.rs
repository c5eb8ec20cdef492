use chrono::{NaiveDate, NaiveDateTime};

/// Date renderings observed on the portal, most specific first.
const DATE_FORMATS: [&str; 4] = ["%m/%d/%Y %H:%M", "%m/%d/%y %H:%M", "%m/%d/%Y", "%m/%d/%y"];

/// Parse a date as the portal renders it. Returns None for anything that is
/// not a date, including placeholder values like "N/A".
pub fn parse_portal_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime);
        }
        // Date-only renderings carry no time component
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Days served, inclusive of the booking day. Open bookings count up to
/// `as_of`.
pub fn time_served_days(
    booking: NaiveDateTime,
    release: Option<NaiveDateTime>,
    as_of: NaiveDateTime,
) -> i64 {
    let end = release.unwrap_or(as_of);
    ((end.date() - booking.date()).num_days() + 1).max(0)
}
