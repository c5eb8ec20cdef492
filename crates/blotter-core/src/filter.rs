use crate::record::{BookingRecord, fields, parse_portal_date};

/// Filter criteria for booking records.
///
/// All conditions combine with AND logic — a record must match every
/// specified criterion to pass.
#[derive(Debug, Default)]
pub struct RecordFilter {
    /// Custody status the record must carry, e.g. "Released".
    pub status: Option<String>,
    /// Case-insensitive substring to look for.
    pub text: Option<String>,
    /// Restrict the text match to one field; None searches every field.
    pub field: Option<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: String) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.text = Some(text.to_lowercase());
        self
    }

    pub fn with_field(mut self, field: String) -> Self {
        self.field = Some(field);
        self
    }

    /// Check whether a record passes every criterion.
    pub fn matches(&self, record: &BookingRecord) -> bool {
        if let Some(status) = &self.status {
            if record.get(fields::STATUS) != Some(status.as_str()) {
                return false;
            }
        }

        if let Some(text) = &self.text {
            let found = match &self.field {
                Some(field) => record
                    .get(field)
                    .is_some_and(|value| value.to_lowercase().contains(text)),
                None => record
                    .field_names()
                    .filter_map(|name| record.get(name))
                    .any(|value| value.to_lowercase().contains(text)),
            };
            if !found {
                return false;
            }
        }

        true
    }

    /// Apply the filter, preserving record order.
    pub fn apply(&self, records: &[BookingRecord]) -> Vec<BookingRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

/// Sort records by one field. Dates and the time-served count compare by
/// value; everything else compares as case-insensitive text. Records missing
/// the field sort last either way.
pub fn sort_records(records: &mut [BookingRecord], field: &str, ascending: bool) {
    records.sort_by(|a, b| {
        let ordering = match (sort_key(a, field), sort_key(b, field)) {
            (Some(ka), Some(kb)) => ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if ascending { ordering } else { ordering.reverse() }
    });
}

#[derive(PartialEq, PartialOrd)]
enum SortKey {
    Days(i64),
    Date(chrono::NaiveDateTime),
    Text(String),
}

fn sort_key(record: &BookingRecord, field: &str) -> Option<SortKey> {
    let value = record.get(field)?;

    if field == fields::TIME_SERVED_DAYS {
        if let Ok(days) = value.parse::<i64>() {
            return Some(SortKey::Days(days));
        }
    }

    if field == fields::BOOKING_DATE || field == fields::RELEASE_DATE {
        if let Some(date) = parse_portal_date(value) {
            return Some(SortKey::Date(date));
        }
    }

    Some(SortKey::Text(value.to_lowercase()))
}
