mod custody;
mod dates;
mod extract;

pub use custody::{CustodyStatus, determine_custody};
pub use dates::{parse_portal_date, time_served_days};
pub use extract::{FieldParser, FieldRule, RecordSchema};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field names the default schema produces. The schema itself is data, so a
/// record may carry any field set; these constants only name the ones the
/// report and custody logic look for.
pub mod fields {
    pub const NAME: &str = "Name";
    pub const BOOKING_NUMBER: &str = "Booking Number";
    pub const BOOKING_DATE: &str = "Booking Date";
    pub const RELEASE_DATE: &str = "Release Date";
    pub const STATUS: &str = "Status";
    pub const TIME_SERVED_DAYS: &str = "Time Served (Days)";
    pub const CHARGES: &str = "Charges";
    pub const FACILITY: &str = "Facility";
}

/// One booking entry scraped from the portal.
///
/// Records are ordered field-name → value maps. Columns export in sorted
/// field-name order, and the rendered source text rides along out-of-band so
/// the tabular exports never include it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    raw_text: String,
}

impl BookingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record holding the rendered entry text it was parsed from.
    pub fn from_raw_text(raw_text: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            raw_text: raw_text.into(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field names in export (sorted) order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
