use super::dates::parse_portal_date;
use chrono::NaiveDateTime;

/// Whether the person behind a booking record is still held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyStatus {
    InCustody,
    Released,
    Unknown,
}

impl CustodyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyStatus::InCustody => "In Custody",
            CustodyStatus::Released => "Released",
            CustodyStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for CustodyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facility strings that indicate the person is still held.
const CUSTODY_INDICATORS: [&str; 10] = [
    "jail",
    "prison",
    "facility",
    "block",
    "pod",
    "cell",
    "detention",
    "surety bond",
    "bonds",
    "holding",
];

/// Release-date placeholders the portal renders for open bookings.
const OPEN_BOOKING_PLACEHOLDERS: [&str; 3] = ["n/a", "unknown", "still in custody"];

/// Decide custody from the release-date and facility renderings.
///
/// A parseable release date in the past means released. Otherwise a facility
/// string naming a holding location means still in custody. Anything else is
/// unknown rather than guessed.
pub fn determine_custody(release_date: &str, facility: &str, as_of: NaiveDateTime) -> CustodyStatus {
    let release = release_date.trim();
    let release_lower = release.to_lowercase();

    let is_placeholder =
        release.is_empty() || OPEN_BOOKING_PLACEHOLDERS.contains(&release_lower.as_str());

    if !is_placeholder {
        // The portal sometimes appends "Time: HH:MM" after the date proper
        let clean = match release_lower.find("time:") {
            Some(at) => release[..at].trim_end(),
            None => release,
        };

        if let Some(date) = parse_portal_date(clean) {
            if date <= as_of {
                return CustodyStatus::Released;
            }
        }
    }

    let facility_lower = facility.to_lowercase();
    if CUSTODY_INDICATORS
        .iter()
        .any(|indicator| facility_lower.contains(indicator))
    {
        return CustodyStatus::InCustody;
    }

    CustodyStatus::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDateTime {
        parse_portal_date("06/01/2024 12:00").unwrap()
    }

    #[test]
    fn test_past_release_date_means_released() {
        let status = determine_custody("03/15/2024", "Main Detention Facility", as_of());
        assert_eq!(status, CustodyStatus::Released);
    }

    #[test]
    fn test_trailing_time_suffix_stripped() {
        let status = determine_custody("03/15/2024 Time: 08:45", "", as_of());
        assert_eq!(status, CustodyStatus::Released);
    }

    #[test]
    fn test_placeholder_with_facility_means_in_custody() {
        let status = determine_custody("N/A", "Cell Block D", as_of());
        assert_eq!(status, CustodyStatus::InCustody);
    }

    #[test]
    fn test_future_release_date_falls_through_to_facility() {
        let status = determine_custody("12/31/2099", "Holding Pod 3", as_of());
        assert_eq!(status, CustodyStatus::InCustody);
    }

    #[test]
    fn test_no_signal_is_unknown() {
        let status = determine_custody("", "", as_of());
        assert_eq!(status, CustodyStatus::Unknown);

        let status = determine_custody("unknown", "NO FILE", as_of());
        assert_eq!(status, CustodyStatus::Unknown);
    }
}
