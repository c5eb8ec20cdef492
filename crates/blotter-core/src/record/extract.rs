use super::{BookingRecord, fields};
use crate::{Error, Result};
use regex::Regex;

/// How to pull one field's value out of a rendered entry.
#[derive(Debug, Clone)]
pub enum FieldParser {
    /// Capture group 1 of a pattern applied to the whole entry text.
    Pattern(Regex),
    /// First non-empty line after the line containing the label.
    NextLine { label: String },
    /// Every line after the label up to the next "Label:" line, joined with
    /// " | " (charge lists span lines).
    Block { label: String },
}

/// One extraction rule: a target field name, a parser, and an optional
/// fallback used when the parser finds nothing.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: String,
    parser: FieldParser,
    fallback: Option<String>,
}

impl FieldRule {
    pub fn pattern(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self {
            name: name.into(),
            parser: FieldParser::Pattern(regex),
            fallback: None,
        })
    }

    pub fn next_line(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parser: FieldParser::NextLine {
                label: label.into(),
            },
            fallback: None,
        }
    }

    pub fn block(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parser: FieldParser::Block {
                label: label.into(),
            },
            fallback: None,
        }
    }

    /// Value to record when the parser finds nothing.
    pub fn or(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, text: &str) -> Option<String> {
        match &self.parser {
            FieldParser::Pattern(regex) => regex
                .captures(text)
                .and_then(|captures| captures.get(1))
                .map(|group| group.as_str().trim().to_string())
                .filter(|value| !value.is_empty()),
            FieldParser::NextLine { label } => {
                let mut lines = text.lines();
                lines.find(|line| line.contains(label.as_str()))?;
                lines
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(String::from)
            }
            FieldParser::Block { label } => {
                let mut lines = text.lines();
                lines.find(|line| line.contains(label.as_str()))?;
                let block: Vec<&str> = lines
                    .map(str::trim)
                    .take_while(|line| !line.contains(':'))
                    .filter(|line| !line.is_empty())
                    .collect();
                if block.is_empty() {
                    None
                } else {
                    Some(block.join(" | "))
                }
            }
        }
    }
}

/// The set of rules that turns a rendered entry into a [`BookingRecord`].
///
/// The field set is configuration, not code: callers can supply their own
/// rules when the portal's markup changes or a different site is scraped.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    rules: Vec<FieldRule>,
}

impl RecordSchema {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Rules matching the booking portal's current rendering.
    pub fn booking_default() -> Self {
        let rules = vec![
            FieldRule::pattern(fields::BOOKING_NUMBER, r"Booking Number:\s*(\d+)")
                .expect("static pattern")
                .or("Unknown"),
            FieldRule::pattern(
                fields::BOOKING_DATE,
                r"Booking Date/Time:\s*([0-9]{1,2}/[0-9]{1,2}/[0-9]{4}(?: [0-9]{1,2}:[0-9]{2})?)",
            )
            .expect("static pattern")
            .or("Unknown"),
            FieldRule::pattern(
                fields::RELEASE_DATE,
                r"Release Date:\s*([0-9]{1,2}/[0-9]{1,2}/[0-9]{2,4}(?: [0-9]{1,2}:[0-9]{2})?)",
            )
            .expect("static pattern")
            .or("N/A"),
            FieldRule::block(fields::CHARGES, "Charges:").or("Not specified"),
            FieldRule::pattern(fields::FACILITY, r"Facility:\s*(.+)")
                .expect("static pattern")
                .or("Not specified"),
        ];
        Self::new(rules)
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Extract a record from one rendered entry.
    ///
    /// Returns None when no rule matched anything — the page structure did
    /// not line up with the schema, which is a parse failure, distinct from
    /// a results page with zero entries.
    pub fn extract(&self, text: &str) -> Option<BookingRecord> {
        let mut record = BookingRecord::from_raw_text(text);
        let mut matched = 0;

        for rule in &self.rules {
            match rule.apply(text) {
                Some(value) => {
                    matched += 1;
                    record.set(rule.name(), value);
                }
                None => {
                    if let Some(fallback) = &rule.fallback {
                        record.set(rule.name(), fallback.clone());
                    }
                }
            }
        }

        if matched == 0 {
            tracing::debug!("no schema rule matched entry text ({} chars)", text.len());
            return None;
        }

        Some(record)
    }
}
