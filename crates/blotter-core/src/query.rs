use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One person to look up on the portal. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    last_name: String,
    first_name: String,
}

impl SearchQuery {
    /// Build a query. The portal requires a last name; the first name may be
    /// empty.
    pub fn new(last_name: impl Into<String>, first_name: impl Into<String>) -> Result<Self> {
        let last_name = last_name.into().trim().to_string();
        let first_name = first_name.into().trim().to_string();

        if last_name.is_empty() {
            return Err(Error::EmptyLastName);
        }

        Ok(Self {
            last_name,
            first_name,
        })
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first_name.is_empty() {
            write!(f, "{}", self.last_name)
        } else {
            write!(f, "{}, {}", self.last_name, self.first_name)
        }
    }
}

/// The full ordered list of queries submitted for one run. Duplicates are
/// allowed and processed independently.
pub type Batch = Vec<SearchQuery>;

/// Parse the "Lastname, Firstname" one-per-line format used by search inputs.
///
/// Blank lines and `#` comments are skipped. A line without a comma is taken
/// as a bare last name.
pub fn parse_name_lines(input: &str) -> Result<Batch> {
    let mut batch = Vec::new();

    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (last, first) = match line.split_once(',') {
            Some((last, first)) => (last, first),
            None => (line, ""),
        };

        let query = SearchQuery::new(last, first).map_err(|_| Error::NameLine {
            line: number + 1,
            text: line.to_string(),
        })?;
        batch.push(query);
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_last_name() {
        assert!(SearchQuery::new("", "John").is_err());
        assert!(SearchQuery::new("   ", "John").is_err());
        assert!(SearchQuery::new("Doe", "").is_ok());
    }

    #[test]
    fn test_query_display() {
        let full = SearchQuery::new("Doe", "John").unwrap();
        assert_eq!(full.to_string(), "Doe, John");

        let bare = SearchQuery::new("Doe", "").unwrap();
        assert_eq!(bare.to_string(), "Doe");
    }

    #[test]
    fn test_parse_name_lines() {
        let batch = parse_name_lines("Doe, John\nSmith, Jane\n").unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].last_name(), "Doe");
        assert_eq!(batch[0].first_name(), "John");
        assert_eq!(batch[1].last_name(), "Smith");
    }

    #[test]
    fn test_parse_skips_blanks_and_comments() {
        let batch = parse_name_lines("# roster\n\nDoe, John\n   \nSmith\n").unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].last_name(), "Smith");
        assert_eq!(batch[1].first_name(), "");
    }

    #[test]
    fn test_parse_rejects_missing_last_name() {
        let err = parse_name_lines("Doe, John\n, Jane\n").unwrap_err();
        match err {
            Error::NameLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicates_allowed() {
        let batch = parse_name_lines("Doe, John\nDoe, John\n").unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], batch[1]);
    }
}
